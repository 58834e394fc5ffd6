// src/lib.rs
//! Random-access virtual files stored as directories of 4 KiB block files.
//!
//! A virtual file named `data/app.db` lives in `data/app.db.blocks/`, one
//! file per block (`block_000000`, `block_000001`, ...). Blocks that were
//! never written have no file and read back as zeros.

pub mod block_dir;
pub mod block_path;
pub mod block_store;
pub mod error;
pub mod vfs;
pub mod virtual_file;

pub use block_dir::BlockEntry;
pub use block_store::{BlockStore, BLOCK_SIZE};
pub use error::{BlockError, Result};
pub use vfs::{StorageMode, Vfs, VfsConfig};
pub use virtual_file::{AuditedFile, BlockFile, PassthroughFile, VirtualFile};
