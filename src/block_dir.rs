// src/block_dir.rs
use crate::block_path::{block_dir, parse_block_file_name};
use crate::error::{BlockError, Result};
use log::debug;
use std::fs::{self, DirBuilder};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

#[cfg(unix)]
const BLOCK_DIR_MODE: u32 = 0o755;

/// One block file found on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEntry {
    pub index: u64,
    pub len: u64,
}

/// Makes sure `<name>.blocks/` exists and returns its path. An existing
/// directory, including one created concurrently by another opener, is fine.
pub fn ensure_dir(name: &Path) -> Result<PathBuf> {
    let dir = block_dir(name)?;

    match fs::metadata(&dir) {
        Ok(meta) if meta.is_dir() => return Ok(dir),
        Ok(_) => {
            return Err(BlockError::DirectoryCreate {
                path: dir,
                source: io::Error::new(ErrorKind::AlreadyExists, "exists and is not a directory"),
            })
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(BlockError::DirectoryCreate { path: dir, source: e }),
    }

    let mut builder = DirBuilder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(BLOCK_DIR_MODE);
    }

    match builder.create(&dir) {
        Ok(()) => {
            debug!("Created block directory {:?}", dir);
            Ok(dir)
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists && dir.is_dir() => Ok(dir),
        Err(e) => Err(BlockError::DirectoryCreate { path: dir, source: e }),
    }
}

/// Every block file currently in `dir`, sorted by index. A missing directory
/// holds no blocks.
pub fn list_blocks(dir: &Path) -> Result<Vec<BlockEntry>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(BlockError::io(dir, e)),
    };

    let mut blocks = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| BlockError::io(dir, e))?;
        let index = match entry.file_name().to_str().and_then(parse_block_file_name) {
            Some(index) => index,
            None => continue,
        };

        let meta = match entry.metadata() {
            Ok(meta) => meta,
            // Removed between readdir and stat
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(BlockError::io(entry.path(), e)),
        };
        if !meta.is_file() {
            continue;
        }

        blocks.push(BlockEntry { index, len: meta.len() });
    }

    blocks.sort_unstable_by_key(|b| b.index);
    Ok(blocks)
}

/// Removes `<name>.blocks/` and everything in it. Returns `false` if there
/// was nothing to remove.
pub fn remove_dir(name: &Path) -> Result<bool> {
    let dir = block_dir(name)?;
    match fs::remove_dir_all(&dir) {
        Ok(()) => {
            debug!("Removed block directory {:?}", dir);
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(BlockError::io(dir, e)),
    }
}
