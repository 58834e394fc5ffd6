// src/vfs.rs
use crate::block_dir::remove_dir;
use crate::block_path::block_dir;
use crate::block_store::BlockStore;
use crate::error::{BlockError, Result};
use crate::virtual_file::{AuditedFile, PassthroughFile, VirtualFile};
use log::{info, warn};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageMode {
    /// `<name>.blocks/block_NNNNNN` files
    #[default]
    Block,
    /// The native file at `<name>`
    Passthrough,
}

impl FromStr for StorageMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "block" | "blocks" => Ok(StorageMode::Block),
            "passthrough" | "native" => Ok(StorageMode::Passthrough),
            other => Err(format!("unknown storage mode '{}' (expected block or passthrough)", other)),
        }
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageMode::Block => f.write_str("block"),
            StorageMode::Passthrough => f.write_str("passthrough"),
        }
    }
}

/// Fixed for the lifetime of a [`Vfs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VfsConfig {
    pub mode: StorageMode,
    /// Wrap opened files in [`AuditedFile`].
    pub audit: bool,
}

impl Default for VfsConfig {
    fn default() -> Self {
        VfsConfig { mode: StorageMode::Block, audit: true }
    }
}

/// Opens and removes virtual files according to its configuration.
#[derive(Debug, Clone, Default)]
pub struct Vfs {
    config: VfsConfig,
}

impl Vfs {
    pub fn new(config: VfsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &VfsConfig {
        &self.config
    }

    pub fn open(&self, name: impl AsRef<Path>) -> Result<Box<dyn VirtualFile>> {
        let name = name.as_ref();

        let opened: Result<Box<dyn VirtualFile>> = match self.config.mode {
            StorageMode::Block => {
                BlockStore::open(name).map(|f| Box::new(f) as Box<dyn VirtualFile>)
            }
            StorageMode::Passthrough => {
                PassthroughFile::open(name).map(|f| Box::new(f) as Box<dyn VirtualFile>)
            }
        };

        let file = match opened {
            Ok(file) => file,
            Err(e) => {
                if self.config.audit {
                    warn!("OPEN {} ({}): FAILED: {}", name.display(), self.config.mode, e);
                }
                return Err(e);
            }
        };

        if !self.config.audit {
            return Ok(file);
        }
        info!("OPEN {} ({})", name.display(), self.config.mode);
        Ok(Box::new(AuditedFile::new(file)))
    }

    /// Removes everything stored under `name`. Absent data is not an error.
    pub fn delete(&self, name: impl AsRef<Path>) -> Result<()> {
        let name = name.as_ref();

        let result = match self.config.mode {
            StorageMode::Block => remove_dir(name).and_then(|_| remove_native(name)),
            StorageMode::Passthrough => remove_native(name),
        };

        if self.config.audit {
            match &result {
                Ok(()) => info!("DELETE {} ({})", name.display(), self.config.mode),
                Err(e) => warn!("DELETE {} ({}): FAILED: {}", name.display(), self.config.mode, e),
            }
        }
        result
    }

    pub fn exists(&self, name: impl AsRef<Path>) -> Result<bool> {
        let name = name.as_ref();
        let path = match self.config.mode {
            StorageMode::Block => block_dir(name)?,
            StorageMode::Passthrough => name.to_path_buf(),
        };

        match fs::metadata(&path) {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BlockError::io(path, e)),
        }
    }
}

fn remove_native(name: &Path) -> Result<()> {
    match fs::remove_file(name) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BlockError::io(name, e)),
    }
}
