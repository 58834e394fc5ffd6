// src/block_store.rs
//! A virtual file stored as a directory of fixed-size block files.
//!
//! Byte `offset` of the virtual file lives in block `offset / BLOCK_SIZE` at
//! position `offset % BLOCK_SIZE`. An absent block file reads as zeros, and a
//! short one reads as zeros past its physical end. The logical size is not
//! stored anywhere: it is recomputed from the block files on every call.
//!
//! # Concurrency
//!
//! Nothing here locks. Every call opens, uses and closes its block files, so
//! two handles on the same name (in one process or several) see each other's
//! writes, but:
//!
//! - a partial-block write is a read followed by a write, and two of them
//!   racing on the same block can lose one writer's bytes;
//! - a whole-block write is only as atomic as the filesystem makes a single
//!   file rewrite;
//! - `truncate` racing with `read`/`write` can leave holes or a boundary block
//!   with a stale length.
//!
//! Callers that need multi-writer safety must serialize access per virtual
//! file themselves, e.g. with a mutex keyed by name wrapped around the handle.

use crate::block_dir::{ensure_dir, list_blocks, BlockEntry};
use crate::block_path::block_path;
use crate::error::{BlockError, Result};
use log::debug;
use std::cmp;
use std::fs::{self, File};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

pub const BLOCK_SIZE: usize = 4096;
const BLOCK_SIZE_U64: u64 = BLOCK_SIZE as u64;

/// Handle on one virtual file. Holds nothing but the name; dropping or
/// closing it leaves the blocks on disk.
#[derive(Debug)]
pub struct BlockStore {
    name: PathBuf,
    dir: PathBuf,
}

impl BlockStore {
    pub fn open(name: impl AsRef<Path>) -> Result<Self> {
        let name = name.as_ref();
        if name.as_os_str().is_empty() {
            return Err(BlockError::invalid("empty virtual file name"));
        }

        let dir = ensure_dir(name)?;
        Ok(Self { name: name.to_path_buf(), dir })
    }

    pub fn name(&self) -> &Path {
        &self.name
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn close(self) {}

    /// Fills all of `buf` with the content starting at `offset`. Unwritten
    /// ranges and anything past the logical end read as zeros, so on success
    /// the return value is always `buf.len()`.
    pub fn read(&self, buf: &mut [u8], offset: i64) -> Result<usize> {
        let mut current_offset = check_span(offset, buf.len())?;
        let mut total_read = 0;

        while total_read < buf.len() {
            let (index, block_offset) = split_offset(current_offset);
            let chunk_size = cmp::min(buf.len() - total_read, BLOCK_SIZE - block_offset);

            let chunk = &mut buf[total_read..total_read + chunk_size];
            self.read_chunk(index, block_offset, chunk)?;

            total_read += chunk_size;
            current_offset += chunk_size as u64;
        }

        Ok(total_read)
    }

    fn read_chunk(&self, index: u64, block_offset: usize, chunk: &mut [u8]) -> Result<()> {
        let path = block_path(&self.name, index)?;

        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                chunk.fill(0);
                return Ok(());
            }
            Err(e) => return Err(BlockError::io(path, e)),
        };

        file.seek(SeekFrom::Start(block_offset as u64))
            .map_err(|e| BlockError::io(&path, e))?;
        let n = read_up_to(&mut file, chunk).map_err(|e| BlockError::io(&path, e))?;
        chunk[n..].fill(0);
        Ok(())
    }

    /// Stores `buf` at `offset`. Blocks already written stay written if a
    /// later block fails.
    pub fn write(&self, buf: &[u8], offset: i64) -> Result<usize> {
        let mut current_offset = check_span(offset, buf.len())?;
        let mut total_written = 0;

        while total_written < buf.len() {
            let (index, block_offset) = split_offset(current_offset);
            let chunk_size = cmp::min(buf.len() - total_written, BLOCK_SIZE - block_offset);
            let chunk = &buf[total_written..total_written + chunk_size];
            let path = block_path(&self.name, index)?;

            if block_offset == 0 && chunk_size == BLOCK_SIZE {
                fs::write(&path, chunk).map_err(|e| BlockError::io(&path, e))?;
            } else {
                // Read-Modify-Write; the block always goes back at full length
                let mut block_data = load_block(&path)?;
                block_data[block_offset..block_offset + chunk_size].copy_from_slice(chunk);
                fs::write(&path, &block_data[..]).map_err(|e| BlockError::io(&path, e))?;
            }

            total_written += chunk_size;
            current_offset += chunk_size as u64;
        }

        Ok(total_written)
    }

    /// Sets the logical size. Blocks wholly past `new_size` are deleted and an
    /// unaligned boundary block is cut to `new_size % BLOCK_SIZE` bytes.
    pub fn truncate(&self, new_size: i64) -> Result<()> {
        if new_size < 0 {
            return Err(BlockError::invalid(format!("negative size {}", new_size)));
        }
        let new_size = new_size as u64;
        let keep_blocks = new_size.div_ceil(BLOCK_SIZE_U64);

        let mut removed = 0;
        for entry in list_blocks(&self.dir)? {
            if entry.index < keep_blocks {
                continue;
            }
            let path = block_path(&self.name, entry.index)?;
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(BlockError::io(path, e)),
            }
        }
        if removed > 0 {
            debug!("Truncate {:?}: removed {} block(s) from index {}", self.name, removed, keep_blocks);
        }

        let tail_len = (new_size % BLOCK_SIZE_U64) as usize;
        if tail_len != 0 {
            let path = block_path(&self.name, (new_size - 1) / BLOCK_SIZE_U64)?;
            let block_data = load_block(&path)?;
            fs::write(&path, &block_data[..tail_len]).map_err(|e| BlockError::io(&path, e))?;
        }

        Ok(())
    }

    /// Highest `index * BLOCK_SIZE + len` over the block files on disk.
    pub fn size(&self) -> Result<u64> {
        let max_size = list_blocks(&self.dir)?
            .iter()
            .map(|b| {
                b.index
                    .saturating_mul(BLOCK_SIZE_U64)
                    .saturating_add(cmp::min(b.len, BLOCK_SIZE_U64))
            })
            .max()
            .unwrap_or(0);
        Ok(max_size)
    }

    pub fn blocks(&self) -> Result<Vec<BlockEntry>> {
        list_blocks(&self.dir)
    }
}

/// Validates `len` bytes at `offset` and returns the offset as unsigned.
pub(crate) fn check_span(offset: i64, len: usize) -> Result<u64> {
    if offset < 0 {
        return Err(BlockError::invalid(format!("negative offset {}", offset)));
    }
    i64::try_from(len)
        .ok()
        .and_then(|len| offset.checked_add(len))
        .ok_or_else(|| BlockError::invalid(format!("{} bytes at offset {} overflows", len, offset)))?;
    Ok(offset as u64)
}

fn split_offset(offset: u64) -> (u64, usize) {
    (offset / BLOCK_SIZE_U64, (offset % BLOCK_SIZE_U64) as usize)
}

/// Current content of a block, zero-padded to `BLOCK_SIZE`.
fn load_block(path: &Path) -> Result<[u8; BLOCK_SIZE]> {
    let mut block_data = [0u8; BLOCK_SIZE];
    match File::open(path) {
        Ok(mut file) => {
            read_up_to(&mut file, &mut block_data).map_err(|e| BlockError::io(path, e))?;
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(BlockError::io(path, e)),
    }
    Ok(block_data)
}

/// Like `read_exact`, but stopping quietly at end of file.
fn read_up_to(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
