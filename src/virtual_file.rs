// src/virtual_file.rs
use crate::block_store::{check_span, BlockStore};
use crate::error::{BlockError, Result};
use log::{info, warn};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Random-access byte storage behind one name. Reads always fill the whole
/// buffer; anything past the stored data reads as zeros.
pub trait VirtualFile: Send + Sync {
    fn name(&self) -> &Path;
    fn read(&self, buf: &mut [u8], offset: i64) -> Result<usize>;
    fn write(&self, buf: &[u8], offset: i64) -> Result<usize>;
    fn truncate(&self, new_size: i64) -> Result<()>;
    fn size(&self) -> Result<u64>;

    fn sync(&self) -> Result<()> {
        Ok(())
    }
}

/// Block storage variant. Every block write has closed its file before
/// returning, so there is nothing to sync.
pub type BlockFile = BlockStore;

impl VirtualFile for BlockStore {
    fn name(&self) -> &Path {
        BlockStore::name(self)
    }

    fn read(&self, buf: &mut [u8], offset: i64) -> Result<usize> {
        BlockStore::read(self, buf, offset)
    }

    fn write(&self, buf: &[u8], offset: i64) -> Result<usize> {
        BlockStore::write(self, buf, offset)
    }

    fn truncate(&self, new_size: i64) -> Result<()> {
        BlockStore::truncate(self, new_size)
    }

    fn size(&self) -> Result<u64> {
        BlockStore::size(self)
    }
}

impl<F: VirtualFile + ?Sized> VirtualFile for Box<F> {
    fn name(&self) -> &Path {
        (**self).name()
    }

    fn read(&self, buf: &mut [u8], offset: i64) -> Result<usize> {
        (**self).read(buf, offset)
    }

    fn write(&self, buf: &[u8], offset: i64) -> Result<usize> {
        (**self).write(buf, offset)
    }

    fn truncate(&self, new_size: i64) -> Result<()> {
        (**self).truncate(new_size)
    }

    fn size(&self) -> Result<u64> {
        (**self).size()
    }

    fn sync(&self) -> Result<()> {
        (**self).sync()
    }
}

/// One native file, used as-is.
#[derive(Debug)]
pub struct PassthroughFile {
    name: PathBuf,
    file: File,
}

impl PassthroughFile {
    pub fn open(name: impl AsRef<Path>) -> Result<Self> {
        let name = name.as_ref();
        if name.as_os_str().is_empty() {
            return Err(BlockError::invalid("empty virtual file name"));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(name)
            .map_err(|e| BlockError::io(name, e))?;

        Ok(Self { name: name.to_path_buf(), file })
    }
}

impl VirtualFile for PassthroughFile {
    fn name(&self) -> &Path {
        &self.name
    }

    fn read(&self, buf: &mut [u8], offset: i64) -> Result<usize> {
        let offset = check_span(offset, buf.len())?;

        let mut filled = 0;
        while filled < buf.len() {
            match read_at(&self.file, &mut buf[filled..], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(BlockError::io(&self.name, e)),
            }
        }
        buf[filled..].fill(0);
        Ok(buf.len())
    }

    fn write(&self, buf: &[u8], offset: i64) -> Result<usize> {
        let offset = check_span(offset, buf.len())?;

        let mut written = 0;
        while written < buf.len() {
            match write_at(&self.file, &buf[written..], offset + written as u64) {
                Ok(0) => {
                    let e = io::Error::new(ErrorKind::WriteZero, "failed to write whole buffer");
                    return Err(BlockError::io(&self.name, e));
                }
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(BlockError::io(&self.name, e)),
            }
        }
        Ok(written)
    }

    fn truncate(&self, new_size: i64) -> Result<()> {
        if new_size < 0 {
            return Err(BlockError::invalid(format!("negative size {}", new_size)));
        }
        self.file.set_len(new_size as u64).map_err(|e| BlockError::io(&self.name, e))
    }

    fn size(&self) -> Result<u64> {
        let meta = self.file.metadata().map_err(|e| BlockError::io(&self.name, e))?;
        Ok(meta.len())
    }

    fn sync(&self) -> Result<()> {
        self.file.sync_all().map_err(|e| BlockError::io(&self.name, e))
    }
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    std::os::unix::fs::FileExt::read_at(file, buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    std::os::windows::fs::FileExt::seek_read(file, buf, offset)
}

#[cfg(unix)]
fn write_at(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    std::os::unix::fs::FileExt::write_at(file, buf, offset)
}

#[cfg(windows)]
fn write_at(file: &File, buf: &[u8], offset: u64) -> io::Result<usize> {
    std::os::windows::fs::FileExt::seek_write(file, buf, offset)
}

/// Logs every call on the wrapped file (inputs, outcome, latency) and
/// otherwise passes it straight through.
pub struct AuditedFile<F: VirtualFile> {
    inner: F,
}

impl<F: VirtualFile> AuditedFile<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }

    fn audit<T: fmt::Debug>(
        &self,
        op: &str,
        detail: fmt::Arguments<'_>,
        started: Instant,
        result: Result<T>,
    ) -> Result<T> {
        let elapsed = started.elapsed();
        match &result {
            Ok(value) => info!(
                "{} {}: {} -> {:?} ({:?})",
                op, self.inner.name().display(), detail, value, elapsed
            ),
            Err(e) => warn!(
                "{} {}: {} -> FAILED ({:?}): {}",
                op, self.inner.name().display(), detail, elapsed, e
            ),
        }
        result
    }
}

impl<F: VirtualFile> VirtualFile for AuditedFile<F> {
    fn name(&self) -> &Path {
        self.inner.name()
    }

    fn read(&self, buf: &mut [u8], offset: i64) -> Result<usize> {
        let started = Instant::now();
        let result = self.inner.read(buf, offset);
        self.audit("READ", format_args!("{} bytes at offset {}", buf.len(), offset), started, result)
    }

    fn write(&self, buf: &[u8], offset: i64) -> Result<usize> {
        let started = Instant::now();
        let result = self.inner.write(buf, offset);
        self.audit("WRITE", format_args!("{} bytes at offset {}", buf.len(), offset), started, result)
    }

    fn truncate(&self, new_size: i64) -> Result<()> {
        let started = Instant::now();
        let result = self.inner.truncate(new_size);
        self.audit("TRUNCATE", format_args!("to {} bytes", new_size), started, result)
    }

    fn size(&self) -> Result<u64> {
        let started = Instant::now();
        let result = self.inner.size();
        self.audit("FILESIZE", format_args!("query"), started, result)
    }

    fn sync(&self) -> Result<()> {
        let started = Instant::now();
        let result = self.inner.sync();
        self.audit("SYNC", format_args!("flush"), started, result)
    }
}

impl<F: VirtualFile> Drop for AuditedFile<F> {
    fn drop(&mut self) {
        info!("CLOSE {}", self.inner.name().display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn exercise(file: &dyn VirtualFile) -> Vec<u8> {
        file.write(b"Hello, World!", 0).unwrap();
        file.write(&[7u8; 5000], 3000).unwrap();
        file.truncate(6000).unwrap();

        let mut buf = vec![0xFFu8; 7000];
        assert_eq!(file.read(&mut buf, 0).unwrap(), 7000);
        buf
    }

    #[test]
    fn passthrough_zero_fills_past_eof() {
        let tmp = tempdir().unwrap();
        let file = PassthroughFile::open(tmp.path().join("plain.db")).unwrap();

        file.write(b"abc", 0).unwrap();
        assert_eq!(file.size().unwrap(), 3);

        let mut buf = [0xFFu8; 8];
        assert_eq!(file.read(&mut buf, 1).unwrap(), 8);
        assert_eq!(buf, [b'b', b'c', 0, 0, 0, 0, 0, 0]);
        file.sync().unwrap();
    }

    #[test]
    fn passthrough_and_block_agree_on_content() {
        let tmp = tempdir().unwrap();
        let plain = PassthroughFile::open(tmp.path().join("a.db")).unwrap();
        let blocks = BlockStore::open(tmp.path().join("b.db")).unwrap();

        let expected = exercise(&plain);
        assert_eq!(exercise(&blocks), expected);
        assert_eq!(&expected[..13], b"Hello, World!");
        assert!(expected[6000..].iter().all(|&b| b == 0));
        assert_eq!(plain.size().unwrap(), 6000);
        assert_eq!(VirtualFile::size(&blocks).unwrap(), 6000);
    }

    #[test]
    fn passthrough_rejects_negative_offsets() {
        let tmp = tempdir().unwrap();
        let file = PassthroughFile::open(tmp.path().join("neg.db")).unwrap();

        let mut buf = [0u8; 4];
        assert!(matches!(file.read(&mut buf, -8), Err(BlockError::InvalidArgument(_))));
        assert!(matches!(file.truncate(-1), Err(BlockError::InvalidArgument(_))));
    }

    #[test]
    fn audited_file_is_transparent() {
        let tmp = tempdir().unwrap();
        let store = BlockStore::open(tmp.path().join("audit.db")).unwrap();
        let audited = AuditedFile::new(store);

        assert_eq!(audited.write(b"logged", 4093).unwrap(), 6);
        let mut buf = [0u8; 6];
        assert_eq!(audited.read(&mut buf, 4093).unwrap(), 6);
        assert_eq!(&buf, b"logged");
        assert_eq!(audited.size().unwrap(), 8192);
        audited.sync().unwrap();

        assert!(matches!(audited.write(b"x", -1), Err(BlockError::InvalidArgument(_))));
        assert_eq!(audited.inner().blocks().unwrap().len(), 2);
    }

    #[test]
    fn boxed_files_delegate() {
        let tmp = tempdir().unwrap();
        let boxed: Box<dyn VirtualFile> =
            Box::new(AuditedFile::new(BlockStore::open(tmp.path().join("boxed.db")).unwrap()));

        boxed.write(&[1, 2, 3], 10).unwrap();
        assert_eq!(boxed.name(), tmp.path().join("boxed.db"));
        assert_eq!(boxed.size().unwrap(), 4096);
    }
}
