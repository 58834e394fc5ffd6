// tests/virtual_files.rs
use blockvfs::{BlockError, BlockStore, StorageMode, Vfs, VfsConfig, BLOCK_SIZE};
use std::fs;
use tempfile::tempdir;

fn page(n: u8) -> Vec<u8> {
    vec![n; BLOCK_SIZE]
}

#[test]
fn pages_written_through_vfs_are_block_files() {
    let tmp = tempdir().unwrap();
    let name = tmp.path().join("pages.db");
    let vfs = Vfs::new(VfsConfig::default());

    let file = vfs.open(&name).unwrap();
    for n in 0..4u8 {
        file.write(&page(n + 1), n as i64 * BLOCK_SIZE as i64).unwrap();
    }
    assert_eq!(file.size().unwrap(), 4 * BLOCK_SIZE as u64);
    drop(file);

    let dir = tmp.path().join("pages.db.blocks");
    for n in 0..4u8 {
        let raw = fs::read(dir.join(format!("block_{:06}", n))).unwrap();
        assert_eq!(raw, page(n + 1));
    }
}

#[test]
fn reopened_handles_see_earlier_writes() {
    let tmp = tempdir().unwrap();
    let name = tmp.path().join("reopen.db");
    let vfs = Vfs::new(VfsConfig { mode: StorageMode::Block, audit: false });

    {
        let file = vfs.open(&name).unwrap();
        file.write(b"first handle", 7000).unwrap();
    }

    let file = vfs.open(&name).unwrap();
    let mut buf = [0u8; 12];
    file.read(&mut buf, 7000).unwrap();
    assert_eq!(&buf, b"first handle");

    // A plain BlockStore on the same name agrees.
    let store = BlockStore::open(&name).unwrap();
    assert_eq!(store.size().unwrap(), file.size().unwrap());
}

#[test]
fn journal_style_shrink_and_regrow() {
    let tmp = tempdir().unwrap();
    let file = Vfs::default().open(tmp.path().join("journal.db")).unwrap();

    file.write(&vec![0xAB; 3 * BLOCK_SIZE + 512], 0).unwrap();
    file.truncate(0).unwrap();
    assert_eq!(file.size().unwrap(), 0);

    file.write(b"header", 0).unwrap();
    let mut buf = vec![0xFF; 2 * BLOCK_SIZE];
    file.read(&mut buf, 0).unwrap();
    assert_eq!(&buf[..6], b"header");
    assert!(buf[6..].iter().all(|&b| b == 0));
}

#[test]
fn errors_reach_the_caller_unchanged() {
    let tmp = tempdir().unwrap();
    let file = Vfs::default().open(tmp.path().join("errors.db")).unwrap();

    let mut buf = [0u8; 1];
    let err = file.read(&mut buf, -1).unwrap_err();
    assert!(matches!(err, BlockError::InvalidArgument(_)));
    assert!(err.to_string().contains("negative offset"));
}
