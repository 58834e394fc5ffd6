// src/block_path.rs
use crate::error::{BlockError, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

const BLOCK_DIR_SUFFIX: &str = ".blocks";
const BLOCK_FILE_PREFIX: &str = "block_";
// Minimum width; indices past 999999 simply grow more digits.
const INDEX_WIDTH: usize = 6;

#[cfg(unix)]
pub const MAX_PATH_LEN: usize = libc::PATH_MAX as usize;
#[cfg(not(unix))]
pub const MAX_PATH_LEN: usize = 260;

#[cfg(unix)]
pub const MAX_NAME_LEN: usize = libc::NAME_MAX as usize;
#[cfg(not(unix))]
pub const MAX_NAME_LEN: usize = 255;

/// `<name>.blocks`
pub fn block_dir(name: &Path) -> Result<PathBuf> {
    let mut dir = OsString::from(name.as_os_str());
    dir.push(BLOCK_DIR_SUFFIX);
    let dir = check_len(PathBuf::from(dir))?;
    check_file_name_len(dir)
}

/// `<name>.blocks/block_NNNNNN`
pub fn block_path(name: &Path, index: u64) -> Result<PathBuf> {
    let dir = block_dir(name)?;
    check_len(dir.join(block_file_name(index)))
}

pub fn block_file_name(index: u64) -> String {
    format!("{}{:0width$}", BLOCK_FILE_PREFIX, index, width = INDEX_WIDTH)
}

/// Inverse of [`block_file_name`]. Anything that is not a canonical block
/// file name (stray files, extra leading zeros) yields `None`.
pub fn parse_block_file_name(file_name: &str) -> Option<u64> {
    let digits = file_name.strip_prefix(BLOCK_FILE_PREFIX)?;
    if digits.len() < INDEX_WIDTH || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let index: u64 = digits.parse().ok()?;
    if block_file_name(index).len() != file_name.len() {
        return None;
    }
    Some(index)
}

fn check_len(path: PathBuf) -> Result<PathBuf> {
    let len = path.as_os_str().len();
    // PATH_MAX includes the terminating NUL
    if len >= MAX_PATH_LEN {
        return Err(BlockError::PathTooLong { path, len, limit: MAX_PATH_LEN });
    }
    Ok(path)
}

// `<name>.blocks` can push a legal file name over NAME_MAX.
fn check_file_name_len(path: PathBuf) -> Result<PathBuf> {
    let len = path.file_name().map_or(0, |n| n.len());
    if len > MAX_NAME_LEN {
        return Err(BlockError::PathTooLong { path, len, limit: MAX_NAME_LEN });
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composes_directory_and_block_paths() {
        let name = Path::new("data/test.db");
        assert_eq!(block_dir(name).unwrap(), PathBuf::from("data/test.db.blocks"));
        assert_eq!(
            block_path(name, 0).unwrap(),
            PathBuf::from("data/test.db.blocks/block_000000")
        );
        assert_eq!(
            block_path(name, 42).unwrap(),
            PathBuf::from("data/test.db.blocks/block_000042")
        );
    }

    #[test]
    fn large_indices_extend_the_name() {
        assert_eq!(block_file_name(999_999), "block_999999");
        assert_eq!(block_file_name(1_000_000), "block_1000000");
        assert_eq!(parse_block_file_name("block_1000000"), Some(1_000_000));
    }

    #[test]
    fn parses_only_canonical_names() {
        assert_eq!(parse_block_file_name("block_000000"), Some(0));
        assert_eq!(parse_block_file_name("block_012345"), Some(12345));

        assert_eq!(parse_block_file_name("block_0000001"), None);
        assert_eq!(parse_block_file_name("block_12"), None);
        assert_eq!(parse_block_file_name("block_00001a"), None);
        assert_eq!(parse_block_file_name("block_000001.tmp"), None);
        assert_eq!(parse_block_file_name("blk_000001"), None);
        assert_eq!(parse_block_file_name(".DS_Store"), None);
    }

    #[test]
    fn rejects_overlong_paths() {
        let long_name = "a".repeat(MAX_PATH_LEN);
        let err = block_dir(Path::new(&long_name)).unwrap_err();
        assert!(matches!(err, BlockError::PathTooLong { limit, .. } if limit == MAX_PATH_LEN));

        // Directory fits but the block path does not.
        let target = MAX_PATH_LEN - ".blocks".len() - 2;
        let mut name = String::new();
        while name.len() + 201 <= target {
            name.push_str(&"d".repeat(200));
            name.push('/');
        }
        name.push_str(&"b".repeat(target - name.len()));
        assert!(block_dir(Path::new(&name)).is_ok());
        assert!(matches!(
            block_path(Path::new(&name), 0),
            Err(BlockError::PathTooLong { limit, .. }) if limit == MAX_PATH_LEN
        ));
    }

    #[cfg(unix)]
    #[test]
    fn rejects_directory_name_over_name_max() {
        let tmp = std::env::temp_dir();

        let fits = "c".repeat(MAX_NAME_LEN - ".blocks".len());
        assert!(block_dir(&tmp.join(&fits)).is_ok());

        let too_long = "a".repeat(MAX_NAME_LEN - ".blocks".len() + 1);
        let err = block_dir(&tmp.join(&too_long)).unwrap_err();
        assert!(matches!(
            err,
            BlockError::PathTooLong { len, limit, .. } if len == MAX_NAME_LEN + 1 && limit == MAX_NAME_LEN
        ));
        assert!(matches!(block_path(&tmp.join(&too_long), 3), Err(BlockError::PathTooLong { .. })));
    }
}
