//! Timestamped backups of superseded store files

use std::io;
use std::path::{Path, PathBuf};

/// Save a copy of `path` in `backups_dir` as `<stem>_<timestamp>.parquet`
///
/// `path` itself stays in place so a store file exists at every moment;
/// the caller replaces it afterwards. Timestamps carry milliseconds; a
/// numeric suffix disambiguates the rare collision so an earlier backup is
/// never overwritten.
pub(crate) fn preserve(path: &Path, backups_dir: &Path, stem: &str) -> io::Result<PathBuf> {
    std::fs::create_dir_all(backups_dir)?;

    let stamp = chrono::Local::now().format("%Y%m%d%H%M%S%3f").to_string();
    let target = unused_name(backups_dir, stem, &stamp);

    match std::fs::hard_link(path, &target) {
        Ok(()) => Ok(target),
        Err(_) => {
            // Different filesystem or no link support
            std::fs::copy(path, &target)?;
            Ok(target)
        }
    }
}

fn unused_name(dir: &Path, stem: &str, stamp: &str) -> PathBuf {
    let first = dir.join(format!("{}_{}.parquet", stem, stamp));
    if !first.exists() {
        return first;
    }

    let mut n = 1u32;
    loop {
        let candidate = dir.join(format!("{}_{}_{}.parquet", stem, stamp, n));
        if !candidate.exists() {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preserve_keeps_bytes_and_source() {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("job.parquet");
        std::fs::write(&source, b"previous version").unwrap();

        let backups = temp.path().join("backups");
        let moved = preserve(&source, &backups, "job").unwrap();

        assert_eq!(std::fs::read(&source).unwrap(), b"previous version");
        assert_eq!(std::fs::read(&moved).unwrap(), b"previous version");
        let name = moved.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("job_"));
        assert!(name.ends_with(".parquet"));
    }

    #[test]
    fn test_colliding_stamp_gets_suffix() {
        let temp = tempfile::tempdir().unwrap();
        std::fs::write(temp.path().join("job_20240101000000000.parquet"), b"a").unwrap();

        let next = unused_name(temp.path(), "job", "20240101000000000");
        assert_eq!(
            next.file_name().unwrap().to_string_lossy(),
            "job_20240101000000000_1.parquet"
        );
    }
}
