//! On-disk layout below the root folder
//!
//! ```text
//! <root>/
//! ├── stores/           # one <job>.parquet per job
//! ├── store_backups/    # previous store versions, timestamped
//! ├── media/<job>/      # synthesized and transcoded audio
//! └── decks/            # packaged deck archives
//! ```

use crate::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// Paths derived from the resolved root folder
#[derive(Debug, Clone)]
pub struct RootLayout {
    root: PathBuf,
}

impl RootLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stores_dir(&self) -> PathBuf {
        self.root.join("stores")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.root.join("store_backups")
    }

    pub fn media_dir(&self, job: &str) -> PathBuf {
        self.root.join("media").join(sanitize_job_name(job))
    }

    pub fn decks_dir(&self) -> PathBuf {
        self.root.join("decks")
    }

    /// Create every shared directory (media folders are created per job)
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [self.stores_dir(), self.backups_dir(), self.decks_dir()] {
            if !dir.exists() {
                std::fs::create_dir_all(&dir)?;
                info!("Created directory: {}", dir.display());
            }
        }
        Ok(())
    }

    /// Create the media folder for a job and return it
    pub fn ensure_media_dir(&self, job: &str) -> Result<PathBuf> {
        let dir = self.media_dir(job);
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }
}

/// Job names become file names; keep them to a portable character set
pub fn sanitize_job_name(job: &str) -> String {
    let cleaned: String = job
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | ' ') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "job".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_are_below_root() {
        let layout = RootLayout::new("/tmp/deckgen-root");
        assert_eq!(layout.stores_dir(), PathBuf::from("/tmp/deckgen-root/stores"));
        assert_eq!(
            layout.media_dir("A1 words"),
            PathBuf::from("/tmp/deckgen-root/media/A1 words")
        );
    }

    #[test]
    fn test_sanitize_job_name() {
        assert_eq!(sanitize_job_name("goethe/a1"), "goethe_a1");
        assert_eq!(sanitize_job_name("  "), "job");
        assert_eq!(sanitize_job_name("Wörter-2"), "Wörter-2");
    }

    #[test]
    fn test_ensure_directories() {
        let temp = tempfile::tempdir().unwrap();
        let layout = RootLayout::new(temp.path());
        layout.ensure_directories().unwrap();

        assert!(layout.stores_dir().is_dir());
        assert!(layout.backups_dir().is_dir());
        assert!(layout.decks_dir().is_dir());

        let media = layout.ensure_media_dir("job").unwrap();
        assert!(media.is_dir());
    }
}
