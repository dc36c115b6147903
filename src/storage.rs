// SPDX-License-Identifier: MPL-2.0

//! Storage utilities for segment, reel and photo files

use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Container extension for segments and composed reels
pub const VIDEO_EXTENSION: &str = "mp4";

/// Working directory holding segments, composed reels and exported photos
#[derive(Debug, Clone)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    /// Use `root` as the working directory (created lazily)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default working directory under the system temp dir
    pub fn default_root() -> PathBuf {
        std::env::temp_dir().join("reelcam")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fresh location for one recorded segment
    pub fn segment_path(&self, session: Uuid, order: u32) -> std::io::Result<PathBuf> {
        let dir = self.root.join("segments").join(session.to_string());
        std::fs::create_dir_all(&dir)?;

        let path = dir.join(format!("segment-{:03}.{}", order, VIDEO_EXTENSION));
        debug!(path = %path.display(), "Allocated segment location");
        Ok(path)
    }

    /// Uniquely named location for a composed reel
    pub fn reel_path(&self) -> std::io::Result<PathBuf> {
        let dir = self.root.join("reels");
        std::fs::create_dir_all(&dir)?;

        Ok(dir.join(unique_name("Reel", VIDEO_EXTENSION)))
    }

    /// Directory for exported photos of one batch
    pub fn photo_dir(&self) -> std::io::Result<PathBuf> {
        let dir = self
            .root
            .join("photos")
            .join(Local::now().format("%Y%m%d_%H%M%S").to_string());
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Remove the segment files of a finished session
    pub fn discard_session(&self, session: Uuid) {
        let dir = self.root.join("segments").join(session.to_string());
        if let Err(e) = std::fs::remove_dir_all(&dir)
            && e.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %dir.display(), error = %e, "Failed to remove segments");
        }
    }
}

impl Default for MediaStorage {
    fn default() -> Self {
        Self::new(Self::default_root())
    }
}

/// `<prefix>-<timestamp>-<short uuid>.<ext>`
pub fn unique_name(prefix: &str, extension: &str) -> String {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let id = Uuid::new_v4().simple().to_string();
    format!("{}-{}-{}.{}", prefix, timestamp, &id[..8], extension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_names_differ() {
        let a = unique_name("Reel", "mp4");
        let b = unique_name("Reel", "mp4");
        assert_ne!(a, b);
        assert!(a.starts_with("Reel-"));
        assert!(a.ends_with(".mp4"));
    }

    #[test]
    fn test_segment_paths_are_ordered_per_session() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = MediaStorage::new(tmp.path());
        let session = Uuid::new_v4();

        let first = storage.segment_path(session, 0).unwrap();
        let second = storage.segment_path(session, 1).unwrap();

        assert_eq!(first.parent(), second.parent());
        assert!(first.file_name().unwrap() < second.file_name().unwrap());
        assert!(first.parent().unwrap().is_dir());
    }

    #[test]
    fn test_discard_session_removes_segments() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = MediaStorage::new(tmp.path());
        let session = Uuid::new_v4();

        let path = storage.segment_path(session, 0).unwrap();
        std::fs::write(&path, b"data").unwrap();
        storage.discard_session(session);

        assert!(!path.exists());
        // Second discard is a no-op
        storage.discard_session(session);
    }
}
