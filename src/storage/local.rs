//! Local filesystem storage implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::{TrackStorage, WriteMetadata};

/// Extension of stored track files.
const TRACK_EXTENSION: &str = "dat";

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Path of the file holding a track.
    pub fn track_path(&self, track_id: &str) -> PathBuf {
        self.root_dir
            .join(format!("{}.{}", track_id, TRACK_EXTENSION))
    }

    fn check_track_id(track_id: &str) -> Result<()> {
        let valid = !track_id.is_empty()
            && track_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(AppError::validation(format!(
                "Invalid track ID '{}'",
                track_id
            )));
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[async_trait]
impl TrackStorage for LocalStorage {
    async fn write_track(&self, track_id: &str, bytes: &[u8]) -> Result<WriteMetadata> {
        Self::check_track_id(track_id)?;
        let path = self.track_path(track_id);
        self.write_bytes(&path, bytes).await?;

        log::info!("Wrote {} bytes to {}", bytes.len(), path.display());
        Ok(WriteMetadata {
            location: path.display().to_string(),
            bytes: bytes.len(),
            timestamp: Utc::now(),
        })
    }

    async fn read_track(&self, track_id: &str) -> Result<Option<Vec<u8>>> {
        Self::check_track_id(track_id)?;
        self.read_bytes(&self.track_path(track_id)).await
    }

    async fn list_tracks(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(TRACK_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_track;
    use crate::error::FormatError;
    use crate::models::{LanguageTrack, Placeholder, TrackHeader, Word};
    use tempfile::TempDir;

    fn track() -> LanguageTrack {
        let mut track = LanguageTrack::new(TrackHeader {
            learning_language_id: "ja".into(),
            user_language_id: "en".into(),
            learning_language: "日本語".into(),
            user_language: "English".into(),
        });
        track.words.push(Word {
            surface_form: "猫".into(),
            translations: "cat".into(),
            ..Word::placeholder(0)
        });
        track
    }

    #[tokio::test]
    async fn test_write_and_load() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        let track = track();

        let bytes = encode_track(&track).unwrap();
        let meta = storage.write_track("en-ja", &bytes).await.unwrap();
        assert_eq!(meta.bytes, bytes.len());
        assert!(storage.track_path("en-ja").exists());
        assert!(!tmp.path().join("en-ja.tmp").exists());

        let loaded = storage.load_track("en-ja").await.unwrap();
        assert_eq!(loaded, track);
    }

    #[tokio::test]
    async fn test_read_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        assert_eq!(storage.read_track("en-fr").await.unwrap(), None);
        assert!(storage.load_track("en-fr").await.is_err());
    }

    #[tokio::test]
    async fn test_corrupt_track_fails_to_load() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        storage.write_track("en-fr", b"not a track").await.unwrap();

        let err = storage.load_track("en-fr").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Format(FormatError::InvalidMagic { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_tracks() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        storage.write_track("en-ko", b"x").await.unwrap();
        storage.write_track("en-fr", b"x").await.unwrap();
        std::fs::write(tmp.path().join("config.toml"), "").unwrap();

        assert_eq!(storage.list_tracks().await.unwrap(), vec!["en-fr", "en-ko"]);
    }

    #[tokio::test]
    async fn test_list_missing_root_is_empty() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path().join("nope"));
        assert!(storage.list_tracks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_path_like_track_id() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        assert!(storage.write_track("../escape", b"x").await.is_err());
    }
}
