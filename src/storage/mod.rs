//! Storage abstractions for encoded language tracks.
//!
//! Tracks are stored as opaque `.dat` blobs keyed by track ID
//! (`<userLang>-<learningLang>`):
//!
//! ```text
//! storage/
//! ├── config.toml
//! ├── en-fr.dat
//! └── en-ja.dat
//! ```

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::codec::decode_track;
use crate::error::{AppError, Result};
use crate::models::LanguageTrack;

pub use local::LocalStorage;

/// Metadata about a storage write operation.
#[derive(Debug, Clone)]
pub struct WriteMetadata {
    /// Where the track ended up
    pub location: String,
    /// Size of the stored stream
    pub bytes: usize,
    /// Timestamp of the write
    pub timestamp: DateTime<Utc>,
}

/// Trait for track storage backends.
#[async_trait]
pub trait TrackStorage: Send + Sync {
    /// Store an encoded track, replacing any previous version.
    async fn write_track(&self, track_id: &str, bytes: &[u8]) -> Result<WriteMetadata>;

    /// Read an encoded track, `None` if it was never stored.
    async fn read_track(&self, track_id: &str) -> Result<Option<Vec<u8>>>;

    /// Track IDs currently stored.
    async fn list_tracks(&self) -> Result<Vec<String>>;

    /// Read and decode a track. Loading is all-or-nothing.
    async fn load_track(&self, track_id: &str) -> Result<LanguageTrack> {
        let bytes = self
            .read_track(track_id)
            .await?
            .ok_or_else(|| AppError::config(format!("Track '{}' not found", track_id)))?;
        Ok(decode_track(&bytes)?)
    }
}
