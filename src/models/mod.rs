// src/models/mod.rs

//! Domain models for the scraper.
//!
//! - `track`: the lesson/word graph stored in track files
//! - `remote`: payloads of the upstream service
//! - `config`: application configuration
//! - `stats`: crawl counters

mod config;
mod remote;
mod stats;
mod track;

// Re-export all public types
pub use config::{Config, CrawlerConfig, EndpointConfig, LanguageInfo, LoggingConfig};
pub use remote::{
    AlternativeForm, DictionaryItem, LanguageData, ProgressDebugInfo, RelatedLexeme, Skill, User,
};
pub use stats::CrawlStats;
pub use track::{
    Example, LanguageTrack, Lesson, LessonId, Placeholder, TrackHeader, Word, WordId, track_id,
};
