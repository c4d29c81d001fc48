// src/error.rs

//! Unified error handling for the scraper and the track format.

use std::fmt;

use thiserror::Error;

/// Result type alias for application operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Errors raised while encoding or decoding a language track.
///
/// Every variant is fatal for the stream being processed; a decode that
/// fails never hands out a partial graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The stream does not start with the track magic number.
    #[error("Invalid magic number at start of stream: {found:02x?}")]
    InvalidMagic { found: Vec<u8> },

    /// A read would run past the end of the buffer.
    #[error("Read of {needed} byte(s) at offset {offset} is out of bounds ({available} available)")]
    OutOfBounds {
        offset: u64,
        needed: u64,
        available: u64,
    },

    /// A header or record was cut off before all of its fields were read.
    #[error("Truncated {context} starting at offset {offset}: {source}")]
    TruncatedStream {
        context: &'static str,
        offset: u64,
        #[source]
        source: Box<FormatError>,
    },

    /// A string field does not hold valid UTF-8.
    #[error("Invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 { offset: u64 },

    /// A record starts with a tag that is neither a lesson nor a word.
    #[error("Unknown record tag {tag:#04x} at offset {offset}")]
    UnknownTag { tag: u8, offset: u64 },

    /// A record references an ID beyond the supported table size.
    #[error("{kind} ID {id} exceeds the maximum of {max}")]
    IdOutOfRange {
        kind: &'static str,
        id: u32,
        max: u32,
    },

    /// A field is too large for its length prefix.
    #[error("{context} has length {len}, which exceeds the maximum of {max}")]
    TooLong {
        context: &'static str,
        len: usize,
        max: usize,
    },

    /// The underlying writer failed.
    #[error("Write failed: {0}")]
    Write(String),
}

impl FormatError {
    /// Wrap a lower-level error as a truncation of the named structure.
    pub fn truncated(context: &'static str, offset: u64, source: FormatError) -> Self {
        Self::TruncatedStream {
            context,
            offset,
            source: Box::new(source),
        }
    }
}

impl From<std::io::Error> for FormatError {
    fn from(error: std::io::Error) -> Self {
        Self::Write(error.to_string())
    }
}

/// A failed lookup against the remote dictionary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The server asked us to slow down (HTTP 429).
    #[error("Rate limited while fetching {url}")]
    RateLimited { url: String },

    /// The server answered with a non-success status.
    #[error("Error fetching {url}: HTTP {status} {reason}")]
    Status {
        url: String,
        status: u16,
        reason: String,
    },

    /// The request never produced a response.
    #[error("Network error fetching {url}: {message}")]
    Network { url: String, message: String },

    /// The response body could not be parsed.
    #[error("Could not parse response from {url}: {message}")]
    Parse { url: String, message: String },

    /// A lookup asked for a language with no configured endpoint.
    #[error("No dictionary endpoint for language '{language}'")]
    UnsupportedLanguage { language: String },
}

impl FetchError {
    /// Whether this failure should trigger the backoff policy.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    pub fn network(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Network {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn parse(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Parse {
            url: url.into(),
            message: message.to_string(),
        }
    }
}

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP client could not be built
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Track encoding or decoding failed
    #[error("Track format error: {0}")]
    Format(#[from] FormatError),

    /// A remote lookup failed
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Too many remote lookups failed during one crawl
    #[error("Too many failed requests ({failures} > {limit}); aborting crawl")]
    BudgetExceeded { failures: usize, limit: usize },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Crawling error
    #[error("Crawl error for {context}: {message}")]
    Crawl { context: String, message: String },
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a crawl error with context.
    pub fn crawl(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Crawl {
            context: context.into(),
            message: message.to_string(),
        }
    }
}
