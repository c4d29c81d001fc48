//! Service layer for the scraper.
//!
//! - Remote lookups (`DictionarySource`, `HttpDictionary`)

mod dictionary;

pub use dictionary::{DictionarySource, HttpDictionary};
