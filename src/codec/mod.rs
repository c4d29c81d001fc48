//! Binary language track format.
//!
//! - `primitive`: big-endian integers and length-prefixed strings
//! - `track`: lesson/word records, stream writer and decoder

pub mod primitive;
pub mod track;

pub use track::{MAGIC, MAX_ENTITY_ID, TrackWriter, decode_track, encode_track};
