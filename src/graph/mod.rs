//! Identity management for the lesson/word graph.

pub mod identity;

pub use identity::{Allocation, ExternalKey, IdentityTable, placeholder_slot};
