// src/lib.rs

//! offlineowl: language track format and scraper library

pub mod codec;
pub mod error;
pub mod graph;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
