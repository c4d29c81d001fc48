// src/models/stats.rs

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Counters collected over one crawl.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlStats {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub lessons: usize,
    pub words_resolved: usize,
    pub words_failed: usize,
    /// Words that were allocated an ID but never written
    pub words_dangling: usize,
    pub fetches: usize,
    pub rate_limited: usize,
    pub failures: usize,
}

impl CrawlStats {
    pub fn started() -> Self {
        let now = Utc::now();
        Self {
            start_time: now,
            end_time: now,
            lessons: 0,
            words_resolved: 0,
            words_failed: 0,
            words_dangling: 0,
            fetches: 0,
            rate_limited: 0,
            failures: 0,
        }
    }

    /// Ratio of fetches that produced a word.
    pub fn success_rate(&self) -> f64 {
        if self.fetches == 0 {
            return 1.0;
        }
        self.words_resolved as f64 / self.fetches as f64
    }
}
