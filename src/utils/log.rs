// src/utils/log.rs

//! Console report for scrapes and track inspection.
//!
//! Each line reads `[timestamp] [LEVEL] message`. The threshold is a
//! `log::LevelFilter` set once by [`init`]; library internals go through the
//! `log` facade instead of these helpers.

use std::str::FromStr;
use std::sync::OnceLock;

use ::log::{Level, LevelFilter};
use chrono::Local;

static THRESHOLD: OnceLock<LevelFilter> = OnceLock::new();

/// Set the report threshold from a config or CLI level name.
pub fn init(level: &str) {
    let filter = LevelFilter::from_str(level).unwrap_or(LevelFilter::Info);
    let _ = THRESHOLD.set(filter);
}

fn enabled(level: Level) -> bool {
    level <= THRESHOLD.get().copied().unwrap_or(LevelFilter::Info)
}

fn line(level: Level, message: &str) -> String {
    format!(
        "[{}] [{}] {}",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        level,
        message
    )
}

fn emit(level: Level, message: &str) {
    if !enabled(level) {
        return;
    }
    match level {
        Level::Error | Level::Warn => eprintln!("{}", line(level, message)),
        _ => println!("{}", line(level, message)),
    }
}

pub fn info(message: &str) {
    emit(Level::Info, message);
}

pub fn error(message: &str) {
    emit(Level::Error, message);
}

/// A finished stage, e.g. a track written to storage.
pub fn success(message: &str) {
    emit(Level::Info, &format!("✓ {}", message));
}

/// Numbered stage of a scrape (`[2/3] Crawling words`).
pub fn step(current: usize, total: usize, message: &str) {
    emit(Level::Info, &format!("[{}/{}] {}", current, total, message));
}

/// Banner naming the track being worked on.
pub fn header(title: &str) {
    let rule = "=".repeat(title.chars().count() + 8);
    emit(Level::Info, &rule);
    emit(Level::Info, &format!("=== {} ===", title));
    emit(Level::Info, &rule);
}

pub fn sub_item(message: &str) {
    emit(Level::Info, &format!("  - {}", message));
}

/// Counter table with the keys padded to one column.
pub fn summary(title: &str, items: &[(&str, String)]) {
    emit(Level::Info, &format!("{}:", title));
    for row in summary_rows(items) {
        emit(Level::Info, &row);
    }
}

fn summary_rows(items: &[(&str, String)]) -> Vec<String> {
    let width = items.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    items
        .iter()
        .map(|(key, value)| format!("  {:<width$}  {}", key, value, width = width))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_shape() {
        let text = line(Level::Warn, "rate limited");
        assert!(text.starts_with('['));
        assert!(text.ends_with("[WARN] rate limited"));
    }

    #[test]
    fn test_default_threshold_is_info() {
        assert!(enabled(Level::Error));
        assert!(enabled(Level::Info));
    }

    #[test]
    fn test_summary_rows_align_values() {
        let rows = summary_rows(&[
            ("Lessons", "12".to_string()),
            ("Dangling words", "3".to_string()),
        ]);
        assert_eq!(rows[0], "  Lessons         12");
        assert_eq!(rows[1], "  Dangling words  3");
    }

    #[test]
    fn test_summary_rows_empty() {
        assert!(summary_rows(&[]).is_empty());
    }
}
