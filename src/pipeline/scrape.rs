// src/pipeline/scrape.rs

//! Scrape pipeline: user tree → track file.

use crate::error::{AppError, Result};
use crate::models::{Config, CrawlStats, TrackHeader};
use crate::services::DictionarySource;
use crate::storage::{TrackStorage, WriteMetadata};
use crate::utils::log;

use super::builder::TrackBuilder;

/// What to scrape.
#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub username: String,
    pub learning_language_id: String,
    pub user_language_id: String,
}

/// Result of a completed scrape.
#[derive(Debug, Clone)]
pub struct ScrapeSummary {
    pub header: TrackHeader,
    pub stats: CrawlStats,
    pub written: WriteMetadata,
}

/// Check that both language IDs are two-character configured languages.
pub fn validate_request(config: &Config, request: &ScrapeRequest) -> Result<()> {
    for id in [&request.learning_language_id, &request.user_language_id] {
        if id.chars().count() != 2 {
            return Err(AppError::validation(format!(
                "Language ID '{}' must be two characters",
                id
            )));
        }
        if config.language_name(id).is_none() {
            return Err(AppError::validation(format!(
                "Language '{}' is not configured",
                id
            )));
        }
    }
    Ok(())
}

/// Fetch the user's tree, crawl it into a track, and store the result.
pub async fn run_scrape(
    config: &Config,
    source: &dyn DictionarySource,
    storage: &dyn TrackStorage,
    request: &ScrapeRequest,
) -> Result<ScrapeSummary> {
    log::header(&format!(
        "Scraping {} -> {} for {}",
        request.user_language_id, request.learning_language_id, request.username
    ));
    validate_request(config, request)?;

    log::step(1, 3, "Fetching lesson tree");
    let user = source.fetch_user(&request.username).await?;
    let language = user
        .language_data
        .get(&request.learning_language_id)
        .ok_or_else(|| {
            AppError::crawl(
                &request.username,
                format!("user is not learning '{}'", request.learning_language_id),
            )
        })?;
    log::sub_item(&format!("{} lesson(s) found", language.skills.len()));

    let header = TrackHeader {
        learning_language_id: request.learning_language_id.clone(),
        user_language_id: request.user_language_id.clone(),
        learning_language: language.language_string.clone(),
        user_language: config
            .language_name(&request.user_language_id)
            .unwrap_or(request.user_language_id.as_str())
            .to_string(),
    };

    log::step(2, 3, "Crawling words");
    let output = TrackBuilder::new(source, &config.crawler, header.clone(), Vec::new())?
        .build(&language.skills)
        .await?;

    log::step(3, 3, "Writing track");
    let written = storage.write_track(&header.track_id(), &output.sink).await?;
    log::success(&format!(
        "Track saved to {} ({} bytes)",
        written.location, written.bytes
    ));

    let stats = output.stats;
    log::summary(
        "Scrape Results",
        &[
            ("Lessons", stats.lessons.to_string()),
            ("Words resolved", stats.words_resolved.to_string()),
            ("Words failed", stats.words_failed.to_string()),
            ("Dangling words", stats.words_dangling.to_string()),
            ("Fetches", stats.fetches.to_string()),
            ("Rate limited", stats.rate_limited.to_string()),
            (
                "Success rate",
                format!("{:.1}%", stats.success_rate() * 100.0),
            ),
            (
                "Duration",
                format!("{}s", (stats.end_time - stats.start_time).num_seconds()),
            ),
        ],
    );

    Ok(ScrapeSummary {
        header,
        stats,
        written,
    })
}
