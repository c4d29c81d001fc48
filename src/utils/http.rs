// src/utils/http.rs

//! HTTP client and endpoint utilities.

use std::time::Duration;

use url::Url;

use crate::error::{AppError, Result};
use crate::models::CrawlerConfig;

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(config: &CrawlerConfig) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Substitute `{name}` placeholders in an endpoint template.
pub fn fill_template(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{}}}", name), value)
    })
}

/// Dictionary endpoint for one language: `{lang}` filled in, then parsed.
pub fn dictionary_base_url(template: &str, language: &str) -> Result<Url> {
    let raw = fill_template(template, &[("lang", language)]);
    Url::parse(&raw).map_err(|e| {
        AppError::config(format!(
            "endpoints.dictionary_url for '{}' is not a valid URL ({}): {}",
            language, raw, e
        ))
    })
}

/// User endpoint with its trailing `/{username}` segment stripped.
///
/// The username is pushed back as an escaped path segment per request.
pub fn user_base_url(template: &str) -> Result<Url> {
    let base = template
        .strip_suffix("{username}")
        .filter(|base| base.ends_with('/'))
        .ok_or_else(|| AppError::config("endpoints.user_url must end with /{username}"))?;
    let url = Url::parse(base)
        .map_err(|e| AppError::config(format!("endpoints.user_url is not a valid URL: {}", e)))?;
    if url.cannot_be_a_base() {
        return Err(AppError::config(
            "endpoints.user_url cannot take path segments",
        ));
    }
    Ok(url)
}
