//! Pipeline entry points for scraper operations.
//!
//! - `run_scrape`: Fetch a user's lesson tree and crawl it into a track
//! - `TrackBuilder`: The crawl session behind it

pub mod backoff;
pub mod budget;
pub mod builder;
pub mod scrape;

pub use backoff::Backoff;
pub use budget::{BudgetStatus, FailureBudget};
pub use builder::{BuildOutput, TrackBuilder, WordState};
pub use scrape::{ScrapeRequest, ScrapeSummary, run_scrape, validate_request};
