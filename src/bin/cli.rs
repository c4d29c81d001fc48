//! offlineowl CLI
//!
//! Scrapes language tracks into `<storage-dir>/<userLang>-<learningLang>.dat`
//! and inspects existing track files.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use offlineowl::{
    codec::decode_track,
    error::{AppError, Result},
    models::Config,
    pipeline::{self, ScrapeRequest},
    services::HttpDictionary,
    storage::{LocalStorage, TrackStorage},
    utils::{http, log as progress},
};

/// offlineowl - Offline vocabulary track scraper
#[derive(Parser, Debug)]
#[command(name = "offlineowl", version, about = "Offline vocabulary track scraper")]
struct Cli {
    /// Directory holding config.toml and track files
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Path to config file (default: {storage_dir}/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape a user's lesson tree into a track file
    Scrape {
        /// Username whose lesson tree seeds the crawl
        username: String,
        /// Two-letter ID of the language being learned
        learning_lang: String,
        /// Two-letter ID of the user's own language
        user_lang: String,
    },

    /// Decode a track file and print what it holds
    Inspect {
        /// Track file, or a track ID inside the storage directory
        track: String,
    },

    /// List stored tracks
    List,

    /// Validate configuration file
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool, config: &Config) {
    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
    progress::init(level);
}

async fn read_track_arg(storage: &LocalStorage, track: &str) -> Result<Vec<u8>> {
    let path = PathBuf::from(track);
    if path.is_file() {
        return Ok(tokio::fs::read(&path).await?);
    }
    storage
        .read_track(track)
        .await?
        .ok_or_else(|| AppError::config(format!("Track '{}' not found", track)))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| cli.storage_dir.join("config.toml"));
    let config = Config::load_or_default(&config_path);
    init_logging(cli.verbose, &config);

    let storage = LocalStorage::new(&cli.storage_dir);

    match cli.command {
        Command::Scrape {
            username,
            learning_lang,
            user_lang,
        } => {
            config.validate()?;

            let request = ScrapeRequest {
                username,
                learning_language_id: learning_lang,
                user_language_id: user_lang,
            };
            pipeline::validate_request(&config, &request)?;

            let client = http::create_async_client(&config.crawler)?;
            let source = HttpDictionary::new(client, &config)?;

            if let Err(e) = pipeline::run_scrape(&config, &source, &storage, &request).await {
                progress::error(&format!("Scrape failed: {}", e));
                return Err(e);
            }
        }

        Command::Inspect { track } => {
            let bytes = read_track_arg(&storage, &track).await?;
            let decoded = decode_track(&bytes)?;
            let header = &decoded.header;

            progress::header(&format!(
                "{} ({} -> {})",
                header.track_id(),
                header.user_language,
                header.learning_language
            ));
            progress::summary(
                "Track",
                &[
                    ("Bytes", bytes.len().to_string()),
                    ("Lessons", decoded.lessons.len().to_string()),
                    (
                        "Placeholder lessons",
                        decoded.placeholder_lesson_count().to_string(),
                    ),
                    ("Words", decoded.words.len().to_string()),
                    (
                        "Placeholder words",
                        decoded.placeholder_word_count().to_string(),
                    ),
                ],
            );
            for lesson in &decoded.lessons {
                let deps: Vec<&str> = decoded
                    .lesson_dependencies(lesson)
                    .map(|l| l.name.as_str())
                    .collect();
                progress::sub_item(&format!(
                    "#{} {} ({} word(s)) <- [{}]",
                    lesson.id,
                    lesson.name,
                    lesson.words.len(),
                    deps.join(", ")
                ));
            }
        }

        Command::List => {
            let tracks = storage.list_tracks().await?;
            if tracks.is_empty() {
                progress::info(&format!(
                    "No tracks in {}",
                    storage.root().display()
                ));
            }
            for id in tracks {
                progress::sub_item(&id);
            }
        }

        Command::Validate => {
            ::log::info!("Validating configuration at {}", config_path.display());

            if let Err(e) = config.validate() {
                ::log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            progress::success("Config OK");
        }
    }

    Ok(())
}
