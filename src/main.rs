mod config;
mod error;
mod gemini;
mod http;
mod models;
mod normalizer;
mod sources;
mod store;

use anyhow::Result;
use clap::{Parser, Subcommand};
use config::Configuration;
use error::CinemaError;
use gemini::{GeminiClient, KeyDiagnostics};
use http::HttpClient;
use models::{Collection, FilterLanguage, FilterType, Movie, SearchParams, StoredMovie};
use store::{FileBackend, InteractionStore};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Keep history and watchlist in memory only
    #[arg(long)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search for movies and series
    Search {
        query: String,

        #[arg(long, value_enum, default_value_t = FilterLanguage::All)]
        language: FilterLanguage,

        #[arg(long = "type", value_enum, default_value_t = FilterType::All)]
        media_type: FilterType,

        /// Open the result with this id: records it in history and prints its best link
        #[arg(long)]
        open: Option<String>,

        /// Toggle the result with this id in the watchlist
        #[arg(long)]
        watch_later: Option<String>,
    },
    /// Show trending titles
    Featured,
    /// Watch history
    History {
        #[command(subcommand)]
        action: CollectionAction,
    },
    /// Titles saved for later
    Watchlist {
        #[command(subcommand)]
        action: CollectionAction,
    },
    /// Check the API key setup
    Diagnose,
}

#[derive(Subcommand)]
enum CollectionAction {
    List,
    Remove { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries command output
    tracing_subscriber::fmt()
        .with_env_filter(&cli.log_level)
        .with_writer(std::io::stderr)
        .init();

    let config = Configuration::from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);

    let gemini = GeminiClient::new(
        HttpClient::new()?,
        config.api_key(),
        config.model(),
        config.base_url(),
        config.result_count(),
    );

    match cli.command {
        Command::Diagnose => print_diagnostics(&gemini.diagnostics()),
        Command::Featured => print_movies(&gemini.featured_movies().await),
        Command::Search {
            query,
            language,
            media_type,
            open,
            watch_later,
        } => {
            let params = SearchParams {
                query,
                language,
                media_type,
            };
            let movies = match gemini.search_movies(&params).await {
                Ok(movies) => movies,
                Err(e) => {
                    error!("Search failed: {}", e);
                    eprintln!("{}", user_message(&e));
                    return Ok(());
                }
            };
            if movies.is_empty() {
                println!("No matching results.");
                return Ok(());
            }
            print_movies(&movies);

            if open.is_some() || watch_later.is_some() {
                let Some(store) = open_store(&config, cli.ephemeral).await else {
                    return Ok(());
                };
                if let Some(id) = open {
                    open_movie(&store, &movies, &id).await;
                }
                if let Some(id) = watch_later {
                    toggle_watchlist(&store, &movies, &id).await;
                }
            }
        }
        Command::History { action } => {
            if let Some(store) = open_store(&config, cli.ephemeral).await {
                run_collection_action(&store, Collection::History, action).await;
            }
        }
        Command::Watchlist { action } => {
            if let Some(store) = open_store(&config, cli.ephemeral).await {
                run_collection_action(&store, Collection::Watchlist, action).await;
            }
        }
    }

    Ok(())
}

/// A store that cannot be opened degrades the command instead of failing it.
async fn open_store(config: &Configuration, ephemeral: bool) -> Option<InteractionStore> {
    let result = if ephemeral {
        info!("Using in-memory store");
        InteractionStore::in_memory().await
    } else {
        let backend = FileBackend::new(config.store_path());
        info!("Using data directory {}", backend.dir().display());
        InteractionStore::open(Box::new(backend), config.history_limit()).await
    };

    match result {
        Ok(store) => Some(store),
        Err(e) => {
            error!("Failed to open store: {}", e);
            eprintln!("{}", user_message(&e));
            None
        }
    }
}

async fn run_collection_action(store: &InteractionStore, collection: Collection, action: CollectionAction) {
    match action {
        CollectionAction::List => {
            let records = match store.list(collection).await {
                Ok(records) => records,
                Err(e) => {
                    warn!("Failed to read {}: {}", collection, e);
                    Vec::new()
                }
            };
            print_stored(collection, &records);
        }
        CollectionAction::Remove { id } => match store.remove(collection, &id).await {
            Ok(()) => println!("Removed {} from {}", id, collection),
            Err(e) => {
                error!("Failed to remove {} from {}: {}", id, collection, e);
                eprintln!("{}", user_message(&e));
            }
        },
    }
}

async fn open_movie(store: &InteractionStore, movies: &[Movie], id: &str) {
    let Some(movie) = movies.iter().find(|m| m.id == id) else {
        warn!("No result with id {}", id);
        return;
    };
    if let Err(e) = store.record_open(movie).await {
        error!("Failed to record {} in history: {}", movie.title, e);
        eprintln!("{}", user_message(&e));
    }
    match movie.sources.first() {
        Some(link) => println!("Opening {}: {}", movie.title, link),
        None => println!("Links for {} are still loading", movie.title),
    }
}

async fn toggle_watchlist(store: &InteractionStore, movies: &[Movie], id: &str) {
    let Some(movie) = movies.iter().find(|m| m.id == id) else {
        warn!("No result with id {}", id);
        return;
    };
    match store.toggle(Collection::Watchlist, movie).await {
        Ok(true) => println!("Added {} to watchlist", movie.title),
        Ok(false) => println!("Removed {} from watchlist", movie.title),
        Err(e) => {
            error!("Failed to update watchlist: {}", e);
            eprintln!("{}", user_message(&e));
        }
    }
}

fn user_message(err: &CinemaError) -> String {
    match err {
        CinemaError::CredentialMissing => {
            "The API key is not configured. Set API_KEY or gemini.apiKey in the config file.".to_string()
        }
        CinemaError::CredentialInvalid(_) => {
            "The API key was rejected. Run `diagnose` to check it.".to_string()
        }
        CinemaError::RateLimited => "The free usage quota is exhausted, try again later.".to_string(),
        CinemaError::UpstreamUnavailable(_) => {
            "Could not reach the AI service. Run `diagnose` to check the setup.".to_string()
        }
        CinemaError::MalformedResponse(_) => "The AI service returned no usable results.".to_string(),
        CinemaError::StorageUnavailable(_) => {
            "Local storage is unavailable; changes were not saved.".to_string()
        }
        CinemaError::Config(msg) => format!("Configuration problem: {}", msg),
    }
}

fn print_movies(movies: &[Movie]) {
    for movie in movies {
        println!(
            "[{}] {} ({}) {} - {:.1}/10 - {}",
            movie.id,
            movie.title,
            movie.year,
            if movie.original_title != movie.title { movie.original_title.as_str() } else { "" },
            movie.rating,
            movie.quality
        );
        println!("    poster: {}", movie.poster_or_placeholder());
        if movie.sources.is_empty() {
            println!("    links: still loading");
        }
        for link in &movie.sources {
            println!("    {}: {}", sources::label(link), link);
        }
    }
}

fn print_stored(collection: Collection, records: &[StoredMovie]) {
    if records.is_empty() {
        println!("{} is empty", collection);
        return;
    }
    for record in records {
        let when = chrono::DateTime::<chrono::Utc>::from_timestamp_millis(record.timestamp)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!("{}  [{}] {} ({})", when, record.movie.id, record.movie.title, record.movie.year);
    }
}

fn print_diagnostics(diagnostics: &KeyDiagnostics) {
    match diagnostics {
        KeyDiagnostics::Missing => {
            println!("API key: missing");
            println!("Set API_KEY (or GEMINI_API_KEY) or gemini.apiKey in the config file.");
        }
        KeyDiagnostics::InvalidLength { length } => {
            println!("API key: too short to be valid ({} characters)", length);
        }
        KeyDiagnostics::Detected { masked, length } => {
            println!("API key: detected, starts with {} ({} characters)", masked, length);
        }
    }
}
