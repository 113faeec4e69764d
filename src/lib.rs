//! anime-watch-list - Keep track of where you are in every anime you follow
//!
//! This library scrapes the streaming sites a watch list points at, works out
//! the next episode of every show and keeps a cache so that shows whose state
//! is already known cost no network access at all.

mod cache;
mod config;
mod engine;
mod http;
mod metadata_retrieval;
mod parsers;
mod show;
mod show_cache;
mod temp;
mod tracked;

// Re-export error types
pub use cache::CacheError;
pub use config::ConfigError;
pub use http::FetchError;
pub use metadata_retrieval::MetadataRetrievalError;
pub use parsers::ScrapeError;
pub use show_cache::ShowCacheError;
pub use tracked::TrackedListError;

pub use config::{
    DEFAULT_DISPLAY_TIMEZONE, DEFAULT_REQUEST_TIMEOUT, DEFAULT_WORKERS, Settings, parse_timezone,
};
pub use engine::{Engine, RefreshStats, display_order};
pub use http::{Fetcher, FetchedPage, HttpFetcher};
pub use metadata_retrieval::{
    AnimeInfo, BroadcastSlot, JikanProvider, MetadataProvider, convert_broadcast, filter_title,
};
pub use show::{CoverImage, NOT_STARTED_EPISODE, ShowRecord, ShowStatus, UNRESOLVED_EPISODE};
pub use show_cache::{CacheEntries, CachedShow, ShowCache};
pub use tracked::TrackedList;

use std::time::Duration;
use thiserror::Error;

/// Progress event emitted during a refresh
///
/// These events allow library users to track progress and provide feedback
/// while the shows are resolved. `ShowResolved` is emitted from worker
/// threads in completion order.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Refresh started
    Started { tracked: usize },

    /// Show cache read
    CacheLoaded { entries: usize },

    /// One show resolved
    ShowResolved {
        completed: usize,
        total: usize,
        title: String,
        status: ShowStatus,
        from_cache: bool,
    },

    /// Cache and tracked list written
    Saved { cache_entries: usize },

    /// Refresh complete
    Complete { shows: usize, elapsed: Duration },
}

/// Top-level error type for watch list operations
#[derive(Debug, Error)]
pub enum WatchListError {
    /// Error reading or writing the tracked list
    #[error("Tracked list error: {0}")]
    TrackedList(#[from] TrackedListError),

    /// Error writing the show cache
    #[error("Show cache error: {0}")]
    ShowCache(#[from] ShowCacheError),

    /// Error during metadata cache operations
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Error during metadata retrieval
    #[error("Metadata retrieval error: {0}")]
    MetadataRetrieval(#[from] MetadataRetrievalError),

    /// Error setting up site access
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Invalid settings
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The worker pool could not be started
    #[error("Failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    /// No show at the given index
    #[error("No show at index {index} (watch list has {len} shows)")]
    ShowIndex { index: usize, len: usize },

    /// The show has no known next episode
    #[error("No next episode known for '{0}'")]
    NoNextEpisode(String),

    /// The text is not a URL that can be tracked
    #[error("Not a valid show URL: '{0}'")]
    InvalidUrl(String),
}
