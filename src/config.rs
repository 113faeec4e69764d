//! Runtime settings
//!
//! Where the tracked list and caches live, how many shows are resolved in
//! parallel and how long a single request may take.

use chrono_tz::Tz;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Number of shows resolved concurrently unless configured otherwise
pub const DEFAULT_WORKERS: usize = 8;

/// Per-request timeout unless configured otherwise
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Timezone broadcast times are shown in unless configured otherwise
pub const DEFAULT_DISPLAY_TIMEZONE: Tz = chrono_tz::Europe::Stockholm;

const TRACKED_FILE_NAME: &str = "config.txt";
const CACHE_FILE_NAME: &str = "cache.json";
const METADATA_CACHE_DIR_NAME: &str = "metadata";

/// Errors that can occur while building the settings
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to determine the platform's configuration directory
    #[error("Failed to determine configuration directory location")]
    ProjectDirsNotFound,

    /// The configured timezone is not an IANA timezone name
    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),
}

/// Settings of one engine instance
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Directory holding the tracked list and the show cache
    pub config_dir: PathBuf,
    /// The tracked-URL list
    pub tracked_file: PathBuf,
    /// The show cache
    pub cache_file: PathBuf,
    /// Directory of the per-title metadata lookup cache
    pub metadata_cache_dir: PathBuf,
    /// Size of the worker pool used by a refresh, at least 1
    pub workers: usize,
    /// Timeout applied to every HTTP request
    pub request_timeout: Duration,
    /// Timezone broadcast slots are converted to
    pub display_timezone: Tz,
}

impl Settings {
    /// Settings using the platform's standard directories
    ///
    /// The tracked list and the show cache go to the configuration directory,
    /// metadata lookups to the cache directory.
    pub fn default_paths() -> Result<Self, ConfigError> {
        let proj_dirs = directories::ProjectDirs::from("com", "ahmed91abbas", "anime-watch-list")
            .ok_or(ConfigError::ProjectDirsNotFound)?;

        let mut settings = Self::in_dir(proj_dirs.config_dir());
        settings.metadata_cache_dir = proj_dirs.cache_dir().join(METADATA_CACHE_DIR_NAME);
        Ok(settings)
    }

    /// Settings keeping every file under `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            config_dir: dir.to_path_buf(),
            tracked_file: dir.join(TRACKED_FILE_NAME),
            cache_file: dir.join(CACHE_FILE_NAME),
            metadata_cache_dir: dir.join(METADATA_CACHE_DIR_NAME),
            workers: DEFAULT_WORKERS,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            display_timezone: DEFAULT_DISPLAY_TIMEZONE,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_display_timezone(mut self, timezone: Tz) -> Self {
        self.display_timezone = timezone;
        self
    }
}

/// Parses an IANA timezone name such as `Europe/Stockholm`
pub fn parse_timezone(name: &str) -> Result<Tz, ConfigError> {
    name.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidTimezone(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_dir_layout() {
        let settings = Settings::in_dir("/tmp/watch");
        assert_eq!(settings.tracked_file, PathBuf::from("/tmp/watch/config.txt"));
        assert_eq!(settings.cache_file, PathBuf::from("/tmp/watch/cache.json"));
        assert_eq!(settings.metadata_cache_dir, PathBuf::from("/tmp/watch/metadata"));
        assert_eq!(settings.workers, DEFAULT_WORKERS);
        assert_eq!(settings.display_timezone, chrono_tz::Europe::Stockholm);
    }

    #[test]
    fn test_workers_never_zero() {
        let settings = Settings::in_dir("/tmp/watch").with_workers(0);
        assert_eq!(settings.workers, 1);
    }

    #[test]
    fn test_parse_timezone() {
        assert_eq!(parse_timezone("Asia/Tokyo").unwrap(), chrono_tz::Asia::Tokyo);
        assert!(matches!(
            parse_timezone("Mars/Olympus"),
            Err(ConfigError::InvalidTimezone(_))
        ));
    }
}
