//! Cache storage module
//!
//! This module provides persistent per-key caching of serializable data,
//! one JSON file per key, with an optional time-to-live measured from the
//! file's last modification.

use crate::temp::write_atomically;
use serde::{Deserialize, Serialize};
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// Failed to create or access cache directory
    #[error("Failed to create cache directory at {path}: {source}")]
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to read cached data
    #[error("Failed to read cache file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to write cached data
    #[error("Failed to write cache file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to deserialize cached data
    #[error("Failed to deserialize cache file {path}: {source}")]
    DeserializationFailed {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Failed to serialize data for caching
    #[error("Failed to serialize data: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// A generic cache storage for serializable data
///
/// Data implementing `Serialize` and `Deserialize` is stored as one JSON
/// file per identifier inside the cache directory.
pub(crate) struct CacheStorage<T> {
    /// The directory where cached data is stored
    cache_dir: PathBuf,
    /// Entries older than this are treated as missing
    ttl: Option<Duration>,
    /// Phantom data for the generic type
    _phantom: PhantomData<T>,
}

impl<T> CacheStorage<T>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    /// Opens or creates a cache storage in the given directory
    ///
    /// # Arguments
    ///
    /// * `cache_dir` - Directory the entries are stored in, created if missing
    /// * `ttl` - Maximum age of an entry, or None to keep entries forever
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let day = Duration::from_secs(24 * 60 * 60);
    /// let cache: CacheStorage<AnimeInfo> = CacheStorage::open_in(&settings.metadata_cache_dir, Some(day))?;
    /// ```
    pub fn open_in(cache_dir: &Path, ttl: Option<Duration>) -> Result<Self, CacheError> {
        fs::create_dir_all(cache_dir).map_err(|e| CacheError::DirectoryCreationFailed {
            path: cache_dir.to_path_buf(),
            source: e,
        })?;

        Ok(Self {
            cache_dir: cache_dir.to_path_buf(),
            ttl,
            _phantom: PhantomData,
        })
    }

    fn entry_path(&self, identifier: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", sanitize_name(identifier)))
    }

    /// Whether the entry at `path` outlived the time-to-live
    fn is_expired(&self, path: &Path) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };

        fs::metadata(path)
            .and_then(|metadata| metadata.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .is_some_and(|age| age > ttl)
    }

    /// Loads cached data for the given identifier
    ///
    /// Returns None if there is no entry or the entry has expired. Returns an
    /// error if the entry exists but cannot be read or deserialized.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// if let Some(info) = cache.load("sousou no frieren")? {
    ///     println!("Found cached info: {}", info.url);
    /// }
    /// ```
    pub fn load(&self, identifier: &str) -> Result<Option<T>, CacheError> {
        let file_path = self.entry_path(identifier);

        // If file doesn't exist, return None
        if !file_path.exists() || self.is_expired(&file_path) {
            return Ok(None);
        }

        // Read the file
        let content = fs::read_to_string(&file_path).map_err(|e| CacheError::ReadFailed {
            path: file_path.clone(),
            source: e,
        })?;

        // Deserialize the JSON
        let data =
            serde_json::from_str(&content).map_err(|e| CacheError::DeserializationFailed {
                path: file_path,
                source: e,
            })?;

        Ok(Some(data))
    }

    /// Stores data in the cache with the given identifier
    ///
    /// # Examples
    ///
    /// ```ignore
    /// cache.store("sousou no frieren", &info)?;
    /// ```
    pub fn store(&self, identifier: &str, data: &T) -> Result<(), CacheError> {
        let file_path = self.entry_path(identifier);

        // Serialize to JSON
        let content = serde_json::to_string_pretty(data)?;

        // Write to file
        write_atomically(&file_path, content.as_bytes()).map_err(|e| CacheError::WriteFailed {
            path: file_path,
            source: e,
        })?;

        Ok(())
    }
}

/// Sanitizes a name for use in file paths
///
/// Converts to lowercase and replaces all characters that are not
/// a-z, 0-9, or hyphen with underscores.
fn sanitize_name(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Entry {
        value: u32,
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("Simple"), "simple");
        assert_eq!(sanitize_name("With Spaces"), "with_spaces");
        assert_eq!(sanitize_name("With-Hyphens"), "with-hyphens");
        assert_eq!(sanitize_name("Special!@#$%"), "special_____");
        assert_eq!(sanitize_name("Mixed123ABC"), "mixed123abc");
    }

    #[test]
    fn test_store_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache: CacheStorage<Entry> = CacheStorage::open_in(&dir.path().join("metadata"), None).unwrap();

        assert_eq!(cache.load("Frieren").unwrap(), None);
        cache.store("Frieren", &Entry { value: 28 }).unwrap();
        assert_eq!(cache.load("frieren").unwrap(), Some(Entry { value: 28 }));
        assert!(dir.path().join("metadata").join("frieren.json").exists());
    }

    #[test]
    fn test_expired_entries_are_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cache: CacheStorage<Entry> =
            CacheStorage::open_in(dir.path(), Some(Duration::ZERO)).unwrap();

        cache.store("frieren", &Entry { value: 28 }).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.load("frieren").unwrap(), None);
    }

    #[test]
    fn test_corrupt_entry_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache: CacheStorage<Entry> = CacheStorage::open_in(dir.path(), None).unwrap();
        fs::write(dir.path().join("frieren.json"), "not json").unwrap();

        assert!(matches!(
            cache.load("frieren"),
            Err(CacheError::DeserializationFailed { .. })
        ));
    }
}
