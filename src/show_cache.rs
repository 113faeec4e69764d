//! Show cache
//!
//! The cache lets a refresh skip scraping shows whose data has not changed.
//! It is a single pretty-printed JSON object mapping a per-show cache key to
//! the cached projection of that show's record. It is read wholesale before a
//! refresh and rewritten wholesale afterwards.

use crate::show::{CoverImage, ShowRecord, ShowStatus};
use crate::temp::write_atomically;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use serde_json::ser::PrettyFormatter;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur while persisting the show cache
#[derive(Debug, Error)]
pub enum ShowCacheError {
    /// Failed to write the cache file
    #[error("Failed to write cache file {path}: {source}")]
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to remove the cache file
    #[error("Failed to remove cache file {path}: {source}")]
    RemoveFailed { path: PathBuf, source: io::Error },

    /// Failed to serialize the cache
    #[error("Failed to serialize cache: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// The cached projection of a show record
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CachedShow {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: ShowStatus,
    #[serde(default)]
    pub current_ep_url: String,
    #[serde(default)]
    pub current_url: String,
    #[serde(default)]
    pub next_ep_url: String,
    #[serde(default)]
    pub next_url: String,
    #[serde(default)]
    pub myanimelist_url: String,
    #[serde(
        default,
        deserialize_with = "lenient_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub mal_id: Option<u64>,
    #[serde(default, deserialize_with = "lenient_episodes")]
    pub episodes: Option<String>,
    #[serde(default)]
    pub image: CoverImage,
}

impl CachedShow {
    /// Blanks the episode pointers so they get recomputed
    fn clear_pointers(&mut self) {
        self.current_ep_url.clear();
        self.current_url.clear();
        self.next_ep_url.clear();
        self.next_url.clear();
    }
}

impl From<&ShowRecord> for CachedShow {
    fn from(record: &ShowRecord) -> Self {
        Self {
            title: record.title.clone(),
            status: record.status,
            current_ep_url: record.current_ep_url.clone(),
            current_url: record.current_url.clone(),
            next_ep_url: record.next_ep_url.clone(),
            next_url: record.next_url.clone(),
            myanimelist_url: record.myanimelist_url.clone(),
            mal_id: record.mal_id,
            episodes: record.episodes.clone(),
            image: record.image.clone(),
        }
    }
}

/// All cache entries, ordered by key so the file stays diffable
pub type CacheEntries = BTreeMap<String, CachedShow>;

/// Accepts episode counts written as numbers or strings
fn lenient_episodes<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(number)) => Some(number.to_string()),
        Some(Value::String(text)) if !text.is_empty() && text != "-" => Some(text),
        _ => None,
    })
}

/// Accepts external ids written as numbers or numeric strings
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(number)) => number.as_u64(),
        Some(Value::String(text)) => text.trim().parse().ok(),
        _ => None,
    })
}

/// Handle to the on-disk show cache
#[derive(Debug, Clone)]
pub struct ShowCache {
    path: PathBuf,
}

impl ShowCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads all entries
    ///
    /// A missing, unreadable or invalid cache file yields an empty cache: the
    /// cache only ever saves work, it is never required for a refresh.
    pub fn load(&self) -> CacheEntries {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no cache file, starting cold");
                return CacheEntries::new();
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "cache unreadable, ignoring it");
                return CacheEntries::new();
            }
        };

        match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "cache is not valid JSON, ignoring it");
                CacheEntries::new()
            }
        }
    }

    /// Replaces the cache file with the given entries
    pub fn store(&self, entries: &CacheEntries) -> Result<(), ShowCacheError> {
        let mut content = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut content, formatter);
        entries.serialize(&mut serializer)?;

        write_atomically(&self.path, &content).map_err(|e| ShowCacheError::WriteFailed {
            path: self.path.clone(),
            source: e,
        })
    }

    /// Deletes the cache file, returning whether there was one
    pub fn remove(&self) -> Result<bool, ShowCacheError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(ShowCacheError::RemoveFailed {
                path: self.path.clone(),
                source: err,
            }),
        }
    }
}

/// Builds the record a parser starts from for `url`
///
/// Cached fields are overlaid onto an empty record. When the tracked URL no
/// longer matches the cached current episode (the user pointed the list at
/// another episode) the episode pointers are dropped so they get recomputed,
/// while title, cover and MyAnimeList data are kept.
pub(crate) fn preliminary_record(url: &str, cached: Option<&CachedShow>) -> ShowRecord {
    let mut record = ShowRecord {
        title: String::new(),
        image: CoverImage::default(),
        loaded_from_cache: true,
        ..ShowRecord::default()
    };

    if let Some(cached) = cached {
        record.title = cached.title.clone();
        record.current_ep_url = cached.current_ep_url.clone();
        record.current_url = cached.current_url.clone();
        record.next_ep_url = cached.next_ep_url.clone();
        record.next_url = cached.next_url.clone();
        record.myanimelist_url = cached.myanimelist_url.clone();
        record.mal_id = cached.mal_id;
        record.episodes = cached.episodes.clone();
        record.image = cached.image.clone();
    }

    if record.current_ep_url != url {
        record.current_ep_url = url.to_string();
        record.current_url.clear();
        record.next_ep_url.clear();
        record.next_url.clear();
    }

    record
}

/// Merges one batch of resolved records into fresh cache entries
///
/// Each item pairs a record with the cache key of its current episode URL.
/// Records with an empty key are not cached. Failed records never write
/// their own fields; the entry they had before the batch is carried over.
/// When two records share a key the later one wins but its episode pointers
/// are blanked, since neither can be trusted for the shared key.
pub(crate) fn merge_batch<'a, I>(records: I, previous: &CacheEntries) -> CacheEntries
where
    I: IntoIterator<Item = (String, &'a ShowRecord)>,
{
    let mut merged = CacheEntries::new();

    for (key, record) in records {
        if key.is_empty() {
            continue;
        }

        if record.status == ShowStatus::Failed {
            if let Some(prior) = previous.get(&key) {
                merged.entry(key).or_insert_with(|| prior.clone());
            }
            continue;
        }

        let mut entry = CachedShow::from(record);
        if merged.contains_key(&key) {
            entry.clear_pointers();
        }
        merged.insert(key, entry);
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, current: &str, next: &str) -> ShowRecord {
        ShowRecord {
            title: title.to_string(),
            current_ep_url: current.to_string(),
            current_url: current.to_string(),
            next_ep_url: next.to_string(),
            next_url: next.to_string(),
            ep: "1".to_string(),
            ..ShowRecord::default()
        }
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ShowCache::new(dir.path().join("cache.json"));
        assert!(cache.load().is_empty());
    }

    #[test]
    fn test_load_invalid_json_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{ this is not json").unwrap();
        assert!(ShowCache::new(&path).load().is_empty());
    }

    #[test]
    fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ShowCache::new(dir.path().join("cache.json"));
        let mut entries = CacheEntries::new();
        entries.insert(
            "https://anitaku.to/frieren".to_string(),
            CachedShow::from(&record("Frieren", "https://anitaku.to/frieren-episode-3", "")),
        );

        cache.store(&entries).unwrap();
        assert_eq!(cache.load(), entries);

        let raw = fs::read_to_string(cache.path()).unwrap();
        assert!(raw.contains("\n    \"https://anitaku.to/frieren\""));
    }

    #[test]
    fn test_load_accepts_numeric_episodes_and_string_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(
            &path,
            r#"{"k": {"title": "T", "episodes": 12, "mal_id": "52991", "image": {"url": "", "base64_data": ""}},
                "l": {"title": "U", "episodes": "-"}}"#,
        )
        .unwrap();

        let entries = ShowCache::new(&path).load();
        assert_eq!(entries["k"].episodes.as_deref(), Some("12"));
        assert_eq!(entries["k"].mal_id, Some(52991));
        assert_eq!(entries["l"].episodes, None);
    }

    #[test]
    fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ShowCache::new(dir.path().join("cache.json"));
        cache.store(&CacheEntries::new()).unwrap();
        assert!(cache.remove().unwrap());
        assert!(!cache.remove().unwrap());
    }

    #[test]
    fn test_preliminary_record_keeps_pointers_for_same_url() {
        let url = "https://anitaku.to/frieren-episode-3";
        let cached = CachedShow::from(&record("Frieren", url, "https://anitaku.to/frieren-episode-4"));

        let prelim = preliminary_record(url, Some(&cached));
        assert!(prelim.loaded_from_cache);
        assert_eq!(prelim.title, "Frieren");
        assert_eq!(prelim.next_ep_url, "https://anitaku.to/frieren-episode-4");
    }

    #[test]
    fn test_preliminary_record_drops_pointers_for_edited_url() {
        let cached = CachedShow::from(&record(
            "Frieren",
            "https://anitaku.to/frieren-episode-3",
            "https://anitaku.to/frieren-episode-4",
        ));

        let url = "https://anitaku.to/frieren-episode-1";
        let prelim = preliminary_record(url, Some(&cached));
        assert_eq!(prelim.title, "Frieren");
        assert_eq!(prelim.current_ep_url, url);
        assert!(prelim.current_url.is_empty());
        assert!(prelim.next_ep_url.is_empty());
        assert!(prelim.next_url.is_empty());
    }

    #[test]
    fn test_preliminary_record_without_cache() {
        let url = "https://anitaku.to/frieren-episode-3";
        let prelim = preliminary_record(url, None);
        assert!(prelim.title.is_empty());
        assert_eq!(prelim.current_ep_url, url);
        assert!(prelim.image.base64_data.is_empty());
    }

    #[test]
    fn test_merge_batch_skips_failed_and_keeps_previous_entry() {
        let mut previous = CacheEntries::new();
        let prior = CachedShow::from(&record("Old", "https://a/x-episode-1", "https://a/x-episode-2"));
        previous.insert("https://a/x".to_string(), prior.clone());

        let failed = ShowRecord::unresolved("https://a/x-episode-1", ShowStatus::Failed);
        let fresh_failure = ShowRecord::unresolved("https://a/y-episode-1", ShowStatus::Failed);
        let merged = merge_batch(
            vec![
                ("https://a/x".to_string(), &failed),
                ("https://a/y".to_string(), &fresh_failure),
            ],
            &previous,
        );

        assert_eq!(merged.len(), 1);
        assert_eq!(merged["https://a/x"], prior);
    }

    #[test]
    fn test_merge_batch_blanks_pointers_of_duplicates() {
        let first = record("First", "https://a/x-episode-1", "https://a/x-episode-2");
        let second = record("Second", "https://a/x-episode-5", "https://a/x-episode-6");
        let merged = merge_batch(
            vec![
                ("https://a/x".to_string(), &first),
                ("https://a/x".to_string(), &second),
            ],
            &CacheEntries::new(),
        );

        let entry = &merged["https://a/x"];
        assert_eq!(entry.title, "Second");
        assert!(entry.current_ep_url.is_empty());
        assert!(entry.next_ep_url.is_empty());
    }

    #[test]
    fn test_merge_batch_ignores_empty_keys() {
        let show = record("Show", "https://a/episode.php?x", "");
        let merged = merge_batch(vec![(String::new(), &show)], &CacheEntries::new());
        assert!(merged.is_empty());
    }
}
