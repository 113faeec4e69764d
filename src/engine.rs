//! Refresh engine
//!
//! The engine owns the tracked list, the show cache and the parser router.
//! A refresh resolves every tracked URL on a bounded worker pool, then
//! writes the merged cache and the rewritten tracked list once all shows
//! are in. The explicit operations (advancing, editing, removing) work on
//! the records of the last refresh and persist immediately.

use crate::cache::CacheStorage;
use crate::config::Settings;
use crate::http::{Fetcher, HttpFetcher};
use crate::metadata_retrieval::{AnimeInfo, CachedMetadataProvider, JikanProvider, MetadataProvider};
use crate::parsers::ParserRouter;
use crate::show::{NOT_STARTED_EPISODE, ShowRecord, ShowStatus};
use crate::show_cache::{CacheEntries, ShowCache, merge_batch, preliminary_record};
use crate::tracked::TrackedList;
use crate::{ProgressEvent, WatchListError};
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// How long a metadata lookup stays cached
const METADATA_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Shortest URL accepted by `Engine::add_url`
const MIN_URL_LENGTH: usize = 12;

/// Summary of the last refresh
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshStats {
    pub total: usize,
    /// Shows resolved without any network access
    pub cached: usize,
    pub not_aired: usize,
    /// Shows the user has not started watching
    pub not_started: usize,
    /// Failed and unsupported shows
    pub failed: usize,
    /// Regular shows whose next episode is not out yet
    pub without_next_episode: usize,
    /// Wall-clock duration of the last refresh
    pub load_time: Option<Duration>,
}

/// The watch list engine
pub struct Engine {
    settings: Settings,
    router: ParserRouter,
    tracked: TrackedList,
    cache: ShowCache,
    shows: Vec<ShowRecord>,
    last_refresh: Option<Duration>,
}

impl Engine {
    /// Creates an engine fetching over HTTP
    pub fn new(settings: Settings) -> Result<Self, WatchListError> {
        let fetcher = HttpFetcher::new(settings.request_timeout)?;
        Ok(Self::with_fetcher(settings, Arc::new(fetcher)))
    }

    /// Creates an engine using the given fetcher for all site access
    pub fn with_fetcher(settings: Settings, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            router: ParserRouter::new(fetcher),
            tracked: TrackedList::new(&settings.tracked_file),
            cache: ShowCache::new(&settings.cache_file),
            settings,
            shows: Vec::new(),
            last_refresh: None,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Records of the last refresh, ordered by title
    ///
    /// Indices into this slice identify shows in all other operations.
    pub fn shows(&self) -> &[ShowRecord] {
        &self.shows
    }

    /// One placeholder record per tracked URL, for display before a refresh
    pub fn skeleton(&self) -> Result<Vec<ShowRecord>, WatchListError> {
        Ok(self
            .tracked
            .read()?
            .iter()
            .map(|_| ShowRecord::default())
            .collect())
    }

    /// Resolves all tracked shows
    pub fn refresh(&mut self) -> Result<&[ShowRecord], WatchListError> {
        self.refresh_with_progress(|_| {})
    }

    /// Resolves all tracked shows, reporting progress through `progress`
    ///
    /// The callback is invoked from worker threads. Only an unreadable
    /// tracked list or a worker pool that cannot be started fails the
    /// refresh; shows that cannot be resolved carry their problem in their
    /// status, and failures to write the results are logged.
    pub fn refresh_with_progress<F>(&mut self, progress: F) -> Result<&[ShowRecord], WatchListError>
    where
        F: Fn(ProgressEvent) + Sync,
    {
        let started = Instant::now();

        let urls = self.tracked.read()?;
        progress(ProgressEvent::Started { tracked: urls.len() });

        let previous = self.cache.load();
        progress(ProgressEvent::CacheLoaded {
            entries: previous.len(),
        });

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.workers)
            .build()?;

        let total = urls.len();
        let completed = AtomicUsize::new(0);
        let router = &self.router;
        let mut shows: Vec<ShowRecord> = pool.install(|| {
            urls.par_iter()
                .map(|url| {
                    let record = resolve_show(router, url, &previous);
                    let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                    progress(ProgressEvent::ShowResolved {
                        completed: done,
                        total,
                        title: record.title.clone(),
                        status: record.status,
                        from_cache: record.loaded_from_cache,
                    });
                    record
                })
                .collect()
        });

        // Title order keeps indices stable across refreshes
        shows.sort_by(|a, b| a.title.cmp(&b.title));
        self.shows = shows;

        match self.write_back(&previous) {
            Ok(cache_entries) => progress(ProgressEvent::Saved { cache_entries }),
            Err(err) => error!(error = %err, "failed to save refresh results"),
        }

        let elapsed = started.elapsed();
        self.last_refresh = Some(elapsed);

        let stats = self.stats();
        info!(
            total = stats.total,
            cached = stats.cached,
            failed = stats.failed,
            elapsed_ms = elapsed.as_millis() as u64,
            "refresh complete"
        );
        progress(ProgressEvent::Complete {
            shows: self.shows.len(),
            elapsed,
        });

        Ok(&self.shows)
    }

    /// Moves a show to its next episode
    ///
    /// Returns the URL of the episode to watch now. No network access
    /// happens; the next refresh resolves the episode after it.
    pub fn advance_episode(&mut self, index: usize) -> Result<String, WatchListError> {
        let show = self.show_mut(index)?;
        if !show.has_next() {
            return Err(WatchListError::NoNextEpisode(show.title.clone()));
        }

        show.current_ep_url = std::mem::take(&mut show.next_ep_url);
        show.current_url = std::mem::take(&mut show.next_url);
        if show.current_url.is_empty() {
            show.current_url = show.current_ep_url.clone();
        }
        let watch_url = show.current_url.clone();
        debug!(title = %show.title, url = %watch_url, "advanced to next episode");

        self.persist()?;
        Ok(watch_url)
    }

    /// Points a show at episode `ep`
    ///
    /// Returns false when the site cannot express that episode, in which
    /// case nothing changes.
    pub fn edit_episode_number(&mut self, index: usize, ep: &str) -> Result<bool, WatchListError> {
        let len = self.shows.len();
        let show = self
            .shows
            .get_mut(index)
            .ok_or(WatchListError::ShowIndex { index, len })?;

        let ep = ep.trim();
        let updated = self
            .router
            .parser_for(&show.current_ep_url)
            .update_url_episode_number(&show.current_ep_url, ep);
        if updated == show.current_ep_url {
            return Ok(false);
        }

        show.current_ep_url = updated;
        show.ep = ep.to_string();
        show.current_url.clear();
        show.next_ep_url.clear();
        show.next_url.clear();

        self.persist()?;
        Ok(true)
    }

    /// Stops tracking a show
    pub fn remove_show(&mut self, index: usize) -> Result<ShowRecord, WatchListError> {
        let len = self.shows.len();
        if index >= len {
            return Err(WatchListError::ShowIndex { index, len });
        }

        let removed = self.shows.remove(index);
        self.persist()?;
        Ok(removed)
    }

    /// Starts tracking a URL; it is resolved on the next refresh
    pub fn add_url(&mut self, url: &str) -> Result<(), WatchListError> {
        let url = url.trim();
        let has_scheme = url.starts_with("http://") || url.starts_with("https://");
        if !has_scheme || url.len() < MIN_URL_LENGTH {
            return Err(WatchListError::InvalidUrl(url.to_string()));
        }

        self.tracked.append(url)?;
        Ok(())
    }

    /// Deletes the show cache, returning whether there was one
    pub fn remove_cache(&self) -> Result<bool, WatchListError> {
        Ok(self.cache.remove()?)
    }

    /// Looks up a show on MyAnimeList and records what was learned
    pub fn lookup_metadata(&mut self, index: usize) -> Result<Option<AnimeInfo>, WatchListError> {
        let jikan = JikanProvider::new(self.settings.request_timeout, self.settings.display_timezone)?;
        let cache = CacheStorage::open_in(&self.settings.metadata_cache_dir, Some(METADATA_TTL))?;
        let provider = CachedMetadataProvider::new(jikan, cache);
        self.lookup_metadata_with(index, &provider)
    }

    /// Like `lookup_metadata` with an explicit provider
    pub fn lookup_metadata_with(
        &mut self,
        index: usize,
        provider: &dyn MetadataProvider,
    ) -> Result<Option<AnimeInfo>, WatchListError> {
        let title = self.show(index)?.title.clone();
        let info = provider.lookup_anime(&title)?;
        if let Some(info) = &info {
            self.apply_metadata(&title, info)?;
        }
        Ok(info)
    }

    /// Copies the MyAnimeList URL and episode count into the shows titled `title`
    ///
    /// Both the records of the last refresh and the cache are updated, so
    /// finished detection works from the next refresh on. Returns the number
    /// of updated records.
    pub fn apply_metadata(&mut self, title: &str, info: &AnimeInfo) -> Result<usize, WatchListError> {
        let episodes = info.episodes.map(|count| count.to_string());
        let has_url = info.url.starts_with("http");

        let mut updated = 0;
        for show in self.shows.iter_mut().filter(|show| show.title == title) {
            if has_url {
                show.myanimelist_url = info.url.clone();
            }
            show.episodes = episodes.clone();
            updated += 1;
        }

        let mut entries = self.cache.load();
        for entry in entries.values_mut().filter(|entry| entry.title == title) {
            if has_url {
                entry.myanimelist_url = info.url.clone();
            }
            entry.episodes = episodes.clone();
        }
        self.cache.store(&entries)?;

        Ok(updated)
    }

    /// Counts of the last refresh
    pub fn stats(&self) -> RefreshStats {
        let mut stats = RefreshStats {
            total: self.shows.len(),
            load_time: self.last_refresh,
            ..RefreshStats::default()
        };

        for show in &self.shows {
            if show.loaded_from_cache {
                stats.cached += 1;
            }
            if show.status == ShowStatus::NotAired {
                stats.not_aired += 1;
            }
            if show.ep == NOT_STARTED_EPISODE {
                stats.not_started += 1;
            }
            if show.status.is_error() {
                stats.failed += 1;
            }
            if show.status == ShowStatus::Ongoing && !show.has_next() {
                stats.without_next_episode += 1;
            }
        }

        stats
    }

    fn show(&self, index: usize) -> Result<&ShowRecord, WatchListError> {
        let len = self.shows.len();
        self.shows.get(index).ok_or(WatchListError::ShowIndex { index, len })
    }

    fn show_mut(&mut self, index: usize) -> Result<&mut ShowRecord, WatchListError> {
        let len = self.shows.len();
        self.shows
            .get_mut(index)
            .ok_or(WatchListError::ShowIndex { index, len })
    }

    fn cache_key_of(&self, url: &str) -> String {
        self.router.parser_for(url).cache_key(url)
    }

    /// Writes the cache and the tracked list from the current records
    fn write_back(&self, previous: &CacheEntries) -> Result<usize, WatchListError> {
        let entries = merge_batch(
            self.shows
                .iter()
                .map(|show| (self.cache_key_of(&show.current_ep_url), show)),
            previous,
        );
        self.cache.store(&entries)?;
        self.tracked.rewrite(&self.shows)?;
        Ok(entries.len())
    }

    /// Persists an explicit change on top of the cache on disk
    fn persist(&self) -> Result<(), WatchListError> {
        let previous = self.cache.load();
        self.write_back(&previous)?;
        Ok(())
    }
}

/// Resolves one tracked URL, starting from its cache entry
fn resolve_show(router: &ParserRouter, url: &str, cache: &CacheEntries) -> ShowRecord {
    let parser = router.parser_for(url);
    let key = parser.cache_key(url);
    let cached = if key.is_empty() { None } else { cache.get(&key) };

    debug!(parser = parser.name(), url, cached = cached.is_some(), "resolving show");
    parser.extend_details(url, preliminary_record(url, cached))
}

/// Order in which shows are presented
///
/// Shows with a next episode come first, freshly released ones on top and
/// then by episode, highest first. Ties keep the order of status label and
/// title. Returns indices into `shows`.
pub fn display_order(shows: &[ShowRecord]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..shows.len()).collect();
    order.sort_by_cached_key(|&i| format!("{} {}", shows[i].status.label(), shows[i].title));

    let (mut with_next, without_next): (Vec<usize>, Vec<usize>) =
        order.into_iter().partition(|&i| shows[i].has_next());

    with_next.sort_by(|&a, &b| {
        shows[b]
            .episode_sort_value()
            .total_cmp(&shows[a].episode_sort_value())
    });
    with_next.sort_by(|&a, &b| shows[b].weight.cmp(&shows[a].weight));

    with_next.extend(without_next);
    with_next
}
