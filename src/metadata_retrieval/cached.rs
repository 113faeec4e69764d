//! Cached metadata provider implementation
//!
//! This module provides a caching wrapper for metadata providers that
//! automatically stores and retrieves lookups from a local cache.

use super::{AnimeInfo, MetadataProvider, MetadataRetrievalError, filter_title};
use crate::cache::CacheStorage;
use tracing::debug;

/// A caching wrapper for metadata providers
///
/// This provider wraps another metadata provider and caches successful
/// matches to avoid redundant network requests. Titles without a match are
/// not cached so a show that gets listed later is found on the next lookup.
pub struct CachedMetadataProvider<P>
where
    P: MetadataProvider,
{
    /// The underlying metadata provider
    provider: P,
    /// Cache storage for lookup results
    cache: CacheStorage<AnimeInfo>,
}

impl<P> CachedMetadataProvider<P>
where
    P: MetadataProvider,
{
    /// Creates a new cached metadata provider wrapping the given provider
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let jikan = JikanProvider::new(timeout, tz)?;
    /// let cache = CacheStorage::open_in(&settings.metadata_cache_dir, Some(day))?;
    /// let cached = CachedMetadataProvider::new(jikan, cache);
    /// ```
    pub(crate) fn new(provider: P, cache: CacheStorage<AnimeInfo>) -> Self {
        Self { provider, cache }
    }
}

impl<P> MetadataProvider for CachedMetadataProvider<P>
where
    P: MetadataProvider,
{
    fn lookup_anime(&self, title: &str) -> Result<Option<AnimeInfo>, MetadataRetrievalError> {
        let cache_key = filter_title(title);

        // Cache read errors fall through to the provider
        match self.cache.load(&cache_key) {
            Ok(Some(info)) => return Ok(Some(info)),
            Ok(None) => {}
            Err(err) => debug!(title, error = %err, "ignoring unreadable metadata cache entry"),
        }

        let info = self.provider.lookup_anime(title)?;

        // Store in cache (ignore errors to avoid failing the request)
        if let Some(info) = &info {
            if let Err(err) = self.cache.store(&cache_key, info) {
                debug!(title, error = %err, "failed to cache metadata");
            }
        }

        Ok(info)
    }
}
