//! Site parsers
//!
//! Each supported streaming site gets a parser that knows how to derive a
//! cache key from a URL, how to rewrite a URL to point at another episode and
//! how to resolve a show's current and next episode from the site's pages.
//! All parsers share one contract so the engine never has to know which site
//! a show lives on.

mod animeheaven;
mod anitaku;
mod generic;
mod hianime;
mod router;
mod support;

pub(crate) use router::ParserRouter;
pub(crate) use support::ParserSupport;

use crate::http::FetchError;
use crate::show::{NOT_STARTED_EPISODE, ShowRecord, ShowStatus};
use thiserror::Error;
use tracing::warn;

/// Errors that can occur while resolving a show from its site
///
/// These never escape a refresh: `SiteParser::extend_details` turns them
/// into a record with a failed or unsupported status.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The URL does not have a shape the parser understands
    #[error("{parser} does not understand {url}")]
    UnsupportedUrl { parser: &'static str, url: String },

    /// A page or payload could not be fetched
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// An element the parser relies on is missing from the page
    #[error("No element matching '{selector}' on {url}")]
    MissingElement { selector: &'static str, url: String },

    /// The page contains data the parser cannot interpret
    #[error("Unexpected data on {url}: {reason}")]
    InvalidData { url: String, reason: String },
}

/// Contract shared by all site parsers
pub(crate) trait SiteParser: Send + Sync {
    /// Short name used in logs and errors
    fn name(&self) -> &'static str;

    /// Shared fetch and image helpers
    fn support(&self) -> &ParserSupport;

    /// Derives the cache key of a URL
    ///
    /// Episode specific parts are stripped so every episode of a show maps
    /// to the same key. An empty key means the URL is never cached.
    fn cache_key(&self, url: &str) -> String;

    /// Rewrites `url` to point at episode `ep`
    ///
    /// An episode the site cannot express leaves the URL unchanged.
    fn update_url_episode_number(&self, url: &str, ep: &str) -> String;

    /// Resolves the site specific fields of a show
    ///
    /// `details` is the preliminary record built from the cache. The parser
    /// decides on its own whether cached data suffices or pages need to be
    /// fetched.
    fn resolve(&self, url: &str, details: ShowRecord) -> Result<ShowRecord, ScrapeError>;

    /// Resolves a show and applies the post-processing common to all sites
    ///
    /// Never fails: scrape errors become records whose status tells the
    /// user what went wrong, with the tracked URL as title.
    fn extend_details(&self, url: &str, details: ShowRecord) -> ShowRecord {
        let cached_next_ep_url = details.next_ep_url.clone();

        let record = match self.resolve(url, details) {
            Ok(record) => record,
            Err(ScrapeError::UnsupportedUrl { .. }) => {
                ShowRecord::unresolved(url, ShowStatus::UnsupportedUrl)
            }
            Err(err) => {
                warn!(parser = self.name(), url, error = %err, "failed to resolve show");
                ShowRecord::unresolved(url, ShowStatus::Failed)
            }
        };

        finalize(self.support(), url, record, &cached_next_ep_url)
    }
}

/// Post-processing applied to every resolved record
fn finalize(support: &ParserSupport, url: &str, mut record: ShowRecord, cached_next_ep_url: &str) -> ShowRecord {
    if record.current_ep_url.is_empty() {
        record.current_ep_url = url.to_string();
    }
    if record.title.is_empty() {
        record.title = url.to_string();
    }

    if !record.status.is_error() {
        if record.is_at_last_episode() {
            record.status = ShowStatus::Finished;
        } else if record.ep == NOT_STARTED_EPISODE && !record.has_next() {
            record.status = ShowStatus::NotAired;
        }
    }

    if record.image.base64_data.is_empty() {
        record.image.base64_data = support.image_base64(&record.image.url);
        record.loaded_from_cache = false;
    }

    if record.current_url.is_empty() {
        record.current_url = record.current_ep_url.clone();
    }
    if record.next_url.is_empty() {
        record.next_url = record.next_ep_url.clone();
    }

    record.weight = u8::from(record.next_ep_url != cached_next_ep_url);
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::StubFetcher;
    use crate::show::{CoverImage, placeholder_base64};
    use std::sync::Arc;

    struct ScriptedParser {
        support: ParserSupport,
        outcome: fn(ShowRecord) -> Result<ShowRecord, ScrapeError>,
    }

    impl SiteParser for ScriptedParser {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn support(&self) -> &ParserSupport {
            &self.support
        }

        fn cache_key(&self, url: &str) -> String {
            url.to_string()
        }

        fn update_url_episode_number(&self, url: &str, _ep: &str) -> String {
            url.to_string()
        }

        fn resolve(&self, _url: &str, details: ShowRecord) -> Result<ShowRecord, ScrapeError> {
            (self.outcome)(details)
        }
    }

    fn parser(outcome: fn(ShowRecord) -> Result<ShowRecord, ScrapeError>) -> ScriptedParser {
        ScriptedParser {
            support: ParserSupport::new(Arc::new(StubFetcher::new())),
            outcome,
        }
    }

    fn cached(next: &str) -> ShowRecord {
        ShowRecord {
            title: "Show".to_string(),
            ep: "3".to_string(),
            current_ep_url: "https://site/show-episode-3".to_string(),
            next_ep_url: next.to_string(),
            image: CoverImage {
                url: "https://site/cover.jpg".to_string(),
                base64_data: "AAAA".to_string(),
            },
            loaded_from_cache: true,
            ..ShowRecord::default()
        }
    }

    #[test]
    fn test_weight_reflects_changed_next_episode() {
        let url = "https://site/show-episode-3";

        let unchanged = parser(Ok).extend_details(url, cached("https://site/show-episode-4"));
        assert_eq!(unchanged.weight, 0);
        assert!(unchanged.loaded_from_cache);

        let fresh = parser(|mut d| {
            d.next_ep_url = "https://site/show-episode-4".to_string();
            Ok(d)
        })
        .extend_details(url, cached(""));
        assert_eq!(fresh.weight, 1);
        assert_eq!(fresh.next_url, "https://site/show-episode-4");
        assert_eq!(fresh.current_url, url);
    }

    #[test]
    fn test_errors_become_statuses() {
        let url = "https://site/show-episode-3";

        let failed = parser(|_| {
            Err(ScrapeError::MissingElement {
                selector: "h1",
                url: "https://site/show-episode-3".to_string(),
            })
        })
        .extend_details(url, cached(""));
        assert_eq!(failed.status, ShowStatus::Failed);
        assert_eq!(failed.title, url);
        assert_eq!(failed.ep, "-1");
        assert_eq!(failed.image.base64_data, placeholder_base64());

        let unsupported = parser(|_| {
            Err(ScrapeError::UnsupportedUrl {
                parser: "scripted",
                url: String::new(),
            })
        })
        .extend_details(url, cached(""));
        assert_eq!(unsupported.status, ShowStatus::UnsupportedUrl);
        assert_eq!(unsupported.current_ep_url, url);
    }

    #[test]
    fn test_status_derivation() {
        let url = "https://site/show-episode-3";

        let finished = parser(|mut d| {
            d.episodes = Some("3".to_string());
            Ok(d)
        })
        .extend_details(url, cached("https://site/show-episode-4"));
        assert_eq!(finished.status, ShowStatus::Finished);

        let not_aired = parser(|mut d| {
            d.ep = "0".to_string();
            d.next_ep_url.clear();
            Ok(d)
        })
        .extend_details(url, cached(""));
        assert_eq!(not_aired.status, ShowStatus::NotAired);
    }

    #[test]
    fn test_missing_image_falls_back_to_placeholder() {
        let record = parser(|mut d| {
            d.image = CoverImage::default();
            Ok(d)
        })
        .extend_details("https://site/show-episode-3", cached(""));

        assert_eq!(record.image.base64_data, placeholder_base64());
        assert!(!record.loaded_from_cache);
    }
}
