//! Fallback parser for sites without dedicated support
//!
//! Nothing is fetched. URLs containing an `-episode-<n>` or `-ep-<n>` token
//! stay usable by assuming the next episode lives at the same URL with the
//! number incremented.

use super::support::ParserSupport;
use super::{ScrapeError, SiteParser};
use crate::show::{CoverImage, ShowRecord};
use regex::Regex;
use std::sync::LazyLock;

static EPISODE_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://.*-(?:episode|ep)-(\d+)").expect("valid episode token pattern"));
static EPISODE_TOKEN_ANYWHERE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-(?:episode|ep)-\d+").expect("valid episode token pattern"));

pub(crate) struct GenericParser {
    support: ParserSupport,
}

impl GenericParser {
    pub(crate) fn new(support: ParserSupport) -> Self {
        Self { support }
    }
}

impl SiteParser for GenericParser {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn support(&self) -> &ParserSupport {
        &self.support
    }

    fn cache_key(&self, url: &str) -> String {
        EPISODE_TOKEN_ANYWHERE.replace_all(url, "").into_owned()
    }

    fn update_url_episode_number(&self, url: &str, ep: &str) -> String {
        if ep.is_empty() || !ep.bytes().all(|b| b.is_ascii_digit()) {
            return url.to_string();
        }
        match EPISODE_TOKEN.captures(url).and_then(|caps| caps.get(1)) {
            Some(number) => format!("{}{}{}", &url[..number.start()], ep, &url[number.end()..]),
            None => url.to_string(),
        }
    }

    fn resolve(&self, url: &str, mut details: ShowRecord) -> Result<ShowRecord, ScrapeError> {
        let number = EPISODE_TOKEN
            .captures(url)
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| ScrapeError::UnsupportedUrl {
                parser: self.name(),
                url: url.to_string(),
            })?;

        let current: u64 = number.as_str().parse().map_err(|_| ScrapeError::InvalidData {
            url: url.to_string(),
            reason: format!("episode number '{}' is out of range", number.as_str()),
        })?;
        let next = current.checked_add(1).ok_or_else(|| ScrapeError::InvalidData {
            url: url.to_string(),
            reason: format!("episode number {} has no successor", current),
        })?;
        let next_ep_url = format!("{}{}{}", &url[..number.start()], next, &url[number.end()..]);

        details.ep = current.to_string();
        details.current_ep_url = url.to_string();
        details.current_url = url.to_string();
        details.next_url = next_ep_url.clone();
        details.next_ep_url = next_ep_url;
        details.title = url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(url)
            .to_string();
        details.image = CoverImage::placeholder();
        details.loaded_from_cache = false;
        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::StubFetcher;
    use crate::show::{ShowStatus, placeholder_base64};
    use crate::show_cache::preliminary_record;
    use std::sync::Arc;

    fn parser() -> (GenericParser, Arc<StubFetcher>) {
        let stub = Arc::new(StubFetcher::new());
        (GenericParser::new(ParserSupport::new(stub.clone())), stub)
    }

    #[test]
    fn test_episode_token_synthesizes_next() {
        let url = "https://example.org/watch/blue-lock-episode-7";
        let (parser, stub) = parser();

        let record = parser.extend_details(url, preliminary_record(url, None));

        assert_eq!(record.ep, "7");
        assert_eq!(record.title, "blue-lock-episode-7");
        assert_eq!(record.next_ep_url, "https://example.org/watch/blue-lock-episode-8");
        assert_eq!(record.next_url, record.next_ep_url);
        assert_eq!(record.image.base64_data, placeholder_base64());
        assert!(!record.loaded_from_cache);
        assert_eq!(stub.request_count(), 0);
    }

    #[test]
    fn test_ep_token_with_trailing_path() {
        let url = "https://example.org/show-ep-9/";
        let (parser, _) = parser();

        let record = parser.extend_details(url, preliminary_record(url, None));

        assert_eq!(record.ep, "9");
        assert_eq!(record.title, "show-ep-9");
        assert_eq!(record.next_ep_url, "https://example.org/show-ep-10/");
    }

    #[test]
    fn test_url_without_token_is_unsupported() {
        let url = "https://example.org/some/show";
        let (parser, _) = parser();

        let record = parser.extend_details(url, preliminary_record(url, None));

        assert_eq!(record.status, ShowStatus::UnsupportedUrl);
        assert_eq!(record.title, url);
        assert_eq!(record.ep, "-1");
    }

    #[test]
    fn test_largest_episode_number_fails_without_panicking() {
        let url = "https://example.org/show-episode-18446744073709551615";
        let (parser, _) = parser();

        let record = parser.extend_details(url, preliminary_record(url, None));

        assert_eq!(record.status, ShowStatus::Failed);
        assert_eq!(record.current_ep_url, url);
        assert!(record.next_ep_url.is_empty());
    }

    #[test]
    fn test_episode_number_beyond_range_fails() {
        let url = "https://example.org/show-episode-99999999999999999999";
        let (parser, _) = parser();

        let record = parser.extend_details(url, preliminary_record(url, None));
        assert_eq!(record.status, ShowStatus::Failed);
    }

    #[test]
    fn test_update_and_cache_key() {
        let (parser, _) = parser();
        let url = "https://example.org/blue-lock-episode-7";

        assert_eq!(
            parser.update_url_episode_number(url, "3"),
            "https://example.org/blue-lock-episode-3"
        );
        assert_eq!(parser.update_url_episode_number(url, "x"), url);
        assert_eq!(parser.cache_key(url), "https://example.org/blue-lock");
    }
}
