//! Show records
//!
//! This module defines the data model shared by the parsers, the show cache
//! and the engine: one `ShowRecord` per tracked URL describing where the user
//! currently is in that show.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Cover shown when a site offers none or the download fails
const PLACEHOLDER_IMAGE: &[u8] = include_bytes!("../assets/image-not-found.png");

static PLACEHOLDER_BASE64: LazyLock<String> = LazyLock::new(|| BASE64.encode(PLACEHOLDER_IMAGE));

/// Episode marker for records whose episode could not be determined
pub const UNRESOLVED_EPISODE: &str = "-1";

/// Episode marker for shows the user has not started yet
pub const NOT_STARTED_EPISODE: &str = "0";

/// State of a tracked show after a refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowStatus {
    /// Regular show, possibly with a next episode available
    #[default]
    Ongoing,
    /// The show exists but has not released any episode yet
    NotAired,
    /// No parser recognizes the URL
    UnsupportedUrl,
    /// Scraping failed for this run
    Failed,
    /// The current episode is the last one
    Finished,
}

impl ShowStatus {
    /// Short label used when rendering a show's title
    pub fn label(&self) -> &'static str {
        match self {
            ShowStatus::Ongoing => "",
            ShowStatus::NotAired => "Not yet aired",
            ShowStatus::UnsupportedUrl => "UNSUPPORTED URL",
            ShowStatus::Failed => "Failed",
            ShowStatus::Finished => "✅",
        }
    }

    /// Whether this status marks a record that could not be resolved
    pub fn is_error(&self) -> bool {
        matches!(self, ShowStatus::Failed | ShowStatus::UnsupportedUrl)
    }
}

impl fmt::Display for ShowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Cover art of a show, embedded so it never has to be fetched twice
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoverImage {
    /// Where the cover was downloaded from (empty when unknown)
    #[serde(default)]
    pub url: String,
    /// Base64 encoded image bytes
    #[serde(default)]
    pub base64_data: String,
}

impl CoverImage {
    /// A cover without source URL carrying the bundled placeholder image
    pub fn placeholder() -> Self {
        Self {
            url: String::new(),
            base64_data: placeholder_base64(),
        }
    }
}

/// Base64 encoding of the bundled placeholder image
pub fn placeholder_base64() -> String {
    PLACEHOLDER_BASE64.clone()
}

/// One tracked show's current state
///
/// `current_ep_url` and `next_ep_url` are the canonical episode pages, while
/// `current_url` and `next_url` are the pages the user actually watches on
/// (identical for most sites).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowRecord {
    pub title: String,
    pub status: ShowStatus,
    pub current_ep_url: String,
    pub current_url: String,
    pub next_ep_url: String,
    pub next_url: String,
    pub myanimelist_url: String,
    pub mal_id: Option<u64>,
    /// Episode number as text, fractional episodes like "12.5" included
    pub ep: String,
    /// Total number of episodes, when known from the metadata lookup
    pub episodes: Option<String>,
    /// True when no network fetch happened for this record in this run
    pub loaded_from_cache: bool,
    /// 1 when the next episode changed since the last refresh
    pub weight: u8,
    pub image: CoverImage,
}

impl Default for ShowRecord {
    fn default() -> Self {
        Self {
            title: "Loading...".to_string(),
            status: ShowStatus::Ongoing,
            current_ep_url: String::new(),
            current_url: String::new(),
            next_ep_url: String::new(),
            next_url: String::new(),
            myanimelist_url: String::new(),
            mal_id: None,
            ep: UNRESOLVED_EPISODE.to_string(),
            episodes: None,
            loaded_from_cache: false,
            weight: 0,
            image: CoverImage::placeholder(),
        }
    }
}

impl ShowRecord {
    /// Builds the record for a URL that could not be resolved
    ///
    /// The raw URL doubles as the title so the entry stays identifiable.
    pub fn unresolved(url: &str, status: ShowStatus) -> Self {
        Self {
            title: url.to_string(),
            status,
            current_ep_url: url.to_string(),
            ..Self::default()
        }
    }

    /// Whether a next episode is known
    pub fn has_next(&self) -> bool {
        !self.next_ep_url.is_empty()
    }

    /// Whether the current episode is the last one of the show
    pub fn is_at_last_episode(&self) -> bool {
        self.episodes.as_deref() == Some(self.ep.as_str())
    }

    /// Title prefixed with the status label, as shown in listings
    pub fn display_title(&self) -> String {
        match self.status.label() {
            "" => self.title.clone(),
            label => format!("[{}] {}", label, self.title),
        }
    }

    /// Numeric value of the episode for ordering
    ///
    /// Fractional episodes written with a dash ("12-5") sort as "12.5".
    pub fn episode_sort_value(&self) -> f64 {
        if let Ok(value) = self.ep.parse::<f64>() {
            return value;
        }
        self.ep.replacen('-', ".", 1).parse().unwrap_or(-1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_record_is_unresolved_with_placeholder() {
        let record = ShowRecord::default();
        assert_eq!(record.ep, UNRESOLVED_EPISODE);
        assert_eq!(record.weight, 0);
        assert!(record.image.url.is_empty());
        assert_eq!(record.image.base64_data, placeholder_base64());
    }

    #[test]
    fn test_placeholder_decodes_to_png() {
        let bytes = BASE64.decode(placeholder_base64()).unwrap();
        assert!(infer::is_image(&bytes));
    }

    #[test]
    fn test_unresolved_uses_url_as_title() {
        let url = "https://example.com/some/show";
        let record = ShowRecord::unresolved(url, ShowStatus::UnsupportedUrl);
        assert_eq!(record.title, url);
        assert_eq!(record.current_ep_url, url);
        assert_eq!(record.ep, "-1");
        assert_eq!(record.status, ShowStatus::UnsupportedUrl);
    }

    #[test]
    fn test_episode_sort_value() {
        let mut record = ShowRecord::default();
        record.ep = "12".to_string();
        assert_eq!(record.episode_sort_value(), 12.0);
        record.ep = "12.5".to_string();
        assert_eq!(record.episode_sort_value(), 12.5);
        record.ep = "12-5".to_string();
        assert_eq!(record.episode_sort_value(), 12.5);
        record.ep = "-1".to_string();
        assert_eq!(record.episode_sort_value(), -1.0);
    }

    #[test]
    fn test_display_title() {
        let mut record = ShowRecord::default();
        record.title = "Frieren".to_string();
        assert_eq!(record.display_title(), "Frieren");
        record.status = ShowStatus::NotAired;
        assert_eq!(record.display_title(), "[Not yet aired] Frieren");
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&ShowStatus::UnsupportedUrl).unwrap();
        assert_eq!(json, "\"unsupported_url\"");
        let status: ShowStatus = serde_json::from_str("\"not_aired\"").unwrap();
        assert_eq!(status, ShowStatus::NotAired);
    }
}
