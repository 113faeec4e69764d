/// Data structures and traits for anime metadata retrieval.
///
/// This module provides the structure describing a show as listed on
/// MyAnimeList (total episodes, airing status, broadcast slot, ...), as well
/// as the trait for implementing metadata providers.
mod broadcast;
mod cached;
mod jikan;
mod jikan_types;

pub use broadcast::{BroadcastSlot, convert_broadcast};
pub(crate) use cached::CachedMetadataProvider;
pub use jikan::JikanProvider;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;

static TRAILING_PARENTHETICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" \(.*\)$").expect("valid parenthetical pattern"));
static SPECIAL_CHARACTERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s\-_]").expect("valid special character pattern"));

/// Placeholder for values the provider does not know
pub const MISSING_VALUE: &str = "-";

/// Errors that can occur during metadata retrieval operations.
#[derive(Debug, Error)]
pub enum MetadataRetrievalError {
    /// Request to the metadata provider failed
    #[error("Request failed: {0}")]
    RequestError(String),

    /// Failed to parse the provider's JSON response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// The API returned invalid or unexpected data
    #[error("API returned invalid data: {0}")]
    InvalidData(String),
}

/// Metadata of one show
///
/// Text fields hold `-` when the provider has no value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimeInfo {
    /// The show's MyAnimeList page
    pub url: String,
    pub title_english: String,
    /// Source material, e.g. "Manga"
    pub source: String,
    /// Airing status, e.g. "Finished airing"
    pub status: String,
    /// Total number of episodes, once known
    pub episodes: Option<u32>,
    /// Human readable airing period
    pub aired: String,
    pub score: String,
    pub season: String,
    /// Weekly broadcast slot converted to the display timezone
    pub broadcast: String,
    /// Genre names joined by ", "
    pub genres: String,
    pub synopsis: String,
    /// Cover image on MyAnimeList
    pub image_url: String,
}

/// Trait for metadata providers that can look up anime information.
///
/// Implementors of this trait can retrieve show metadata from various
/// sources such as MyAnimeList mirrors or AniList.
pub trait MetadataProvider {
    /// Looks up the show with the given title.
    ///
    /// # Arguments
    ///
    /// * `title` - The show title as scraped from its streaming site
    ///
    /// # Returns
    ///
    /// The metadata of the matching show, None if no listed show matches,
    /// or a MetadataRetrievalError if the provider could not be queried
    fn lookup_anime(&self, title: &str) -> Result<Option<AnimeInfo>, MetadataRetrievalError>;
}

/// Normalizes a title for matching
///
/// Drops a trailing parenthetical such as " (Dub)" or " (2024)", removes
/// punctuation and lowercases the rest.
pub fn filter_title(title: &str) -> String {
    let title = TRAILING_PARENTHETICAL.replace(title, "");
    SPECIAL_CHARACTERS
        .replace_all(title.trim_end(), "")
        .to_lowercase()
}

/// Renders an optional provider value for display
///
/// Missing or empty values become `-`. The first letter is capitalized
/// unless the value is a URL.
pub(crate) fn display_value(value: Option<&str>) -> String {
    let value = match value.map(str::trim) {
        Some(value) if !value.is_empty() => value,
        _ => return MISSING_VALUE.to_string(),
    };

    if value.starts_with("http") {
        return value.to_string();
    }

    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => MISSING_VALUE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_title() {
        assert_eq!(filter_title("Sousou no Frieren"), "sousou no frieren");
        assert_eq!(filter_title("Kaiju No. 8 (Dub)"), "kaiju no 8");
        assert_eq!(filter_title("Re:Zero - Season 3"), "rezero - season 3");
        assert_eq!(filter_title("Dr. Stone: Science Future (2025)"), "dr stone science future");
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(None), "-");
        assert_eq!(display_value(Some("")), "-");
        assert_eq!(display_value(Some("manga")), "Manga");
        assert_eq!(display_value(Some("Finished Airing")), "Finished Airing");
        assert_eq!(
            display_value(Some("https://myanimelist.net/anime/52991")),
            "https://myanimelist.net/anime/52991"
        );
    }
}
