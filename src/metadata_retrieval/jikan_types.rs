/// Jikan API response types for deserialization.
///
/// These structures mirror the JSON response format of the Jikan v4 anime
/// search endpoint. Jikan sends `null` for anything MyAnimeList does not
/// know, so nearly every field is optional.
use serde::Deserialize;

/// The top-level response from the anime search endpoint.
#[derive(Debug, Deserialize)]
pub(super) struct JikanSearchResponse {
    /// Search hits, best first
    #[serde(default)]
    pub data: Vec<JikanAnime>,
}

/// A single anime entry.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct JikanAnime {
    pub url: Option<String>,
    /// All known titles (default, synonyms, Japanese, English, ...)
    #[serde(default)]
    pub titles: Vec<JikanTitle>,
    pub title_english: Option<String>,
    pub source: Option<String>,
    pub status: Option<String>,
    pub episodes: Option<u32>,
    pub aired: Option<JikanAired>,
    pub score: Option<f64>,
    pub season: Option<String>,
    pub broadcast: Option<JikanBroadcast>,
    #[serde(default)]
    pub genres: Vec<JikanNamed>,
    pub synopsis: Option<String>,
    pub images: Option<JikanImages>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct JikanTitle {
    pub title: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct JikanAired {
    /// Human readable period, e.g. "Sep 29, 2023 to Mar 22, 2024"
    pub string: Option<String>,
}

/// Weekly broadcast slot in the broadcaster's timezone.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct JikanBroadcast {
    /// Plural weekday, e.g. "Fridays"
    pub day: Option<String>,
    /// Time of day as "HH:MM"
    pub time: Option<String>,
    /// IANA timezone name, e.g. "Asia/Tokyo"
    pub timezone: Option<String>,
    /// Preformatted slot, e.g. "Fridays at 23:00 (JST)"
    pub string: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct JikanNamed {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct JikanImages {
    pub jpg: Option<JikanImage>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct JikanImage {
    pub image_url: Option<String>,
}
