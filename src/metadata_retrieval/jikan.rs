/// Jikan (unofficial MyAnimeList API) metadata provider implementation.
use super::broadcast::convert_broadcast;
use super::jikan_types::{JikanAnime, JikanSearchResponse};
use super::{AnimeInfo, MISSING_VALUE, MetadataProvider, MetadataRetrievalError, display_value, filter_title};
use crate::http::BROWSER_USER_AGENT;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use std::time::Duration;
use tracing::debug;

/// Number of search hits considered per lookup
const SEARCH_LIMIT: &str = "5";

/// Metadata provider for the Jikan API.
///
/// This provider searches https://api.jikan.moe/v4/anime and picks the hit
/// whose titles match the scraped title.
pub struct JikanProvider {
    client: reqwest::blocking::Client,
    base_url: String,
    display_timezone: Tz,
}

impl JikanProvider {
    /// Creates a new Jikan provider converting broadcast slots to `display_timezone`.
    pub fn new(timeout: Duration, display_timezone: Tz) -> Result<Self, MetadataRetrievalError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| MetadataRetrievalError::RequestError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: "https://api.jikan.moe/v4".to_string(),
            display_timezone,
        })
    }

    /// Picks the search hit matching `filtered_title`.
    ///
    /// An exact match on any of a hit's titles wins over a partial match.
    fn best_match(filtered_title: &str, candidates: Vec<JikanAnime>) -> Option<JikanAnime> {
        let normalized = |anime: &JikanAnime| -> Vec<String> {
            anime
                .titles
                .iter()
                .map(|title| filter_title(&title.title))
                .collect()
        };

        if let Some(exact) = candidates
            .iter()
            .position(|anime| normalized(anime).iter().any(|title| title == filtered_title))
        {
            return candidates.into_iter().nth(exact);
        }

        candidates.into_iter().find(|anime| {
            normalized(anime)
                .iter()
                .any(|title| title.contains(filtered_title) || filtered_title.contains(title.as_str()))
        })
    }

    /// Converts a Jikan entry to our internal AnimeInfo structure.
    fn convert_anime(anime: JikanAnime, display_timezone: Tz, today: NaiveDate) -> AnimeInfo {
        let broadcast = anime
            .broadcast
            .as_ref()
            .and_then(|broadcast| {
                let slot = convert_broadcast(
                    broadcast.day.as_deref()?,
                    broadcast.time.as_deref()?,
                    broadcast.timezone.as_deref()?,
                    display_timezone,
                    today,
                );
                match slot {
                    Some(slot) => Some(format!("{} ({})", slot, display_timezone.name())),
                    None => broadcast.string.clone(),
                }
            })
            .unwrap_or_else(|| MISSING_VALUE.to_string());

        let genres = anime
            .genres
            .iter()
            .map(|genre| display_value(Some(genre.name.as_str())))
            .collect::<Vec<_>>()
            .join(", ");

        AnimeInfo {
            url: display_value(anime.url.as_deref()),
            title_english: display_value(anime.title_english.as_deref()),
            source: display_value(anime.source.as_deref()),
            status: display_value(anime.status.as_deref()),
            episodes: anime.episodes,
            aired: display_value(anime.aired.as_ref().and_then(|aired| aired.string.as_deref())),
            score: display_value(anime.score.map(|score| score.to_string()).as_deref()),
            season: display_value(anime.season.as_deref()),
            broadcast,
            genres: if genres.is_empty() {
                MISSING_VALUE.to_string()
            } else {
                genres
            },
            synopsis: display_value(anime.synopsis.as_deref()),
            image_url: display_value(
                anime
                    .images
                    .as_ref()
                    .and_then(|images| images.jpg.as_ref())
                    .and_then(|jpg| jpg.image_url.as_deref()),
            ),
        }
    }

    /// Turns a parsed search response into the matching show, if any.
    fn select(
        title: &str,
        response: JikanSearchResponse,
        display_timezone: Tz,
        today: NaiveDate,
    ) -> Option<AnimeInfo> {
        let filtered_title = filter_title(title);
        Self::best_match(&filtered_title, response.data)
            .map(|anime| Self::convert_anime(anime, display_timezone, today))
    }
}

impl MetadataProvider for JikanProvider {
    fn lookup_anime(&self, title: &str) -> Result<Option<AnimeInfo>, MetadataRetrievalError> {
        // Build the API URL
        let url = format!("{}/anime", self.base_url);
        let query = filter_title(title);

        // Make the HTTP request with query parameters
        let response = self
            .client
            .get(&url)
            .query(&[("q", query.as_str()), ("limit", SEARCH_LIMIT)])
            .send()
            .map_err(|e| MetadataRetrievalError::RequestError(e.to_string()))?;

        // Ensure request was successful
        if !response.status().is_success() {
            return Err(MetadataRetrievalError::RequestError(format!(
                "HTTP {} {}",
                response.status().as_u16(),
                response.status().canonical_reason().unwrap_or("Unknown")
            )));
        }

        // Parse the JSON response
        let search: JikanSearchResponse = response
            .json()
            .map_err(|e| MetadataRetrievalError::ParseError(e.to_string()))?;

        debug!(title, hits = search.data.len(), "searched MyAnimeList");
        Ok(Self::select(title, search, self.display_timezone, Utc::now().date_naive()))
    }
}
