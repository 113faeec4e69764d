//! Parser for HiAnime
//!
//! A show lives at `/<slug>-<id>`. The crate tracks episodes in a display
//! form `/<slug>-<id>?episode=<n>` while the site plays them under
//! `/watch/<slug>-<id>?ep=<episode id>`, so both the episode number and the
//! site's internal episode id have to be resolved. Show details come from the
//! JSON embedded in the show page, the episode list from the site's AJAX
//! endpoint.

use super::support::{ParserSupport, first_attr, myanimelist_url, require, selector};
use super::{ScrapeError, SiteParser};
use crate::show::{CoverImage, NOT_STARTED_EPISODE, ShowRecord};
use regex::Regex;
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;
use url::Url;

static DISPLAY_EPISODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\?episode=(\d+(?:\.\d+)?)$").expect("valid display episode pattern")
});
static WATCH_EPISODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\?ep=(\d+)$").expect("valid watch episode pattern"));
static EPISODE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(?:\.\d+)?$").expect("valid number pattern"));

const SYNC_DATA: &str = "script#syncData";
const POSTER: &str = "div.film-poster img";

static SYNC_DATA_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector(SYNC_DATA));
static POSTER_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector(POSTER));
static EPISODE_ITEM_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector("a.ep-item"));

/// Show data embedded in every show page
#[derive(Debug, Deserialize)]
struct SyncData {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    mal_id: Option<Value>,
}

/// Response of the episode list endpoint
#[derive(Debug, Deserialize)]
struct EpisodeList {
    html: String,
}

#[derive(Debug)]
struct EpisodeEntry {
    number: String,
    id: String,
}

pub(crate) struct HiAnimeParser {
    support: ParserSupport,
}

impl HiAnimeParser {
    pub(crate) fn new(support: ParserSupport) -> Self {
        Self { support }
    }

    /// The numeric show id at the end of the show slug
    fn anime_id(&self, url: &str) -> Option<String> {
        let key = self.cache_key(url);
        let id = key.rsplit('-').next()?;
        (!id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())).then(|| id.to_string())
    }

    /// The page the site plays an episode on
    fn watch_url(&self, url: &str, episode_id: &str) -> String {
        let base = self.cache_key(url);
        match base.rsplit_once('/') {
            Some((prefix, slug)) => format!("{}/watch/{}?ep={}", prefix, slug, episode_id),
            None => base,
        }
    }

    fn update_from_show_page(&self, url: &str, details: &mut ShowRecord) -> Result<(), ScrapeError> {
        let (_, document) = self.support.fetch_document(url)?;
        let root = document.root_element();

        let script = require(root.select(&SYNC_DATA_SELECTOR).next(), SYNC_DATA, url)?;
        let raw: String = script.text().collect();
        let data: SyncData = serde_json::from_str(&raw).map_err(|e| ScrapeError::InvalidData {
            url: url.to_string(),
            reason: format!("embedded show data is not valid JSON: {}", e),
        })?;

        let title = nanohtml2text::html2text(data.name.as_deref().unwrap_or_default())
            .trim()
            .to_string();
        let mal_id = match data.mal_id {
            Some(Value::Number(number)) => number.as_u64(),
            Some(Value::String(text)) => text.trim().parse().ok(),
            _ => None,
        };

        details.myanimelist_url = myanimelist_url(&title, mal_id);
        details.title = title;
        details.mal_id = mal_id;

        if details.image.url.is_empty() {
            if let Some(src) = first_attr(root, &POSTER_SELECTOR, "src") {
                details.image = CoverImage {
                    url: src,
                    base64_data: String::new(),
                };
            }
        }
        Ok(())
    }

    fn fetch_episode_list(&self, url: &str, anime_id: &str) -> Result<Vec<EpisodeEntry>, ScrapeError> {
        let origin = Url::parse(url)
            .map_err(|e| ScrapeError::InvalidData {
                url: url.to_string(),
                reason: e.to_string(),
            })?
            .origin()
            .ascii_serialization();
        let list_url = format!("{}/ajax/v2/episode/list/{}", origin, anime_id);

        let body = self.support.fetch_text(&list_url)?;
        let list: EpisodeList = serde_json::from_str(&body).map_err(|e| ScrapeError::InvalidData {
            url: list_url.clone(),
            reason: format!("episode list is not valid JSON: {}", e),
        })?;

        let fragment = Html::parse_fragment(&list.html);
        Ok(fragment
            .select(&EPISODE_ITEM_SELECTOR)
            .filter_map(|item| {
                Some(EpisodeEntry {
                    number: item.value().attr("data-number")?.trim().to_string(),
                    id: item.value().attr("data-id")?.trim().to_string(),
                })
            })
            .collect())
    }

    fn update_from_episode_list(
        &self,
        url: &str,
        anime_id: &str,
        details: &mut ShowRecord,
    ) -> Result<(), ScrapeError> {
        let entries = self.fetch_episode_list(url, anime_id)?;

        let requested_number = DISPLAY_EPISODE.captures(url).map(|caps| caps[1].to_string());
        let requested_id = WATCH_EPISODE.captures(url).map(|caps| caps[1].to_string());

        let current = entries.iter().position(|entry| {
            requested_id.as_deref() == Some(entry.id.as_str())
                || requested_number.as_deref() == Some(entry.number.as_str())
        });

        let next = match current {
            Some(index) => {
                let entry = &entries[index];
                details.ep = entry.number.clone();
                details.current_ep_url = self.update_url_episode_number(url, &entry.number);
                details.current_url = self.watch_url(url, &entry.id);
                entries.get(index + 1)
            }
            // Nothing requested or the requested episode is not listed
            None => {
                details.ep = NOT_STARTED_EPISODE.to_string();
                details.current_ep_url = self.cache_key(url);
                details.current_url = details.current_ep_url.clone();
                entries.first()
            }
        };

        match next {
            Some(entry) => {
                details.next_ep_url = self.update_url_episode_number(url, &entry.number);
                details.next_url = self.watch_url(url, &entry.id);
            }
            None => {
                details.next_ep_url.clear();
                details.next_url.clear();
            }
        }
        Ok(())
    }
}

impl SiteParser for HiAnimeParser {
    fn name(&self) -> &'static str {
        "hianime"
    }

    fn support(&self) -> &ParserSupport {
        &self.support
    }

    fn cache_key(&self, url: &str) -> String {
        let key = WATCH_EPISODE.replace(url, "");
        DISPLAY_EPISODE.replace(&key, "").replace("/watch/", "/")
    }

    fn update_url_episode_number(&self, url: &str, ep: &str) -> String {
        let base = self.cache_key(url);
        if ep == NOT_STARTED_EPISODE {
            return base;
        }
        if !EPISODE_NUMBER.is_match(ep) {
            return url.to_string();
        }
        format!("{}?episode={}", base, ep)
    }

    fn resolve(&self, url: &str, mut details: ShowRecord) -> Result<ShowRecord, ScrapeError> {
        let anime_id = self.anime_id(url).ok_or_else(|| ScrapeError::UnsupportedUrl {
            parser: self.name(),
            url: url.to_string(),
        })?;

        details.ep = DISPLAY_EPISODE
            .captures(url)
            .map(|caps| caps[1].to_string())
            .unwrap_or_else(|| NOT_STARTED_EPISODE.to_string());

        if details.title.is_empty() || details.mal_id.is_none() || details.image.url.is_empty() {
            self.update_from_show_page(url, &mut details)?;
            details.loaded_from_cache = false;
        }

        if details.current_url.is_empty() || (!details.has_next() && !details.is_at_last_episode()) {
            self.update_from_episode_list(url, &anime_id, &mut details)?;
            details.loaded_from_cache = false;
        }

        Ok(details)
    }
}
