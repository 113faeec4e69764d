//! Parser for the Anitaku family of sites (formerly Gogoanime)
//!
//! Shows have a category page `/category/<show>` and one page per episode
//! `/<show>-episode-<n>`, where `<n>` may be a dashed fractional episode such
//! as `12-5`. The category page is used for shows the user has not started.

use super::support::{ParserSupport, first_attr, first_text, myanimelist_url, require, selector};
use super::{ScrapeError, SiteParser};
use crate::show::{CoverImage, NOT_STARTED_EPISODE, ShowRecord, ShowStatus};
use regex::Regex;
use scraper::Selector;
use std::sync::LazyLock;
use url::Url;

static CATEGORY_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://[^/]+/(category/)").expect("valid category pattern"));
static EPISODE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://[^/]+/.+-episode-(\d+(?:-\d+)?)$").expect("valid episode pattern")
});
static EPISODE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-episode-\d+(?:-\d+)?").expect("valid suffix pattern"));
static EPISODE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(?:-\d+)?$").expect("valid number pattern"));

const EPISODE_TITLE: &str = "div.anime-info a";
const CATEGORY_TITLE: &str = "div.anime_info_body_bg h1";
const COVER: &str = "[itemprop=image]";
const NEXT_EPISODE_BOX: &str = "div.anime_video_body_episodes_r";
const EPISODE_RANGE: &str = "div.anime_video_body a";

static EPISODE_TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector(EPISODE_TITLE));
static CATEGORY_TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector(CATEGORY_TITLE));
static COVER_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector(COVER));
static NEXT_EPISODE_BOX_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector(NEXT_EPISODE_BOX));
static EPISODE_RANGE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector(EPISODE_RANGE));
static ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector("a"));

enum PageKind {
    Category,
    Episode,
}

pub(crate) struct AnitakuParser {
    support: ParserSupport,
}

impl AnitakuParser {
    pub(crate) fn new(support: ParserSupport) -> Self {
        Self { support }
    }

    /// Whether the cached record lacks anything only a page fetch provides
    fn needs_fetch(details: &ShowRecord) -> bool {
        details.title.is_empty()
            || details.current_ep_url.is_empty()
            || details.next_ep_url.is_empty()
            || details.myanimelist_url.is_empty()
            || details.image.url.is_empty()
    }

    fn update_from_episode_page(&self, url: &str, details: &mut ShowRecord) -> Result<(), ScrapeError> {
        let (final_url, document) = self.support.fetch_document(url)?;
        let root = document.root_element();

        let title = require(first_text(root, &EPISODE_TITLE_SELECTOR), EPISODE_TITLE, url)?;
        let cover = require(first_attr(root, &COVER_SELECTOR, "content"), COVER, url)?;
        let next_box = require(root.select(&NEXT_EPISODE_BOX_SELECTOR).next(), NEXT_EPISODE_BOX, url)?;

        // The last episode has no link in the box
        let next_ep_url = match first_attr(next_box, &ANCHOR_SELECTOR, "href") {
            Some(href) => join(&final_url, &href)?,
            None => String::new(),
        };

        if details.myanimelist_url.is_empty() {
            details.myanimelist_url = myanimelist_url(&title, details.mal_id);
        }
        details.title = title;
        details.current_ep_url = final_url.clone();
        details.current_url = final_url;
        details.next_url = next_ep_url.clone();
        details.next_ep_url = next_ep_url;
        set_cover(details, cover);
        Ok(())
    }

    fn update_from_category_page(&self, url: &str, details: &mut ShowRecord) -> Result<(), ScrapeError> {
        let (_, document) = self.support.fetch_document(url)?;
        let root = document.root_element();

        let title = require(first_text(root, &CATEGORY_TITLE_SELECTOR), CATEGORY_TITLE, url)?;
        let cover = require(first_attr(root, &COVER_SELECTOR, "content"), COVER, url)?;
        let ep_end = require(first_attr(root, &EPISODE_RANGE_SELECTOR, "ep_end"), EPISODE_RANGE, url)?;
        let released: f64 = ep_end.parse().map_err(|_| ScrapeError::InvalidData {
            url: url.to_string(),
            reason: format!("episode count '{}' is not a number", ep_end),
        })?;

        let next_ep_url = if released > 0.0 {
            details.status = ShowStatus::Ongoing;
            self.update_url_episode_number(url, "1")
        } else {
            details.status = ShowStatus::NotAired;
            String::new()
        };

        if details.myanimelist_url.is_empty() {
            details.myanimelist_url = myanimelist_url(&title, details.mal_id);
        }
        details.title = title;
        details.current_ep_url = url.to_string();
        details.current_url = url.to_string();
        details.next_url = next_ep_url.clone();
        details.next_ep_url = next_ep_url;
        set_cover(details, cover);
        Ok(())
    }
}

impl SiteParser for AnitakuParser {
    fn name(&self) -> &'static str {
        "anitaku"
    }

    fn support(&self) -> &ParserSupport {
        &self.support
    }

    fn cache_key(&self, url: &str) -> String {
        EPISODE_SUFFIX.replace_all(url, "").into_owned()
    }

    fn update_url_episode_number(&self, url: &str, ep: &str) -> String {
        if !EPISODE_NUMBER.is_match(ep) {
            return url.to_string();
        }

        if let Some(number) = EPISODE_URL.captures(url).and_then(|caps| caps.get(1)) {
            if ep == NOT_STARTED_EPISODE {
                let stem = &url[..number.start() - "-episode-".len()];
                return match stem.rsplit_once('/') {
                    Some((dir, show)) => format!("{}/category/{}", dir, show),
                    None => url.to_string(),
                };
            }
            return format!("{}{}{}", &url[..number.start()], ep, &url[number.end()..]);
        }

        if let Some(marker) = CATEGORY_URL.captures(url).and_then(|caps| caps.get(1)) {
            if ep == NOT_STARTED_EPISODE {
                return url.to_string();
            }
            return format!(
                "{}{}-episode-{}",
                &url[..marker.start()],
                &url[marker.end()..],
                ep
            );
        }

        url.to_string()
    }

    fn resolve(&self, url: &str, mut details: ShowRecord) -> Result<ShowRecord, ScrapeError> {
        let kind = if CATEGORY_URL.is_match(url) {
            details.ep = NOT_STARTED_EPISODE.to_string();
            PageKind::Category
        } else if let Some(caps) = EPISODE_URL.captures(url) {
            details.ep = caps[1].to_string();
            PageKind::Episode
        } else {
            return Err(ScrapeError::UnsupportedUrl {
                parser: self.name(),
                url: url.to_string(),
            });
        };

        if details.is_at_last_episode() {
            details.status = ShowStatus::Finished;
            return Ok(details);
        }

        if Self::needs_fetch(&details) {
            match kind {
                PageKind::Category => self.update_from_category_page(url, &mut details)?,
                PageKind::Episode => self.update_from_episode_page(url, &mut details)?,
            }
            details.loaded_from_cache = false;
        }

        Ok(details)
    }
}

/// Resolves a link found on a page against the page's final URL
fn join(base: &str, href: &str) -> Result<String, ScrapeError> {
    Url::parse(base)
        .and_then(|base| base.join(href))
        .map(|joined| joined.to_string())
        .map_err(|e| ScrapeError::InvalidData {
            url: base.to_string(),
            reason: format!("cannot resolve link '{}': {}", href, e),
        })
}

/// Records a cover URL, dropping the cached image data when it changed
fn set_cover(details: &mut ShowRecord, cover: String) {
    if details.image.url != cover {
        details.image = CoverImage {
            url: cover,
            base64_data: String::new(),
        };
    }
}
