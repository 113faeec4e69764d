//! Parser for AnimeHeaven
//!
//! Shows are tracked as `anime.php?<id>&episode=<n>`. Links copied from the
//! player page have the form `episode.php?<id>`; those are resolved to the
//! show page through the page heading first.

use super::support::{ParserSupport, first_attr, first_text, myanimelist_url, require, selector};
use super::{ScrapeError, SiteParser};
use crate::show::{CoverImage, NOT_STARTED_EPISODE, ShowRecord, ShowStatus};
use regex::Regex;
use scraper::Selector;
use std::sync::LazyLock;
use url::Url;

static EPISODE_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&episode=(\d+(?:\.\d+)?)$").expect("valid episode pattern"));
static HEADING_EPISODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" Episode (\d+(?:\.\d+)?)$").expect("valid heading pattern"));
static EPISODE_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(?:\.\d+)?$").expect("valid number pattern"));

const SHOW_PAGE: &str = "anime.php";
const PLAYER_PAGE: &str = "episode.php";

const HEADING: &str = "h1";
const HEADING_LINK: &str = "h1 a";
const TITLE: &str = "div.infotitle.c";
const POSTER: &str = "img.posterimg";
const EPISODE_LABEL: &str = r#"div[class^="watch2 bc"]"#;

static HEADING_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector(HEADING));
static HEADING_LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector(HEADING_LINK));
static TITLE_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector(TITLE));
static POSTER_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector(POSTER));
static EPISODE_LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector("a.ac3"));
static EPISODE_LABEL_SELECTOR: LazyLock<Selector> = LazyLock::new(|| selector(EPISODE_LABEL));

pub(crate) struct AnimeHeavenParser {
    support: ParserSupport,
}

impl AnimeHeavenParser {
    pub(crate) fn new(support: ParserSupport) -> Self {
        Self { support }
    }

    fn episode_from_url(url: &str) -> String {
        EPISODE_PARAM
            .captures(url)
            .map(|caps| caps[1].to_string())
            .unwrap_or_else(|| NOT_STARTED_EPISODE.to_string())
    }

    fn needs_fetch(details: &ShowRecord) -> bool {
        !details.is_at_last_episode()
            && (details.title.is_empty()
                || details.current_url.is_empty()
                || details.next_ep_url.is_empty()
                || details.myanimelist_url.is_empty()
                || details.image.url.is_empty())
    }

    /// Finds the show page of `url` together with the episode it points at
    fn show_page(&self, url: &str) -> Result<(String, String), ScrapeError> {
        let ep = Self::episode_from_url(url);
        if url.contains(SHOW_PAGE) {
            return Ok((ep, EPISODE_PARAM.replace(url, "").into_owned()));
        }

        let (final_url, document) = self.support.fetch_document(url)?;
        let root = document.root_element();

        let href = require(first_attr(root, &HEADING_LINK_SELECTOR, "href"), HEADING_LINK, url)?;
        let heading = require(first_text(root, &HEADING_SELECTOR), HEADING, url)?;
        let ep = HEADING_EPISODE
            .captures(&heading)
            .map(|caps| caps[1].to_string())
            .unwrap_or(ep);

        Ok((ep, join(&final_url, &href)?))
    }

    fn update_from_show_page(&self, ep: String, main_url: &str, details: &mut ShowRecord) -> Result<(), ScrapeError> {
        let (final_url, document) = self.support.fetch_document(main_url)?;
        let root = document.root_element();

        details.current_ep_url = format!("{}&episode={}", main_url, ep);
        details.current_url = details.current_ep_url.clone();

        // Episodes are listed newest first, so the entry right before the
        // current one is the next episode
        let mut found = false;
        for link in root.select(&EPISODE_LINK_SELECTOR) {
            let Some(label) = first_text(link, &EPISODE_LABEL_SELECTOR) else {
                continue;
            };
            if label.contains("raw") {
                continue;
            }
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let link_url = join(&final_url, href.trim())?;

            if label == ep {
                details.current_url = link_url;
                found = true;
                break;
            }
            details.next_url = link_url;
            details.next_ep_url = format!("{}&episode={}", main_url, label);
        }

        if !found && ep != NOT_STARTED_EPISODE {
            details.status = ShowStatus::NotAired;
            details.current_url.clear();
            details.next_url.clear();
            details.next_ep_url.clear();
        }

        let title = require(first_text(root, &TITLE_SELECTOR), TITLE, main_url)?;
        if details.myanimelist_url.is_empty() {
            details.myanimelist_url = myanimelist_url(&title, details.mal_id);
        }
        details.title = title;

        if let Some(src) = first_attr(root, &POSTER_SELECTOR, "src") {
            let cover = join(&final_url, &src)?;
            if details.image.url != cover {
                details.image = CoverImage {
                    url: cover,
                    base64_data: String::new(),
                };
            }
        }

        details.ep = ep;
        Ok(())
    }
}

impl SiteParser for AnimeHeavenParser {
    fn name(&self) -> &'static str {
        "animeheaven"
    }

    fn support(&self) -> &ParserSupport {
        &self.support
    }

    fn cache_key(&self, url: &str) -> String {
        if url.contains(SHOW_PAGE) {
            EPISODE_PARAM.replace(url, "").into_owned()
        } else {
            String::new()
        }
    }

    fn update_url_episode_number(&self, url: &str, ep: &str) -> String {
        if !url.contains(SHOW_PAGE) || !EPISODE_NUMBER.is_match(ep) {
            return url.to_string();
        }
        format!("{}&episode={}", EPISODE_PARAM.replace(url, ""), ep)
    }

    fn resolve(&self, url: &str, mut details: ShowRecord) -> Result<ShowRecord, ScrapeError> {
        if !url.contains(SHOW_PAGE) && !url.contains(PLAYER_PAGE) {
            return Err(ScrapeError::UnsupportedUrl {
                parser: self.name(),
                url: url.to_string(),
            });
        }

        details.ep = Self::episode_from_url(url);
        if details.is_at_last_episode() {
            details.status = ShowStatus::Finished;
        }

        if Self::needs_fetch(&details) {
            let (ep, main_url) = self.show_page(url)?;
            self.update_from_show_page(ep, &main_url, &mut details)?;
            details.loaded_from_cache = false;
        }

        Ok(details)
    }
}

fn join(base: &str, href: &str) -> Result<String, ScrapeError> {
    Url::parse(base)
        .and_then(|base| base.join(href))
        .map(|joined| joined.to_string())
        .map_err(|e| ScrapeError::InvalidData {
            url: base.to_string(),
            reason: format!("cannot resolve link '{}': {}", href, e),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::StubFetcher;
    use crate::show_cache::preliminary_record;
    use std::sync::Arc;

    const MAIN_URL: &str = "https://animeheaven.me/anime.php?x7k2p";

    const MAIN_PAGE: &str = r#"
        <html><body>
          <img class="posterimg" src="image.php?x7k2p">
          <div class="infotitle c">Kaiju No. 8</div>
          <a class="ac3" href="episode.php?e14"><div class="watch2 bc">4</div></a>
          <a class="ac3" href="episode.php?r13"><div class="watch2 bc c">3 raw</div></a>
          <a class="ac3" href="episode.php?e13"><div class="watch2 bc">3</div></a>
          <a class="ac3" href="episode.php?e12"><div class="watch2 bc">2</div></a>
          <a class="ac3" href="episode.php?e11"><div class="watch2 bc">1</div></a>
        </body></html>"#;

    const PLAYER_PAGE_HTML: &str = r#"
        <html><body>
          <h1><a href="anime.php?x7k2p">Kaiju No. 8</a> Episode 2</h1>
        </body></html>"#;

    fn parser_with(stub: StubFetcher) -> (AnimeHeavenParser, Arc<StubFetcher>) {
        let stub = Arc::new(stub);
        (AnimeHeavenParser::new(ParserSupport::new(stub.clone())), stub)
    }

    #[test]
    fn test_cache_key() {
        let (parser, _) = parser_with(StubFetcher::new());
        assert_eq!(parser.cache_key("https://animeheaven.me/anime.php?x7k2p&episode=3"), MAIN_URL);
        assert_eq!(parser.cache_key(MAIN_URL), MAIN_URL);
        assert_eq!(parser.cache_key("https://animeheaven.me/episode.php?e13"), "");
    }

    #[test]
    fn test_update_url_episode_number() {
        let (parser, _) = parser_with(StubFetcher::new());
        assert_eq!(
            parser.update_url_episode_number("https://animeheaven.me/anime.php?x7k2p&episode=3", "7"),
            "https://animeheaven.me/anime.php?x7k2p&episode=7"
        );
        assert_eq!(
            parser.update_url_episode_number(MAIN_URL, "1"),
            "https://animeheaven.me/anime.php?x7k2p&episode=1"
        );
        let player = "https://animeheaven.me/episode.php?e13";
        assert_eq!(parser.update_url_episode_number(player, "5"), player);
    }

    #[test]
    fn test_show_page_resolves_current_and_next() {
        let url = "https://animeheaven.me/anime.php?x7k2p&episode=2";
        let (parser, _) = parser_with(StubFetcher::new().with_page(MAIN_URL, MAIN_PAGE));

        let record = parser.extend_details(url, preliminary_record(url, None));

        assert_eq!(record.title, "Kaiju No. 8");
        assert_eq!(record.ep, "2");
        assert_eq!(record.current_ep_url, url);
        assert_eq!(record.current_url, "https://animeheaven.me/episode.php?e12");
        assert_eq!(record.next_ep_url, "https://animeheaven.me/anime.php?x7k2p&episode=3");
        assert_eq!(record.next_url, "https://animeheaven.me/episode.php?e13");
        assert_eq!(record.image.url, "https://animeheaven.me/image.php?x7k2p");
        assert_eq!(record.status, ShowStatus::Ongoing);
        assert_eq!(record.weight, 1);
    }

    #[test]
    fn test_player_link_resolves_through_heading() {
        let url = "https://animeheaven.me/episode.php?e12";
        let (parser, _) = parser_with(
            StubFetcher::new()
                .with_page(url, PLAYER_PAGE_HTML)
                .with_page(MAIN_URL, MAIN_PAGE),
        );

        let record = parser.extend_details(url, preliminary_record(url, None));

        assert_eq!(record.ep, "2");
        assert_eq!(record.current_ep_url, "https://animeheaven.me/anime.php?x7k2p&episode=2");
        assert_eq!(record.next_ep_url, "https://animeheaven.me/anime.php?x7k2p&episode=3");
    }

    #[test]
    fn test_unreleased_episode_is_not_aired() {
        let url = "https://animeheaven.me/anime.php?x7k2p&episode=5";
        let (parser, _) = parser_with(StubFetcher::new().with_page(MAIN_URL, MAIN_PAGE));

        let record = parser.extend_details(url, preliminary_record(url, None));

        assert_eq!(record.status, ShowStatus::NotAired);
        assert!(record.next_ep_url.is_empty());
        assert_eq!(record.current_url, record.current_ep_url);
    }

    #[test]
    fn test_unstarted_show_has_oldest_episode_as_next() {
        let url = MAIN_URL;
        let (parser, _) = parser_with(StubFetcher::new().with_page(MAIN_URL, MAIN_PAGE));

        let record = parser.extend_details(url, preliminary_record(url, None));

        assert_eq!(record.ep, "0");
        assert_eq!(record.next_ep_url, "https://animeheaven.me/anime.php?x7k2p&episode=1");
        assert_eq!(record.status, ShowStatus::Ongoing);
    }

    #[test]
    fn test_last_episode_is_not_fetched() {
        let url = "https://animeheaven.me/anime.php?x7k2p&episode=12";
        let (parser, stub) = parser_with(StubFetcher::new());
        let mut details = preliminary_record(url, None);
        details.episodes = Some("12".to_string());
        details.image.base64_data = "AAAA".to_string();

        let record = parser.extend_details(url, details);

        assert_eq!(record.status, ShowStatus::Finished);
        assert_eq!(stub.request_count(), 0);
    }

    #[test]
    fn test_other_pages_are_unsupported() {
        let url = "https://animeheaven.me/search.php?s=kaiju";
        let (parser, _) = parser_with(StubFetcher::new());

        let record = parser.extend_details(url, preliminary_record(url, None));
        assert_eq!(record.status, ShowStatus::UnsupportedUrl);
    }
}
