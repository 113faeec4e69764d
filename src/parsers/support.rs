//! Helpers shared by the site parsers

use super::ScrapeError;
use crate::http::Fetcher;
use crate::show::placeholder_base64;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tracing::debug;

/// Fetching and image helpers composed into every parser
#[derive(Clone)]
pub(crate) struct ParserSupport {
    fetcher: Arc<dyn Fetcher>,
}

impl ParserSupport {
    pub(crate) fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Fetches a page and parses it, returning the final URL with the document
    pub(crate) fn fetch_document(&self, url: &str) -> Result<(String, Html), ScrapeError> {
        let page = self.fetcher.fetch_page(url)?;
        Ok((page.url, Html::parse_document(&page.body)))
    }

    /// Fetches a page body without parsing it
    pub(crate) fn fetch_text(&self, url: &str) -> Result<String, ScrapeError> {
        Ok(self.fetcher.fetch_page(url)?.body)
    }

    /// Downloads a cover and returns it base64 encoded
    ///
    /// Falls back to the bundled placeholder when there is no URL, the
    /// download fails or the payload is not an image (sites like to answer
    /// with an HTML error page).
    pub(crate) fn image_base64(&self, url: &str) -> String {
        if url.is_empty() {
            return placeholder_base64();
        }

        match self.fetcher.fetch_bytes(url) {
            Ok(bytes) if infer::is_image(&bytes) => BASE64.encode(bytes),
            Ok(_) => {
                debug!(url, "cover is not an image, using placeholder");
                placeholder_base64()
            }
            Err(err) => {
                debug!(url, error = %err, "cover download failed, using placeholder");
                placeholder_base64()
            }
        }
    }
}

/// Builds the MyAnimeList URL for a show
///
/// With a known MyAnimeList id the stable anime page is used, otherwise a
/// search for the title.
pub(crate) fn myanimelist_url(title: &str, mal_id: Option<u64>) -> String {
    match mal_id {
        Some(id) => format!("https://myanimelist.net/anime/{}", id),
        None => format!(
            "https://myanimelist.net/search/all?q={}&cat=anime#anime",
            title.split(' ').collect::<Vec<_>>().join("%20")
        ),
    }
}

/// Parses a selector known at compile time
pub(crate) fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector must be valid")
}

/// Text content of the first element matching `selector`, trimmed
pub(crate) fn first_text(root: ElementRef<'_>, selector: &Selector) -> Option<String> {
    root.select(selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
}

/// Attribute value of the first element matching `selector`, trimmed
pub(crate) fn first_attr(root: ElementRef<'_>, selector: &Selector, attr: &str) -> Option<String> {
    root.select(selector)
        .next()
        .and_then(|element| element.value().attr(attr))
        .map(|value| value.trim().to_string())
}

/// Turns a missing element into a scrape error naming the selector
pub(crate) fn require<T>(value: Option<T>, selector: &'static str, url: &str) -> Result<T, ScrapeError> {
    value.ok_or_else(|| ScrapeError::MissingElement {
        selector,
        url: url.to_string(),
    })
}
