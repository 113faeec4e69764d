//! Host based parser selection

use super::animeheaven::AnimeHeavenParser;
use super::anitaku::AnitakuParser;
use super::generic::GenericParser;
use super::hianime::HiAnimeParser;
use super::support::ParserSupport;
use super::SiteParser;
use crate::http::Fetcher;
use std::sync::Arc;
use url::Url;

/// Known site names, matched against every label of a URL's host
///
/// Matching is by prefix so mirrors like `gogoanime3.co` or regional
/// domains like `hianime.nz` route to the same parser.
const ANITAKU_SITES: &[&str] = &["gogoanimes", "gogoanime", "anitaku"];
const HIANIME_SITES: &[&str] = &["hianime"];
const ANIMEHEAVEN_SITES: &[&str] = &["animeheaven"];

/// Routes URLs to the parser of their site
pub(crate) struct ParserRouter {
    anitaku: AnitakuParser,
    hianime: HiAnimeParser,
    animeheaven: AnimeHeavenParser,
    generic: GenericParser,
}

impl ParserRouter {
    pub(crate) fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        let support = ParserSupport::new(fetcher);
        Self {
            anitaku: AnitakuParser::new(support.clone()),
            hianime: HiAnimeParser::new(support.clone()),
            animeheaven: AnimeHeavenParser::new(support.clone()),
            generic: GenericParser::new(support),
        }
    }

    /// The parser responsible for `url`; unknown sites get the generic one
    pub(crate) fn parser_for(&self, url: &str) -> &dyn SiteParser {
        let labels = site_labels(url);
        let known = |sites: &[&str]| {
            labels
                .iter()
                .any(|label| sites.iter().any(|site| label.starts_with(site)))
        };

        if known(ANITAKU_SITES) {
            &self.anitaku
        } else if known(HIANIME_SITES) {
            &self.hianime
        } else if known(ANIMEHEAVEN_SITES) {
            &self.animeheaven
        } else {
            &self.generic
        }
    }
}

/// Labels of the URL's host below the top-level domain, lowercased
fn site_labels(url: &str) -> Vec<String> {
    let Some(host) = Url::parse(url.trim())
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_lowercase))
    else {
        return Vec::new();
    };

    let mut labels: Vec<String> = host.split('.').map(str::to_string).collect();
    if labels.len() > 1 {
        labels.pop();
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::StubFetcher;

    fn router() -> ParserRouter {
        ParserRouter::new(Arc::new(StubFetcher::new()))
    }

    #[test]
    fn test_routes_known_sites_and_mirrors() {
        let router = router();
        let cases = [
            ("https://anitaku.pe/show-episode-1", "anitaku"),
            ("https://gogoanime3.co/show-episode-1", "anitaku"),
            ("https://www.gogoanimes.fi/category/show", "anitaku"),
            ("https://hianime.to/frieren-18542", "hianime"),
            ("https://HiAnime.nz/frieren-18542", "hianime"),
            ("https://animeheaven.me/anime.php?x7k2p", "animeheaven"),
            ("https://example.org/show-episode-1", "generic"),
            ("not a url", "generic"),
        ];

        for (url, expected) in cases {
            assert_eq!(router.parser_for(url).name(), expected, "{}", url);
        }
    }

    #[test]
    fn test_subdomains_route_to_their_site() {
        let router = router();
        assert_eq!(router.parser_for("https://m.anitaku.pe/show-episode-1").name(), "anitaku");
        assert_eq!(router.parser_for("https://www1.hianime.to/frieren-18542").name(), "hianime");
        assert_eq!(router.parser_for("https://cdn.example.org/anitaku").name(), "generic");
    }
}
