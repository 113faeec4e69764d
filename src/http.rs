//! HTTP fetching
//!
//! Every network access of the crate goes through the `Fetcher` trait so the
//! parsers can be exercised against canned pages in tests. The production
//! implementation is a blocking reqwest client with a browser User-Agent and
//! a per-request timeout.

use std::time::Duration;
use thiserror::Error;

/// User-Agent sent with every request; several sites reject unknown agents
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:128.0) Gecko/20100101 Firefox/128.0";

/// Errors that can occur while fetching a page or a binary payload
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP client could not be constructed
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    /// The request could not be sent or the connection failed
    #[error("Request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// The request did not complete within the configured timeout
    #[error("Request to {url} timed out")]
    TimedOut { url: String },

    /// The server answered with a non-success status code
    #[error("Request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The response body could not be read
    #[error("Failed to read response body from {url}: {reason}")]
    Body { url: String, reason: String },
}

/// A fetched text page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// The final URL after following redirects
    pub url: String,
    /// The response body
    pub body: String,
}

/// Source of web pages and binary payloads
pub trait Fetcher: Send + Sync {
    /// Fetches a text page, following redirects
    fn fetch_page(&self, url: &str) -> Result<FetchedPage, FetchError>;

    /// Fetches a binary payload such as a cover image
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// Fetcher backed by a blocking reqwest client
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Creates a fetcher whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::ClientBuild(e.to_string()))?;

        Ok(Self { client })
    }

    fn send(&self, url: &str) -> Result<reqwest::blocking::Response, FetchError> {
        let response = self.client.get(url).send().map_err(|e| {
            if e.is_timeout() {
                FetchError::TimedOut {
                    url: url.to_string(),
                }
            } else {
                FetchError::Request {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        // Ensure request was successful
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response)
    }
}

impl Fetcher for HttpFetcher {
    fn fetch_page(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self.send(url)?;
        let final_url = response.url().to_string();

        let body = response.text().map_err(|e| FetchError::Body {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(FetchedPage {
            url: final_url,
            body,
        })
    }

    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let response = self.send(url)?;

        let bytes = response.bytes().map_err(|e| FetchError::Body {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(bytes.to_vec())
    }
}
