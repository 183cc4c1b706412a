//! HTTP access behind a trait.
//!
//! Every strategy talks to the network through [`Fetch`], so the resolver
//! can be exercised with a recording mock and never opens a socket in tests.
//! The production implementation is [`HttpFetcher`], a blocking `reqwest`
//! client with per-request timeouts and capped body sizes.

use crate::config::FetchConfig;
use reqwest::blocking::Client;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::io::Read;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Upper bound on a downloaded icon. Anything bigger is truncated and will
/// fail format detection.
pub const MAX_ICON_BYTES: u64 = 2 * 1024 * 1024;

/// Redirect hops followed before a request is abandoned.
pub const MAX_REDIRECTS: usize = 5;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP client setup failed: {0}")]
    Client(String),
    #[error("Request to {url} failed: {message}")]
    Request { url: String, message: String },
    #[error("Reading body of {url} failed: {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

/// What a request is for; selects its timeout and body limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Icon,
    Page,
}

/// A completed HTTP exchange, whatever its status.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    /// Lowercased `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// Final URL after redirects.
    pub url: Url,
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal HTTP GET capability.
///
/// `Sync` so one fetcher can be shared by every worker in the pool.
pub trait Fetch: Sync {
    /// Issue a GET. Non-2xx statuses are returned as responses; only
    /// transport failures (DNS, TLS, timeout, reset) are errors.
    fn get(&self, url: &Url, purpose: Purpose) -> Result<FetchResponse, FetchError>;
}

/// Blocking `reqwest` implementation of [`Fetch`].
pub struct HttpFetcher {
    client: Client,
    icon_timeout: Duration,
    page_timeout: Duration,
    max_page_bytes: u64,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("image/*,text/html,*/*;q=0.8"),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        let icon_timeout = Duration::from_secs(config.icon_timeout_secs);
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .connect_timeout(icon_timeout)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            icon_timeout,
            page_timeout: Duration::from_secs(config.page_timeout_secs),
            max_page_bytes: config.max_page_bytes as u64,
        })
    }
}

impl Fetch for HttpFetcher {
    fn get(&self, url: &Url, purpose: Purpose) -> Result<FetchResponse, FetchError> {
        let (timeout, limit) = match purpose {
            Purpose::Icon => (self.icon_timeout, MAX_ICON_BYTES),
            Purpose::Page => (self.page_timeout, self.max_page_bytes),
        };

        let response = self
            .client
            .get(url.as_str())
            .timeout(timeout)
            .send()
            .map_err(|e| FetchError::Request {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase());
        let final_url = response.url().clone();

        let mut body = Vec::new();
        response
            .take(limit)
            .read_to_end(&mut body)
            .map_err(|source| FetchError::Body {
                url: url.to_string(),
                source,
            })?;

        Ok(FetchResponse {
            status,
            content_type,
            url: final_url,
            body,
        })
    }
}
