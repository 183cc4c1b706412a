//! Favicon resolution.
//!
//! Given an organization's website, find an icon by trying a chain of
//! strategies in order and stopping at the first hit:
//!
//! 1. [`ConventionalPaths`]: well-known paths such as `/favicon.ico` on the
//!    site origin.
//! 2. [`PageLinks`]: `<link rel="icon">` style declarations on the homepage.
//! 3. [`FaviconService`]: a favicon-by-domain web service.
//!
//! Resolution is best-effort. Every failure inside a strategy is logged and
//! swallowed, so the worst outcome for one organization is "no icon".
//!
//! ## Submodules
//!
//! - [`fetch`]: the [`Fetch`] trait and the blocking `reqwest` client
//! - [`html`]: `<link>` tag discovery with `scraper`
//! - [`sniff`]: magic-byte format detection and extension choice
//! - [`sources`]: the [`IconSource`] trait and the three strategies

pub mod fetch;
pub mod html;
pub mod sniff;
pub mod sources;

pub use fetch::{Fetch, FetchError, FetchResponse, HttpFetcher, Purpose};
pub use sources::{ConventionalPaths, FaviconService, IconSource, PageLinks};

use crate::config::FetchConfig;
use crate::types::normalize_website;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use url::Url;

/// Which strategy produced an icon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    ConventionalPath,
    PageLink,
    Service,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Strategy::ConventionalPath => "conventional path",
            Strategy::PageLink => "page link",
            Strategy::Service => "favicon service",
        })
    }
}

/// A website reduced to what the strategies need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    /// The website as given, normalized.
    pub url: Url,
    /// `scheme://host[:port]/`
    pub origin: Url,
    /// Host name without port, as passed to the favicon service.
    pub host: String,
}

impl Site {
    /// Parse a raw `Website` cell. Blank values, unparseable URLs and URLs
    /// without a host give `None`.
    pub fn parse(raw: &str) -> Option<Site> {
        if raw.trim().is_empty() {
            return None;
        }
        let url = Url::parse(&normalize_website(raw)).ok()?;
        let host = url.host_str().filter(|h| !h.is_empty())?.to_string();
        let mut origin = url.clone();
        origin.set_path("/");
        origin.set_query(None);
        origin.set_fragment(None);
        Some(Site { url, origin, host })
    }
}

/// A downloaded icon, not yet written anywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct Icon {
    pub bytes: Vec<u8>,
    /// Storage extension, without the dot.
    pub extension: &'static str,
    /// Final URL the bytes came from.
    pub source: Url,
    pub strategy: Strategy,
}

/// Ordered chain of icon sources.
pub struct Resolver {
    sources: Vec<Box<dyn IconSource>>,
}

impl Resolver {
    pub fn new(sources: Vec<Box<dyn IconSource>>) -> Self {
        Self { sources }
    }

    /// The standard three-strategy chain.
    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(vec![
            Box::new(ConventionalPaths::new(
                config.probe_paths.clone(),
                config.min_icon_bytes,
            )),
            Box::new(PageLinks::new(config.min_icon_bytes, config.max_page_icons)),
            Box::new(FaviconService::new(config.service_url.clone())),
        ])
    }

    pub fn strategies(&self) -> Vec<Strategy> {
        self.sources.iter().map(|s| s.strategy()).collect()
    }

    /// Try each source in order; the first icon wins.
    pub fn resolve(&self, site: &Site, fetcher: &dyn Fetch) -> Option<Icon> {
        for source in &self.sources {
            if let Some(icon) = source.find(site, fetcher) {
                debug!(host = %site.host, strategy = %icon.strategy, url = %icon.source, "icon found");
                return Some(icon);
            }
            debug!(host = %site.host, strategy = %source.strategy(), "strategy found nothing");
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::favicon::fetch::tests::MockFetcher;
    use crate::test_helpers::{html_payload, png_payload};

    fn resolver() -> Resolver {
        Resolver::from_config(&FetchConfig {
            probe_paths: vec!["/favicon.ico".into(), "/favicon.png".into()],
            service_url: "https://icons.test/?domain={domain}".into(),
            ..FetchConfig::default()
        })
    }

    // =========================================================================
    // Site parsing
    // =========================================================================

    #[test]
    fn site_adds_scheme_and_derives_origin() {
        let site = Site::parse("www.example.org/about/us?x=1").unwrap();
        assert_eq!(site.url.as_str(), "https://www.example.org/about/us?x=1");
        assert_eq!(site.origin.as_str(), "https://www.example.org/");
        assert_eq!(site.host, "www.example.org");
    }

    #[test]
    fn site_keeps_http_and_port() {
        let site = Site::parse("http://localhost:8080/x").unwrap();
        assert_eq!(site.origin.as_str(), "http://localhost:8080/");
        assert_eq!(site.host, "localhost");
    }

    #[test]
    fn site_rejects_blank_and_hostless() {
        assert!(Site::parse("").is_none());
        assert!(Site::parse("   ").is_none());
        assert!(Site::parse("https://").is_none());
    }

    // =========================================================================
    // Strategy chain
    // =========================================================================

    #[test]
    fn default_chain_order() {
        assert_eq!(
            resolver().strategies(),
            vec![
                Strategy::ConventionalPath,
                Strategy::PageLink,
                Strategy::Service
            ]
        );
    }

    #[test]
    fn first_strategy_short_circuits() {
        let mock = MockFetcher::new().icon("https://example.org/favicon.ico", &png_payload(200));
        let site = Site::parse("example.org").unwrap();
        let icon = resolver().resolve(&site, &mock).unwrap();
        assert_eq!(icon.strategy, Strategy::ConventionalPath);
        assert_eq!(mock.request_count(), 1);
    }

    #[test]
    fn falls_through_to_page_links() {
        let mock = MockFetcher::new()
            .reply(
                "https://example.org/favicon.ico",
                200,
                Some("text/html"),
                &html_payload(500),
            )
            .page(
                "https://example.org/",
                r#"<link rel="shortcut icon" href="/brand/icon.png">"#,
            )
            .icon("https://example.org/brand/icon.png", &png_payload(300));
        let site = Site::parse("https://example.org").unwrap();
        let icon = resolver().resolve(&site, &mock).unwrap();
        assert_eq!(icon.strategy, Strategy::PageLink);
        assert!(!mock.contacted_host("icons.test"));
    }

    #[test]
    fn falls_through_to_service() {
        let mock = MockFetcher::new()
            .fail("https://example.org/")
            .icon("https://icons.test/?domain=example.org", &png_payload(120));
        let site = Site::parse("example.org").unwrap();
        let icon = resolver().resolve(&site, &mock).unwrap();
        assert_eq!(icon.strategy, Strategy::Service);
        assert_eq!(
            mock.requested_urls(),
            vec![
                "https://example.org/favicon.ico",
                "https://example.org/favicon.png",
                "https://example.org/",
                "https://icons.test/?domain=example.org",
            ]
        );
    }

    #[test]
    fn nothing_found_is_none() {
        let mock = MockFetcher::new();
        let site = Site::parse("example.org").unwrap();
        assert!(resolver().resolve(&site, &mock).is_none());
    }

    #[test]
    fn strategy_serializes_kebab_case() {
        let json = serde_json::to_string(&Strategy::ConventionalPath).unwrap();
        assert_eq!(json, "\"conventional-path\"");
        assert_eq!(Strategy::Service.to_string(), "favicon service");
    }
}
