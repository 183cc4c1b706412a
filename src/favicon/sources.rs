//! The three icon strategies.
//!
//! Each implements [`IconSource`]: given a site, return an icon or `None`.
//! A source never errors. Transport failures, bad statuses and unusable
//! payloads are logged at `debug` and turn into "try the next candidate".

use super::fetch::{Fetch, Purpose};
use super::html::icon_links;
use super::sniff::{icon_extension, is_image_like};
use super::{Icon, Site, Strategy};
use tracing::debug;
use url::Url;

/// One way of finding a site's icon.
pub trait IconSource: Send + Sync {
    fn strategy(&self) -> Strategy;

    /// Attempt resolution. `None` means "not found by this strategy".
    fn find(&self, site: &Site, fetcher: &dyn Fetch) -> Option<Icon>;
}

/// What a downloaded candidate must satisfy to be accepted.
#[derive(Debug, Clone, Copy)]
struct Acceptance {
    min_bytes: usize,
    require_image: bool,
}

/// Download one candidate URL and apply the acceptance policy.
fn download(
    fetcher: &dyn Fetch,
    url: &Url,
    strategy: Strategy,
    accept: Acceptance,
) -> Option<Icon> {
    let response = match fetcher.get(url, Purpose::Icon) {
        Ok(r) => r,
        Err(e) => {
            debug!(%url, error = %e, "icon request failed");
            return None;
        }
    };
    if !response.is_success() {
        debug!(%url, status = response.status, "icon request returned error status");
        return None;
    }
    let body_len = response.body.len();
    if body_len == 0 || body_len < accept.min_bytes {
        debug!(%url, bytes = body_len, "icon payload too small");
        return None;
    }
    let content_type = response.content_type.as_deref();
    if accept.require_image && !is_image_like(&response.body, content_type) {
        debug!(%url, content_type, "payload is not an image");
        return None;
    }
    let extension = icon_extension(&response.body, content_type, &response.url);
    Some(Icon {
        bytes: response.body,
        extension,
        source: response.url,
        strategy,
    })
}

// ============================================================================
// Conventional paths
// ============================================================================

/// Probes well-known icon locations on the site origin.
pub struct ConventionalPaths {
    paths: Vec<String>,
    min_bytes: usize,
}

impl ConventionalPaths {
    pub fn new(paths: Vec<String>, min_bytes: usize) -> Self {
        Self { paths, min_bytes }
    }
}

impl IconSource for ConventionalPaths {
    fn strategy(&self) -> Strategy {
        Strategy::ConventionalPath
    }

    fn find(&self, site: &Site, fetcher: &dyn Fetch) -> Option<Icon> {
        let accept = Acceptance {
            min_bytes: self.min_bytes,
            require_image: true,
        };
        self.paths
            .iter()
            .filter_map(|path| site.origin.join(path).ok())
            .find_map(|url| download(fetcher, &url, self.strategy(), accept))
    }
}

// ============================================================================
// Homepage <link> tags
// ============================================================================

/// Reads the homepage and tries the icons it declares.
pub struct PageLinks {
    min_bytes: usize,
    max_icons: usize,
}

impl PageLinks {
    pub fn new(min_bytes: usize, max_icons: usize) -> Self {
        Self {
            min_bytes,
            max_icons,
        }
    }
}

impl IconSource for PageLinks {
    fn strategy(&self) -> Strategy {
        Strategy::PageLink
    }

    fn find(&self, site: &Site, fetcher: &dyn Fetch) -> Option<Icon> {
        let page = match fetcher.get(&site.origin, Purpose::Page) {
            Ok(r) if r.is_success() => r,
            Ok(r) => {
                debug!(url = %site.origin, status = r.status, "homepage returned error status");
                return None;
            }
            Err(e) => {
                debug!(url = %site.origin, error = %e, "homepage request failed");
                return None;
            }
        };
        let html = String::from_utf8_lossy(&page.body);
        let candidates = icon_links(&html, &page.url);
        if candidates.is_empty() {
            debug!(url = %page.url, "no icon links on homepage");
            return None;
        }
        let accept = Acceptance {
            min_bytes: self.min_bytes,
            require_image: true,
        };
        candidates
            .iter()
            .take(self.max_icons)
            .find_map(|url| download(fetcher, url, self.strategy(), accept))
    }
}

// ============================================================================
// Favicon-by-domain service
// ============================================================================

/// Last resort: ask a third-party service for the domain's icon.
pub struct FaviconService {
    template: String,
}

impl FaviconService {
    /// `template` contains a `{domain}` placeholder.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn url_for(&self, host: &str) -> Option<Url> {
        Url::parse(&self.template.replace("{domain}", host)).ok()
    }
}

impl IconSource for FaviconService {
    fn strategy(&self) -> Strategy {
        Strategy::Service
    }

    fn find(&self, site: &Site, fetcher: &dyn Fetch) -> Option<Icon> {
        let Some(url) = self.url_for(&site.host) else {
            debug!(template = %self.template, "favicon service URL is invalid");
            return None;
        };
        // The service answers with a generic globe for unknown domains; that
        // is still better than nothing, so any non-empty payload is kept.
        let accept = Acceptance {
            min_bytes: 1,
            require_image: false,
        };
        download(fetcher, &url, self.strategy(), accept)
    }
}
