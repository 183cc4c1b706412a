//! Site configuration module.
//!
//! Handles loading, validating, and merging the optional `config.toml` in the
//! site source directory. User values are layered over stock defaults, so a
//! config file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [site]
//! title = "Our Giving Portfolio"   # Used by the built-in page template
//! intro = "..."
//!
//! [fetch]
//! user_agent = "Mozilla/5.0 (compatible; FaviconFetcher/1.0)"
//! icon_timeout_secs = 10     # Per-request timeout for icon downloads
//! page_timeout_secs = 15     # Per-request timeout for the homepage fetch
//! min_icon_bytes = 100       # Smaller payloads are placeholders, not icons
//! max_page_bytes = 204800    # Homepage HTML read limit
//! max_page_icons = 10        # Icon links tried from one page
//! service_url = "https://www.google.com/s2/favicons?domain={domain}&sz=64"
//! probe_paths = ["/favicon.ico", "/favicon.png", ...]
//!
//! [images]
//! max_width = 1200           # Downscale wider site images (omit to copy as-is)
//! keep_original = ["favicon512.png"]
//!
//! [processing]
//! max_processes = 8          # Parallel favicon fetches (network-bound, not tied to cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::labels;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Name of the config file inside the site source directory.
pub const CONFIG_FILENAME: &str = "config.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Text for the built-in page template.
    pub site: PageConfig,
    /// Favicon fetching behaviour.
    pub fetch: FetchConfig,
    /// Static image copying.
    pub images: ImagesConfig,
    /// Parallel fetch settings.
    pub processing: ProcessingConfig,
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fetch = &self.fetch;
        if fetch.icon_timeout_secs == 0 || fetch.page_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "fetch timeouts must be at least 1 second".into(),
            ));
        }
        if fetch.max_page_icons == 0 {
            return Err(ConfigError::Validation(
                "fetch.max_page_icons must be non-zero".into(),
            ));
        }
        if !fetch.service_url.contains("{domain}") {
            return Err(ConfigError::Validation(
                "fetch.service_url must contain a {domain} placeholder".into(),
            ));
        }
        if let Some(bad) = fetch.probe_paths.iter().find(|p| !p.starts_with('/')) {
            return Err(ConfigError::Validation(format!(
                "fetch.probe_paths entries must start with '/': {bad:?}"
            )));
        }
        if self.images.max_width == Some(0) {
            return Err(ConfigError::Validation(
                "images.max_width must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Text used when the site source has no `index.html` of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PageConfig {
    pub title: String,
    pub intro: String,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            title: "Our Giving Portfolio".to_string(),
            intro: "The organizations our foundation supports, close to home and around the world."
                .to_string(),
        }
    }
}

/// Favicon fetching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub user_agent: String,
    pub icon_timeout_secs: u64,
    pub page_timeout_secs: u64,
    /// Icon payloads shorter than this are treated as missing.
    pub min_icon_bytes: usize,
    pub max_page_bytes: usize,
    pub max_page_icons: usize,
    /// Last-resort favicon service; `{domain}` is replaced by the site host.
    pub service_url: String,
    /// Conventional icon paths probed before the homepage is parsed.
    pub probe_paths: Vec<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (compatible; FaviconFetcher/1.0)".to_string(),
            icon_timeout_secs: 10,
            page_timeout_secs: 15,
            min_icon_bytes: 100,
            max_page_bytes: 200 * 1024,
            max_page_icons: 10,
            service_url: "https://www.google.com/s2/favicons?domain={domain}&sz=64".to_string(),
            probe_paths: labels::PROBE_PATHS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Static image settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Raster images wider than this are downscaled. `None` copies verbatim.
    pub max_width: Option<u32>,
    /// File names always copied verbatim, even when `max_width` is set.
    pub keep_original: Vec<String>,
}

/// Fetch workers used when `max_processes` is not set. Independent of the
/// core count.
pub const DEFAULT_FETCH_WORKERS: usize = 8;

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel favicon workers.
    /// When absent or null, defaults to [`DEFAULT_FETCH_WORKERS`].
    pub max_processes: Option<usize>,
}

/// Resolve the effective worker count from config.
///
/// - `None` → [`DEFAULT_FETCH_WORKERS`]
/// - `Some(n)` → `n`, at least 1. Not clamped to the core count.
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    config
        .max_processes
        .unwrap_or(DEFAULT_FETCH_WORKERS)
        .max(1)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    toml::Value::try_from(SiteConfig::default())
        .map_err(|e| ConfigError::Validation(format!("default config does not serialize: {e}")))
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Load config from `config.toml` in the site source directory.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(source_dir: &Path) -> Result<SiteConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match load_raw_config(source_dir)? {
        Some(overlay) => merge_toml(base, overlay),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Foundation Site Configuration
# =============================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Place this file in the site source
# directory (next to index.html). Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Page text (only used when the source directory has no index.html)
# ---------------------------------------------------------------------------
[site]
title = "Our Giving Portfolio"
intro = "The organizations our foundation supports, close to home and around the world."

# ---------------------------------------------------------------------------
# Favicon fetching
# ---------------------------------------------------------------------------
[fetch]
user_agent = "Mozilla/5.0 (compatible; FaviconFetcher/1.0)"

# Per-request timeouts. One unreachable site can never stall the build
# for longer than the sum of its attempts.
icon_timeout_secs = 10
page_timeout_secs = 15

# Payloads smaller than this are treated as placeholders, not icons.
min_icon_bytes = 100

# How much of a homepage to read when looking for <link rel="icon">,
# and how many of the links found to try.
max_page_bytes = 204800
max_page_icons = 10

# Last resort. {domain} is replaced with the organization's host name.
service_url = "https://www.google.com/s2/favicons?domain={domain}&sz=64"

# Conventional locations, tried first and in this order.
probe_paths = [
    "/favicon.ico",
    "/favicon.png",
    "/apple-touch-icon.png",
    "/apple-touch-icon-precomposed.png",
    "/favicon-32x32.png",
    "/favicon-16x16.png",
    "/icon.png",
    "/logo.png",
    "/images/favicon.ico",
    "/images/favicon.png",
    "/img/favicon.ico",
    "/img/favicon.png",
    "/assets/favicon.ico",
    "/assets/favicon.png",
    "/static/favicon.ico",
    "/static/favicon.png",
    "/public/favicon.ico",
    "/public/favicon.png",
]

# ---------------------------------------------------------------------------
# Site images (copied from <source>/images/ to <output>/images/)
# ---------------------------------------------------------------------------
[images]
# Downscale raster images wider than this many pixels.
# Omit to copy every image verbatim.
# max_width = 1200

# File names that are never resized.
keep_original = []

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel favicon fetches. Fetching waits on the network, so
# this may exceed the number of CPU cores.
# max_processes = 8
"##
}
