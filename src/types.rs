//! Core records shared by every build stage.
//!
//! An [`Organization`] is created once per CSV row by the loader and never
//! mutated afterwards. Icon resolution results live beside it (see
//! [`IconFile`]) rather than inside it, so the loaded data stays immutable
//! for the whole run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Geographic scope bucket for an organization.
///
/// The derived `Ord` is the display order of the portfolio table:
/// Local, then National, then Global.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Classification {
    Local,
    National,
    Global,
}

impl Classification {
    pub const ALL: [Classification; 3] = [
        Classification::Local,
        Classification::National,
        Classification::Global,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Classification::Local => "Local",
            Classification::National => "National",
            Classification::Global => "Global",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a `Class` value is not one of the three scopes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownClassification(pub String);

impl FromStr for Classification {
    type Err = UnknownClassification;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Classification::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| UnknownClassification(trimmed.to_string()))
    }
}

/// One row of the organizations CSV.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Organization {
    /// 1-based line in the CSV file where this record starts (header is line 1).
    pub row: usize,
    pub name: String,
    /// Filesystem-safe key derived from `name`; also the icon cache key.
    pub slug: String,
    pub classification: Classification,
    /// Raw `Reason` tag, e.g. "education". Looked up case-insensitively.
    pub reason: Option<String>,
    pub amount: Option<String>,
    pub why: Option<String>,
    pub summary: Option<String>,
    pub website: Option<String>,
    pub ein: Option<String>,
    pub charity_navigator: Option<String>,
    pub guidestar: Option<String>,
}

impl Organization {
    /// Website with an `https://` scheme added when none was given.
    pub fn website_href(&self) -> Option<String> {
        self.website.as_deref().map(normalize_website)
    }
}

/// Prefix bare hosts with `https://`; URLs that already carry an HTTP(S)
/// scheme are returned trimmed but otherwise untouched.
pub fn normalize_website(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}

/// A favicon stored in the icon cache, referenced by file name only.
///
/// The renderer links it as `favicon/<file_name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IconFile {
    pub file_name: String,
}
