//! Shared test utilities.
//!
//! Fixture setup, organization builders and canned HTTP payloads used by the
//! unit tests of several modules.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let orgs = load_organizations(&tmp.path().join("data/organizations.csv")).unwrap();
//!
//! let mock = MockFetcher::new().icon("https://a.org/favicon.ico", &png_payload(200));
//! let food_bank = org("Food Bank", "foodbank.org");
//! ```

use std::path::Path;
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::naming::slugify;
use crate::types::{Classification, Organization};

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/site/` to a temp directory and return it.
///
/// The copy contains `data/organizations.csv` and a `site/` source
/// directory, so tests can mutate either without affecting other tests.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/site");
    for entry in WalkDir::new(&fixtures) {
        let entry = entry.unwrap();
        let rel = entry.path().strip_prefix(&fixtures).unwrap();
        let dst = tmp.path().join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&dst).unwrap();
        } else {
            std::fs::copy(entry.path(), &dst).unwrap();
        }
    }
    tmp
}

// =========================================================================
// Organizations
// =========================================================================

/// A Local organization with a website.
pub fn org(name: &str, website: &str) -> Organization {
    Organization {
        website: Some(website.to_string()),
        ..org_in(name, Classification::Local)
    }
}

/// A Local organization with no website.
pub fn org_without_website(name: &str) -> Organization {
    org_in(name, Classification::Local)
}

/// A bare organization in the given scope.
pub fn org_in(name: &str, classification: Classification) -> Organization {
    Organization {
        row: 2,
        name: name.to_string(),
        slug: slugify(name),
        classification,
        reason: None,
        amount: None,
        why: None,
        summary: None,
        website: None,
        ein: None,
        charity_navigator: None,
        guidestar: None,
    }
}

// =========================================================================
// HTTP payloads
// =========================================================================

/// `len` bytes that sniff as PNG.
pub fn png_payload(len: usize) -> Vec<u8> {
    let mut bytes = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec();
    bytes.resize(len.max(bytes.len()), 0);
    bytes
}

/// An HTML error page padded to `len` bytes.
pub fn html_payload(len: usize) -> Vec<u8> {
    let mut bytes = b"<!DOCTYPE html><html><head><title>Not Found</title></head><body>".to_vec();
    bytes.resize(len.max(bytes.len()), b' ');
    bytes
}
