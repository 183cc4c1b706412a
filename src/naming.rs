//! Organization name → slug conversion.
//!
//! The slug is the organization's identity on disk: cached favicons are stored
//! as `<slug>.<ext>`. It must be stable across runs and safe as a file name
//! and as a relative URL path segment, so only lowercase ASCII letters,
//! digits and single dashes survive:
//!
//! - `"Second Harvest Heartland"` → `"second-harvest-heartland"`
//! - `"St. Mary's Church (Downtown)"` → `"st-mary-s-church-downtown"`
//! - `"  --Food & Shelter--  "` → `"food-shelter"`
//!
//! A name with no ASCII alphanumerics at all (e.g. written entirely in another
//! script) would collapse to an empty string; those get `org-<8 hex>` from a
//! SHA-256 of the trimmed name instead.

use sha2::{Digest, Sha256};

/// Convert an organization name to its filesystem-safe slug.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        let digest = Sha256::digest(name.trim().as_bytes());
        let hex = format!("{:x}", digest);
        return format!("org-{}", &hex[..8]);
    }
    slug
}
