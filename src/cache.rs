//! On-disk favicon cache for incremental builds.
//!
//! Fetching icons is the slow part of a build: every organization costs up
//! to a few dozen HTTP round trips. The cache keeps each resolved icon so a
//! rebuild only touches the network for organizations that have none yet.
//!
//! # Layout
//!
//! ```text
//! <temp_dir>/
//! ├── .icon-manifest.json      provenance (source URL, strategy, digest)
//! └── favicon/
//!     ├── food-bank.png
//!     └── river-trust.ico
//! ```
//!
//! Icons are keyed by organization slug. The file system is the source of
//! truth: an icon is cached when `favicon/<slug>.<ext>` exists for one of
//! [`KNOWN_EXTENSIONS`], whatever the manifest says. The manifest is purely
//! informational and is rebuilt as icons are stored.
//!
//! The cache lives in the temp directory rather than the output so that a
//! failed build, or a `--clean` one, never has to touch the published site.
//!
//! # Concurrency
//!
//! Workers resolve different organizations in parallel. Every write is
//! confined to files named after the worker's own slug, so no two workers
//! ever touch the same path. The manifest is updated by the caller after the
//! parallel phase.

use crate::favicon::Strategy;
use crate::types::IconFile;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Subdirectory holding the icon files.
pub const FAVICON_DIR: &str = "favicon";

/// Name of the provenance manifest within the temp directory.
const MANIFEST_FILENAME: &str = ".icon-manifest.json";

/// Bump to discard manifests written by an incompatible version.
const MANIFEST_VERSION: u32 = 1;

/// Extensions recognized as cached icons, in lookup order.
pub const KNOWN_EXTENSIONS: [&str; 8] = ["png", "jpg", "jpeg", "ico", "svg", "webp", "gif", "bmp"];

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Handle on the favicon cache directory.
#[derive(Debug, Clone)]
pub struct IconCache {
    root: PathBuf,
    dir: PathBuf,
}

impl IconCache {
    /// Open (creating if needed) the cache under `temp_dir`.
    pub fn open(temp_dir: &Path) -> Result<Self, CacheError> {
        let dir = temp_dir.join(FAVICON_DIR);
        fs::create_dir_all(&dir)?;
        Ok(Self {
            root: temp_dir.to_path_buf(),
            dir,
        })
    }

    /// Directory containing the icon files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_of(&self, icon: &IconFile) -> PathBuf {
        self.dir.join(&icon.file_name)
    }

    /// The cached icon for `slug`, if a non-empty one exists.
    pub fn lookup(&self, slug: &str) -> Option<IconFile> {
        KNOWN_EXTENSIONS.iter().find_map(|ext| {
            let file_name = format!("{slug}.{ext}");
            let meta = fs::metadata(self.dir.join(&file_name)).ok()?;
            (meta.is_file() && meta.len() > 0).then_some(IconFile { file_name })
        })
    }

    /// Write `bytes` as the icon for `slug`.
    ///
    /// The file is written under a temporary name and renamed into place, so
    /// a reader never sees a half-written icon. Icons for the same slug with
    /// a different extension are removed afterwards.
    pub fn store(&self, slug: &str, bytes: &[u8], extension: &str) -> Result<IconFile, CacheError> {
        let file_name = format!("{slug}.{extension}");
        let target = self.dir.join(&file_name);
        let staging = self.dir.join(format!(".{file_name}.tmp"));
        fs::write(&staging, bytes)?;
        if let Err(e) = fs::rename(&staging, &target) {
            let _ = fs::remove_file(&staging);
            return Err(e.into());
        }
        for ext in KNOWN_EXTENSIONS.iter().filter(|e| **e != extension) {
            remove_if_present(&self.dir.join(format!("{slug}.{ext}")))?;
        }
        Ok(IconFile { file_name })
    }

    /// Delete every cached file for `slug`. Returns how many were removed.
    pub fn evict(&self, slug: &str) -> Result<usize, CacheError> {
        let mut removed = 0;
        for ext in KNOWN_EXTENSIONS {
            if remove_if_present(&self.dir.join(format!("{slug}.{ext}")))? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub fn load_manifest(&self) -> IconManifest {
        IconManifest::load(&self.root)
    }

    pub fn save_manifest(&self, manifest: &IconManifest) -> Result<(), CacheError> {
        manifest.save(&self.root)
    }
}

/// Remove the whole favicon cache under `temp_dir`. Returns whether
/// anything was there.
pub fn clear(temp_dir: &Path) -> Result<bool, CacheError> {
    let dir = temp_dir.join(FAVICON_DIR);
    let had_icons = dir.exists();
    if had_icons {
        fs::remove_dir_all(&dir)?;
    }
    remove_if_present(&manifest_path(temp_dir))?;
    Ok(had_icons)
}

fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

// ============================================================================
// Provenance manifest
// ============================================================================

/// Where a cached icon came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    pub file: String,
    pub source: String,
    pub strategy: Strategy,
    pub sha256: String,
}

/// Slug → provenance record. Sorted so the file diffs cleanly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IconManifest {
    pub version: u32,
    pub entries: BTreeMap<String, ManifestEntry>,
}

impl IconManifest {
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: BTreeMap::new(),
        }
    }

    /// Load from `temp_dir`. Missing, corrupt or wrong-version manifests
    /// load as empty.
    pub fn load(temp_dir: &Path) -> Self {
        let Ok(content) = fs::read_to_string(manifest_path(temp_dir)) else {
            return Self::empty();
        };
        match serde_json::from_str::<Self>(&content) {
            Ok(m) if m.version == MANIFEST_VERSION => m,
            _ => Self::empty(),
        }
    }

    pub fn save(&self, temp_dir: &Path) -> Result<(), CacheError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(manifest_path(temp_dir), json)?;
        Ok(())
    }

    pub fn record(&mut self, slug: &str, entry: ManifestEntry) {
        self.entries.insert(slug.to_string(), entry);
    }

    pub fn forget(&mut self, slug: &str) {
        self.entries.remove(slug);
    }

    pub fn get(&self, slug: &str) -> Option<&ManifestEntry> {
        self.entries.get(slug)
    }
}

/// Manifest location for a temp directory.
pub fn manifest_path(temp_dir: &Path) -> PathBuf {
    temp_dir.join(MANIFEST_FILENAME)
}

/// SHA-256 of a byte slice as lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

// ============================================================================
// Stats
// ============================================================================

/// Per-build tally of icon outcomes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Served from the cache, no network.
    pub cached: u32,
    /// Resolved over the network this run.
    pub fetched: u32,
    /// Resolution ran and found nothing.
    pub missing: u32,
    /// No website, resolution not attempted.
    pub skipped: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.cached + self.fetched + self.missing + self.skipped
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = [
            (self.cached, "cached"),
            (self.fetched, "fetched"),
            (self.missing, "missing"),
            (self.skipped, "without website"),
        ]
        .into_iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, label)| format!("{n} {label}"))
        .collect();

        match parts.len() {
            0 => write!(f, "no icons"),
            1 => write!(f, "{}", parts[0]),
            _ => write!(f, "{} ({} total)", parts.join(", "), self.total()),
        }
    }
}
