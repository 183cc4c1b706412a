//! Build orchestration.
//!
//! A build runs five stages strictly in sequence:
//!
//! ```text
//! Clean (optional) → Load → Resolve icons → Render → Write
//! ```
//!
//! Load and Render failures are fatal. Icon resolution never is: a broken
//! site only costs its organization the icon.
//!
//! Nothing is written into the output directory directly. The Write stage
//! fills a staging directory next to it (`.<name>.staging`) and publishes by
//! rename, so a failed build leaves the previous site exactly as it was.

use crate::assets::{AssetError, AssetReport, copy_assets};
use crate::cache::{self, CacheError, CacheStats, FAVICON_DIR, IconCache};
use crate::config::{ConfigError, SiteConfig, effective_threads};
use crate::favicon::{Fetch, Resolver};
use crate::labels::Labels;
use crate::load::{LoadError, load_organizations};
use crate::render::{
    RenderError, RenderedSite, TEMPLATE_FILENAME, inject_into_template, render_site,
};
use crate::resolve::{ResolveError, ResolveEvent, ResolveOptions, resolve_icons};
use crate::types::{Classification, IconFile, Organization};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_DATA: &str = "data/organizations.csv";
pub const DEFAULT_SOURCE: &str = "site";
pub const DEFAULT_OUTPUT: &str = "dist";
pub const DEFAULT_TEMP_DIR: &str = ".foundation-site-cache";

/// Standalone copy of the rendered rows.
pub const TABLE_FILENAME: &str = "portfolio_table.html";

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Load error: {0}")]
    Load(#[from] LoadError),
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("Icon resolution error: {0}")]
    Resolve(#[from] ResolveError),
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),
    #[error("Output path {0} must name a directory")]
    InvalidOutput(PathBuf),
}

/// Where a build reads from and writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPaths {
    /// The organizations CSV.
    pub data: PathBuf,
    /// Template, stylesheet, images and `config.toml`.
    pub source: PathBuf,
    pub output: PathBuf,
    /// Icon cache and manifest.
    pub temp_dir: PathBuf,
}

impl Default for BuildPaths {
    fn default() -> Self {
        Self {
            data: PathBuf::from(DEFAULT_DATA),
            source: PathBuf::from(DEFAULT_SOURCE),
            output: PathBuf::from(DEFAULT_OUTPUT),
            temp_dir: PathBuf::from(DEFAULT_TEMP_DIR),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildOptions {
    /// Wipe the icon cache before building.
    pub clean: bool,
    /// Re-resolve every icon even when one is cached.
    pub refetch: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Clean,
    Load,
    ResolveIcons,
    Render,
    Write,
}

/// Progress notifications for the CLI.
#[derive(Debug, Clone)]
pub enum BuildEvent {
    StageStarted(Stage),
    Cleaned {
        removed_cache: bool,
    },
    Loaded {
        total: usize,
        by_class: Vec<(Classification, usize)>,
    },
    Icon(ResolveEvent),
    Rendered {
        rows: usize,
        from_template: bool,
    },
    Published {
        output: PathBuf,
    },
}

#[derive(Debug)]
pub struct BuildReport {
    pub organizations: usize,
    pub icons: CacheStats,
    pub assets: AssetReport,
    pub from_template: bool,
    pub output: PathBuf,
}

/// Result of [`check`].
#[derive(Debug)]
pub struct CheckReport {
    pub organizations: Vec<Organization>,
    /// Whether the source has its own `index.html`.
    pub has_template: bool,
}

/// Run the full pipeline.
pub fn build(
    paths: &BuildPaths,
    options: BuildOptions,
    config: &SiteConfig,
    fetcher: &dyn Fetch,
    events: Option<Sender<BuildEvent>>,
) -> Result<BuildReport, BuildError> {
    let emit = |event: BuildEvent| {
        if let Some(tx) = &events {
            tx.send(event).ok();
        }
    };
    let staging = staging_dir(&paths.output)?;

    if options.clean {
        emit(BuildEvent::StageStarted(Stage::Clean));
        let removed_cache = cache::clear(&paths.temp_dir)?;
        remove_dir_if_present(&staging)?;
        emit(BuildEvent::Cleaned { removed_cache });
    }

    emit(BuildEvent::StageStarted(Stage::Load));
    let orgs = load_organizations(&paths.data)?;
    emit(BuildEvent::Loaded {
        total: orgs.len(),
        by_class: count_by_class(&orgs),
    });

    emit(BuildEvent::StageStarted(Stage::ResolveIcons));
    let icon_cache = IconCache::open(&paths.temp_dir)?;
    let resolver = Resolver::from_config(&config.fetch);
    let resolve_options = ResolveOptions {
        refetch: options.refetch,
        threads: effective_threads(&config.processing),
    };
    let resolution = std::thread::scope(|s| {
        let forward = events.as_ref().map(|build_tx| {
            let (tx, rx) = mpsc::channel::<ResolveEvent>();
            let build_tx = build_tx.clone();
            s.spawn(move || {
                for event in rx {
                    build_tx.send(BuildEvent::Icon(event)).ok();
                }
            });
            tx
        });
        resolve_icons(
            &orgs,
            &icon_cache,
            &resolver,
            fetcher,
            resolve_options,
            forward,
        )
    })?;

    let (icons, icon_files) = read_cached_icons(&orgs, resolution.icons, &icon_cache);

    emit(BuildEvent::StageStarted(Stage::Render));
    let site = render_site(
        &paths.source,
        &orgs,
        &icons,
        &Labels::default(),
        &config.site,
    )?;
    emit(BuildEvent::Rendered {
        rows: orgs.len(),
        from_template: site.from_template,
    });

    emit(BuildEvent::StageStarted(Stage::Write));
    if let Some(parent) = non_empty_parent(&paths.output) {
        fs::create_dir_all(parent)?;
    }
    remove_dir_if_present(&staging)?;
    fs::create_dir_all(&staging)?;

    let written = write_staging(&staging, &site, &icon_files, paths, config);
    let assets = match written.and_then(|assets| publish(&staging, &paths.output).map(|()| assets)) {
        Ok(assets) => assets,
        Err(e) => {
            if let Err(cleanup) = remove_dir_if_present(&staging) {
                warn!(dir = %staging.display(), error = %cleanup, "could not remove staging directory");
            }
            return Err(e);
        }
    };
    emit(BuildEvent::Published {
        output: paths.output.clone(),
    });

    Ok(BuildReport {
        organizations: orgs.len(),
        icons: resolution.stats,
        assets,
        from_template: site.from_template,
        output: paths.output.clone(),
    })
}

/// Read every resolved icon out of the cache, keyed by file name.
///
/// An icon that cannot be read costs only its own rows their icon: they are
/// rendered with the fallback and the build goes on.
fn read_cached_icons(
    orgs: &[Organization],
    icons: Vec<Option<IconFile>>,
    icon_cache: &IconCache,
) -> (Vec<Option<IconFile>>, BTreeMap<String, Vec<u8>>) {
    let mut files: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    let icons = orgs
        .iter()
        .zip(icons)
        .map(|(org, icon)| {
            let icon = icon?;
            if files.contains_key(&icon.file_name) {
                return Some(icon);
            }
            let path = icon_cache.path_of(&icon);
            match fs::read(&path) {
                Ok(bytes) => {
                    files.insert(icon.file_name.clone(), bytes);
                    Some(icon)
                }
                Err(e) => {
                    warn!(
                        org = %org.name,
                        file = %path.display(),
                        error = %e,
                        "could not read cached icon"
                    );
                    None
                }
            }
        })
        .collect();
    (icons, files)
}

/// Fill the staging directory with everything the site needs.
fn write_staging(
    staging: &Path,
    site: &RenderedSite,
    icon_files: &BTreeMap<String, Vec<u8>>,
    paths: &BuildPaths,
    config: &SiteConfig,
) -> Result<AssetReport, BuildError> {
    fs::write(staging.join("index.html"), &site.index_html)?;
    fs::write(staging.join(TABLE_FILENAME), &site.table_html)?;
    let favicon_dir = staging.join(FAVICON_DIR);
    fs::create_dir_all(&favicon_dir)?;
    for (file_name, bytes) in icon_files {
        fs::write(favicon_dir.join(file_name), bytes)?;
    }
    Ok(copy_assets(&paths.source, staging, &config.images)?)
}

/// Validate the data file and template without touching the network or
/// the output.
pub fn check(paths: &BuildPaths) -> Result<CheckReport, BuildError> {
    let organizations = load_organizations(&paths.data)?;
    let template_path = paths.source.join(TEMPLATE_FILENAME);
    let has_template = template_path.is_file();
    if has_template {
        let template = fs::read_to_string(&template_path)?;
        if inject_into_template(&template, "").is_none() {
            return Err(RenderError::MissingTableBody(template_path).into());
        }
    }
    Ok(CheckReport {
        organizations,
        has_template,
    })
}

pub fn count_by_class(orgs: &[Organization]) -> Vec<(Classification, usize)> {
    Classification::ALL
        .into_iter()
        .map(|c| (c, orgs.iter().filter(|o| o.classification == c).count()))
        .collect()
}

/// `.<name>.staging` next to the output directory.
pub fn staging_dir(output: &Path) -> Result<PathBuf, BuildError> {
    sibling(output, "staging")
}

fn sibling(output: &Path, suffix: &str) -> Result<PathBuf, BuildError> {
    let name = output
        .file_name()
        .ok_or_else(|| BuildError::InvalidOutput(output.to_path_buf()))?;
    Ok(output.with_file_name(format!(".{}.{suffix}", name.to_string_lossy())))
}

fn non_empty_parent(path: &Path) -> Option<&Path> {
    path.parent().filter(|p| !p.as_os_str().is_empty())
}

/// Swap `staging` into place at `output`.
///
/// The previous output is renamed aside first and restored if the final
/// rename fails; it is deleted only once the new site is in place.
fn publish(staging: &Path, output: &Path) -> Result<(), BuildError> {
    let previous = sibling(output, "previous")?;
    remove_dir_if_present(&previous)?;

    let had_previous = output.exists();
    if had_previous {
        fs::rename(output, &previous)?;
    }
    if let Err(e) = fs::rename(staging, output) {
        if had_previous && let Err(restore) = fs::rename(&previous, output) {
            warn!(dir = %previous.display(), error = %restore, "could not restore previous output");
        }
        return Err(e.into());
    }
    if had_previous && let Err(e) = remove_path(&previous) {
        warn!(dir = %previous.display(), error = %e, "could not remove previous output");
    }
    Ok(())
}

fn remove_path(path: &Path) -> io::Result<()> {
    if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn remove_dir_if_present(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(_) => remove_path(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
