//! The icon stage: cache lookups plus parallel network resolution.
//!
//! For each organization, in this order:
//!
//! 1. No usable website → [`IconOutcome::Skipped`], no network, no cache.
//! 2. `refetch` set → evict the cached icon first.
//! 3. Cache hit → [`IconOutcome::Cached`], no network.
//! 4. Otherwise run the [`Resolver`] chain and store whatever it finds.
//!
//! Rows that share a slug share one cache file, so each distinct slug is
//! resolved once and its outcome applies to every such row. A row without a
//! website is skipped even when another row with its slug has one.
//!
//! Distinct slugs are independent, so they run on a bounded rayon pool.
//! Results come back in input order regardless of completion order. A
//! failure for one organization (including a cache write error) is logged
//! and degrades to "no icon"; only the pool itself can fail the stage.

use crate::cache::{CacheStats, IconCache, IconManifest, ManifestEntry, sha256_hex};
use crate::favicon::{Fetch, Resolver, Site, Strategy};
use crate::types::{IconFile, Organization};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::warn;

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// What happened to one organization's icon.
#[derive(Debug, Clone, PartialEq)]
pub enum IconOutcome {
    Cached(IconFile),
    Fetched {
        file: IconFile,
        strategy: Strategy,
        source: String,
        sha256: String,
    },
    /// Resolution ran and found nothing usable.
    Missing,
    /// The organization has no usable website.
    Skipped,
}

impl IconOutcome {
    pub fn file(&self) -> Option<&IconFile> {
        match self {
            IconOutcome::Cached(file) | IconOutcome::Fetched { file, .. } => Some(file),
            IconOutcome::Missing | IconOutcome::Skipped => None,
        }
    }
}

/// Progress notification, one per organization, in completion order.
#[derive(Debug, Clone)]
pub struct ResolveEvent {
    /// 1-based position in the sorted organization list.
    pub index: usize,
    pub name: String,
    pub outcome: IconOutcome,
}

#[derive(Debug, Clone, Copy)]
pub struct ResolveOptions {
    pub refetch: bool,
    pub threads: usize,
}

/// Stage result: one icon slot per organization, in input order.
#[derive(Debug)]
pub struct IconResolution {
    pub icons: Vec<Option<IconFile>>,
    pub stats: CacheStats,
}

/// Organizations that share a slug and have a usable website. They share one
/// cache file, so they are resolved once, from the first row's website.
struct Job<'a> {
    org: &'a Organization,
    site: Site,
    /// Positions in the organization list that take this job's outcome.
    rows: Vec<usize>,
}

/// Group organizations by slug, in first-seen order. Rows without a usable
/// website get no job.
fn plan_jobs(orgs: &[Organization]) -> (Vec<Job<'_>>, Vec<Option<usize>>) {
    let mut jobs: Vec<Job<'_>> = Vec::new();
    let mut by_slug: HashMap<&str, usize> = HashMap::new();
    let mut job_of = Vec::with_capacity(orgs.len());

    for (i, org) in orgs.iter().enumerate() {
        let Some(site) = org.website.as_deref().and_then(Site::parse) else {
            job_of.push(None);
            continue;
        };
        let job = match by_slug.get(org.slug.as_str()) {
            Some(&job) => {
                jobs[job].rows.push(i);
                job
            }
            None => {
                jobs.push(Job {
                    org,
                    site,
                    rows: vec![i],
                });
                by_slug.insert(&org.slug, jobs.len() - 1);
                jobs.len() - 1
            }
        };
        job_of.push(Some(job));
    }
    (jobs, job_of)
}

/// Resolve icons for every organization.
pub fn resolve_icons(
    orgs: &[Organization],
    cache: &IconCache,
    resolver: &Resolver,
    fetcher: &dyn Fetch,
    options: ResolveOptions,
    progress: Option<Sender<ResolveEvent>>,
) -> Result<IconResolution, ResolveError> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.threads.max(1))
        .build()?;

    let (jobs, job_of) = plan_jobs(orgs);

    if let Some(tx) = &progress {
        for (i, org) in orgs.iter().enumerate() {
            if job_of[i].is_none() {
                tx.send(ResolveEvent {
                    index: i + 1,
                    name: org.name.clone(),
                    outcome: IconOutcome::Skipped,
                })
                .ok();
            }
        }
    }

    let job_outcomes: Vec<IconOutcome> = pool.install(|| {
        jobs.par_iter()
            .map_with(progress, |progress, job| {
                let outcome =
                    resolve_site(job.org, &job.site, cache, resolver, fetcher, options.refetch);
                if let Some(tx) = progress {
                    for &i in &job.rows {
                        tx.send(ResolveEvent {
                            index: i + 1,
                            name: orgs[i].name.clone(),
                            outcome: outcome.clone(),
                        })
                        .ok();
                    }
                }
                outcome
            })
            .collect()
    });

    let outcomes: Vec<IconOutcome> = job_of
        .iter()
        .map(|job| match job {
            Some(j) => job_outcomes[*j].clone(),
            None => IconOutcome::Skipped,
        })
        .collect();

    update_manifest(cache, orgs, &outcomes, options.refetch);

    let mut stats = CacheStats::default();
    for outcome in &outcomes {
        match outcome {
            IconOutcome::Cached(_) => stats.cached += 1,
            IconOutcome::Fetched { .. } => stats.fetched += 1,
            IconOutcome::Missing => stats.missing += 1,
            IconOutcome::Skipped => stats.skipped += 1,
        }
    }

    Ok(IconResolution {
        icons: outcomes.iter().map(|o| o.file().cloned()).collect(),
        stats,
    })
}

fn resolve_site(
    org: &Organization,
    site: &Site,
    cache: &IconCache,
    resolver: &Resolver,
    fetcher: &dyn Fetch,
    refetch: bool,
) -> IconOutcome {
    if refetch {
        if let Err(e) = cache.evict(&org.slug) {
            warn!(org = %org.name, error = %e, "could not evict cached icon");
        }
    } else if let Some(file) = cache.lookup(&org.slug) {
        return IconOutcome::Cached(file);
    }

    let Some(icon) = resolver.resolve(site, fetcher) else {
        warn!(org = %org.name, website = %site.url, "no favicon found");
        return IconOutcome::Missing;
    };

    match cache.store(&org.slug, &icon.bytes, icon.extension) {
        Ok(file) => IconOutcome::Fetched {
            file,
            strategy: icon.strategy,
            source: icon.source.to_string(),
            sha256: sha256_hex(&icon.bytes),
        },
        Err(e) => {
            warn!(org = %org.name, error = %e, "could not cache favicon");
            IconOutcome::Missing
        }
    }
}

/// Bring the provenance manifest in line with this run. Best-effort: the
/// manifest is informational, so failures only warn.
fn update_manifest(
    cache: &IconCache,
    orgs: &[Organization],
    outcomes: &[IconOutcome],
    refetch: bool,
) {
    let mut manifest = if refetch {
        IconManifest::empty()
    } else {
        cache.load_manifest()
    };
    for (org, outcome) in orgs.iter().zip(outcomes) {
        match outcome {
            IconOutcome::Fetched {
                file,
                strategy,
                source,
                sha256,
            } => manifest.record(
                &org.slug,
                ManifestEntry {
                    file: file.file_name.clone(),
                    source: source.clone(),
                    strategy: *strategy,
                    sha256: sha256.clone(),
                },
            ),
            IconOutcome::Missing => manifest.forget(&org.slug),
            IconOutcome::Cached(_) | IconOutcome::Skipped => {}
        }
    }
    if let Err(e) = cache.save_manifest(&manifest) {
        warn!(error = %e, "could not write icon manifest");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchConfig;
    use crate::favicon::fetch::tests::MockFetcher;
    use crate::test_helpers::{org, org_without_website, png_payload};
    use std::sync::mpsc;
    use tempfile::TempDir;

    fn resolver() -> Resolver {
        Resolver::from_config(&FetchConfig {
            probe_paths: vec!["/favicon.ico".into()],
            service_url: "https://icons.test/?domain={domain}".into(),
            ..FetchConfig::default()
        })
    }

    fn options(refetch: bool) -> ResolveOptions {
        ResolveOptions {
            refetch,
            threads: 2,
        }
    }

    #[test]
    fn empty_website_skips_network() {
        let tmp = TempDir::new().unwrap();
        let cache = IconCache::open(tmp.path()).unwrap();
        let mock = MockFetcher::new();
        let orgs = vec![org_without_website("Quiet Trust")];

        let result = resolve_icons(&orgs, &cache, &resolver(), &mock, options(false), None).unwrap();
        assert_eq!(result.icons, vec![None]);
        assert_eq!(result.stats.skipped, 1);
        assert_eq!(mock.request_count(), 0);
    }

    #[test]
    fn cache_hit_skips_network() {
        let tmp = TempDir::new().unwrap();
        let cache = IconCache::open(tmp.path()).unwrap();
        cache.store("food-bank", &png_payload(200), "png").unwrap();
        let mock = MockFetcher::new();
        let orgs = vec![org("Food Bank", "foodbank.org")];

        let result = resolve_icons(&orgs, &cache, &resolver(), &mock, options(false), None).unwrap();
        assert_eq!(result.icons[0].as_ref().unwrap().file_name, "food-bank.png");
        assert_eq!(result.stats.cached, 1);
        assert_eq!(mock.request_count(), 0);
    }

    #[test]
    fn refetch_ignores_cache() {
        let tmp = TempDir::new().unwrap();
        let cache = IconCache::open(tmp.path()).unwrap();
        cache.store("food-bank", &png_payload(200), "ico").unwrap();
        let mock = MockFetcher::new().icon("https://foodbank.org/favicon.ico", &png_payload(300));
        let orgs = vec![org("Food Bank", "foodbank.org")];

        let result = resolve_icons(&orgs, &cache, &resolver(), &mock, options(true), None).unwrap();
        assert_eq!(result.stats.fetched, 1);
        assert_eq!(result.icons[0].as_ref().unwrap().file_name, "food-bank.png");
        assert!(!cache.dir().join("food-bank.ico").exists());
        assert!(mock.contacted_host("foodbank.org"));
    }

    #[test]
    fn refetch_with_nothing_found_drops_stale_icon() {
        let tmp = TempDir::new().unwrap();
        let cache = IconCache::open(tmp.path()).unwrap();
        cache.store("gone", &png_payload(200), "png").unwrap();
        let mock = MockFetcher::new();
        let orgs = vec![org("Gone", "gone.org")];

        let result = resolve_icons(&orgs, &cache, &resolver(), &mock, options(true), None).unwrap();
        assert_eq!(result.icons, vec![None]);
        assert_eq!(result.stats.missing, 1);
        assert!(cache.lookup("gone").is_none());
    }

    #[test]
    fn failures_are_isolated_and_order_is_kept() {
        let tmp = TempDir::new().unwrap();
        let cache = IconCache::open(tmp.path()).unwrap();
        let mock = MockFetcher::new()
            .fail("https://broken.org/favicon.ico")
            .fail("https://broken.org/")
            .fail("https://icons.test/?domain=broken.org")
            .icon("https://a.org/favicon.ico", &png_payload(200))
            .icon("https://c.org/favicon.ico", &png_payload(200));
        let orgs = vec![
            org("A", "a.org"),
            org("Broken", "broken.org"),
            org("C", "c.org"),
        ];

        let result = resolve_icons(&orgs, &cache, &resolver(), &mock, options(false), None).unwrap();
        let names: Vec<Option<&str>> = result
            .icons
            .iter()
            .map(|i| i.as_ref().map(|f| f.file_name.as_str()))
            .collect();
        assert_eq!(names, vec![Some("a.png"), None, Some("c.png")]);
        assert_eq!(result.stats.fetched, 2);
        assert_eq!(result.stats.missing, 1);
    }

    #[test]
    fn fetched_icons_are_recorded_in_manifest() {
        let tmp = TempDir::new().unwrap();
        let cache = IconCache::open(tmp.path()).unwrap();
        let bytes = png_payload(200);
        let mock = MockFetcher::new().icon("https://a.org/favicon.ico", &bytes);
        let orgs = vec![org("A", "a.org")];

        resolve_icons(&orgs, &cache, &resolver(), &mock, options(false), None).unwrap();
        let manifest = cache.load_manifest();
        let entry = manifest.get("a").unwrap();
        assert_eq!(entry.file, "a.png");
        assert_eq!(entry.source, "https://a.org/favicon.ico");
        assert_eq!(entry.strategy, Strategy::ConventionalPath);
        assert_eq!(entry.sha256, sha256_hex(&bytes));
    }

    #[test]
    fn repeated_organization_is_resolved_once() {
        let tmp = TempDir::new().unwrap();
        let cache = IconCache::open(tmp.path()).unwrap();
        let mock = MockFetcher::new().icon("https://foodshelf.org/favicon.ico", &png_payload(200));
        let orgs = vec![
            org("Food Shelf", "foodshelf.org"),
            org("Food Shelf", "foodshelf.org"),
            org_without_website("Food Shelf"),
        ];
        let (tx, rx) = mpsc::channel();

        let result = resolve_icons(&orgs, &cache, &resolver(), &mock, options(false), Some(tx)).unwrap();
        assert_eq!(mock.request_count(), 1);
        let names: Vec<Option<&str>> = result
            .icons
            .iter()
            .map(|i| i.as_ref().map(|f| f.file_name.as_str()))
            .collect();
        assert_eq!(names, vec![Some("food-shelf.png"), Some("food-shelf.png"), None]);
        assert_eq!(result.stats.fetched, 2);
        assert_eq!(result.stats.skipped, 1);

        let mut indexes: Vec<usize> = rx.iter().map(|e| e.index).collect();
        indexes.sort();
        assert_eq!(indexes, vec![1, 2, 3]);
    }

    #[test]
    fn sends_one_event_per_organization() {
        let tmp = TempDir::new().unwrap();
        let cache = IconCache::open(tmp.path()).unwrap();
        let mock = MockFetcher::new();
        let orgs = vec![org_without_website("X"), org_without_website("Y")];
        let (tx, rx) = mpsc::channel();

        resolve_icons(&orgs, &cache, &resolver(), &mock, options(false), Some(tx)).unwrap();
        let mut events: Vec<ResolveEvent> = rx.iter().collect();
        events.sort_by_key(|e| e.index);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, "X");
        assert_eq!(events[1].index, 2);
        assert_eq!(events[1].outcome, IconOutcome::Skipped);
    }
}
