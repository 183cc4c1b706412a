//! # Foundation Site
//!
//! A static site builder for a charitable foundation's giving portfolio.
//! A CSV of organizations becomes an HTML table, one row per organization,
//! each decorated with the organization's favicon.
//!
//! # Architecture: Staged Pipeline
//!
//! ```text
//! 1. Load      organizations.csv  →  Vec<Organization>   (sorted Local/National/Global)
//! 2. Resolve   organizations      →  favicon/<slug>.ext  (cache, then network)
//! 3. Render    rows + template    →  index.html          (Maud)
//! 4. Write     staging dir        →  dist/               (atomic rename)
//! ```
//!
//! Load and Render are all-or-nothing: malformed data aborts the build
//! before anything is published. Resolve is best-effort: each organization
//! is resolved on its own and a failure only costs that organization its
//! icon.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`load`] | CSV parsing and validation into [`types::Organization`] records |
//! | [`types`] | Shared records: `Organization`, `Classification`, `IconFile` |
//! | [`naming`] | Organization name → filesystem-safe slug |
//! | [`favicon`] | Strategy chain that finds an icon for a website |
//! | [`cache`] | On-disk icon cache keyed by slug, with provenance manifest |
//! | [`resolve`] | Runs the favicon chain over all organizations on a rayon pool |
//! | [`labels`] | Emoji and tooltip tables for scopes and causes |
//! | [`render`] | Table rows, template injection and the built-in page |
//! | [`assets`] | Stylesheet and image copying, optional downscaling |
//! | [`pipeline`] | Stage sequencing, clean/refetch, staging and publish |
//! | [`config`] | `config.toml` loading, merging over stock defaults, validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Cache Outside the Output
//!
//! Icons are cached under the temp directory, not in `dist/`. The output is
//! only ever replaced wholesale by renaming a finished staging directory, so
//! a build that fails half-way (bad `Class` value, broken template) leaves
//! the previously published site untouched, even with `--clean`.
//!
//! ## Blocking HTTP on a Thread Pool
//!
//! Favicon fetching is the only I/O-bound part of the build, and it is
//! embarrassingly parallel across organizations. A blocking `reqwest`
//! client on a bounded rayon pool keeps the code synchronous without an
//! async runtime.
//!
//! ## Testable Network Seam
//!
//! Every strategy goes through the [`favicon::Fetch`] trait, so the whole
//! pipeline runs in tests against a recording mock and never opens a
//! socket.

pub mod assets;
pub mod cache;
pub mod config;
pub mod favicon;
pub mod labels;
pub mod load;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod render;
pub mod resolve;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
