//! CLI output formatting.
//!
//! # Information-First Display
//!
//! Output is organized around organizations, not files. Each organization
//! leads with its positional index and name; details such as scope,
//! website and icon outcome follow as indented context lines.
//!
//! # Output Format
//!
//! ## Check
//!
//! ```text
//! Organizations (3)
//! 001 Food Bank of the Valley
//!     Local · food
//!     Website: https://foodbank.example
//! 002 Quiet Trust
//!     Local · church
//! 003 River Trust
//!     Global · environment
//!     Website: https://rivertrust.example
//!
//! Template: site/index.html
//! ```
//!
//! ## Build
//!
//! ```text
//! ==> Loading organizations
//!     5 organizations (2 Local, 1 National, 2 Global)
//! ==> Resolving favicons
//!     001 Food Bank of the Valley: fetched (conventional path)
//!     002 Quiet Trust: no website
//! ==> Rendering portfolio
//!     5 rows → index.html (template)
//! ==> Writing site
//! ==> Build complete: dist
//! Icons: 1 fetched, 1 without website (2 total)
//! Images: 2 copied
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::assets::{ImageAction, StylesheetSource};
use crate::pipeline::{BuildEvent, BuildReport, CheckReport, Stage};
use crate::resolve::IconOutcome;
use crate::types::{Classification, Organization};
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{n} {one}")
    } else {
        format!("{n} {many}")
    }
}

fn class_breakdown(by_class: &[(Classification, usize)]) -> String {
    by_class
        .iter()
        .map(|(c, n)| format!("{n} {c}"))
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// Check
// ============================================================================

/// Format the `check` command's inventory of organizations.
pub fn format_check_output(report: &CheckReport, source: &Path) -> Vec<String> {
    let mut lines = vec![format!("Organizations ({})", report.organizations.len())];
    for (i, org) in report.organizations.iter().enumerate() {
        lines.extend(organization_lines(i + 1, org));
    }
    lines.push(String::new());
    if report.has_template {
        lines.push(format!("Template: {}", source.join("index.html").display()));
    } else {
        lines.push("Template: built-in page".to_string());
    }
    lines
}

pub fn print_check_output(report: &CheckReport, source: &Path) {
    for line in format_check_output(report, source) {
        println!("{}", line);
    }
}

fn organization_lines(index: usize, org: &Organization) -> Vec<String> {
    let mut lines = vec![format!("{} {}", format_index(index), org.name)];
    match org.reason.as_deref() {
        Some(reason) => lines.push(format!("{}{} · {}", indent(1), org.classification, reason)),
        None => lines.push(format!("{}{}", indent(1), org.classification)),
    }
    if let Some(href) = org.website_href() {
        lines.push(format!("{}Website: {}", indent(1), href));
    }
    lines
}

// ============================================================================
// Build progress
// ============================================================================

/// Format a single build progress event as display lines.
pub fn format_build_event(event: &BuildEvent) -> Vec<String> {
    match event {
        BuildEvent::StageStarted(stage) => vec![format!("==> {}", stage_title(*stage))],
        BuildEvent::Cleaned { removed_cache } => {
            if *removed_cache {
                vec![format!("{}Removed icon cache", indent(1))]
            } else {
                vec![format!("{}Icon cache already empty", indent(1))]
            }
        }
        BuildEvent::Loaded { total, by_class } => vec![format!(
            "{}{} ({})",
            indent(1),
            plural(*total, "organization", "organizations"),
            class_breakdown(by_class)
        )],
        BuildEvent::Icon(event) => vec![format!(
            "{}{} {}: {}",
            indent(1),
            format_index(event.index),
            event.name,
            outcome_text(&event.outcome)
        )],
        BuildEvent::Rendered {
            rows,
            from_template,
        } => {
            let page = if *from_template { "template" } else { "built-in page" };
            vec![format!(
                "{}{} \u{2192} index.html ({})",
                indent(1),
                plural(*rows, "row", "rows"),
                page
            )]
        }
        BuildEvent::Published { output } => {
            vec![format!("==> Build complete: {}", output.display())]
        }
    }
}

fn stage_title(stage: Stage) -> &'static str {
    match stage {
        Stage::Clean => "Cleaning icon cache",
        Stage::Load => "Loading organizations",
        Stage::ResolveIcons => "Resolving favicons",
        Stage::Render => "Rendering portfolio",
        Stage::Write => "Writing site",
    }
}

fn outcome_text(outcome: &IconOutcome) -> String {
    match outcome {
        IconOutcome::Cached(_) => "cached".to_string(),
        IconOutcome::Fetched { strategy, .. } => format!("fetched ({strategy})"),
        IconOutcome::Missing => "no icon found".to_string(),
        IconOutcome::Skipped => "no website".to_string(),
    }
}

// ============================================================================
// Build summary
// ============================================================================

/// Format the closing summary of a successful build.
pub fn format_build_report(report: &BuildReport) -> Vec<String> {
    let resized = report
        .assets
        .images
        .iter()
        .filter(|i| matches!(i.action, ImageAction::Resized { .. }))
        .count();
    let copied = report.assets.images.len() - resized;

    let images = match (copied, resized) {
        (0, 0) => "none".to_string(),
        (c, 0) => format!("{c} copied"),
        (0, r) => format!("{r} resized"),
        (c, r) => format!("{c} copied, {r} resized"),
    };
    let stylesheet = match report.assets.stylesheet {
        StylesheetSource::Source => "styles.css",
        StylesheetSource::Builtin => "built-in",
    };

    vec![
        format!("Icons: {}", report.icons),
        format!("Images: {}", images),
        format!("Stylesheet: {}", stylesheet),
    ]
}

pub fn print_build_report(report: &BuildReport) {
    for line in format_build_report(report) {
        println!("{}", line);
    }
}
