//! HTML rendering with Maud.
//!
//! The portfolio is a single table. Each organization becomes one `<tr>`,
//! the rows form a fragment, and the fragment is injected into the page
//! template at `<source>/index.html`. Sites without a template get a
//! built-in page.
//!
//! Rendering is a pure function of its inputs: the same organizations, icon
//! files and labels always produce byte-identical output.
//!
//! ## Row layout
//!
//! ```text
//! <tr>
//!   <td class="org">       favicon (or 🌐) + linked name + summary
//!   <td class="scope">     Local / National / Global emoji with tooltip
//!   <td class="category">  cause emoji with tooltip
//!   <td class="ratings">   Charity Navigator and GuideStar badges
//!   <td class="notes">     why we give
//! </tr>
//! ```

use crate::config::PageConfig;
use crate::labels::Labels;
use crate::types::{IconFile, Organization};
use maud::{DOCTYPE, Markup, PreEscaped, html};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Template file looked up in the source directory.
pub const TEMPLATE_FILENAME: &str = "index.html";

/// Marker identifying the table whose body is replaced.
const TABLE_MARKER: &str = r#"class="portfolio-table""#;

const CHARITY_NAVIGATOR_BADGE: &str = "images/cn.png";
const GUIDESTAR_BADGE: &str = "images/gs.jpeg";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Template {0} has no <tbody> inside a class=\"portfolio-table\" table")]
    MissingTableBody(PathBuf),
    #[error("Row {row}: organization has no name")]
    MissingName { row: usize },
    #[error("Got {icons} icon slots for {orgs} organizations")]
    IconCountMismatch { orgs: usize, icons: usize },
}

/// Rendered output, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSite {
    pub index_html: String,
    pub table_html: String,
    /// Whether `index_html` came from the source template.
    pub from_template: bool,
}

/// Render the table fragment and the full page.
pub fn render_site(
    source_dir: &Path,
    orgs: &[Organization],
    icons: &[Option<IconFile>],
    labels: &Labels,
    page: &PageConfig,
) -> Result<RenderedSite, RenderError> {
    let table_html = render_table(orgs, icons, labels)?;
    let template_path = source_dir.join(TEMPLATE_FILENAME);

    if template_path.is_file() {
        let template = fs::read_to_string(&template_path)?;
        let index_html = inject_into_template(&template, &table_html)
            .ok_or(RenderError::MissingTableBody(template_path))?;
        Ok(RenderedSite {
            index_html,
            table_html,
            from_template: true,
        })
    } else {
        let index_html = builtin_page(page, &table_html).into_string();
        Ok(RenderedSite {
            index_html,
            table_html,
            from_template: false,
        })
    }
}

/// All rows, newline-separated, with a trailing newline.
///
/// Rows are grouped Local, National, Global; within a group the input order
/// is kept.
pub fn render_table(
    orgs: &[Organization],
    icons: &[Option<IconFile>],
    labels: &Labels,
) -> Result<String, RenderError> {
    if orgs.len() != icons.len() {
        return Err(RenderError::IconCountMismatch {
            orgs: orgs.len(),
            icons: icons.len(),
        });
    }

    let mut rows: Vec<(&Organization, Option<&IconFile>)> =
        orgs.iter().zip(icons.iter().map(Option::as_ref)).collect();
    rows.sort_by_key(|(org, _)| org.classification);

    let mut out = String::new();
    for (org, icon) in rows {
        if org.name.trim().is_empty() {
            return Err(RenderError::MissingName { row: org.row });
        }
        out.push_str(&render_row(org, icon, labels).into_string());
        out.push('\n');
    }
    Ok(out)
}

/// One `<tr>` for one organization.
pub fn render_row(org: &Organization, icon: Option<&IconFile>, labels: &Labels) -> Markup {
    let href = org.website_href();
    let summary = org.summary.as_deref().unwrap_or(labels.missing_summary);
    let why = org.why.as_deref().unwrap_or(labels.missing_why);
    let scope = labels.scope(org.classification);
    let (cause_emoji, cause_label) = labels.cause(org.reason.as_deref());

    html! {
        tr {
            td.org {
                div.org-card {
                    @if let Some(icon) = icon {
                        img.favicon src=(format!("favicon/{}", icon.file_name)) alt="" aria-hidden="true" loading="lazy";
                    } @else {
                        span.favicon-fallback aria-hidden="true" { (labels.missing_icon) }
                    }
                    div.org-card-content {
                        div {
                            @if let Some(href) = &href {
                                a.org-name href=(href) target="_blank" rel="noreferrer" { (org.name) }
                            } @else {
                                span.org-name { (org.name) }
                            }
                        }
                        span.summary { (summary) }
                    }
                }
            }
            td.scope {
                @if let Some(badge) = scope {
                    span.emoji title=(badge.label) { (badge.emoji) }
                }
            }
            td.category {
                span.emoji title=(cause_label) { (cause_emoji) }
            }
            td.ratings {
                (rating_badge(org.charity_navigator.as_deref(), CHARITY_NAVIGATOR_BADGE, "Charity Navigator logo"))
                (rating_badge(org.guidestar.as_deref(), GUIDESTAR_BADGE, "GuideStar logo"))
            }
            td.notes {
                span.why { (why) }
            }
        }
    }
}

fn rating_badge(link: Option<&str>, image: &str, alt: &str) -> Markup {
    html! {
        @if let Some(link) = link {
            a.badge-link href=(link) target="_blank" rel="noreferrer" {
                img.badge-image src=(image) alt=(alt) loading="lazy";
            }
        } @else {
            span.badge-empty aria-hidden="true" {}
        }
    }
}

/// Replace the body of the portfolio table in `template` with `fragment`.
///
/// The first `<tbody>` after `class="portfolio-table"` is used; its
/// attributes are preserved, and so is the indentation of a `</tbody>` that
/// sits on its own line. Returns `None` when there is no such body.
pub fn inject_into_template(template: &str, fragment: &str) -> Option<String> {
    let table = template.find(TABLE_MARKER)?;
    let tbody_open = table + template[table..].find("<tbody")?;
    let content_start = tbody_open + template[tbody_open..].find('>')? + 1;
    let content_end = content_start + template[content_start..].find("</tbody>")?;

    let body = &template[content_start..content_end];
    let closing_indent = body
        .rfind('\n')
        .map(|nl| &body[nl + 1..])
        .filter(|tail| tail.chars().all(|c| c == ' ' || c == '\t'))
        .unwrap_or_default();

    let mut out = String::with_capacity(template.len() + fragment.len());
    out.push_str(&template[..content_start]);
    out.push('\n');
    out.push_str(fragment.trim_end());
    out.push('\n');
    out.push_str(closing_indent);
    out.push_str(&template[content_end..]);
    Some(out)
}

/// Stand-alone page used when the source has no template.
pub fn builtin_page(page: &PageConfig, fragment: &str) -> Markup {
    let content = html! {
        header.site-header {
            h1 { (page.title) }
            @if !page.intro.is_empty() {
                p.intro { (page.intro) }
            }
        }
        main {
            table.portfolio-table {
                thead {
                    tr {
                        th { "Organization" }
                        th { "Scope" }
                        th { "Focus" }
                        th { "Ratings" }
                        th { "Why we give" }
                    }
                }
                tbody {
                    "\n" (PreEscaped(fragment.trim_end())) "\n"
                }
            }
        }
    };
    base_document(&page.title, content)
}

fn base_document(title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) }
                link rel="stylesheet" href="styles.css";
            }
            body {
                (content)
            }
        }
    }
}
