//! Organization data loading.
//!
//! Stage 1 of the build. Reads the organizations CSV and produces the ordered
//! list of [`Organization`] records every later stage works from.
//!
//! ## Input Format
//!
//! ```text
//! Org,Class,Reason,Amount,Why,Summary,Website,EIN,CharityNavigator,GuideStar
//! Food Shelf,Local,food,5000,"Neighbors, fed.",Weekly groceries,foodshelf.org,,,
//! ```
//!
//! Columns are matched by header name, so their order does not matter and
//! extra columns are ignored. `Org` and `Class` must be present; every other
//! column is optional and an empty cell means "not provided".
//!
//! ## Validation
//!
//! These are fatal, since they mean the data file itself is wrong:
//! - A missing `Org` or `Class` header
//! - A row with an empty `Org`
//! - A `Class` that is not Local, National or Global
//!
//! Blank lines and rows where every cell is empty are skipped. An
//! organization may appear more than once (one row per grant); rows whose
//! names reduce to the same slug share one cached icon.
//!
//! ## Ordering
//!
//! The result is grouped Local → National → Global. Within a group the CSV
//! order is kept (stable sort), so editors control the order of the table by
//! ordering the spreadsheet.

use crate::naming::slugify;
use crate::types::{Classification, Organization};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Columns that must appear in the header row.
pub const REQUIRED_COLUMNS: [&str; 2] = ["Org", "Class"];

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Organization data not found: {0}")]
    NotFound(PathBuf),
    #[error("Missing required column {0:?} in CSV header")]
    MissingColumn(&'static str),
    #[error("Line {line}: required field {field:?} is empty")]
    MissingField { line: usize, field: &'static str },
    #[error("Line {line}: unrecognized Class {value:?} (expected Local, National or Global)")]
    UnknownClassification { line: usize, value: String },
}

/// Header positions of the known columns. `None` means the column is absent.
struct Columns {
    org: usize,
    class: usize,
    reason: Option<usize>,
    amount: Option<usize>,
    why: Option<usize>,
    summary: Option<usize>,
    website: Option<usize>,
    ein: Option<usize>,
    charity_navigator: Option<usize>,
    guidestar: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self, LoadError> {
        let find = |name: &str| headers.iter().position(|h| h == name);
        let required = |name: &'static str| find(name).ok_or(LoadError::MissingColumn(name));
        Ok(Self {
            org: required(REQUIRED_COLUMNS[0])?,
            class: required(REQUIRED_COLUMNS[1])?,
            reason: find("Reason"),
            amount: find("Amount"),
            why: find("Why"),
            summary: find("Summary"),
            website: find("Website"),
            ein: find("EIN"),
            charity_navigator: find("CharityNavigator"),
            guidestar: find("GuideStar"),
        })
    }
}

/// Cell text, empty when the row is shorter than the header.
fn cell(record: &csv::StringRecord, index: usize) -> &str {
    record.get(index).unwrap_or_default()
}

/// Optional cell: absent column, short row, and empty cell all mean `None`.
fn optional(record: &csv::StringRecord, index: Option<usize>) -> Option<String> {
    index
        .map(|i| cell(record, i))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Load and validate the organizations CSV at `path`.
pub fn load_organizations(path: &Path) -> Result<Vec<Organization>, LoadError> {
    if !path.is_file() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    let file = File::open(path)?;
    parse_organizations(file)
}

/// Parse organizations from any CSV source. See the module docs for rules.
pub fn parse_organizations<R: io::Read>(source: R) -> Result<Vec<Organization>, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(source);

    let headers = reader.headers()?.clone();
    let columns = Columns::from_headers(&headers)?;

    let mut organizations = Vec::new();

    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or_default();

        let name = cell(&record, columns.org).to_string();
        if name.is_empty() {
            return Err(LoadError::MissingField { line, field: "Org" });
        }
        let class = cell(&record, columns.class);
        let classification: Classification =
            class
                .parse()
                .map_err(|_| LoadError::UnknownClassification {
                    line,
                    value: class.to_string(),
                })?;

        let slug = slugify(&name);

        organizations.push(Organization {
            row: line,
            name,
            slug,
            classification,
            reason: optional(&record, columns.reason),
            amount: optional(&record, columns.amount),
            why: optional(&record, columns.why),
            summary: optional(&record, columns.summary),
            website: optional(&record, columns.website),
            ein: optional(&record, columns.ein),
            charity_navigator: optional(&record, columns.charity_navigator),
            guidestar: optional(&record, columns.guidestar),
        });
    }

    // Stable: CSV order survives within each classification.
    organizations.sort_by_key(|o| o.classification);
    Ok(organizations)
}
