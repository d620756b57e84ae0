use crate::models::ListingRecord;
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default filename root for persisted captures.
pub const DEFAULT_ROOT: &str = "job-listings";

/// Fixed columns present in every capture, ahead of whatever metadata
/// fields the run collected.
const FIXED_COLUMNS: [&str; 6] = [
    "url",
    "error",
    "error_message",
    "overview",
    "qualifications",
    "responsibilities",
];

/// A finished scrape, held as an ordered table of listing records.
///
/// Captures are written as `{root}_{YYYY-MM-DD}_{revision:04}.json`, the
/// revision incrementing per calendar day so same-day runs never
/// overwrite each other.
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    records: Vec<ListingRecord>,
}

/// On-disk layout: explicit column list plus indexed rows.
#[derive(Serialize, Deserialize)]
struct CaptureFile {
    columns: Vec<String>,
    rows: Vec<CaptureRow>,
}

#[derive(Serialize, Deserialize)]
struct CaptureRow {
    index: usize,
    #[serde(flatten)]
    record: ListingRecord,
}

impl Capture {
    pub fn new(records: Vec<ListingRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ListingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows whose extraction failed.
    pub fn error_count(&self) -> usize {
        self.records.iter().filter(|r| r.error).count()
    }

    /// Write the capture into `output_dir` under today's next free
    /// revision and return the full path.
    pub fn to_disk(&self, output_dir: &Path, root: &str) -> Result<PathBuf> {
        let today = Local::now().date_naive();
        let revision = next_revision(output_dir, root, today)?;
        let path = output_dir.join(format!("{root}_{today}_{revision:04}.json"));

        let file = CaptureFile {
            columns: self.columns(),
            rows: self
                .records
                .iter()
                .cloned()
                .enumerate()
                .map(|(index, record)| CaptureRow { index, record })
                .collect(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write capture to {}", path.display()))?;

        info!("💾 Saved {} row(s) to {}", self.records.len(), path.display());
        Ok(path)
    }

    /// Reload a previously persisted capture for offline inspection.
    pub fn from_disk(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read capture {}", path.display()))?;
        let file: CaptureFile = serde_json::from_str(&raw)
            .with_context(|| format!("Capture {} is not a valid table", path.display()))?;

        let mut rows = file.rows;
        rows.sort_by_key(|r| r.index);
        Ok(Self {
            records: rows.into_iter().map(|r| r.record).collect(),
        })
    }

    /// Fixed columns first, then every metadata field seen in any row.
    fn columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = FIXED_COLUMNS.iter().map(|c| c.to_string()).collect();
        let metadata: BTreeSet<&String> =
            self.records.iter().flat_map(|r| r.metadata.keys()).collect();
        columns.extend(metadata.into_iter().cloned());
        columns
    }
}

/// Next free revision for `date`: one past the highest already on disk,
/// starting at 1 on a day with no prior captures.
fn next_revision(dir: &Path, root: &str, date: NaiveDate) -> Result<u32> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Output directory {} is not readable", dir.display()))?;

    let mut highest = 0;
    for entry in entries {
        let name = entry?.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some((file_date, revision)) = parse_capture_name(name, root) {
            if file_date == date {
                highest = highest.max(revision);
            }
        }
    }

    Ok(highest + 1)
}

/// Split `{root}_{date}_{revision}.json`; foreign filenames yield None.
fn parse_capture_name(name: &str, root: &str) -> Option<(NaiveDate, u32)> {
    let rest = name
        .strip_suffix(".json")?
        .strip_prefix(root)?
        .strip_prefix('_')?;
    let (date_str, revision_str) = rest.rsplit_once('_')?;
    let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").ok()?;
    let revision = revision_str.parse().ok()?;
    Some((date, revision))
}
