//! Result and statistics value objects
//!
//! Everything the engine hands to presentation or export lives here: the
//! per-comparison [`MatchRecord`], the finalized per-field [`FieldSummary`],
//! and the [`BatchReport`] produced at the end of a batch. Export to JSON Lines
//! is in [`writer`].

pub mod writer;

use crate::validate::{CatalogNameFinding, SpecialCharFinding};
use serde::{Serialize, Serializer};
use std::fmt;

pub use writer::ReportWriter;

/// How a catalog field was bound to a json field
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MatchKind {
    Exact,
    /// Similarity score in `[threshold, 1.0]`
    Fuzzy(f64),
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchKind::Exact => write!(f, "exact"),
            MatchKind::Fuzzy(score) => write!(f, "fuzzy:{:.2}", score),
        }
    }
}

impl Serialize for MatchKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Matched,
    /// Catalog field absent from the JSON
    UnmatchedInJson,
    /// JSON field not found under the catalog
    UnmatchedInDb,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Matched => "matched",
            MatchStatus::UnmatchedInJson => "unmatched_in_json",
            MatchStatus::UnmatchedInDb => "unmatched_in_db",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome for one field of one comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchRecord {
    Matched {
        db_name: String,
        json_name: String,
        kind: MatchKind,
    },
    UnmatchedInJson {
        db_name: String,
        category: Option<String>,
    },
    UnmatchedInDb {
        json_name: String,
    },
}

impl MatchRecord {
    pub fn status(&self) -> MatchStatus {
        match self {
            MatchRecord::Matched { .. } => MatchStatus::Matched,
            MatchRecord::UnmatchedInJson { .. } => MatchStatus::UnmatchedInJson,
            MatchRecord::UnmatchedInDb { .. } => MatchStatus::UnmatchedInDb,
        }
    }

    /// The catalog name, or the json name for fields not in the catalog.
    pub fn field_name(&self) -> &str {
        match self {
            MatchRecord::Matched { db_name, .. } => db_name,
            MatchRecord::UnmatchedInJson { db_name, .. } => db_name,
            MatchRecord::UnmatchedInDb { json_name } => json_name,
        }
    }

    /// `exact`, `fuzzy:<score>` or `not_found`.
    pub fn match_kind(&self) -> String {
        match self {
            MatchRecord::Matched { kind, .. } => kind.to_string(),
            _ => "not_found".to_string(),
        }
    }
}

/// Counts over one comparison's records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatchSummary {
    pub total: usize,
    pub matched: usize,
    pub exact: usize,
    pub fuzzy: usize,
    pub unmatched_in_json: usize,
    pub unmatched_in_db: usize,
}

impl MatchSummary {
    pub fn from_records(records: &[MatchRecord]) -> Self {
        let mut summary = MatchSummary {
            total: records.len(),
            ..Self::default()
        };
        for record in records {
            match record {
                MatchRecord::Matched { kind, .. } => {
                    summary.matched += 1;
                    match kind {
                        MatchKind::Exact => summary.exact += 1,
                        MatchKind::Fuzzy(_) => summary.fuzzy += 1,
                    }
                }
                MatchRecord::UnmatchedInJson { .. } => summary.unmatched_in_json += 1,
                MatchRecord::UnmatchedInDb { .. } => summary.unmatched_in_db += 1,
            }
        }
        summary
    }

    /// Matched share of all records, in percent.
    pub fn match_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.matched as f64 * 100.0 / self.total as f64
        }
    }
}

/// Files a field was missing from: the first `limit` names plus a total
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MissingFiles {
    pub shown: Vec<String>,
    pub total: usize,
}

impl MissingFiles {
    pub fn push(&mut self, file: impl Into<String>, limit: usize) {
        if self.shown.len() < limit {
            self.shown.push(file.into());
        }
        self.total += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Names not shown.
    pub fn more(&self) -> usize {
        self.total - self.shown.len()
    }
}

impl fmt::Display for MissingFiles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.shown.join(", "))?;
        if self.more() > 0 {
            write!(f, " and {} more", self.more())?;
        }
        Ok(())
    }
}

/// Finalized aggregate entry for one normalized field name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldSummary {
    /// Normalized comparison key
    pub key: String,
    pub field_name: String,
    pub status: MatchStatus,
    /// `Exact` when any match was exact, else the best fuzzy score
    pub kind: Option<MatchKind>,
    pub category: Option<String>,
    pub matched: usize,
    pub unmatched_in_json: usize,
    pub unmatched_in_db: usize,
    pub category_null: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_files: Option<MissingFiles>,
}

impl FieldSummary {
    pub fn match_kind(&self) -> String {
        match self.kind {
            Some(kind) if self.status == MatchStatus::Matched => kind.to_string(),
            _ => "not_found".to_string(),
        }
    }
}

/// Counter totals summed over every field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchTotals {
    pub matched: usize,
    pub unmatched_in_json: usize,
    pub unmatched_in_db: usize,
    pub category_null: usize,
}

/// All records of one file, retained for small batches
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileComparison {
    pub source_file: String,
    pub records: Vec<MatchRecord>,
    pub suppressed: Vec<String>,
}

impl FileComparison {
    pub fn summary(&self) -> MatchSummary {
        MatchSummary::from_records(&self.records)
    }

    pub fn rows(&self) -> impl Iterator<Item = ReportRow> + '_ {
        self.records.iter().map(move |record| ReportRow {
            field_name: record.field_name().to_string(),
            status: record.status(),
            match_kind: record.match_kind(),
            source_file: Some(self.source_file.clone()),
        })
    }
}

/// A file that could not be loaded or compared
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileFailure {
    pub source_file: String,
    /// `io`, `encoding` or `parse`
    pub kind: String,
    pub message: String,
}

/// Unmatched fields of one record of a multi-record file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordBreakdown {
    pub source_file: String,
    /// 1-based
    pub record_index: usize,
    pub missing_in_json: Vec<String>,
    pub not_in_catalog: Vec<String>,
}

/// One exported line
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    pub field_name: String,
    pub status: MatchStatus,
    pub match_kind: String,
    pub source_file: Option<String>,
}

/// Everything produced by one batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub fields: Vec<FieldSummary>,
    pub totals: BatchTotals,
    /// Per-file records; only kept at or below the streaming threshold
    pub files: Option<Vec<FileComparison>>,
    pub record_breakdowns: Vec<RecordBreakdown>,
    pub failures: Vec<FileFailure>,
    pub findings: Vec<SpecialCharFinding>,
    pub findings_dropped: usize,
    pub catalog_findings: Vec<CatalogNameFinding>,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cancelled: bool,
}

impl BatchReport {
    pub fn field(&self, key: &str) -> Option<&FieldSummary> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn count(&self, status: MatchStatus) -> usize {
        self.fields.iter().filter(|f| f.status == status).count()
    }

    /// Export rows: per file when per-file records were kept, else per field.
    pub fn rows(&self) -> Vec<ReportRow> {
        match &self.files {
            Some(files) => files.iter().flat_map(FileComparison::rows).collect(),
            None => self
                .fields
                .iter()
                .map(|field| ReportRow {
                    field_name: field.field_name.clone(),
                    status: field.status,
                    match_kind: field.match_kind(),
                    source_file: match (&field.missing_files, field.status) {
                        (Some(missing), MatchStatus::UnmatchedInJson) => Some(missing.to_string()),
                        _ => None,
                    },
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_match_kind_display() {
        assert_eq!(MatchKind::Exact.to_string(), "exact");
        assert_eq!(MatchKind::Fuzzy(16.0 / 18.0).to_string(), "fuzzy:0.89");
    }

    #[test]
    fn test_record_serialization() {
        let record = MatchRecord::Matched {
            db_name: "Clearence".into(),
            json_name: "clearance".into(),
            kind: MatchKind::Fuzzy(0.8889),
        };
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"status": "matched", "db_name": "Clearence", "json_name": "clearance", "kind": "fuzzy:0.89"})
        );

        let record = MatchRecord::UnmatchedInJson {
            db_name: "Species".into(),
            category: None,
        };
        assert_eq!(record.match_kind(), "not_found");
        assert_eq!(record.status().to_string(), "unmatched_in_json");
    }

    #[test]
    fn test_summary_from_records() {
        let records = vec![
            MatchRecord::Matched {
                db_name: "a".into(),
                json_name: "a".into(),
                kind: MatchKind::Exact,
            },
            MatchRecord::Matched {
                db_name: "b".into(),
                json_name: "bb".into(),
                kind: MatchKind::Fuzzy(0.9),
            },
            MatchRecord::UnmatchedInJson {
                db_name: "c".into(),
                category: Some("t".into()),
            },
            MatchRecord::UnmatchedInDb { json_name: "d".into() },
        ];
        let summary = MatchSummary::from_records(&records);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.matched, 2);
        assert_eq!(summary.exact, 1);
        assert_eq!(summary.fuzzy, 1);
        assert_eq!(summary.unmatched_in_json, 1);
        assert_eq!(summary.unmatched_in_db, 1);
        assert!((summary.match_rate() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_files_tail() {
        let mut missing = MissingFiles::default();
        for i in 0..13 {
            missing.push(format!("f{}.json", i), 10);
        }
        assert_eq!(missing.shown.len(), 10);
        assert_eq!(missing.total, 13);
        assert!(missing.to_string().ends_with("f9.json and 3 more"));

        let mut few = MissingFiles::default();
        few.push("a.json", 10);
        assert_eq!(few.to_string(), "a.json");
    }
}
