//! # fieldrecon - Field-Name Reconciliation
//!
//! Reconciles a catalog of expected field names against the field names that
//! actually occur in a corpus of JSON documents.
//!
//! ## Modules
//!
//! - **normalize**: Comparison keys for field and category names
//! - **catalog**: Expected fields grouped by database and category
//! - **flatten**: Document loading and field-path flattening
//! - **matching**: Exact and fuzzy matching with null/array suppression
//! - **validate**: Special-character validation of field values and structural file checks
//! - **aggregate**: Streaming aggregation across many files
//! - **report**: Result value objects and JSON Lines export
//!
//! ## Quick Start
//!
//! ```rust
//! use fieldrecon::catalog::CategoryMap;
//! use fieldrecon::flatten::PathFlattener;
//! use fieldrecon::matching::MatchEngine;
//! use serde_json::json;
//!
//! let document = json!({
//!     "molstructure": "C1=CC=CC=C1",
//!     "compound_id": "X1",
//!     "bioactivity": []
//! });
//!
//! let flattened = PathFlattener::default().flatten(&document);
//! let categories: CategoryMap = vec![("Measure", "bioactivity")].into_iter().collect();
//!
//! let records = MatchEngine::default().compare(
//!     &["MolStructure", "CompoundID", "Species", "Measure"],
//!     &flattened.paths,
//!     &categories,
//!     &flattened.null_categories,
//!     &flattened.array_fields,
//! );
//!
//! // MolStructure and CompoundID match exactly, Species is missing and
//! // "bioactivity" is not in the catalog. Measure is suppressed because its
//! // category is empty.
//! assert_eq!(records.len(), 4);
//! ```

use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub mod aggregate;
pub mod catalog;
pub mod error;
pub mod flatten;
pub mod logging;
pub mod matching;
pub mod normalize;
pub mod report;
pub mod validate;

// Re-export commonly used types for convenience
pub use aggregate::{
    run_batch, spawn_batch, BatchConfig, BatchHandle, BatchObserver, CancelToken, StreamAggregator,
    TracingObserver,
};
pub use catalog::{Catalog, CatalogNode, CategoryMap};
pub use error::{ReconError, Result};
pub use flatten::{load_document, FlattenedDocument, PathFlattener};
pub use matching::{MatchConfig, MatchEngine};
pub use normalize::{normalize_category, normalize_field};
pub use report::{BatchReport, MatchKind, MatchRecord, MatchStatus, MatchSummary, ReportWriter};
pub use validate::{validate_batch, validate_file, BatchValidation, SpecialCharValidator, ValidationContext};

/// Main entry point: reconcile a catalog database against JSON files on the current thread
pub fn reconcile_files(
    catalog: &Catalog,
    database: Option<&str>,
    files: &[PathBuf],
    config: BatchConfig,
) -> Result<BatchReport> {
    let aggregator = StreamAggregator::new(catalog, database, config)?;
    Ok(run_batch(&aggregator, files, &TracingObserver, &CancelToken::new()))
}

/// Expand inputs into JSON files: files are kept, directories are scanned
/// recursively for `*.json`. Symbolic links inside a directory are not
/// followed. The result is sorted and de-duplicated.
pub fn collect_json_files<P: AsRef<Path>>(inputs: &[P]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        let input = input.as_ref();
        if input.is_dir() {
            scan_dir(input, &mut files)?;
        } else {
            files.push(input.to_path_buf());
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn scan_dir(root: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|err| ReconError::Io {
            path: err.path().unwrap_or(root).to_path_buf(),
            source: err.into(),
        })?;
        let is_json = entry
            .path()
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
        if entry.file_type().is_file() && is_json {
            out.push(entry.into_path());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    #[test]
    fn test_reconcile_files() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        fs::create_dir(&nested).unwrap();
        fs::write(dir.path().join("a.json"), r#"{"compound_id": "1", "species": "rat"}"#).unwrap();
        fs::write(nested.join("b.JSON"), r#"{"compound_id": "2"}"#).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let files = collect_json_files(&[dir.path()]).unwrap();
        assert_eq!(files.len(), 2);

        let catalog = Catalog::from_value(&json!({
            "databases": {"ADME": {"pk": ["CompoundID", "Species"]}}
        }))
        .unwrap();
        let report = reconcile_files(&catalog, Some("ADME"), &files, BatchConfig::default()).unwrap();

        assert_eq!(report.succeeded, 2);
        assert_eq!(report.field("compoundid").unwrap().matched, 2);
        let species = report.field("species").unwrap();
        assert_eq!(species.status, MatchStatus::Matched);
        assert_eq!(species.missing_files.as_ref().unwrap().shown, vec!["b.JSON"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_collect_does_not_follow_directory_links() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        std::os::unix::fs::symlink(dir.path(), dir.path().join("loop")).unwrap();

        let files = collect_json_files(&[dir.path()]).unwrap();
        assert_eq!(files, vec![dir.path().join("a.json")]);
    }

    #[test]
    fn test_collect_keeps_explicit_files() {
        let files = collect_json_files(&["b.json", "a.json", "b.json"]).unwrap();
        assert_eq!(files, vec![PathBuf::from("a.json"), PathBuf::from("b.json")]);
    }
}
