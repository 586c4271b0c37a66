use super::stats::FieldStats;
use crate::catalog::{Catalog, CategoryMap};
use crate::error::{ReconError, Result};
use crate::flatten::{load_document, navigate, FlattenConfig, FlattenedDocument, LoadedDocument, PathFlattener};
use crate::matching::{MatchConfig, MatchEngine};
use crate::report::{
    BatchReport, FileComparison, FileFailure, MatchRecord, MatchSummary, RecordBreakdown,
};
use crate::validate::{validate_catalog_names, SpecialCharFinding, SpecialCharValidator, ValidationContext};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Batch configuration
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub matching: MatchConfig,
    /// Above this many files, per-file records are not retained
    pub streaming_threshold: usize,
    /// Above this many files, the field-list cache is cleared every 100 files
    pub very_large_threshold: usize,
    /// Missing-file names shown per field
    pub missing_files_display_limit: usize,
    /// Compare each record of multi-record files on its own
    pub record_breakdown: bool,
    /// Run special-character validation on field values
    pub validate_values: bool,
    /// Compare only the sub-document at this dot path
    pub json_path: Option<String>,
    /// Cap on retained special-character findings
    pub max_findings: Option<usize>,
    /// Cap on retained failure details
    pub max_failure_details: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        BatchConfig {
            matching: MatchConfig::default(),
            streaming_threshold: 1000,
            very_large_threshold: 50_000,
            missing_files_display_limit: 10,
            record_breakdown: true,
            validate_values: true,
            json_path: None,
            max_findings: None,
            max_failure_details: 1000,
        }
    }
}

/// How often a human-readable status line is emitted.
pub fn progress_interval(total: usize) -> usize {
    match total {
        t if t > 50_000 => 5000,
        t if t > 10_000 => 100,
        t if t > 1000 => 50,
        _ => 10,
    }
}

/// Catalog side of a batch plus the engine, validator and flattener
#[derive(Debug, Clone)]
pub struct StreamAggregator {
    config: BatchConfig,
    engine: MatchEngine,
    flattener: PathFlattener,
    validator: SpecialCharValidator,
    db_fields: Vec<String>,
    categories: CategoryMap,
}

impl StreamAggregator {
    /// Build an aggregator for one database, or for every database when `database` is `None`.
    pub fn new(catalog: &Catalog, database: Option<&str>, config: BatchConfig) -> Result<Self> {
        let (db_fields, categories, keywords) = match database {
            Some(name) => {
                if catalog.database(name).is_none() {
                    return Err(ReconError::Configuration(format!(
                        "database '{}' is not in the catalog (known: {})",
                        name,
                        catalog.database_names().join(", ")
                    )));
                }
                (
                    catalog.fields(name),
                    catalog.category_map(name),
                    catalog.excluded_keywords(name).to_vec(),
                )
            }
            None => (catalog.all_fields(), catalog.combined_category_map(), Vec::new()),
        };

        if db_fields.is_empty() {
            return Err(ReconError::Configuration(
                "catalog has no fields to compare".to_string(),
            ));
        }

        Ok(Self::from_parts(db_fields, categories, keywords, config))
    }

    pub fn from_parts(
        db_fields: Vec<String>,
        categories: CategoryMap,
        excluded_keywords: Vec<String>,
        config: BatchConfig,
    ) -> Self {
        let flattener = PathFlattener::new(FlattenConfig {
            case_sensitive: config.matching.case_sensitive,
        });
        StreamAggregator {
            engine: MatchEngine::new(config.matching.clone()),
            flattener,
            validator: SpecialCharValidator::new(excluded_keywords),
            db_fields,
            categories,
            config,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn db_fields(&self) -> &[String] {
        &self.db_fields
    }

    /// Start a batch of `total` files.
    pub fn begin(&self, total: usize) -> BatchRun<'_> {
        let streaming = total > self.config.streaming_threshold;
        let cache_clear_interval = if total > self.config.very_large_threshold {
            100
        } else {
            500
        };
        info!(
            files = total,
            fields = self.db_fields.len(),
            streaming,
            "starting batch"
        );

        BatchRun {
            aggregator: self,
            total,
            streaming,
            stats: FieldStats::new(
                &self.categories,
                self.config.matching.case_sensitive,
                self.config.missing_files_display_limit,
            ),
            files: (!streaming).then(Vec::new),
            record_breakdowns: Vec::new(),
            failures: Vec::new(),
            validation: match self.config.max_findings {
                Some(limit) => ValidationContext::with_limit(limit),
                None => ValidationContext::new(),
            },
            field_cache: HashMap::new(),
            cache_clear_interval,
            processed: 0,
            succeeded: 0,
            failed: 0,
        }
    }
}

/// Everything one file contributed to a run
#[derive(Debug, Clone)]
struct CachedFile {
    flattened: FlattenedDocument,
    findings: Vec<SpecialCharFinding>,
    breakdowns: Vec<RecordBreakdown>,
}

/// State of one batch in progress, owned by the thread running it
pub struct BatchRun<'a> {
    aggregator: &'a StreamAggregator,
    total: usize,
    streaming: bool,
    stats: FieldStats,
    files: Option<Vec<FileComparison>>,
    record_breakdowns: Vec<RecordBreakdown>,
    failures: Vec<FileFailure>,
    validation: ValidationContext,
    /// Per-file contributions by path, replayed when a path repeats
    field_cache: HashMap<PathBuf, CachedFile>,
    cache_clear_interval: usize,
    processed: usize,
    succeeded: usize,
    failed: usize,
}

impl<'a> BatchRun<'a> {
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Files currently held in the field cache.
    pub fn cached_files(&self) -> usize {
        self.field_cache.len()
    }

    /// Load and compare one file. A failure is recorded and returned; the run continues.
    pub fn process_file(&mut self, path: &Path) -> Result<MatchSummary> {
        self.processed += 1;
        if self.processed % self.cache_clear_interval == 0 && !self.field_cache.is_empty() {
            debug!(entries = self.field_cache.len(), "clearing field-list cache");
            self.field_cache.clear();
        }

        if let Some(cached) = self.field_cache.get(path).cloned() {
            let summary = self.compare_flattened(&file_label(path), &cached.flattened);
            for finding in cached.findings {
                self.validation.push(finding);
            }
            self.record_breakdowns.extend(cached.breakdowns);
            self.succeeded += 1;
            return Ok(summary);
        }

        let outcome = load_document(path).and_then(|document| self.compare_document(&document));
        match outcome {
            Ok((summary, cached)) => {
                self.field_cache.insert(path.to_path_buf(), cached);
                self.succeeded += 1;
                Ok(summary)
            }
            Err(err) => {
                self.record_failure(path, &err);
                Err(err)
            }
        }
    }

    /// Compare an already loaded document.
    pub fn process_document(&mut self, document: &LoadedDocument) -> Result<MatchSummary> {
        self.processed += 1;
        match self.compare_document(document) {
            Ok((summary, _)) => {
                self.succeeded += 1;
                Ok(summary)
            }
            Err(err) => {
                self.record_failure(&document.path, &err);
                Err(err)
            }
        }
    }

    fn compare_document(&mut self, document: &LoadedDocument) -> Result<(MatchSummary, CachedFile)> {
        let aggregator = self.aggregator;
        let label = file_label(&document.path);

        let value = match &aggregator.config.json_path {
            Some(json_path) => navigate(&document.value, json_path).ok_or_else(|| ReconError::Parse {
                path: document.path.clone(),
                message: format!("json path '{}' not found", json_path),
            })?,
            None => &document.value,
        };

        let flattened = aggregator.flattener.flatten(value);
        if flattened.paths.is_empty() {
            debug!(file = %label, "document has no fields");
        }

        let mut findings = ValidationContext::new();
        if aggregator.config.validate_values {
            aggregator.validator.validate_document(
                value,
                &flattened.paths,
                &document.text,
                &label,
                &mut findings,
            );
        }
        let findings = findings.into_findings();
        for finding in &findings {
            self.validation.push(finding.clone());
        }

        let summary = self.compare_flattened(&label, &flattened);

        let breakdowns = match value {
            Value::Array(records) if aggregator.config.record_breakdown && !self.streaming => {
                self.breakdown_records(&label, records)
            }
            _ => Vec::new(),
        };
        self.record_breakdowns.extend(breakdowns.iter().cloned());

        Ok((
            summary,
            CachedFile {
                flattened,
                findings,
                breakdowns,
            },
        ))
    }

    fn compare_flattened(&mut self, label: &str, flattened: &FlattenedDocument) -> MatchSummary {
        let aggregator = self.aggregator;
        let comparison = aggregator.engine.compare_detailed(
            &aggregator.db_fields,
            &flattened.paths,
            &aggregator.categories,
            &flattened.null_categories,
            &flattened.array_fields,
        );
        let summary = MatchSummary::from_records(&comparison.records);

        if summary.matched == 0 && !flattened.paths.is_empty() {
            warn!(
                file = label,
                fields = flattened.paths.len(),
                "fields extracted but none matched"
            );
        }

        self.stats.record(&comparison, label);
        if let Some(files) = self.files.as_mut() {
            files.push(FileComparison {
                source_file: label.to_string(),
                records: comparison.records,
                suppressed: comparison.suppressed,
            });
        }
        summary
    }

    /// Compare each record of a multi-record file on its own.
    fn breakdown_records(&self, label: &str, records: &[Value]) -> Vec<RecordBreakdown> {
        let mut breakdowns = Vec::new();
        if records.len() < 2 {
            return breakdowns;
        }
        let aggregator = self.aggregator;
        let case_sensitive = aggregator.config.matching.case_sensitive;

        for (index, record) in records.iter().enumerate() {
            let Value::Object(record) = record else {
                continue;
            };
            let mut flattened = aggregator.flattener.flatten_record(record);
            flattened
                .array_fields
                .extend_from_catalog(record, aggregator.categories.iter(), case_sensitive);

            let results = aggregator.engine.compare(
                &aggregator.db_fields,
                &flattened.paths,
                &aggregator.categories,
                &flattened.null_categories,
                &flattened.array_fields,
            );

            let mut breakdown = RecordBreakdown {
                source_file: label.to_string(),
                record_index: index + 1,
                missing_in_json: Vec::new(),
                not_in_catalog: Vec::new(),
            };
            for result in results {
                match result {
                    MatchRecord::UnmatchedInJson { db_name, .. } => breakdown.missing_in_json.push(db_name),
                    MatchRecord::UnmatchedInDb { json_name } => breakdown.not_in_catalog.push(json_name),
                    MatchRecord::Matched { .. } => {}
                }
            }
            if !breakdown.missing_in_json.is_empty() || !breakdown.not_in_catalog.is_empty() {
                breakdowns.push(breakdown);
            }
        }
        breakdowns
    }

    fn record_failure(&mut self, path: &Path, err: &ReconError) {
        self.failed += 1;
        warn!(file = %path.display(), kind = err.kind(), error = %err, "file failed");
        if self.failures.len() < self.aggregator.config.max_failure_details {
            self.failures.push(FileFailure {
                source_file: path.display().to_string(),
                kind: err.kind().to_string(),
                message: err.to_string(),
            });
        }
    }

    /// Finalize the statistics and build the report.
    pub fn finish(self, cancelled: bool) -> BatchReport {
        let aggregator = self.aggregator;
        let totals = self.stats.totals();
        let fields = self.stats.finalize();
        let findings_dropped = self.validation.dropped();

        let report = BatchReport {
            fields,
            totals,
            files: self.files,
            record_breakdowns: self.record_breakdowns,
            failures: self.failures,
            findings: self.validation.into_findings(),
            findings_dropped,
            catalog_findings: validate_catalog_names(&aggregator.db_fields),
            processed: self.processed,
            succeeded: self.succeeded,
            failed: self.failed,
            cancelled,
        };

        info!(
            processed = report.processed,
            succeeded = report.succeeded,
            failed = report.failed,
            matched = report.totals.matched,
            missing_in_json = report.totals.unmatched_in_json,
            not_in_catalog = report.totals.unmatched_in_db,
            cancelled,
            "batch finished"
        );
        report
    }
}

/// File name used in reports.
fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
