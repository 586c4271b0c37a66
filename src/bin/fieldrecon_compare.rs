//! fieldrecon-compare: Reconcile catalog fields against a corpus of JSON files
//!
//! Usage:
//!   # Compare every JSON file under a directory against one database
//!   fieldrecon-compare --catalog catalog.json --database "ADME Database" data/
//!
//!   # Stricter fuzzy matching, export rows as JSON Lines
//!   fieldrecon-compare --catalog catalog.json --threshold 0.9 --output report.jsonl a.json b.json
//!
//!   # Compare only the sub-document under "data.record"
//!   fieldrecon-compare --catalog catalog.json --json-path data.record data/

// Use MiMalloc allocator for better performance (recommended by simd-json)
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use fieldrecon::aggregate::{spawn_batch, BatchConfig, StreamAggregator, TracingObserver};
use fieldrecon::catalog::Catalog;
use fieldrecon::matching::MatchConfig;
use fieldrecon::report::{BatchReport, MatchStatus, ReportWriter};
use fieldrecon::{collect_json_files, logging};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fieldrecon-compare")]
#[command(about = "Reconcile catalog fields against JSON documents", long_about = None)]
struct Args {
    /// JSON files or directories (scanned recursively for *.json)
    #[arg(value_name = "PATH", required = true)]
    inputs: Vec<PathBuf>,

    /// Catalog file with databases and their fields
    #[arg(long, short = 'c')]
    catalog: PathBuf,

    /// Database to compare against (default: every database in the catalog)
    #[arg(long, short = 'd')]
    database: Option<String>,

    /// Minimum similarity for a fuzzy match
    #[arg(long, default_value_t = 0.8)]
    threshold: f64,

    /// Only accept exact matches after normalization
    #[arg(long)]
    no_fuzzy: bool,

    /// Keep letter case when comparing names
    #[arg(long)]
    case_sensitive: bool,

    /// Compare only the sub-document at this dot path
    #[arg(long)]
    json_path: Option<String>,

    /// Skip special-character validation of field values
    #[arg(long)]
    no_validate: bool,

    /// Keep at most this many special-character findings
    #[arg(long)]
    max_findings: Option<usize>,

    /// Above this many files, per-file records are not retained
    #[arg(long, default_value_t = 1000)]
    streaming_threshold: usize,

    /// Write report rows as JSON Lines to this file
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Print the full report as JSON instead of a summary
    #[arg(long)]
    json: bool,

    /// Log filter, e.g. "debug" or "fieldrecon=trace" (default: RUST_LOG or info)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_logging(args.log_level.as_deref())?;

    if !(0.0..=1.0).contains(&args.threshold) {
        bail!("--threshold must be between 0 and 1, got {}", args.threshold);
    }

    let catalog = Catalog::load(&args.catalog)
        .with_context(|| format!("Failed to load catalog: {}", args.catalog.display()))?;

    let config = BatchConfig {
        matching: MatchConfig {
            case_sensitive: args.case_sensitive,
            fuzzy: !args.no_fuzzy,
            threshold: args.threshold,
        },
        streaming_threshold: args.streaming_threshold,
        validate_values: !args.no_validate,
        json_path: args.json_path.clone(),
        max_findings: args.max_findings,
        ..BatchConfig::default()
    };
    let aggregator = StreamAggregator::new(&catalog, args.database.as_deref(), config)?;

    let files = collect_json_files(&args.inputs)?;
    if files.is_empty() {
        eprintln!("Warning: No JSON files found in input");
    }

    let handle = spawn_batch(aggregator, files, TracingObserver);
    let report = handle.join()?;

    if let Some(output) = &args.output {
        let mut writer = ReportWriter::create(output)?;
        writer.write_report(&report)?;
        eprintln!("Wrote {} lines to {}", writer.rows_written(), output.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    Ok(())
}

fn print_summary(report: &BatchReport) {
    println!(
        "Files: {} processed, {} succeeded, {} failed{}",
        report.processed,
        report.succeeded,
        report.failed,
        if report.cancelled { " (cancelled)" } else { "" }
    );
    println!(
        "Fields: {} matched, {} missing in JSON, {} not found under catalog",
        report.count(MatchStatus::Matched),
        report.count(MatchStatus::UnmatchedInJson),
        report.count(MatchStatus::UnmatchedInDb),
    );

    for field in &report.fields {
        match field.status {
            MatchStatus::Matched => {}
            MatchStatus::UnmatchedInJson => match &field.missing_files {
                Some(missing) => println!("  missing   {} (in: {})", field.field_name, missing),
                None => println!("  missing   {}", field.field_name),
            },
            MatchStatus::UnmatchedInDb => println!("  unknown   {}", field.field_name),
        }
    }

    for failure in &report.failures {
        println!("  failed    {} [{}]: {}", failure.source_file, failure.kind, failure.message);
    }

    if !report.findings.is_empty() {
        println!("Special characters: {} finding(s)", report.findings.len() + report.findings_dropped);
        for finding in &report.findings {
            let chars: String = finding.special_chars.iter().collect();
            match finding.line_number {
                Some(line) => println!(
                    "  {}:{} {} [{}]",
                    finding.source_file, line, finding.path, chars
                ),
                None => println!("  {} {} [{}]", finding.source_file, finding.path, chars),
            }
        }
    }

    for finding in &report.catalog_findings {
        let chars: String = finding.special_chars.iter().collect();
        println!("  catalog   {} [{}]", finding.field, chars);
    }
}
