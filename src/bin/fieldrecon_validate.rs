//! fieldrecon-validate: Check JSON files for syntax and structural problems
//!
//! Exits with status 1 when any file is invalid.
//!
//! Usage:
//!   fieldrecon-validate data/
//!   fieldrecon-validate --json a.json b.json
//!   fieldrecon-validate --output validation.txt data/

// Use MiMalloc allocator for better performance (recommended by simd-json)
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use fieldrecon::validate::validate_batch;
use fieldrecon::{collect_json_files, logging};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fieldrecon-validate")]
#[command(about = "Validate JSON files before reconciliation", long_about = None)]
struct Args {
    /// JSON files or directories (scanned recursively for *.json)
    #[arg(value_name = "PATH", required = true)]
    inputs: Vec<PathBuf>,

    /// Print the results as JSON instead of a text report
    #[arg(long)]
    json: bool,

    /// Also save the report to this file
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Log filter (default: RUST_LOG or info)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_logging(args.log_level.as_deref())?;

    let files = collect_json_files(&args.inputs)?;
    if files.is_empty() {
        eprintln!("Warning: No JSON files found in input");
    }

    let results = validate_batch(&files);
    let text = if args.json {
        serde_json::to_string_pretty(&results)?
    } else {
        results.to_string()
    };

    if let Some(output) = &args.output {
        std::fs::write(output, &text)
            .with_context(|| format!("Failed to write report: {}", output.display()))?;
        eprintln!("Validation report saved to {}", output.display());
    }
    println!("{}", text);

    if results.invalid_files > 0 {
        std::process::exit(1);
    }
    Ok(())
}
