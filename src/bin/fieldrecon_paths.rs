//! fieldrecon-paths: Show how one JSON document is flattened
//!
//! Prints the dot-joined field paths, the top-level null/empty map and the
//! array ownership map as one JSON object.
//!
//! Usage:
//!   fieldrecon-paths data.json
//!   fieldrecon-paths --json-path data.record --compact data.json

// Use MiMalloc allocator for better performance (recommended by simd-json)
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use fieldrecon::flatten::{load_document, navigate, FlattenConfig, PathFlattener};
use fieldrecon::logging;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "fieldrecon-paths")]
#[command(about = "Print the field paths of a JSON document", long_about = None)]
struct Args {
    /// Input file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Flatten only the sub-document at this dot path
    #[arg(long)]
    json_path: Option<String>,

    /// Keep letter case in array member names
    #[arg(long)]
    case_sensitive: bool,

    /// Compact output (no pretty-printing)
    #[arg(long)]
    compact: bool,

    /// Log filter (default: RUST_LOG or info)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_logging(args.log_level.as_deref())?;

    let document = load_document(&args.input)?;
    let value = match &args.json_path {
        Some(path) => navigate(&document.value, path)
            .with_context(|| format!("Path '{}' not found in {}", path, args.input.display()))?,
        None => &document.value,
    };

    let flattener = PathFlattener::new(FlattenConfig {
        case_sensitive: args.case_sensitive,
    });
    let flattened = flattener.flatten(value);

    // Sorted maps for stable output
    let null_categories: BTreeMap<&str, bool> = flattened.null_categories.iter().collect();
    let array_fields: BTreeMap<&str, &str> = flattened.array_fields.iter().collect();

    let mut output = Map::new();
    output.insert("file".into(), json!(document.path.display().to_string()));
    output.insert("encoding".into(), json!(document.encoding.name()));
    output.insert("repair".into(), json!(document.repair.map(|r| format!("{:?}", r))));
    output.insert("records".into(), json!(flattened.record_count));
    output.insert("paths".into(), json!(flattened.paths));
    output.insert("null_categories".into(), json!(null_categories));
    output.insert("array_fields".into(), json!(array_fields));
    let output = Value::Object(output);

    let text = if args.compact {
        serde_json::to_string(&output)?
    } else {
        serde_json::to_string_pretty(&output)?
    };
    println!("{}", text);

    Ok(())
}
