//! Structural checks of JSON files
//!
//! Runs before reconciliation to flag files that will not load, or that load
//! but have a shape worth a second look: empty roots, mixed array elements,
//! records with different key sets, very deep nesting and empty strings.

use crate::flatten::loader::decode_bytes;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Nesting beyond this many levels is reported
pub const MAX_NESTING_DEPTH: usize = 10;

/// Files above this size get a warning
pub const LARGE_FILE_BYTES: u64 = 100 * 1024 * 1024;

// Lines scanned for single-quoted strings when a parse fails
const QUOTE_SCAN_LINES: usize = 100;

/// JSON type of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonType {
    Object,
    Array,
    String,
    Number,
    Boolean,
    Null,
}

impl JsonType {
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Object(_) => JsonType::Object,
            Value::Array(_) => JsonType::Array,
            Value::String(_) => JsonType::String,
            Value::Number(_) => JsonType::Number,
            Value::Bool(_) => JsonType::Boolean,
            Value::Null => JsonType::Null,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JsonType::Object => "object",
            JsonType::Array => "array",
            JsonType::String => "string",
            JsonType::Number => "number",
            JsonType::Boolean => "boolean",
            JsonType::Null => "null",
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Facts gathered about one file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StructureInfo {
    pub file_size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syntax_valid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_type: Option<JsonType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array_element_type: Option<JsonType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_nesting_depth: Option<usize>,
    /// Hints for fixing a syntax error
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

/// Result of validating one file. Errors make it invalid; warnings do not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileValidation {
    pub file: String,
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub info: StructureInfo,
}

impl FileValidation {
    fn new(path: &Path) -> Self {
        FileValidation {
            file: path.display().to_string(),
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            info: StructureInfo::default(),
        }
    }

    fn fail(&mut self, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(message.into());
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// File name without directories.
    pub fn file_name(&self) -> &str {
        Path::new(&self.file)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.file)
    }
}

/// Results for a set of files
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchValidation {
    pub total_files: usize,
    pub valid_files: usize,
    pub invalid_files: usize,
    pub files_with_warnings: usize,
    pub details: Vec<FileValidation>,
}

impl BatchValidation {
    pub fn push(&mut self, result: FileValidation) {
        self.total_files += 1;
        if result.valid {
            self.valid_files += 1;
        } else {
            self.invalid_files += 1;
        }
        if result.has_warnings() {
            self.files_with_warnings += 1;
        }
        self.details.push(result);
    }
}

/// Validate one file. Problems are reported in the result, never as `Err`.
pub fn validate_file<P: AsRef<Path>>(path: P) -> FileValidation {
    let path = path.as_ref();
    let mut result = FileValidation::new(path);

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            result.fail(format!("File not found: {}", path.display()));
            return result;
        }
        Err(e) => {
            result.fail(format!("Cannot read file: {}", e));
            return result;
        }
    };

    result.info.file_size_bytes = bytes.len() as u64;
    if result.info.file_size_bytes > LARGE_FILE_BYTES {
        result.warnings.push(format!(
            "Large file size: {:.2} MB",
            result.info.file_size_bytes as f64 / (1024.0 * 1024.0)
        ));
    }

    let text = match decode_bytes(path, &bytes) {
        Ok((text, _)) => text,
        Err(e) => {
            result.fail(format!("Encoding error: {}", e));
            return result;
        }
    };

    if text.trim().is_empty() {
        result.fail("File is empty");
        return result;
    }

    let value = match serde_json::from_str::<Value>(&text) {
        Ok(value) => value,
        Err(e) => {
            result.info.syntax_valid = Some(false);
            result.fail(format!(
                "JSON syntax error at line {}, column {}: {}",
                e.line(),
                e.column(),
                error_message(&e)
            ));
            result.info.suggestions = syntax_suggestions(&text, &e);
            return result;
        }
    };
    result.info.syntax_valid = Some(true);

    check_structure(&value, &mut result);
    check_empty_strings(&value, "root", &mut result.warnings);
    result
}

/// Validate every file in order.
pub fn validate_batch<P: AsRef<Path>>(files: &[P]) -> BatchValidation {
    let mut batch = BatchValidation::default();
    for path in files {
        let result = validate_file(path);
        if result.valid {
            debug!(file = %result.file, warnings = result.warnings.len(), "file is valid JSON");
        } else {
            warn!(file = %result.file, errors = ?result.errors, "file failed validation");
        }
        batch.push(result);
    }
    info!(
        total = batch.total_files,
        valid = batch.valid_files,
        invalid = batch.invalid_files,
        with_warnings = batch.files_with_warnings,
        "validation finished"
    );
    batch
}

// serde_json appends " at line L column C" to its messages
fn error_message(error: &serde_json::Error) -> String {
    let full = error.to_string();
    match full.rfind(" at line ") {
        Some(index) => full[..index].to_string(),
        None => full,
    }
}

fn syntax_suggestions(text: &str, error: &serde_json::Error) -> Vec<String> {
    let message = error_message(error);
    let mut suggestions = Vec::new();

    if message.contains("key must be a string") {
        suggestions.push("Check for missing quotes around property names".to_string());
    }
    if message.contains("trailing comma") || message.contains("expected value") {
        suggestions.push("Check for trailing commas or missing values".to_string());
    }
    if message.contains("while parsing a string") {
        suggestions.push("Check for unclosed string quotes".to_string());
    }
    let problem_line = error.line().checked_sub(1).and_then(|i| text.lines().nth(i));
    if problem_line.map_or(false, |line| line.trim_end().ends_with(',')) {
        suggestions.push("Check for trailing comma before closing bracket".to_string());
    }
    if has_comment_marker(text) {
        suggestions.push("File may contain comments (not valid in JSON)".to_string());
    }
    if let Some(line) = single_quoted_line(text) {
        suggestions.push(format!(
            "Possible single quotes on line {} (JSON requires double quotes)",
            line
        ));
    }
    suggestions
}

/// `//` or `/*` outside string literals.
fn has_comment_marker(text: &str) -> bool {
    let mut in_string = false;
    let mut escaped = false;
    let mut previous = '\0';
    for c in text.chars() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
        } else if c == '"' {
            in_string = true;
        } else if previous == '/' && (c == '/' || c == '*') {
            return true;
        }
        previous = if in_string { '\0' } else { c };
    }
    false
}

/// First line (1-based) with a single quote and no double quote.
fn single_quoted_line(text: &str) -> Option<usize> {
    text.lines()
        .take(QUOTE_SCAN_LINES)
        .position(|line| line.contains('\'') && !line.contains('"'))
        .map(|index| index + 1)
}

fn check_structure(value: &Value, result: &mut FileValidation) {
    let info = &mut result.info;
    info.root_type = Some(JsonType::of(value));

    match value {
        Value::Object(map) => {
            info.field_count = Some(map.len());
            if map.is_empty() {
                result.warnings.push("Root object is empty".to_string());
            }
        }
        Value::Array(items) => {
            info.array_length = Some(items.len());
            match items.first() {
                None => result.warnings.push("Root array is empty".to_string()),
                Some(first) => {
                    let first_type = JsonType::of(first);
                    info.array_element_type = Some(first_type);
                    if items[1..].iter().any(|item| JsonType::of(item) != first_type) {
                        result.warnings.push("Array contains mixed element types".to_string());
                    }
                    if let Value::Object(first) = first {
                        let first_keys: HashSet<&str> = first.keys().map(String::as_str).collect();
                        let inconsistent = items[1..].iter().any(|item| match item {
                            Value::Object(map) => {
                                map.len() != first_keys.len()
                                    || map.keys().any(|key| !first_keys.contains(key.as_str()))
                            }
                            _ => false,
                        });
                        if inconsistent {
                            result
                                .warnings
                                .push("Array objects have inconsistent field sets".to_string());
                        }
                    }
                }
            }
        }
        _ => return,
    }

    let depth = nesting_depth(value, 0);
    result.info.max_nesting_depth = Some(depth);
    if depth > MAX_NESTING_DEPTH {
        result
            .warnings
            .push(format!("Deep nesting detected: {} levels", depth));
    }
}

fn nesting_depth(value: &Value, current: usize) -> usize {
    let children: Box<dyn Iterator<Item = &Value>> = match value {
        Value::Object(map) => Box::new(map.values()),
        Value::Array(items) => Box::new(items.iter()),
        _ => return current,
    };
    children
        .map(|child| nesting_depth(child, current + 1))
        .max()
        .unwrap_or(current)
}

/// Blank strings under object keys, reported by path (`root.a[0].b`).
fn check_empty_strings(value: &Value, path: &str, warnings: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let child_path = format!("{}.{}", path, key);
                match child {
                    Value::String(s) if s.trim().is_empty() => {
                        warnings.push(format!("Empty string at {}", child_path));
                    }
                    Value::Object(_) | Value::Array(_) => {
                        check_empty_strings(child, &child_path, warnings)
                    }
                    _ => {}
                }
            }
        }
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                if item.is_object() || item.is_array() {
                    check_empty_strings(item, &format!("{}[{}]", path, index), warnings);
                }
            }
        }
        _ => {}
    }
}

impl fmt::Display for BatchValidation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(80);
        let thin = "-".repeat(80);

        writeln!(f, "{}", rule)?;
        writeln!(f, "JSON VALIDATION REPORT")?;
        writeln!(f, "{}", rule)?;
        writeln!(f)?;
        writeln!(f, "SUMMARY")?;
        writeln!(f, "{}", thin)?;
        writeln!(f, "Total Files: {}", self.total_files)?;
        writeln!(f, "Valid Files: {}", self.valid_files)?;
        writeln!(f, "Invalid Files: {}", self.invalid_files)?;
        writeln!(f, "Files with Warnings: {}", self.files_with_warnings)?;

        if self.invalid_files > 0 {
            writeln!(f)?;
            writeln!(f, "INVALID FILES")?;
            writeln!(f, "{}", thin)?;
            for detail in self.details.iter().filter(|d| !d.valid) {
                writeln!(f, "File: {}", detail.file_name())?;
                writeln!(f, "  Path: {}", detail.file)?;
                writeln!(f, "  Errors:")?;
                for error in &detail.errors {
                    writeln!(f, "    - {}", error)?;
                }
            }
        }

        if self.files_with_warnings > 0 {
            writeln!(f)?;
            writeln!(f, "FILES WITH WARNINGS")?;
            writeln!(f, "{}", thin)?;
            for detail in self.details.iter().filter(|d| d.has_warnings()) {
                writeln!(f, "File: {}", detail.file_name())?;
                writeln!(f, "  Path: {}", detail.file)?;
                writeln!(f, "  Warnings:")?;
                for warning in &detail.warnings {
                    writeln!(f, "    - {}", warning)?;
                }
            }
        }

        writeln!(f)?;
        writeln!(f, "VALID FILES")?;
        writeln!(f, "{}", thin)?;
        for detail in self.details.iter().filter(|d| d.valid && !d.has_warnings()) {
            writeln!(f, "  ok {}", detail.file_name())?;
        }
        write!(f, "{}", rule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    fn check(content: &[u8]) -> FileValidation {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        fs::write(&path, content).unwrap();
        validate_file(&path)
    }

    #[test]
    fn test_valid_object() {
        let result = check(br#"{"a": 1, "b": {"c": "x"}}"#);
        assert!(result.valid);
        assert!(result.warnings.is_empty());
        assert_eq!(result.info.syntax_valid, Some(true));
        assert_eq!(result.info.root_type, Some(JsonType::Object));
        assert_eq!(result.info.field_count, Some(2));
        assert_eq!(result.info.max_nesting_depth, Some(2));
    }

    #[test]
    fn test_syntax_error_has_line_and_column() {
        let result = check(b"{\n  \"a\": 1,\n  \"b\": \n}");
        assert!(!result.valid);
        assert_eq!(result.info.syntax_valid, Some(false));
        assert!(result.errors[0].starts_with("JSON syntax error at line 4, column 1:"), "{}", result.errors[0]);
        assert!(!result.errors[0].contains(" at line 4 column"));
    }

    #[test]
    fn test_syntax_suggestions() {
        let result = check(b"{\n  \"a\": 1,\n}");
        assert!(result
            .info
            .suggestions
            .contains(&"Check for trailing commas or missing values".to_string()));

        let result = check(b"{\n  'a': 1\n}");
        assert!(result.info.suggestions.contains(&"Check for missing quotes around property names".to_string()));
        assert!(result
            .info
            .suggestions
            .contains(&"Possible single quotes on line 2 (JSON requires double quotes)".to_string()));

        let result = check(b"{\"url\": \"http://x\", // note\n}");
        assert!(result
            .info
            .suggestions
            .contains(&"File may contain comments (not valid in JSON)".to_string()));
    }

    #[test]
    fn test_comment_marker_ignores_strings() {
        assert!(!has_comment_marker(r#"{"url": "http://example.org/*"}"#));
        assert!(has_comment_marker("{\"a\": 1 /* one */}"));
        assert!(!has_comment_marker(r#"{"a": "\"//"}"#));
    }

    #[test]
    fn test_empty_and_missing_files() {
        let result = check(b"  \n ");
        assert_eq!(result.errors, vec!["File is empty"]);

        let result = validate_file("/no/such/dir/doc.json");
        assert!(!result.valid);
        assert!(result.errors[0].starts_with("File not found"));
    }

    #[test]
    fn test_encoding_error() {
        let result = check(&[0xFF, 0xFE, b'{', 0x00, b'}']);
        assert!(!result.valid);
        assert!(result.errors[0].starts_with("Encoding error"));
    }

    #[test]
    fn test_empty_roots() {
        assert_eq!(check(b"{}").warnings, vec!["Root object is empty"]);
        let result = check(b"[]");
        assert!(result.valid);
        assert_eq!(result.warnings, vec!["Root array is empty"]);
        assert_eq!(result.info.array_length, Some(0));
    }

    #[test]
    fn test_scalar_root() {
        let result = check(b"42");
        assert!(result.valid);
        assert_eq!(result.info.root_type, Some(JsonType::Number));
        assert_eq!(result.info.max_nesting_depth, None);
    }

    #[test]
    fn test_mixed_element_types() {
        let result = check(br#"[{"a": 1}, 2]"#);
        assert_eq!(result.info.array_element_type, Some(JsonType::Object));
        assert_eq!(result.warnings, vec!["Array contains mixed element types"]);
    }

    #[test]
    fn test_inconsistent_record_keys() {
        let result = check(br#"[{"a": 1, "b": 2}, {"b": 3, "a": 4}, {"a": 5}]"#);
        assert_eq!(result.warnings, vec!["Array objects have inconsistent field sets"]);

        let result = check(br#"[{"a": 1, "b": 2}, {"b": 3, "a": 4}]"#);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_deep_nesting() {
        let mut value = json!("leaf");
        for _ in 0..11 {
            value = json!({ "n": value });
        }
        let result = check(value.to_string().as_bytes());
        assert_eq!(result.info.max_nesting_depth, Some(11));
        assert_eq!(result.warnings, vec!["Deep nesting detected: 11 levels"]);

        let mut value = json!("leaf");
        for _ in 0..10 {
            value = json!({ "n": value });
        }
        assert!(check(value.to_string().as_bytes()).warnings.is_empty());
    }

    #[test]
    fn test_empty_strings_by_path() {
        let result = check(br#"{"a": " ", "b": [{"c": ""}, "  "], "d": "x"}"#);
        assert!(result.valid);
        assert_eq!(result.warnings, vec!["Empty string at root.a", "Empty string at root.b[0].c"]);
    }

    #[test]
    fn test_batch_summary_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.json");
        let warned = dir.path().join("warned.json");
        let bad = dir.path().join("bad.json");
        fs::write(&good, r#"{"a": 1}"#).unwrap();
        fs::write(&warned, "[]").unwrap();
        fs::write(&bad, "{").unwrap();

        let batch = validate_batch(&[&good, &warned, &bad]);
        assert_eq!(batch.total_files, 3);
        assert_eq!(batch.valid_files, 2);
        assert_eq!(batch.invalid_files, 1);
        assert_eq!(batch.files_with_warnings, 1);

        let text = batch.to_string();
        assert!(text.contains("Invalid Files: 1"));
        assert!(text.contains("File: bad.json"));
        assert!(text.contains("    - Root array is empty"));
        assert!(text.contains("  ok good.json"));
        assert!(!text.contains("  ok warned.json"));

        let exported = serde_json::to_value(&batch).unwrap();
        assert_eq!(exported["details"][1]["info"]["root_type"], "array");
    }
}
