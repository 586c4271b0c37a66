//! Special-character validation of field values and catalog names
//!
//! Structural checks of whole files live in [`structure`].

pub mod structure;

pub use structure::{validate_batch, validate_file, BatchValidation, FileValidation, JsonType, StructureInfo};

use crate::normalize::{leaf_name, normalize_field};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

// Characters allowed in values: letters, digits, whitespace and _ - . ( ) , : ; " '
static VALUE_ALLOWED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^[a-zA-Z0-9\s_\-.(),:;"']$"#).unwrap()
});

// Catalog names are stricter: no , : ; or quotes
static NAME_ALLOWED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9\s_\-.()]$").unwrap()
});

/// Notation fields that are expected to contain symbols.
pub const DEFAULT_EXCLUSIONS: &[&str] = &[
    "helm",
    "helms",
    "helmnotation",
    "helm_notation",
    "molstructure",
    "molstructure_smiles",
    "molstructuresmiles",
    "smiles",
    "smile",
    "smiles_notation",
    "smilesnotation",
    "fragment_similarity",
    "fragmentsimilarity",
    "fragment_similarity_smiles",
    "fragmentsimilaritysmiles",
    "pbm_smiles",
    "ubm_smiles",
    "pd_smiles",
    "photolabile_smiles",
    "modification_in_smiles",
    "modificationinsmiles",
    "parameters",
    "parameter",
];

const SAMPLE_CHARS: usize = 100;
const LINE_SEARCH_CHARS: usize = 50;

/// Distinct characters outside the value allow-list, in first-seen order.
pub fn find_special_chars(value: &str) -> Vec<char> {
    disallowed(value, &VALUE_ALLOWED)
}

fn disallowed(text: &str, allowed: &Regex) -> Vec<char> {
    let mut found = Vec::new();
    let mut buf = [0u8; 4];
    for c in text.chars() {
        if !allowed.is_match(c.encode_utf8(&mut buf)) && !found.contains(&c) {
            found.push(c);
        }
    }
    found
}

/// A string value containing characters outside the allow-list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpecialCharFinding {
    pub path: String,
    pub special_chars: Vec<char>,
    /// First 100 characters of the value
    pub sample_value: String,
    pub source_file: String,
    pub line_number: Option<usize>,
}

/// A catalog field name containing characters outside the name allow-list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogNameFinding {
    pub field: String,
    pub special_chars: Vec<char>,
}

/// Accumulates findings across documents for one run.
///
/// The caller owns the context: create it, pass it to each validation call,
/// read the findings, then `clear` it or drop it before the next run.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    findings: Vec<SpecialCharFinding>,
    limit: Option<usize>,
    dropped: usize,
}

impl ValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` findings; further ones are only counted.
    pub fn with_limit(limit: usize) -> Self {
        ValidationContext {
            limit: Some(limit),
            ..Self::default()
        }
    }

    pub fn push(&mut self, finding: SpecialCharFinding) {
        match self.limit {
            Some(limit) if self.findings.len() >= limit => self.dropped += 1,
            _ => self.findings.push(finding),
        }
    }

    pub fn findings(&self) -> &[SpecialCharFinding] {
        &self.findings
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Findings discarded because the limit was reached.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn clear(&mut self) {
        self.findings.clear();
        self.dropped = 0;
    }

    pub fn into_findings(self) -> Vec<SpecialCharFinding> {
        self.findings
    }
}

/// Checks string values reached through field paths
#[derive(Debug, Clone)]
pub struct SpecialCharValidator {
    exclusions: Vec<String>,
}

impl Default for SpecialCharValidator {
    fn default() -> Self {
        Self::new(std::iter::empty::<&str>())
    }
}

impl SpecialCharValidator {
    /// Built-in exclusions plus per-domain `keywords`.
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let exclusions = DEFAULT_EXCLUSIONS
            .iter()
            .map(|token| normalize_field(token, false))
            .chain(keywords.into_iter().map(|k| normalize_field(k.as_ref(), false)))
            .filter(|token| !token.is_empty())
            .collect();
        SpecialCharValidator { exclusions }
    }

    /// Whether `field` is exempt, by substring match in either direction.
    pub fn is_excluded(&self, field: &str) -> bool {
        let normalized = normalize_field(field, false);
        self.exclusions
            .iter()
            .any(|token| normalized.contains(token.as_str()) || token.contains(normalized.as_str()))
    }

    /// Validate the values of `paths` inside `document` and append findings to `ctx`.
    ///
    /// `text` is the decoded file content used for line lookups. Returns the
    /// number of findings produced by this document.
    pub fn validate_document(
        &self,
        document: &Value,
        paths: &[String],
        text: &str,
        source_file: &str,
        ctx: &mut ValidationContext,
    ) -> usize {
        let mut produced = 0;

        for path in paths {
            if self.is_excluded(path) {
                continue;
            }
            let value = match first_value(document, path) {
                Some(Value::String(s)) if !s.is_empty() => s,
                _ => continue,
            };
            if is_structured_text(value) {
                continue;
            }

            let special_chars = find_special_chars(value);
            if special_chars.is_empty() {
                continue;
            }

            let finding = SpecialCharFinding {
                path: path.clone(),
                sample_value: value.chars().take(SAMPLE_CHARS).collect(),
                line_number: find_line_number(text, path, value),
                special_chars,
                source_file: source_file.to_string(),
            };
            warn!(
                file = source_file,
                field = %finding.path,
                chars = ?finding.special_chars,
                "value contains special characters"
            );
            ctx.push(finding);
            produced += 1;
        }

        if produced == 0 {
            debug!(file = source_file, "no special characters in field values");
        }
        produced
    }
}

/// Catalog names containing characters outside `[A-Za-z0-9 whitespace _ - . ( )]`.
pub fn validate_catalog_names<I, S>(fields: I) -> Vec<CatalogNameFinding>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fields
        .into_iter()
        .filter_map(|field| {
            let field = field.as_ref();
            let special_chars = disallowed(field, &NAME_ALLOWED);
            (!special_chars.is_empty()).then(|| CatalogNameFinding {
                field: field.to_string(),
                special_chars,
            })
        })
        .collect()
}

/// First non-null value for `path`: the document itself, or for a root array
/// the first record that resolves it.
fn first_value<'v>(document: &'v Value, path: &str) -> Option<&'v Value> {
    match document {
        Value::Array(records) => records
            .iter()
            .filter(|r| r.is_object())
            .find_map(|record| value_at(record, path)),
        Value::Object(_) => value_at(document, path),
        _ => None,
    }
}

/// Resolve a dot path where arrays resolve through their first element.
fn value_at<'v>(record: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = record;
    for key in path.split('.') {
        current = match current {
            Value::Object(obj) => obj.get(key)?,
            Value::Array(items) => match items.first() {
                Some(Value::Object(first)) => first.get(key)?,
                _ => return None,
            },
            _ => return None,
        };
        if current.is_null() {
            return None;
        }
    }
    Some(current)
}

/// A string holding a serialized JSON array or object.
fn is_structured_text(value: &str) -> bool {
    let trimmed = value.trim();
    let bracketed = (trimmed.starts_with('[') && trimmed.ends_with(']'))
        || (trimmed.starts_with('{') && trimmed.ends_with('}'));
    bracketed && serde_json::from_str::<Value>(trimmed).is_ok()
}

/// 1-based line holding the leaf name and the value, else the value alone.
fn find_line_number(text: &str, path: &str, value: &str) -> Option<usize> {
    if text.is_empty() || value.is_empty() {
        return None;
    }
    let leaf = leaf_name(path).to_lowercase();
    let needle: String = value.chars().take(LINE_SEARCH_CHARS).collect();

    text.lines()
        .position(|line| line.contains(&needle) && line.to_lowercase().contains(&leaf))
        .or_else(|| text.lines().position(|line| line.contains(&needle)))
        .map(|index| index + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(document: &Value, text: &str) -> ValidationContext {
        let paths = crate::flatten::PathFlattener::default().flatten(document).paths;
        let mut ctx = ValidationContext::new();
        SpecialCharValidator::default().validate_document(document, &paths, text, "doc.json", &mut ctx);
        ctx
    }

    #[test]
    fn test_allowed_punctuation() {
        assert!(find_special_chars("a,b;c").is_empty());
        assert!(find_special_chars("Name (alias): \"x\" 'y' 1.5-2_3").is_empty());
        assert!(find_special_chars("tab\tand\nnewline").is_empty());
    }

    #[test]
    fn test_percent_is_special() {
        assert_eq!(find_special_chars("50%"), vec!['%']);
        assert_eq!(find_special_chars("a%b#c%"), vec!['%', '#']);
        assert_eq!(find_special_chars("µg/mL"), vec!['µ', '/']);
    }

    #[test]
    fn test_exclusions_both_directions() {
        let validator = SpecialCharValidator::new(["Dose Units"]);
        assert!(validator.is_excluded("MolStructure"));
        assert!(validator.is_excluded("record.Canonical_SMILES"));
        assert!(validator.is_excluded("helm"));
        // field is a substring of a token
        assert!(validator.is_excluded("Smi"));
        assert!(validator.is_excluded("dose_units"));
        assert!(!validator.is_excluded("Concentration"));
    }

    #[test]
    fn test_short_leaves_are_excluded_as_token_substrings() {
        let validator = SpecialCharValidator::default();
        // "in" is inside "modificationinsmiles", "pd" inside "pdsmiles", "a" inside "parameters"
        for field in ["in", "pd", "s", "a", "record.PD"] {
            assert!(validator.is_excluded(field), "{} should be excluded", field);
        }
        for field in ["x", "dose", "pk"] {
            assert!(!validator.is_excluded(field), "{} should be checked", field);
        }

        let document = json!({"pd": "50%", "pk": "50%"});
        let paths = vec!["pd".to_string(), "pk".to_string()];
        let mut ctx = ValidationContext::new();
        validator.validate_document(&document, &paths, "", "short.json", &mut ctx);
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.findings()[0].path, "pk");
    }

    #[test]
    fn test_percent_value_reported_with_line() {
        let text = "{\n  \"Inhibition\": \"50%\",\n  \"Note\": \"a,b;c\"\n}";
        let document: Value = serde_json::from_str(text).unwrap();
        let ctx = run(&document, text);
        assert_eq!(ctx.len(), 1);
        let finding = &ctx.findings()[0];
        assert_eq!(finding.path, "Inhibition");
        assert_eq!(finding.special_chars, vec!['%']);
        assert_eq!(finding.sample_value, "50%");
        assert_eq!(finding.source_file, "doc.json");
        assert_eq!(finding.line_number, Some(2));
    }

    #[test]
    fn test_excluded_field_is_not_validated() {
        let document = json!({"SMILES": "C1=CC=CC=C1", "Parameters": "x>5"});
        assert!(run(&document, "").is_empty());

        let validator = SpecialCharValidator::new(["inhibition"]);
        let mut ctx = ValidationContext::new();
        let document = json!({"Inhibition": "50%"});
        validator.validate_document(&document, &["Inhibition".to_string()], "", "f", &mut ctx);
        assert!(ctx.is_empty());
    }

    #[test]
    fn test_structured_strings_are_skipped() {
        let document = json!({
            "Encoded": "[1, 2, {\"a\": 3}]",
            "Broken": "[not json%]"
        });
        let ctx = run(&document, "");
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.findings()[0].path, "Broken");
        assert_eq!(ctx.findings()[0].line_number, None);
    }

    #[test]
    fn test_arrays_resolve_through_first_element() {
        let document = json!({
            "assays": [{"Result": "ok"}, {"Result": "10 µM"}]
        });
        // only the first element is consulted
        assert!(run(&document, "").is_empty());

        let records = json!([{"id": null}, {"id": "#7"}]);
        let ctx = run(&records, "");
        assert_eq!(ctx.findings()[0].special_chars, vec!['#']);
    }

    #[test]
    fn test_sample_is_truncated() {
        let long = format!("{}%", "x".repeat(150));
        let document = json!({ "Comment": long });
        let ctx = run(&document, "");
        assert_eq!(ctx.findings()[0].sample_value.chars().count(), 100);
    }

    #[test]
    fn test_line_number_prefers_field_name() {
        let text = "\"Other\": \"5%\"\n\"Target\": \"5%\"\n";
        assert_eq!(find_line_number(text, "rec.Target", "5%"), Some(2));
        assert_eq!(find_line_number(text, "Missing", "5%"), Some(1));
        assert_eq!(find_line_number(text, "Target", "9%"), None);
    }

    #[test]
    fn test_context_limit_and_clear() {
        let mut ctx = ValidationContext::with_limit(1);
        let finding = SpecialCharFinding {
            path: "a".into(),
            special_chars: vec!['%'],
            sample_value: "%".into(),
            source_file: "f".into(),
            line_number: None,
        };
        ctx.push(finding.clone());
        ctx.push(finding);
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.dropped(), 1);
        ctx.clear();
        assert!(ctx.is_empty());
        assert_eq!(ctx.dropped(), 0);
    }

    #[test]
    fn test_catalog_names() {
        let findings = validate_catalog_names(["Compound ID", "Dose (mg/kg)", "Ratio:1", "IC50"]);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].field, "Dose (mg/kg)");
        assert_eq!(findings[0].special_chars, vec!['/']);
        assert_eq!(findings[1].special_chars, vec![':']);
    }
}
