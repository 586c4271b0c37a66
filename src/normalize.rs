//! Comparison keys for field and category names
//!
//! Catalog fields and JSON paths use different spelling conventions
//! (`Compound ID`, `compound_id`, `COMPOUND-ID`, `record.compoundId`). Both sides
//! are reduced to a normalized key before any matching happens.

/// Normalize a field name or JSON path into its comparison key.
///
/// Only the final dot-segment is kept, so `"PD.PD_Formula"` compares as
/// `"PD_Formula"`. Spaces, underscores, hyphens and dots are stripped, and the
/// result is lower-cased unless `case_sensitive` is set.
pub fn normalize_field(name: &str, case_sensitive: bool) -> String {
    let leaf = name.rsplit('.').next().unwrap_or(name);
    strip_and_fold(leaf, case_sensitive, |c| matches!(c, ' ' | '_' | '-' | '.'))
}

/// Normalize a category or array name.
///
/// Category names never carry path dots, so only spaces, underscores and
/// hyphens are stripped.
pub fn normalize_category(name: &str, case_sensitive: bool) -> String {
    strip_and_fold(name, case_sensitive, |c| matches!(c, ' ' | '_' | '-'))
}

fn strip_and_fold(name: &str, case_sensitive: bool, is_separator: impl Fn(char) -> bool) -> String {
    let stripped: String = name.chars().filter(|c| !is_separator(*c)).collect();
    if case_sensitive {
        stripped
    } else {
        stripped.to_lowercase()
    }
}

/// The last dot-segment of a path, as written.
pub fn leaf_name(path: &str) -> &str {
    path.rsplit('.').next().unwrap_or(path)
}
