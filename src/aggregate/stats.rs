use crate::catalog::CategoryMap;
use crate::matching::Comparison;
use crate::normalize::normalize_field;
use crate::report::{BatchTotals, FieldSummary, MatchKind, MatchRecord, MatchStatus, MissingFiles};
use std::collections::HashMap;

/// Running counters for one normalized field name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldStat {
    pub matched: usize,
    pub exact: usize,
    pub best_fuzzy: Option<f64>,
    pub unmatched_in_json: usize,
    pub unmatched_in_db: usize,
    pub category_null: usize,
    /// Matched, or present in a JSON file but not under the catalog
    pub seen_in_json: bool,
    pub missing_files: MissingFiles,
    db_spelling: Option<String>,
    json_spelling: Option<String>,
}

impl FieldStat {
    /// Display name: the smallest catalog spelling, else the smallest json spelling.
    pub fn display_name(&self) -> Option<&str> {
        self.db_spelling.as_deref().or(self.json_spelling.as_deref())
    }

    fn note_db(&mut self, name: &str) {
        keep_smallest(&mut self.db_spelling, name);
    }

    fn note_json(&mut self, name: &str) {
        keep_smallest(&mut self.json_spelling, name);
    }

    fn best_kind(&self) -> Option<MatchKind> {
        if self.exact > 0 {
            Some(MatchKind::Exact)
        } else {
            self.best_fuzzy.map(MatchKind::Fuzzy)
        }
    }
}

// Keeps the display name independent of scan order
fn keep_smallest(slot: &mut Option<String>, name: &str) {
    match slot {
        Some(current) if current.as_str() <= name => {}
        _ => *slot = Some(name.to_string()),
    }
}

/// Per-field fold over every comparison of a batch.
///
/// Every counter is a sum, so the final counts do not depend on the order
/// files are folded in. Only the shown missing-file names follow scan order.
#[derive(Debug, Clone)]
pub struct FieldStats {
    stats: HashMap<String, FieldStat>,
    /// normalized field -> category, for category-owned fields
    categories: HashMap<String, String>,
    case_sensitive: bool,
    missing_files_limit: usize,
}

impl FieldStats {
    pub fn new(categories: &CategoryMap, case_sensitive: bool, missing_files_limit: usize) -> Self {
        FieldStats {
            stats: HashMap::new(),
            categories: categories.normalized(case_sensitive),
            case_sensitive,
            missing_files_limit,
        }
    }

    fn entry(&mut self, name: &str) -> (&mut FieldStat, bool) {
        let key = normalize_field(name, self.case_sensitive);
        let owned = self.categories.contains_key(&key);
        (self.stats.entry(key).or_default(), owned)
    }

    /// Fold one file's comparison into the counters.
    pub fn record(&mut self, comparison: &Comparison, source_file: &str) {
        let limit = self.missing_files_limit;

        for record in &comparison.records {
            match record {
                MatchRecord::Matched { db_name, kind, .. } => {
                    let (stat, _) = self.entry(db_name);
                    stat.matched += 1;
                    stat.seen_in_json = true;
                    stat.note_db(db_name);
                    match kind {
                        MatchKind::Exact => stat.exact += 1,
                        MatchKind::Fuzzy(score) => {
                            stat.best_fuzzy = Some(stat.best_fuzzy.map_or(*score, |b| b.max(*score)));
                        }
                    }
                }
                MatchRecord::UnmatchedInJson { db_name, .. } => {
                    let (stat, owned) = self.entry(db_name);
                    stat.unmatched_in_json += 1;
                    stat.note_db(db_name);
                    if owned {
                        stat.missing_files.push(source_file, limit);
                    }
                }
                MatchRecord::UnmatchedInDb { json_name } => {
                    let (stat, _) = self.entry(json_name);
                    stat.unmatched_in_db += 1;
                    stat.seen_in_json = true;
                    stat.note_json(json_name);
                }
            }
        }

        for name in &comparison.suppressed {
            let (stat, _) = self.entry(name);
            stat.category_null += 1;
            stat.note_db(name);
        }
    }

    pub fn len(&self) -> usize {
        self.stats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&FieldStat> {
        self.stats.get(key)
    }

    pub fn totals(&self) -> BatchTotals {
        self.stats.values().fold(BatchTotals::default(), |mut totals, stat| {
            totals.matched += stat.matched;
            totals.unmatched_in_json += stat.unmatched_in_json;
            totals.unmatched_in_db += stat.unmatched_in_db;
            totals.category_null += stat.category_null;
            totals
        })
    }

    /// Turn the counters into report entries, sorted by normalized key.
    ///
    /// A field matched anywhere is reported matched. Otherwise a field missing
    /// from some file is reported missing when it is category-owned, or when it
    /// was never seen in any JSON. Fields only ever suppressed are omitted.
    pub fn finalize(self) -> Vec<FieldSummary> {
        let mut keys: Vec<&String> = self.stats.keys().collect();
        keys.sort();

        let mut summaries = Vec::with_capacity(keys.len());
        for key in keys {
            let stat = &self.stats[key];
            let category = self.categories.get(key).cloned();
            let owned = category.is_some();

            let status = if stat.matched > 0 {
                MatchStatus::Matched
            } else if stat.unmatched_in_json > 0 {
                if owned && !stat.missing_files.is_empty() {
                    MatchStatus::UnmatchedInJson
                } else if !owned && !stat.seen_in_json {
                    MatchStatus::UnmatchedInJson
                } else {
                    continue;
                }
            } else if stat.unmatched_in_db > 0 {
                MatchStatus::UnmatchedInDb
            } else {
                continue;
            };

            let missing_files = match status {
                MatchStatus::UnmatchedInDb => None,
                _ if owned && !stat.missing_files.is_empty() => Some(stat.missing_files.clone()),
                _ => None,
            };

            summaries.push(FieldSummary {
                key: key.clone(),
                field_name: stat.display_name().unwrap_or(key).to_string(),
                status,
                kind: stat.best_kind(),
                category,
                matched: stat.matched,
                unmatched_in_json: stat.unmatched_in_json,
                unmatched_in_db: stat.unmatched_in_db,
                category_null: stat.category_null,
                missing_files,
            });
        }
        summaries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comparison(records: Vec<MatchRecord>, suppressed: &[&str]) -> Comparison {
        Comparison {
            records,
            suppressed: suppressed.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn matched(db: &str, kind: MatchKind) -> MatchRecord {
        MatchRecord::Matched {
            db_name: db.into(),
            json_name: db.to_lowercase(),
            kind,
        }
    }

    fn missing(db: &str) -> MatchRecord {
        MatchRecord::UnmatchedInJson {
            db_name: db.into(),
            category: None,
        }
    }

    fn categories() -> CategoryMap {
        vec![("Measure", "assays")].into_iter().collect()
    }

    #[test]
    fn test_matched_anywhere_wins_and_lists_missing_files() {
        let mut stats = FieldStats::new(&categories(), false, 10);
        stats.record(&comparison(vec![matched("Measure", MatchKind::Exact)], &[]), "a.json");
        stats.record(&comparison(vec![missing("Measure")], &[]), "b.json");

        let fields = stats.finalize();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].status, MatchStatus::Matched);
        assert_eq!(fields[0].kind, Some(MatchKind::Exact));
        assert_eq!(fields[0].category.as_deref(), Some("assays"));
        assert_eq!(fields[0].missing_files.as_ref().unwrap().shown, vec!["b.json"]);
    }

    #[test]
    fn test_uncategorized_missing_only_when_never_seen() {
        let mut stats = FieldStats::new(&CategoryMap::new(), false, 10);
        stats.record(&comparison(vec![missing("Species")], &[]), "a.json");
        stats.record(
            &comparison(
                vec![
                    missing("Route"),
                    MatchRecord::UnmatchedInDb {
                        json_name: "route".into(),
                    },
                ],
                &[],
            ),
            "b.json",
        );

        let fields = stats.finalize();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field_name, "Species");
        assert_eq!(fields[0].status, MatchStatus::UnmatchedInJson);
        assert_eq!(fields[0].missing_files, None);
    }

    #[test]
    fn test_only_suppressed_is_omitted() {
        let mut stats = FieldStats::new(&categories(), false, 10);
        stats.record(&comparison(vec![], &["Measure"]), "a.json");
        stats.record(&comparison(vec![], &["Measure"]), "b.json");
        assert_eq!(stats.get("measure").unwrap().category_null, 2);
        assert_eq!(stats.totals().category_null, 2);
        assert!(stats.finalize().is_empty());
    }

    #[test]
    fn test_not_in_catalog_entry() {
        let mut stats = FieldStats::new(&CategoryMap::new(), false, 10);
        let extra = MatchRecord::UnmatchedInDb {
            json_name: "lab_notes".into(),
        };
        stats.record(&comparison(vec![extra.clone()], &[]), "a.json");
        stats.record(&comparison(vec![extra], &[]), "b.json");

        let fields = stats.finalize();
        assert_eq!(fields[0].key, "labnotes");
        assert_eq!(fields[0].status, MatchStatus::UnmatchedInDb);
        assert_eq!(fields[0].unmatched_in_db, 2);
        assert_eq!(fields[0].match_kind(), "not_found");
    }

    #[test]
    fn test_missing_files_capped() {
        let mut stats = FieldStats::new(&categories(), false, 3);
        for i in 0..5 {
            stats.record(&comparison(vec![missing("Measure")], &[]), &format!("f{}.json", i));
        }
        let fields = stats.finalize();
        let missing_files = fields[0].missing_files.as_ref().unwrap();
        assert_eq!(missing_files.shown, vec!["f0.json", "f1.json", "f2.json"]);
        assert_eq!(missing_files.total, 5);
        assert_eq!(missing_files.more(), 2);
    }

    #[test]
    fn test_fold_is_commutative() {
        let a = comparison(
            vec![
                matched("Clearance", MatchKind::Fuzzy(0.85)),
                missing("Measure"),
                MatchRecord::UnmatchedInDb { json_name: "x".into() },
            ],
            &["Units"],
        );
        let b = comparison(
            vec![
                matched("Clearance", MatchKind::Fuzzy(0.9)),
                matched("Measure", MatchKind::Exact),
            ],
            &[],
        );

        let mut forward = FieldStats::new(&categories(), false, 10);
        forward.record(&a, "a.json");
        forward.record(&b, "b.json");
        let mut backward = FieldStats::new(&categories(), false, 10);
        backward.record(&b, "b.json");
        backward.record(&a, "a.json");

        assert_eq!(forward.totals(), backward.totals());
        assert_eq!(forward.finalize(), backward.finalize());
    }

    #[test]
    fn test_display_name_is_order_independent() {
        let mut stats = FieldStats::new(&CategoryMap::new(), false, 10);
        stats.record(&comparison(vec![matched("compound_ID", MatchKind::Exact)], &[]), "a");
        stats.record(&comparison(vec![matched("CompoundID", MatchKind::Exact)], &[]), "b");
        assert_eq!(stats.get("compoundid").unwrap().display_name(), Some("CompoundID"));
    }
}
