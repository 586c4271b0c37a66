use super::similarity::{ratio_chars, upper_bound};
use crate::catalog::CategoryMap;
use crate::flatten::{ArrayFieldMap, NullCategoryMap};
use crate::normalize::{normalize_category, normalize_field};
use crate::report::{MatchKind, MatchRecord};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Matching configuration
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Compare names with their original letter case
    pub case_sensitive: bool,
    /// Run the fuzzy pass after the exact pass
    pub fuzzy: bool,
    /// Minimum similarity for a fuzzy match
    pub threshold: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            case_sensitive: false,
            fuzzy: true,
            threshold: 0.8,
        }
    }
}

/// Result of one comparison, including the catalog fields that were suppressed
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Comparison {
    pub records: Vec<MatchRecord>,
    /// Display names of catalog fields dropped because their group is null or empty
    pub suppressed: Vec<String>,
}

/// Best json counterpart for a catalog field, without claiming it
#[derive(Debug, Clone, PartialEq)]
pub struct MappingSuggestion {
    pub db_name: String,
    pub json_name: String,
    pub kind: MatchKind,
}

/// A de-duplicated, normalized name list in first-occurrence order.
struct Keyed<'a> {
    keys: Vec<String>,
    chars: Vec<Vec<char>>,
    names: Vec<&'a str>,
}

impl<'a> Keyed<'a> {
    fn new<S: AsRef<str>>(fields: &'a [S], case_sensitive: bool) -> Self {
        let mut seen = HashSet::new();
        let mut keyed = Keyed {
            keys: Vec::with_capacity(fields.len()),
            chars: Vec::with_capacity(fields.len()),
            names: Vec::with_capacity(fields.len()),
        };
        for field in fields {
            let name = field.as_ref();
            let key = normalize_field(name, case_sensitive);
            if seen.insert(key.clone()) {
                keyed.chars.push(key.chars().collect());
                keyed.keys.push(key);
                keyed.names.push(name);
            }
        }
        keyed
    }

    fn len(&self) -> usize {
        self.keys.len()
    }
}

/// Exact-then-fuzzy field matcher with null/array suppression
#[derive(Debug, Clone, Default)]
pub struct MatchEngine {
    config: MatchConfig,
}

impl MatchEngine {
    pub fn new(config: MatchConfig) -> Self {
        MatchEngine { config }
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Match catalog fields against json fields.
    pub fn compare<S: AsRef<str>, T: AsRef<str>>(
        &self,
        db_fields: &[S],
        json_fields: &[T],
        categories: &CategoryMap,
        null_categories: &NullCategoryMap,
        array_fields: &ArrayFieldMap,
    ) -> Vec<MatchRecord> {
        self.compare_detailed(db_fields, json_fields, categories, null_categories, array_fields)
            .records
    }

    /// Match catalog fields against json fields, also returning suppressed fields.
    ///
    /// Records come out as matched (exact, then fuzzy, each in catalog order),
    /// then missing in JSON (catalog order), then not in catalog (json order).
    pub fn compare_detailed<S: AsRef<str>, T: AsRef<str>>(
        &self,
        db_fields: &[S],
        json_fields: &[T],
        categories: &CategoryMap,
        null_categories: &NullCategoryMap,
        array_fields: &ArrayFieldMap,
    ) -> Comparison {
        let cs = self.config.case_sensitive;
        let db = Keyed::new(db_fields, cs);
        let json = Keyed::new(json_fields, cs);

        let mut db_partner: Vec<Option<(usize, MatchKind)>> = vec![None; db.len()];
        let mut json_used = vec![false; json.len()];

        // Exact pass
        let json_index: HashMap<&str, usize> = json
            .keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k.as_str(), i))
            .collect();
        for (d, key) in db.keys.iter().enumerate() {
            if let Some(&j) = json_index.get(key.as_str()) {
                if !json_used[j] {
                    json_used[j] = true;
                    db_partner[d] = Some((j, MatchKind::Exact));
                }
            }
        }

        // Fuzzy pass, greedy in catalog order
        if self.config.fuzzy {
            for d in 0..db.len() {
                if db_partner[d].is_some() {
                    continue;
                }
                let candidates = (0..json.len()).filter(|&j| !json_used[j]);
                if let Some((j, score)) = self.best_candidate(&db.chars[d], &json.chars, candidates) {
                    json_used[j] = true;
                    db_partner[d] = Some((j, MatchKind::Fuzzy(score)));
                }
            }
        }

        let mut records = Vec::with_capacity(db.len() + json.len());
        for want_exact in [true, false] {
            for (d, partner) in db_partner.iter().enumerate() {
                if let Some((j, kind)) = partner {
                    if matches!(kind, MatchKind::Exact) == want_exact {
                        records.push(MatchRecord::Matched {
                            db_name: db.names[d].to_string(),
                            json_name: json.names[*j].to_string(),
                            kind: *kind,
                        });
                    }
                }
            }
        }

        // Suppression of unmatched catalog fields
        let field_categories = categories.normalized(cs);
        let nulls = null_categories.normalized(cs);
        let is_null = |group: &str| nulls.get(&normalize_category(group, cs)).copied().unwrap_or(false);

        let mut suppressed = Vec::new();
        for (d, partner) in db_partner.iter().enumerate() {
            if partner.is_some() {
                continue;
            }
            let key = &db.keys[d];
            let category = field_categories.get(key);
            let owner = array_fields.get(key);

            let array_null = owner.map_or(false, |array| is_null(array));
            let category_null = owner.is_none() && category.map_or(false, |c| is_null(c.as_str()));

            if category_null || (array_null && category.is_none()) {
                suppressed.push(db.names[d].to_string());
                continue;
            }
            records.push(MatchRecord::UnmatchedInJson {
                db_name: db.names[d].to_string(),
                category: category.cloned(),
            });
        }

        for (j, used) in json_used.iter().enumerate() {
            if !used {
                records.push(MatchRecord::UnmatchedInDb {
                    json_name: json.names[j].to_string(),
                });
            }
        }

        if !suppressed.is_empty() {
            debug!(count = suppressed.len(), "suppressed fields of null or empty groups");
        }

        Comparison { records, suppressed }
    }

    /// Suggest the best json field for each catalog field.
    ///
    /// Unlike [`compare`](Self::compare), json fields are never claimed, so
    /// one json field may be suggested for several catalog fields.
    pub fn suggest_mappings<S: AsRef<str>, T: AsRef<str>>(
        &self,
        db_fields: &[S],
        json_fields: &[T],
    ) -> Vec<MappingSuggestion> {
        let cs = self.config.case_sensitive;
        let db = Keyed::new(db_fields, cs);
        let json = Keyed::new(json_fields, cs);

        let mut suggestions = Vec::new();
        for d in 0..db.len() {
            let best = match json.keys.iter().position(|k| *k == db.keys[d]) {
                Some(j) => Some((j, MatchKind::Exact)),
                None if self.config.fuzzy => self
                    .best_candidate(&db.chars[d], &json.chars, 0..json.len())
                    .map(|(j, score)| (j, MatchKind::Fuzzy(score))),
                None => None,
            };
            if let Some((j, kind)) = best {
                suggestions.push(MappingSuggestion {
                    db_name: db.names[d].to_string(),
                    json_name: json.names[j].to_string(),
                    kind,
                });
            }
        }
        suggestions
    }

    /// Highest-scoring candidate at or above the threshold; ties keep the first.
    fn best_candidate(
        &self,
        target: &[char],
        pool: &[Vec<char>],
        candidates: impl Iterator<Item = usize>,
    ) -> Option<(usize, f64)> {
        let threshold = self.config.threshold;
        let mut best: Option<(usize, f64)> = None;

        for j in candidates {
            let bound = upper_bound(target.len(), pool[j].len());
            if bound < threshold || best.map_or(false, |(_, score)| bound <= score) {
                continue;
            }
            let score = ratio_chars(target, &pool[j]);
            if best.map_or(true, |(_, best_score)| score > best_score) {
                best = Some((j, score));
            }
        }

        best.filter(|(_, score)| *score >= threshold)
    }
}
