use crate::normalize::{normalize_category, normalize_field};
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashMap, HashSet};

/// Configuration for path flattening
#[derive(Debug, Clone, Default)]
pub struct FlattenConfig {
    /// Keep letter case when normalizing array member names
    pub case_sensitive: bool,
}

/// `top-level key -> is null or empty array`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NullCategoryMap {
    entries: HashMap<String, bool>,
}

impl NullCategoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute the map from the top-level keys of one record.
    pub fn from_record(record: &Map<String, Value>) -> Self {
        let entries = record
            .iter()
            .map(|(key, value)| (key.clone(), is_null_or_empty(value)))
            .collect();
        NullCategoryMap { entries }
    }

    pub fn insert(&mut self, key: impl Into<String>, is_null: bool) {
        self.entries.insert(key.into(), is_null);
    }

    pub fn get(&self, key: &str) -> Option<bool> {
        self.entries.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Re-key by normalized category name.
    pub fn normalized(&self, case_sensitive: bool) -> HashMap<String, bool> {
        self.entries
            .iter()
            .map(|(key, is_null)| (normalize_category(key, case_sensitive), *is_null))
            .collect()
    }
}

/// `normalized member name -> owning array key`
///
/// When the same name appears under several arrays, the array visited last wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayFieldMap {
    entries: HashMap<String, String>,
}

impl ArrayFieldMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, normalized_field: impl Into<String>, array_key: impl Into<String>) {
        self.entries.insert(normalized_field.into(), array_key.into());
    }

    pub fn get(&self, normalized_field: &str) -> Option<&str> {
        self.entries.get(normalized_field).map(String::as_str)
    }

    pub fn contains(&self, normalized_field: &str) -> bool {
        self.entries.contains_key(normalized_field)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Merge `other` into this map; entries of `other` win.
    pub fn extend(&mut self, other: ArrayFieldMap) {
        self.entries.extend(other.entries);
    }

    /// Add catalog-declared memberships for arrays present in `record`.
    ///
    /// Fields already observed in the data keep their owner. Otherwise a field
    /// is added when the record has a top-level key whose normalized name
    /// equals the field's catalog category (even if that key is null or
    /// empty). Categories are visited in declaration order, so the last
    /// declaration of a normalized name wins.
    pub fn extend_from_catalog<'a>(
        &mut self,
        record: &Map<String, Value>,
        categories: impl IntoIterator<Item = (&'a str, &'a str)>,
        case_sensitive: bool,
    ) {
        let record_keys: HashMap<String, &String> = record
            .keys()
            .map(|key| (normalize_category(key, case_sensitive), key))
            .collect();
        let observed: HashSet<String> = self.entries.keys().cloned().collect();

        for (field, category) in categories {
            let normalized = normalize_field(field, case_sensitive);
            if observed.contains(&normalized) {
                continue;
            }
            if let Some(key) = record_keys.get(&normalize_category(category, case_sensitive)) {
                self.entries.insert(normalized, (*key).clone());
            }
        }
    }
}

/// Everything extracted from one document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlattenedDocument {
    /// Unique dot-joined paths, sorted
    pub paths: Vec<String>,
    pub null_categories: NullCategoryMap,
    pub array_fields: ArrayFieldMap,
    /// Number of object records (1 for an object root)
    pub record_count: usize,
}

/// Walks nested JSON and collects field paths and array ownership
#[derive(Debug, Clone, Default)]
pub struct PathFlattener {
    config: FlattenConfig,
}

impl PathFlattener {
    pub fn new(config: FlattenConfig) -> Self {
        PathFlattener { config }
    }

    /// Flatten a whole document.
    ///
    /// For a root array every record is flattened and the paths are unioned.
    /// The null map of a root array comes from the first record only, which is
    /// an approximation when records differ in shape.
    pub fn flatten(&self, document: &Value) -> FlattenedDocument {
        let mut walk = Walk::new(&self.config);

        let (null_categories, record_count) = match document {
            Value::Object(record) => {
                walk.object(record, None);
                (NullCategoryMap::from_record(record), 1)
            }
            Value::Array(records) => {
                walk.root_array(records);
                let null_categories = match records.first() {
                    Some(Value::Object(first)) => NullCategoryMap::from_record(first),
                    _ => NullCategoryMap::new(),
                };
                (null_categories, records.iter().filter(|r| r.is_object()).count())
            }
            _ => (NullCategoryMap::new(), 0),
        };

        walk.finish(null_categories, record_count)
    }

    /// Flatten a single record of a multi-record document.
    pub fn flatten_record(&self, record: &Map<String, Value>) -> FlattenedDocument {
        let mut walk = Walk::new(&self.config);
        walk.object(record, None);
        walk.finish(NullCategoryMap::from_record(record), 1)
    }
}

/// Traversal state shared by the recursive helpers
struct Walk<'a> {
    config: &'a FlattenConfig,
    paths: BTreeSet<String>,
    arrays: ArrayFieldMap,
}

impl<'a> Walk<'a> {
    fn new(config: &'a FlattenConfig) -> Self {
        Walk {
            config,
            paths: BTreeSet::new(),
            arrays: ArrayFieldMap::new(),
        }
    }

    fn finish(self, null_categories: NullCategoryMap, record_count: usize) -> FlattenedDocument {
        FlattenedDocument {
            paths: self.paths.into_iter().collect(),
            null_categories,
            array_fields: self.arrays,
            record_count,
        }
    }

    fn object(&mut self, obj: &Map<String, Value>, prefix: Option<&str>) {
        for (key, value) in obj.iter() {
            let path = match prefix {
                Some(p) => format!("{}.{}", p, key),
                None => key.clone(),
            };

            match value {
                Value::Array(items) => {
                    // Arrays of scalars are leaves
                    if items.iter().any(Value::is_object) {
                        self.owned_array(items, &path, key);
                    }
                }
                Value::Object(child) => self.object(child, Some(&path)),
                _ => {}
            }

            self.paths.insert(path);
        }
    }

    /// Walk every element of an array owned by `owner`, not just the first.
    fn owned_array(&mut self, items: &[Value], path: &str, owner: &str) {
        for item in items {
            match item {
                Value::Object(child) => {
                    for member in child.keys() {
                        let normalized = normalize_field(member, self.config.case_sensitive);
                        self.arrays.insert(normalized, owner);
                    }
                    self.object(child, Some(path));
                }
                Value::Array(nested) => self.owned_array(nested, path, owner),
                _ => {}
            }
        }
    }

    fn root_array(&mut self, records: &[Value]) {
        for record in records {
            match record {
                Value::Object(obj) => self.object(obj, None),
                Value::Array(nested) => self.root_array(nested),
                _ => {}
            }
        }
    }
}

fn is_null_or_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Resolve a dot path such as `"data.items.0"` inside a document.
///
/// Numeric segments index arrays. Missing keys and explicit nulls resolve to `None`.
pub fn navigate<'v>(value: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = value;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = match current {
            Value::Object(obj) => obj.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
        if current.is_null() {
            return None;
        }
    }
    Some(current)
}
