//! Catalog of expected fields
//!
//! A catalog maps database names to a tree of field lists. The tree is read
//! from a JSON configuration file and collapsed into two views used by the
//! matcher: an ordered field list and a `field -> category` mapping.

use crate::error::{ReconError, Result};
use crate::normalize::normalize_field;
use indexmap::IndexMap;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::info;

/// One node of a database's field tree.
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogNode {
    /// A flat list of field names
    Fields(Vec<String>),
    /// Named children, in declaration order
    Group(Vec<(String, CatalogNode)>),
}

impl CatalogNode {
    /// Build a node from a JSON value: arrays are field lists, objects are groups.
    ///
    /// Duplicate names inside one field list collapse to their first occurrence.
    pub fn from_value(value: &Value, location: &str) -> Result<Self> {
        match value {
            Value::Array(items) => {
                let mut seen = HashSet::new();
                let mut fields = Vec::with_capacity(items.len());
                for item in items {
                    let name = item.as_str().ok_or_else(|| {
                        ReconError::Configuration(format!(
                            "'{}' must contain only field-name strings, found {}",
                            location, item
                        ))
                    })?;
                    if seen.insert(name) {
                        fields.push(name.to_string());
                    }
                }
                Ok(CatalogNode::Fields(fields))
            }
            Value::Object(map) => {
                let mut children = Vec::with_capacity(map.len());
                for (key, child) in map.iter() {
                    let child_location = format!("{}.{}", location, key);
                    children.push((key.clone(), CatalogNode::from_value(child, &child_location)?));
                }
                Ok(CatalogNode::Group(children))
            }
            other => Err(ReconError::Configuration(format!(
                "'{}' must be a list of fields or a group of lists, found {}",
                location, other
            ))),
        }
    }

    /// Concatenate every leaf list beneath this node, in declaration order.
    pub fn flatten(&self) -> Vec<String> {
        let mut fields = Vec::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields(&self, out: &mut Vec<String>) {
        match self {
            CatalogNode::Fields(fields) => out.extend(fields.iter().cloned()),
            CatalogNode::Group(children) => {
                for (_, child) in children {
                    child.collect_fields(out);
                }
            }
        }
    }
}

/// `catalog field -> category` for one or more databases, in declaration order.
///
/// Re-declaring a literal field name updates its category in place. When two
/// spellings share a normalized key, the later declaration wins in [`normalized`](Self::normalized).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryMap {
    entries: IndexMap<String, String>,
}

impl CategoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: impl Into<String>, category: impl Into<String>) {
        self.entries.insert(field.into(), category.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.entries.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(f, c)| (f.as_str(), c.as_str()))
    }

    /// Re-key the mapping by normalized field name; the last declaration of a key wins.
    pub fn normalized(&self, case_sensitive: bool) -> HashMap<String, String> {
        let mut keyed = HashMap::with_capacity(self.entries.len());
        for (field, category) in &self.entries {
            keyed.insert(normalize_field(field, case_sensitive), category.clone());
        }
        keyed
    }
}

impl<F: Into<String>, C: Into<String>> FromIterator<(F, C)> for CategoryMap {
    fn from_iter<I: IntoIterator<Item = (F, C)>>(iter: I) -> Self {
        let mut map = CategoryMap::new();
        for (field, category) in iter {
            map.insert(field, category);
        }
        map
    }
}

/// Databases and their field trees, plus per-database validation exclusions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    databases: Vec<(String, CatalogNode)>,
    excluded_keywords: HashMap<String, Vec<String>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog from a JSON file.
    ///
    /// The file is either `{"databases": {...}, "excluded_keywords": {...}}` or
    /// the databases object on its own.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ReconError::Configuration(format!("cannot read catalog '{}': {}", path.display(), e))
        })?;
        let value: Value = serde_json::from_str(&content).map_err(|e| {
            ReconError::Configuration(format!("catalog '{}' is not valid JSON: {}", path.display(), e))
        })?;
        let catalog = Self::from_value(&value)?;
        info!(
            path = %path.display(),
            databases = catalog.databases.len(),
            "loaded catalog"
        );
        Ok(catalog)
    }

    /// Replace this catalog with the contents of `path`, leaving it untouched on error.
    pub fn reload<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let fresh = Self::load(path)?;
        *self = fresh;
        Ok(())
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let root = value.as_object().ok_or_else(|| {
            ReconError::Configuration("catalog root must be a JSON object".to_string())
        })?;

        let databases_value = root.get("databases").unwrap_or(value);
        let databases_map = databases_value.as_object().ok_or_else(|| {
            ReconError::Configuration("'databases' must be a JSON object".to_string())
        })?;

        let mut catalog = Catalog::new();
        for (name, node) in databases_map.iter() {
            if root.contains_key("databases") || name != "excluded_keywords" {
                catalog.add_database(name.clone(), CatalogNode::from_value(node, name)?);
            }
        }

        if let Some(excluded) = root.get("excluded_keywords") {
            let excluded = excluded.as_object().ok_or_else(|| {
                ReconError::Configuration("'excluded_keywords' must be a JSON object".to_string())
            })?;
            for (database, keywords) in excluded.iter() {
                let keywords = keywords
                    .as_array()
                    .ok_or_else(|| {
                        ReconError::Configuration(format!(
                            "excluded keywords for '{}' must be a list",
                            database
                        ))
                    })?
                    .iter()
                    .filter_map(|k| k.as_str().map(str::to_string))
                    .collect();
                catalog.excluded_keywords.insert(database.clone(), keywords);
            }
        }

        Ok(catalog)
    }

    /// Add or replace a database.
    pub fn add_database(&mut self, name: impl Into<String>, node: CatalogNode) -> &mut Self {
        let name = name.into();
        if let Some(existing) = self.databases.iter_mut().find(|(n, _)| *n == name) {
            existing.1 = node;
        } else {
            self.databases.push((name, node));
        }
        self
    }

    pub fn set_excluded_keywords(&mut self, database: impl Into<String>, keywords: Vec<String>) {
        self.excluded_keywords.insert(database.into(), keywords);
    }

    pub fn excluded_keywords(&self, database: &str) -> &[String] {
        self.excluded_keywords
            .get(database)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn database_names(&self) -> Vec<&str> {
        self.databases.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn database(&self, name: &str) -> Option<&CatalogNode> {
        self.databases.iter().find(|(n, _)| n == name).map(|(_, node)| node)
    }

    /// Top-level category names of a database (empty for a flat field list).
    pub fn categories(&self, database: &str) -> Vec<&str> {
        match self.database(database) {
            Some(CatalogNode::Group(children)) => children.iter().map(|(n, _)| n.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    /// All fields of one database in declaration order.
    ///
    /// The same name may appear more than once when it belongs to several categories.
    pub fn fields(&self, database: &str) -> Vec<String> {
        self.database(database).map(CatalogNode::flatten).unwrap_or_default()
    }

    /// All fields of every database, in declaration order.
    pub fn all_fields(&self) -> Vec<String> {
        self.databases.iter().flat_map(|(_, node)| node.flatten()).collect()
    }

    /// `field -> top-level category` for one database.
    pub fn category_map(&self, database: &str) -> CategoryMap {
        let mut map = CategoryMap::new();
        if let Some(CatalogNode::Group(children)) = self.database(database) {
            for (category, node) in children {
                for field in node.flatten() {
                    map.insert(field, category.clone());
                }
            }
        }
        map
    }

    /// `field -> top-level category` merged across every database.
    pub fn combined_category_map(&self) -> CategoryMap {
        let mut map = CategoryMap::new();
        for (name, _) in &self.databases {
            for (field, category) in self.category_map(name).iter() {
                map.insert(field, category);
            }
        }
        map
    }
}
