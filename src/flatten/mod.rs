//! JSON document loading and field-path flattening
//!
//! This module turns one JSON file into the three views the matcher needs:
//! the set of dot-joined field paths, the top-level null/empty map, and the
//! array ownership map.
//!
//! ## Single parse
//!
//! A file is decoded and parsed exactly once by [`load_document`]. The parsed
//! `Value` is then reused for flattening, the null check, array mapping and
//! special-character validation.

pub mod loader;
pub mod paths;

pub use loader::{load_document, parse_document, LoadedDocument, Repair};
pub use paths::{navigate, ArrayFieldMap, FlattenConfig, FlattenedDocument, NullCategoryMap, PathFlattener};
