//! Field matching - reconcile catalog fields with JSON field paths
//!
//! Matching runs in two passes over normalized keys. The exact pass binds
//! identical keys; the fuzzy pass then lets each remaining catalog field, in
//! catalog order, claim its best unused json field when the similarity
//! reaches the configured threshold. Claimed fields leave the pool, so the
//! result is greedy rather than globally optimal.

pub mod engine;
pub mod similarity;

pub use engine::{Comparison, MappingSuggestion, MatchConfig, MatchEngine};
pub use similarity::ratio;
