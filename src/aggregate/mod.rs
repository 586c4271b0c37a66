//! Streaming aggregation across many files
//!
//! A batch folds every file's comparison into per-field counters
//! ([`FieldStats`]). At or below the streaming threshold the per-file records
//! are kept as well; above it only the counters survive, so memory grows with
//! the number of distinct field names rather than the number of files.
//!
//! Per-file failures are counted and reported but never stop a batch.

pub mod batch;
pub mod stats;
pub mod worker;

pub use batch::{progress_interval, BatchConfig, BatchRun, StreamAggregator};
pub use stats::{FieldStat, FieldStats};
pub use worker::{
    run_batch, spawn_batch, BatchEvent, BatchHandle, BatchObserver, CancelToken, ChannelObserver,
    NoopObserver, ProgressSnapshot, TracingObserver,
};
