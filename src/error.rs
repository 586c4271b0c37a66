use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading catalogs, decoding documents, or running a batch.
///
/// Per-file variants (`Io`, `Encoding`, `Parse`) are recorded by the batch
/// aggregator and never abort a run. `Configuration` is fatal before a run starts.
#[derive(Debug, Error)]
pub enum ReconError {
    #[error("failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not decode '{}' in its marked or any fallback encoding", path.display())]
    Encoding { path: PathBuf },
    #[error("malformed JSON in '{}': {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("batch worker panicked")]
    WorkerPanicked,
}

impl ReconError {
    /// Short machine-friendly kind used in failure details and export rows.
    pub fn kind(&self) -> &'static str {
        match self {
            ReconError::Io { .. } => "io",
            ReconError::Encoding { .. } => "encoding",
            ReconError::Parse { .. } => "parse",
            ReconError::Configuration(_) => "configuration",
            ReconError::WorkerPanicked => "worker",
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconError>;
