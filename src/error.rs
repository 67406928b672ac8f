// Error taxonomy for the duplicate-merge engine
//
// Guard violations and history conflicts are NOT errors - they are expected
// business outcomes and live in merge::MergeOutcome. Errors here are the
// things that genuinely went wrong: persistence failures and bad run
// configuration.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Unexpected persistence failure. A pair-level occurrence marks the
    /// pair as not-merged and the run continues; a scope-level occurrence
    /// aborts the batch only.
    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),

    /// Missing collaborator or invalid run parameters. Fatal to the
    /// enclosing run.
    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
