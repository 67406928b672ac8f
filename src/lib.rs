// Portfolio Dedup - Core Library
// Exposes all modules for use in the CLI and tests

pub mod error;
pub mod grouper;
pub mod merge;
pub mod model;
pub mod reconcile;
pub mod scheduler;
pub mod selector;
pub mod store;

// Re-export commonly used types
pub use error::{EngineError, Result};
pub use grouper::{group_by_natural_key, DuplicateGroup};
pub use merge::{reconcile_dates, GuardViolation, MergeExecutor, MergeOutcome};
pub use model::{
    third_party_key_hash, AccountType, ApiType, EntityId, EntityKind, ExpenseOrIncomeRecord,
    FinancialEntity, HistoryProvenance, HistoryRecord, HistoryRun, Source, SourceId,
    TransactionRecord,
};
pub use reconcile::{
    first_overlapping_run, quantities_fuzzy_equal, HistoryComparison, HistoryConflict,
    HistoryReconciler, MAX_TOLERATED_CONFLICTS, QUANTITY_EPSILON,
};
pub use scheduler::{
    merge_duplicate_accounts, merge_duplicate_papers, process_all, MergeStats,
    DEFAULT_BATCH_SIZE, DEFAULT_PARALLELISM,
};
pub use selector::{choose, AbortReason, Candidate, Selection};
pub use store::{Event, Store};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
