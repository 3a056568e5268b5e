

pub mod batch;
pub mod config;
pub mod error;
pub mod guard;

pub use config::BulkOpsConfig;
pub use error::{BulkOpsError, Result};

pub use batch::{
    operation_fn, BatchCallbacks, BatchConfig, BatchOperation, BatchScheduler, BatchSummary,
    CancelHandle, ItemError, OperationResult, ProgressState, WithTimeout,
};

pub use guard::{
    take_interrupted, FileMarkerStore, KeyEvent, MarkerStore, MemoryMarkerStore, ReloadGuard,
    UnloadDecision,
};
