

mod config;
mod models;
mod partition;
mod scheduler;
mod timeout;

pub use config::{
    BatchCallbacks, BatchCompleteHandler, BatchConfig, BatchStartHandler, ItemCompleteHandler,
    ItemErrorHandler,
};
pub use models::{BatchSummary, ItemError, OperationResult, ProgressState};
pub use partition::{chunk_items, progress_percent, total_batches};
pub use scheduler::{operation_fn, BatchOperation, BatchScheduler, CancelHandle, FnOperation};
pub use timeout::WithTimeout;
