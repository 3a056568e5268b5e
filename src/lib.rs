

pub mod accounts;
pub mod core;

pub use accounts::{AccountAction, AccountOperation, AccountsClient, AccountsError};
pub use crate::core::config::BulkOpsConfig;
pub use crate::core::error::{BulkOpsError, Result};
pub use crate::core::{BatchScheduler, ProgressState, ReloadGuard};


pub const DEFAULT_BATCH_SIZE: usize = 5;


pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;


pub const DEFAULT_MARKER_MAX_AGE_SECS: u64 = 600;
