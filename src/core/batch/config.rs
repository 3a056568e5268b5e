

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::models::{ItemError, OperationResult};
use crate::core::error::{BulkOpsError, Result};


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchConfig {

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,


    #[serde(default)]
    pub delay_between_batches: Duration,
}

fn default_batch_size() -> usize { crate::DEFAULT_BATCH_SIZE }

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            delay_between_batches: Duration::ZERO,
        }
    }
}

impl BatchConfig {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size,
            ..Default::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay_between_batches = delay;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(BulkOpsError::InvalidBatchSize(self.batch_size));
        }
        Ok(())
    }
}


pub type BatchStartHandler<I> = Arc<dyn Fn(&[I]) + Send + Sync>;
pub type BatchCompleteHandler<I, O> = Arc<dyn Fn(&[OperationResult<I, O>]) + Send + Sync>;
pub type ItemCompleteHandler<I, O> = Arc<dyn Fn(&I, &OperationResult<I, O>) + Send + Sync>;
pub type ItemErrorHandler<I> = Arc<dyn Fn(&ItemError, &I) + Send + Sync>;


/// Observer hooks invoked inline by the scheduler's driving loop.
pub struct BatchCallbacks<I, O> {
    pub(crate) on_batch_start: Option<BatchStartHandler<I>>,
    pub(crate) on_batch_complete: Option<BatchCompleteHandler<I, O>>,
    pub(crate) on_item_complete: Option<ItemCompleteHandler<I, O>>,
    pub(crate) on_error: Option<ItemErrorHandler<I>>,
    pub(crate) on_complete: Option<BatchCompleteHandler<I, O>>,
}

impl<I, O> BatchCallbacks<I, O> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            on_batch_start: None,
            on_batch_complete: None,
            on_item_complete: None,
            on_error: None,
            on_complete: None,
        }
    }

    #[must_use]
    pub fn on_batch_start(mut self, f: impl Fn(&[I]) + Send + Sync + 'static) -> Self {
        self.on_batch_start = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_batch_complete(
        mut self,
        f: impl Fn(&[OperationResult<I, O>]) + Send + Sync + 'static,
    ) -> Self {
        self.on_batch_complete = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_item_complete(
        mut self,
        f: impl Fn(&I, &OperationResult<I, O>) + Send + Sync + 'static,
    ) -> Self {
        self.on_item_complete = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_error(mut self, f: impl Fn(&ItemError, &I) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn on_complete(
        mut self,
        f: impl Fn(&[OperationResult<I, O>]) + Send + Sync + 'static,
    ) -> Self {
        self.on_complete = Some(Arc::new(f));
        self
    }
}

impl<I, O> Default for BatchCallbacks<I, O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I, O> Clone for BatchCallbacks<I, O> {
    fn clone(&self) -> Self {
        Self {
            on_batch_start: self.on_batch_start.clone(),
            on_batch_complete: self.on_batch_complete.clone(),
            on_item_complete: self.on_item_complete.clone(),
            on_error: self.on_error.clone(),
            on_complete: self.on_complete.clone(),
        }
    }
}

impl<I, O> fmt::Debug for BatchCallbacks<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchCallbacks")
            .field("on_batch_start", &self.on_batch_start.is_some())
            .field("on_batch_complete", &self.on_batch_complete.is_some())
            .field("on_item_complete", &self.on_item_complete.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}
