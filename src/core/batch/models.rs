

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;


#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ItemError {
    #[error("Operation failed: {0}")]
    Failed(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Remote error (code {code}): {message}")]
    Remote { code: i64, message: String },

    #[error("Operation panicked: {0}")]
    Panicked(String),
}

impl ItemError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}


#[derive(Debug, Clone, Serialize)]
pub struct OperationResult<I, O> {
    pub input: I,
    pub index: usize,
    pub outcome: Result<O, ItemError>,
}

impl<I, O> OperationResult<I, O> {
    pub fn succeeded(input: I, index: usize, data: O) -> Self {
        Self { input, index, outcome: Ok(data) }
    }

    pub fn failed(input: I, index: usize, error: ItemError) -> Self {
        Self { input, index, outcome: Err(error) }
    }

    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn data(&self) -> Option<&O> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&ItemError> {
        self.outcome.as_ref().err()
    }
}


#[derive(Debug, Clone, Serialize)]
pub struct ProgressState<I, O> {
    pub run_id: Option<Uuid>,
    pub is_processing: bool,
    /// 1-based index of the executing batch, 0 when idle.
    pub current_batch: usize,
    pub total_batches: usize,
    pub processed_count: usize,
    pub total_count: usize,
    pub success_count: usize,
    pub failed_count: usize,
    pub current_batch_items: Vec<I>,
    pub results: Vec<OperationResult<I, O>>,
    pub progress: u8,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl<I, O> Default for ProgressState<I, O> {
    fn default() -> Self {
        Self {
            run_id: None,
            is_processing: false,
            current_batch: 0,
            total_batches: 0,
            processed_count: 0,
            total_count: 0,
            success_count: 0,
            failed_count: 0,
            current_batch_items: Vec::new(),
            results: Vec::new(),
            progress: 0,
            started_at: None,
            finished_at: None,
        }
    }
}

impl<I, O> ProgressState<I, O> {
    pub fn remaining_count(&self) -> usize {
        self.total_count.saturating_sub(self.processed_count)
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }
}


#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary<I> {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Inputs that failed, in input order. Re-run these to retry.
    pub failed_inputs: Vec<I>,
    pub cancelled: bool,
}

impl<I: Clone> BatchSummary<I> {
    pub fn from_results<O>(results: &[OperationResult<I, O>], expected: usize) -> Self {
        let failed_inputs: Vec<I> = results
            .iter()
            .filter(|r| !r.success())
            .map(|r| r.input.clone())
            .collect();
        let failed = failed_inputs.len();

        Self {
            total: results.len(),
            succeeded: results.len() - failed,
            failed,
            failed_inputs,
            cancelled: results.len() < expected,
        }
    }
}

impl<I> BatchSummary<I> {
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.failed == 0
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.succeeded as f64 / self.total as f64
        }
    }
}
