

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::models::ItemError;
use super::scheduler::BatchOperation;


/// Races the wrapped operation against a timer. The scheduler itself
/// never aborts an in-flight item; wrap the operation when a hard upper
/// bound per item is needed.
pub struct WithTimeout<Op> {
    inner: Op,
    timeout: Duration,
}

impl<Op> WithTimeout<Op> {
    pub fn new(inner: Op, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn with_default_timeout(inner: Op) -> Self {
        Self::new(inner, Duration::from_secs(crate::DEFAULT_REQUEST_TIMEOUT_SECS))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl<I, Op> BatchOperation<I> for WithTimeout<Op>
where
    I: Send + 'static,
    Op: BatchOperation<I>,
{
    type Output = Op::Output;

    async fn run(&self, item: I, index: usize) -> Result<Self::Output, ItemError> {
        match tokio::time::timeout(self.timeout, self.inner.run(item, index)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                debug!("Item {} timed out after {:?}", index, self.timeout);
                Err(ItemError::Timeout(self.timeout))
            }
        }
    }
}
