

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::Poll;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tokio::sync::{watch, Notify};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::{BatchCallbacks, BatchConfig};
use super::models::{ItemError, OperationResult, ProgressState};
use super::partition::{chunk_items, progress_percent};
use crate::core::error::Result;


#[async_trait]
pub trait BatchOperation<I: Send + 'static>: Send + Sync {
    type Output: Send + 'static;

    /// `index` is the item's position in the full input list.
    async fn run(&self, item: I, index: usize) -> std::result::Result<Self::Output, ItemError>;
}

#[async_trait]
impl<I, T> BatchOperation<I> for Arc<T>
where
    I: Send + 'static,
    T: BatchOperation<I> + ?Sized,
{
    type Output = T::Output;

    async fn run(&self, item: I, index: usize) -> std::result::Result<Self::Output, ItemError> {
        (**self).run(item, index).await
    }
}


pub struct FnOperation<F> {
    f: F,
}


pub fn operation_fn<I, O, F, Fut>(f: F) -> FnOperation<F>
where
    F: Fn(I, usize) -> Fut,
    Fut: Future<Output = std::result::Result<O, ItemError>>,
{
    FnOperation { f }
}

#[async_trait]
impl<I, O, F, Fut> BatchOperation<I> for FnOperation<F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I, usize) -> Fut + Send + Sync,
    Fut: Future<Output = std::result::Result<O, ItemError>> + Send + 'static,
{
    type Output = O;

    async fn run(&self, item: I, index: usize) -> std::result::Result<O, ItemError> {
        (self.f)(item, index).await
    }
}


struct Shared<I, O> {
    state: watch::Sender<ProgressState<I, O>>,
    cancelled: AtomicBool,
    wake: Notify,
}


pub struct CancelHandle<I, O> {
    shared: Arc<Shared<I, O>>,
}

impl<I, O> Clone for CancelHandle<I, O> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<I, O> CancelHandle<I, O> {
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::SeqCst);
        self.shared.state.send_modify(|state| {
            state.is_processing = false;
            state.current_batch_items.clear();
        });
        self.shared.wake.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }
}


/// Runs items in fixed-size concurrent waves, one wave at a time.
///
/// A scheduler drives a single `process` call at a time. Running two
/// `process` calls concurrently on one instance interleaves their
/// updates to the shared progress state; use one scheduler per bulk run.
pub struct BatchScheduler<I, Op>
where
    I: Clone + Send + Sync + 'static,
    Op: BatchOperation<I>,
{
    operation: Op,
    config: BatchConfig,
    callbacks: BatchCallbacks<I, Op::Output>,
    shared: Arc<Shared<I, Op::Output>>,
}

impl<I, Op> BatchScheduler<I, Op>
where
    I: Clone + Send + Sync + 'static,
    Op: BatchOperation<I>,
    Op::Output: Clone + Sync,
{
    pub fn new(operation: Op, config: BatchConfig) -> Result<Self> {
        config.validate()?;

        info!(
            "BatchScheduler initialized: batch_size={}, delay={:?}",
            config.batch_size, config.delay_between_batches
        );

        Ok(Self {
            operation,
            config,
            callbacks: BatchCallbacks::new(),
            shared: Arc::new(Shared {
                state: watch::Sender::new(ProgressState::default()),
                cancelled: AtomicBool::new(false),
                wake: Notify::new(),
            }),
        })
    }

    #[must_use]
    pub fn with_callbacks(mut self, callbacks: BatchCallbacks<I, Op::Output>) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    pub fn cancel_handle(&self) -> CancelHandle<I, Op::Output> {
        CancelHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Stops the run at the next batch boundary. Operations already
    /// dispatched keep running and their results are still collected.
    pub fn cancel(&self) {
        info!("Batch run cancellation requested");
        self.cancel_handle().cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.cancelled.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.shared.cancelled.store(false, Ordering::SeqCst);
        self.shared.state.send_replace(ProgressState::default());
    }

    pub fn snapshot(&self) -> ProgressState<I, Op::Output> {
        self.shared.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProgressState<I, Op::Output>> {
        self.shared.state.subscribe()
    }

    pub async fn process(&self, items: Vec<I>) -> Vec<OperationResult<I, Op::Output>> {
        if items.is_empty() {
            debug!("Batch run skipped: no items");
            return Vec::new();
        }

        let batches = match chunk_items(&items, self.config.batch_size) {
            Ok(batches) => batches,
            Err(e) => {
                error!("Batch run aborted: {}", e);
                return Vec::new();
            }
        };

        let run_id = Uuid::new_v4();
        let total_count = items.len();
        let total_batches = batches.len();

        self.shared.cancelled.store(false, Ordering::SeqCst);
        self.shared.state.send_replace(ProgressState {
            run_id: Some(run_id),
            is_processing: true,
            total_batches,
            total_count,
            started_at: Some(Utc::now()),
            ..Default::default()
        });

        info!(
            "Batch run {} started: {} items in {} batches (batch_size={})",
            run_id, total_count, total_batches, self.config.batch_size
        );

        let mut all_results = Vec::with_capacity(total_count);
        let mut global_index = 0;

        for (batch_index, batch) in batches.into_iter().enumerate() {
            if self.is_cancelled() {
                info!(
                    "Batch run {} cancelled before batch {}/{}",
                    run_id,
                    batch_index + 1,
                    total_batches
                );
                break;
            }

            let batch_len = batch.len();
            match self.run_batch(batch, batch_index, global_index).await {
                Some(results) => all_results.extend(results),
                None => break,
            }
            global_index += batch_len;

            let is_last = batch_index + 1 == total_batches;
            let delay = self.config.delay_between_batches;
            if !is_last && !delay.is_zero() && !self.is_cancelled() {
                self.pause(delay).await;
            }
        }

        let cancelled = self.is_cancelled();
        self.shared.state.send_modify(|state| {
            state.is_processing = false;
            state.current_batch = 0;
            state.current_batch_items.clear();
            // A cancelled run reports how far it actually got.
            state.progress = if cancelled {
                progress_percent(state.processed_count, state.total_count)
            } else {
                100
            };
            state.finished_at = Some(Utc::now());
        });

        if let Some(on_complete) = &self.callbacks.on_complete {
            on_complete(&all_results);
        }

        let succeeded = all_results.iter().filter(|r| r.success()).count();
        info!(
            "Batch run {} {}: {}/{} processed, {} succeeded, {} failed",
            run_id,
            if cancelled { "cancelled" } else { "complete" },
            all_results.len(),
            total_count,
            succeeded,
            all_results.len() - succeeded
        );

        all_results
    }

    async fn run_batch(
        &self,
        batch: Vec<I>,
        batch_index: usize,
        global_index: usize,
    ) -> Option<Vec<OperationResult<I, Op::Output>>> {
        if let Some(on_batch_start) = &self.callbacks.on_batch_start {
            on_batch_start(&batch);
        }

        if self.is_cancelled() {
            debug!("Batch {} abandoned: cancelled during start", batch_index + 1);
            return None;
        }

        debug!(
            "Processing batch {} ({} items, first index {})",
            batch_index + 1,
            batch.len(),
            global_index
        );

        self.shared.state.send_modify(|state| {
            state.current_batch = batch_index + 1;
            state.current_batch_items = batch.clone();
        });

        let operation = &self.operation;
        let dispatched = batch.iter().cloned().enumerate().map(|(offset, item)| {
            let index = global_index + offset;
            Box::pin(async move {
                let outcome = AssertUnwindSafe(operation.run(item.clone(), index))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| Err(ItemError::Panicked(panic_message(panic))));

                (offset, OperationResult { input: item, index, outcome })
            })
        });

        // Every item is started before any outcome is reported.
        let mut settled = Vec::new();
        let mut pending = FuturesUnordered::new();
        for mut item in dispatched {
            match futures::poll!(&mut item) {
                Poll::Ready(done) => settled.push(done),
                Poll::Pending => pending.push(item),
            }
        }

        let mut slots: Vec<Option<OperationResult<I, Op::Output>>> =
            batch.iter().map(|_| None).collect();

        for (offset, result) in settled {
            self.report_item(&result);
            slots[offset] = Some(result);
        }
        while let Some((offset, result)) = pending.next().await {
            self.report_item(&result);
            slots[offset] = Some(result);
        }

        let results: Vec<_> = slots.into_iter().flatten().collect();
        let succeeded = results.iter().filter(|r| r.success()).count();
        let failed = results.len() - succeeded;

        self.shared.state.send_modify(|state| {
            state.processed_count += results.len();
            state.success_count += succeeded;
            state.failed_count += failed;
            state.results.extend(results.iter().cloned());
            state.progress = progress_percent(state.processed_count, state.total_count);
            state.current_batch_items.clear();
        });

        debug!(
            "Batch {} complete: {} succeeded, {} failed",
            batch_index + 1,
            succeeded,
            failed
        );

        if let Some(on_batch_complete) = &self.callbacks.on_batch_complete {
            on_batch_complete(&results);
        }

        Some(results)
    }

    fn report_item(&self, result: &OperationResult<I, Op::Output>) {
        if let Some(err) = result.error() {
            warn!("Item {} failed: {}", result.index, err);
            if let Some(on_error) = &self.callbacks.on_error {
                on_error(err, &result.input);
            }
        }
        if let Some(on_item_complete) = &self.callbacks.on_item_complete {
            on_item_complete(&result.input, result);
        }
    }

    async fn pause(&self, delay: Duration) {
        let notified = self.shared.wake.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_cancelled() {
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = notified => debug!("Inter-batch delay interrupted by cancellation"),
        }
    }
}


fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn echo_index() -> impl BatchOperation<&'static str, Output = usize> {
        operation_fn(|_item: &'static str, index: usize| async move { Ok(index) })
    }

    #[tokio::test]
    async fn test_batches_run_in_order_without_overlap() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let start_log = Arc::clone(&log);
        let complete_log = Arc::clone(&log);

        let scheduler = BatchScheduler::new(echo_index(), BatchConfig::new(2))
            .unwrap()
            .with_callbacks(
                BatchCallbacks::new()
                    .on_batch_start(move |batch: &[&str]| {
                        start_log.lock().push(format!("start:{}", batch.join(",")));
                    })
                    .on_batch_complete(move |results| {
                        complete_log.lock().push(format!("complete:{}", results.len()));
                    }),
            );

        let results = scheduler.process(vec!["a", "b", "c", "d", "e"]).await;

        assert_eq!(results.len(), 5);
        assert_eq!(
            *log.lock(),
            vec![
                "start:a,b",
                "complete:2",
                "start:c,d",
                "complete:2",
                "start:e",
                "complete:1",
            ]
        );
    }

    #[tokio::test]
    async fn test_results_keep_input_order_and_global_index() {
        let scheduler = BatchScheduler::new(echo_index(), BatchConfig::new(3)).unwrap();
        let items = vec!["a", "b", "c", "d", "e", "f", "g"];

        let results = scheduler.process(items.clone()).await;

        let inputs: Vec<_> = results.iter().map(|r| r.input).collect();
        assert_eq!(inputs, items);
        for (position, result) in results.iter().enumerate() {
            assert_eq!(result.index, position);
            assert_eq!(result.data(), Some(&position));
        }
    }

    #[tokio::test]
    async fn test_counts_after_full_run() {
        let op = operation_fn(|item: u32, _index: usize| async move {
            if item % 3 == 0 {
                Err(ItemError::failed(format!("item {} rejected", item)))
            } else {
                Ok(item * 10)
            }
        });
        let scheduler = BatchScheduler::new(op, BatchConfig::new(4)).unwrap();

        let results = scheduler.process((1..=10).collect()).await;
        let state = scheduler.snapshot();

        assert_eq!(results.len(), 10);
        assert_eq!(state.total_count, 10);
        assert_eq!(state.processed_count, 10);
        assert_eq!(state.success_count + state.failed_count, state.processed_count);
        assert_eq!(state.failed_count, 3);
        assert_eq!(state.results.len(), 10);
        assert_eq!(state.total_batches, 3);
        assert_eq!(state.current_batch, 0);
        assert_eq!(state.progress, 100);
        assert!(!state.is_processing);
        assert!(state.current_batch_items.is_empty());
        assert!(state.run_id.is_some());
        assert!(state.is_finished());
    }

    #[tokio::test]
    async fn test_single_failure_is_isolated() {
        let errors = Arc::new(AtomicUsize::new(0));
        let errors_seen = Arc::clone(&errors);

        let op = operation_fn(|item: u32, _index: usize| async move {
            if item == 3 {
                Err(ItemError::failed("login unsuccessful"))
            } else {
                Ok(())
            }
        });
        let scheduler = BatchScheduler::new(op, BatchConfig::new(2))
            .unwrap()
            .with_callbacks(BatchCallbacks::new().on_error(move |_err, item: &u32| {
                assert_eq!(*item, 3);
                errors_seen.fetch_add(1, Ordering::SeqCst);
            }));

        let results = scheduler.process(vec![1, 2, 3, 4, 5]).await;

        assert_eq!(results.len(), 5);
        let failures: Vec<_> = results.iter().filter(|r| !r.success()).collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].input, 3);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_panicking_operation_becomes_failed_result() {
        let op = operation_fn(|item: u32, _index: usize| async move {
            if item == 2 {
                panic!("operation exploded");
            }
            Ok(item)
        });
        let scheduler = BatchScheduler::new(op, BatchConfig::new(3)).unwrap();

        let results = scheduler.process(vec![1, 2, 3]).await;

        assert_eq!(results.len(), 3);
        assert_eq!(
            results[1].error(),
            Some(&ItemError::Panicked("operation exploded".to_string()))
        );
        assert!(results[0].success() && results[2].success());
    }

    #[tokio::test]
    async fn test_items_within_batch_run_concurrently() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let op = {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            operation_fn(move |_item: u32, _index: usize| {
                let in_flight = Arc::clone(&in_flight);
                let peak = Arc::clone(&peak);
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(30)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
        };
        let scheduler = BatchScheduler::new(op, BatchConfig::new(3)).unwrap();

        let started = Instant::now();
        let results = scheduler.process((0..7).collect()).await;

        assert_eq!(results.len(), 7);
        assert_eq!(peak.load(Ordering::SeqCst), 3);
        // Three waves of ~30ms each; sequential execution would take ~210ms.
        assert!(started.elapsed() < Duration::from_millis(180));
    }

    #[tokio::test]
    async fn test_item_callbacks_fire_in_settle_order() {
        let settled = Arc::new(Mutex::new(Vec::new()));
        let settled_log = Arc::clone(&settled);

        let op = operation_fn(|item: &'static str, _index: usize| async move {
            let wait = if item == "slow" { 60 } else { 5 };
            tokio::time::sleep(Duration::from_millis(wait)).await;
            Ok(())
        });
        let scheduler = BatchScheduler::new(op, BatchConfig::new(2))
            .unwrap()
            .with_callbacks(BatchCallbacks::new().on_item_complete(
                move |item: &&'static str, _result| {
                    settled_log.lock().push(*item);
                },
            ));

        let results = scheduler.process(vec!["slow", "fast"]).await;

        assert_eq!(*settled.lock(), vec!["fast", "slow"]);
        let inputs: Vec<_> = results.iter().map(|r| r.input).collect();
        assert_eq!(inputs, vec!["slow", "fast"]);
    }

    #[tokio::test]
    async fn test_whole_batch_starts_before_any_item_reports() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let start_log = Arc::clone(&log);
        let done_log = Arc::clone(&log);

        // Completes on first poll.
        let op = operation_fn(move |item: u32, _index: usize| {
            let log = Arc::clone(&start_log);
            async move {
                log.lock().push(format!("start{}", item));
                Ok::<u32, ItemError>(item)
            }
        });
        let scheduler = BatchScheduler::new(op, BatchConfig::new(3))
            .unwrap()
            .with_callbacks(BatchCallbacks::new().on_item_complete(
                move |item: &u32, _result| {
                    done_log.lock().push(format!("done{}", item));
                },
            ));

        let results = scheduler.process(vec![0, 1, 2, 3]).await;
        assert_eq!(results.len(), 4);

        assert_eq!(
            *log.lock(),
            vec!["start0", "start1", "start2", "done0", "done1", "done2", "start3", "done3"]
        );
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_and_ends_at_100() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_log = Arc::clone(&seen);

        let scheduler = BatchScheduler::new(echo_index(), BatchConfig::new(2)).unwrap();
        let rx = scheduler.subscribe();
        let scheduler = scheduler.with_callbacks(BatchCallbacks::new().on_batch_complete(
            move |_results| {
                seen_log.lock().push(rx.borrow().progress);
            },
        ));

        scheduler.process(vec!["a", "b", "c", "d", "e"]).await;

        assert_eq!(*seen.lock(), vec![40, 80, 100]);
        assert_eq!(scheduler.snapshot().progress, 100);
    }

    #[tokio::test]
    async fn test_empty_input_fires_nothing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (a, b, c) = (Arc::clone(&calls), Arc::clone(&calls), Arc::clone(&calls));

        let scheduler = BatchScheduler::new(echo_index(), BatchConfig::new(2))
            .unwrap()
            .with_callbacks(
                BatchCallbacks::new()
                    .on_batch_start(move |_| {
                        a.fetch_add(1, Ordering::SeqCst);
                    })
                    .on_batch_complete(move |_| {
                        b.fetch_add(1, Ordering::SeqCst);
                    })
                    .on_complete(move |_| {
                        c.fetch_add(1, Ordering::SeqCst);
                    }),
            );

        let results = scheduler.process(Vec::new()).await;
        let state = scheduler.snapshot();

        assert!(results.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(state.run_id.is_none());
        assert_eq!(state.total_count, 0);
        assert_eq!(state.progress, 0);
        assert!(!state.is_processing);
    }

    #[tokio::test]
    async fn test_cancel_after_first_batch_stops_later_batches() {
        let dispatched = Arc::new(AtomicUsize::new(0));

        let op = {
            let dispatched = Arc::clone(&dispatched);
            operation_fn(move |item: u32, _index: usize| {
                dispatched.fetch_add(1, Ordering::SeqCst);
                async move { Ok(item) }
            })
        };
        let scheduler = BatchScheduler::new(op, BatchConfig::new(2)).unwrap();
        let handle = scheduler.cancel_handle();
        let scheduler = scheduler.with_callbacks(BatchCallbacks::new().on_batch_complete(
            move |_results| handle.cancel(),
        ));

        let results = scheduler.process(vec![1, 2, 3, 4, 5, 6]).await;
        let state = scheduler.snapshot();

        assert_eq!(results.len(), 2);
        assert_eq!(dispatched.load(Ordering::SeqCst), 2);
        assert!(!state.is_processing);
        assert!(scheduler.is_cancelled());
        assert_eq!(state.processed_count, 2);
        assert_eq!(state.progress, 33);
    }

    #[tokio::test]
    async fn test_cancel_cuts_inter_batch_delay_short() {
        let config = BatchConfig::new(1).with_delay(Duration::from_secs(5));
        let scheduler = BatchScheduler::new(echo_index(), config).unwrap();
        let handle = scheduler.cancel_handle();

        let started = Instant::now();
        let (results, _) = tokio::join!(scheduler.process(vec!["a", "b", "c"]), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            handle.cancel();
        });

        assert_eq!(results.len(), 1);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_cancel_mid_batch_collects_in_flight_results() {
        let op = operation_fn(|item: u32, _index: usize| async move {
            tokio::time::sleep(Duration::from_millis(60)).await;
            Ok(item)
        });
        let scheduler = BatchScheduler::new(op, BatchConfig::new(2)).unwrap();

        let (results, _) = tokio::join!(scheduler.process(vec![1, 2, 3, 4]), async {
            tokio::time::sleep(Duration::from_millis(15)).await;
            scheduler.cancel();

            let state = scheduler.snapshot();
            assert!(!state.is_processing);
            assert!(state.current_batch_items.is_empty());
        });

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success()));

        let state = scheduler.snapshot();
        assert_eq!(state.processed_count, 2);
        assert_eq!(state.results.len(), 2);
        assert_eq!(state.progress, 50);
    }

    #[tokio::test]
    async fn test_process_clears_previous_cancellation() {
        let scheduler = BatchScheduler::new(echo_index(), BatchConfig::new(2)).unwrap();
        scheduler.cancel();

        let results = scheduler.process(vec!["a", "b", "c"]).await;

        assert_eq!(results.len(), 3);
        assert!(!scheduler.is_cancelled());
    }

    #[tokio::test]
    async fn test_reset_restores_initial_state() {
        let scheduler = BatchScheduler::new(echo_index(), BatchConfig::new(2)).unwrap();
        scheduler.process(vec!["a", "b", "c"]).await;
        scheduler.cancel();

        scheduler.reset();

        let state = scheduler.snapshot();
        assert!(!scheduler.is_cancelled());
        assert!(state.run_id.is_none());
        assert_eq!(state.processed_count, 0);
        assert_eq!(state.total_batches, 0);
        assert!(state.results.is_empty());
        assert_eq!(state.progress, 0);
    }

    #[test]
    fn test_zero_batch_size_rejected_before_run() {
        let result = BatchScheduler::new(echo_index(), BatchConfig::new(0));
        assert!(matches!(
            result,
            Err(crate::core::error::BulkOpsError::InvalidBatchSize(0))
        ));
    }
}
