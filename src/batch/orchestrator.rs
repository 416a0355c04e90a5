//! Batch Pipeline Module
//!
//! This module runs the greedy batching algorithm over records that arrive
//! asynchronously. It sits between a producer channel and a consumer channel:
//!
//! 1. Receive the next record from the input channel
//! 2. Measure it (stopping on a measurement failure) and offer it to the open batch
//! 3. Forward every batch that had to be closed to the output channel
//! 4. Optionally flush the open batch when no record arrived for `linger`
//! 5. Flush the trailing batch once the input channel closes

use crate::{
    BatchError,
    batch::{Batcher, engine::Accumulator},
};
use anyhow::anyhow;
use std::convert::Infallible;
use std::marker::PhantomData;
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};
use tracing::{debug, info};

/// Counters reported when a pipeline finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Records received from the input channel
    pub records_in: usize,
    /// Records dropped as oversized
    pub records_discarded: usize,
    /// Batches sent to the output channel
    pub batches_out: usize,
}

/// Channel-to-channel batching pipeline
///
/// Applies the same flush rules as [`Batcher::split`], one record at a time,
/// so the batches it emits match what the synchronous path would produce for
/// the same input (as long as the linger timer never fires).
pub struct BatchPipeline<T, F, E = Infallible> {
    /// Limits and observer
    batcher: Batcher,
    /// Size of a record in bytes
    size_fn: F,
    /// Idle time after which a non-empty open batch is flushed
    linger: Option<Duration>,
    _record: PhantomData<fn(T) -> E>,
}

impl<T, F> BatchPipeline<T, F, Infallible>
where
    T: Send,
    F: FnMut(&T) -> u64 + Send,
{
    /// Creates a new pipeline
    ///
    /// # Arguments
    /// * `batcher` - Validated limits and the observer to notify
    /// * `size_fn` - Measures each record, in bytes
    pub fn new(
        batcher: Batcher,
        mut size_fn: F,
    ) -> BatchPipeline<T, impl FnMut(&T) -> Result<u64, Infallible> + Send + use<T, F>, Infallible>
    {
        BatchPipeline::try_new(batcher, move |record: &T| {
            Ok::<u64, Infallible>(size_fn(record))
        })
    }
}

impl<T, F, E> BatchPipeline<T, F, E>
where
    T: Send,
    F: FnMut(&T) -> Result<u64, E> + Send,
    E: std::error::Error + Send + Sync + 'static,
{
    /// Creates a pipeline whose size function can fail
    ///
    /// The first measurement failure stops the pipeline with
    /// `BatchError::Measure`; batches already forwarded stay forwarded.
    pub fn try_new(batcher: Batcher, size_fn: F) -> Self {
        Self {
            batcher,
            size_fn,
            linger: None,
            _record: PhantomData,
        }
    }

    /// Flush the open batch if no record arrives within `linger`
    ///
    /// A zero duration disables the timer.
    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = (!linger.is_zero()).then_some(linger);
        self
    }

    /// Run until the input channel is closed
    ///
    /// # Returns
    /// * `Ok(PipelineStats)` once every batch has been forwarded
    /// * `Err` if a record is rejected as oversized, cannot be measured, or
    ///   the output receiver was dropped
    pub async fn run(
        mut self,
        mut input: mpsc::Receiver<T>,
        output: mpsc::Sender<Vec<T>>,
    ) -> anyhow::Result<PipelineStats> {
        let limits = *self.batcher.limits();
        let observer = self.batcher.observer();
        let mut accumulator = Accumulator::new(limits);
        let mut stats = PipelineStats::default();

        info!(
            "Batch pipeline starting: max_record_size={}, max_batch_size={}, max_batch_count={}, linger={:?}",
            limits.max_record_size, limits.max_batch_size, limits.max_batch_count, self.linger
        );

        loop {
            let next = match self.linger {
                Some(linger) if !accumulator.is_empty() => {
                    match timeout(linger, input.recv()).await {
                        Ok(next) => next,
                        Err(_) => {
                            debug!("Linger of {:?} expired, flushing open batch", linger);
                            if let Some(batch) = accumulator.close(observer.as_ref(), false) {
                                forward(&output, batch).await?;
                            }
                            continue;
                        }
                    }
                }
                _ => input.recv().await,
            };

            let Some(record) = next else {
                break;
            };

            let index = stats.records_in;
            stats.records_in += 1;
            let size = (self.size_fn)(&record).map_err(|e| BatchError::Measure {
                index,
                source: Box::new(e),
            })?;

            if let Some(batch) = accumulator.push(index, record, size, observer.as_ref())? {
                forward(&output, batch).await?;
            }
        }

        if let Some(batch) = accumulator.close(observer.as_ref(), true) {
            forward(&output, batch).await?;
        }

        stats.records_discarded = accumulator.discarded();
        stats.batches_out = accumulator.batches_closed();

        info!(
            "Batch pipeline finished: {} records in, {} discarded, {} batches out",
            stats.records_in, stats.records_discarded, stats.batches_out
        );
        Ok(stats)
    }
}

async fn forward<T>(output: &mpsc::Sender<Vec<T>>, batch: Vec<T>) -> anyhow::Result<()> {
    debug!("Forwarding batch of {} records", batch.len());
    output
        .send(batch)
        .await
        .map_err(|_| anyhow!("batch receiver dropped"))
}
