//! Batch Engine Module
//!
//! This module implements the greedy batching algorithm.
//! Records are visited once, in order. A batch is closed as soon as the next
//! record would push it over `max_batch_size` or `max_batch_count`; records
//! larger than `max_record_size` never enter a batch.

use crate::{
    BatchError, BatchEvent, BatchLimits, OversizedPolicy,
    batch::Batches,
    observer::{BatchObserver, NoopObserver},
};
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Upper bound on the capacity reserved up front for a new batch
const MAX_PREALLOCATED_RECORDS: usize = 1024;

/// Greedy accumulator holding the single open batch
///
/// Shared by the iterator adapter and the async pipeline so both apply the
/// exact same flush rules.
pub(crate) struct Accumulator<T> {
    limits: BatchLimits,
    current: Vec<T>,
    current_size: u64,
    /// Number of batches closed so far, also the index of the next one
    closed: usize,
    discarded: usize,
}

impl<T> Accumulator<T> {
    pub(crate) fn new(limits: BatchLimits) -> Self {
        Self {
            limits,
            current: Vec::new(),
            current_size: 0,
            closed: 0,
            discarded: 0,
        }
    }

    /// Offer one measured record
    ///
    /// Returns the batch that had to be closed to make room for `record`, if any.
    pub(crate) fn push(
        &mut self,
        index: usize,
        record: T,
        size: u64,
        observer: &dyn BatchObserver,
    ) -> Result<Option<Vec<T>>, BatchError> {
        if size > self.limits.max_record_size {
            return match self.limits.oversized {
                OversizedPolicy::Discard => {
                    debug!(index, size, "Record exceeds max_record_size, discarding");
                    self.discarded += 1;
                    observer.on_event(&BatchEvent::Discarded {
                        index,
                        record_size: size,
                    });
                    Ok(None)
                }
                OversizedPolicy::Reject => Err(BatchError::OversizedRecord {
                    index,
                    record_size: size,
                    max_record_size: self.limits.max_record_size,
                }),
            };
        }

        // Reaching max_batch_size exactly is allowed; only going over flushes
        let over_size = self.current_size.saturating_add(size) > self.limits.max_batch_size;
        let over_count = self.current.len() >= self.limits.max_batch_count;
        let closed = if over_size || over_count {
            self.close(observer, false)
        } else {
            None
        };

        if self.current.capacity() == 0 {
            self.current
                .reserve(self.limits.max_batch_count.min(MAX_PREALLOCATED_RECORDS));
        }
        self.current.push(record);
        self.current_size = self.current_size.saturating_add(size);

        Ok(closed)
    }

    /// Close the open batch, if it holds anything
    ///
    /// `last` selects which event is reported: `BatchFinal` at end of input,
    /// `BatchClosed` otherwise.
    pub(crate) fn close(&mut self, observer: &dyn BatchObserver, last: bool) -> Option<Vec<T>> {
        if self.current.is_empty() {
            return None;
        }

        let batch = std::mem::take(&mut self.current);
        let batch_size = std::mem::replace(&mut self.current_size, 0);
        let batch_index = self.closed;
        self.closed += 1;

        let record_count = batch.len();
        observer.on_event(&if last {
            BatchEvent::BatchFinal {
                batch_index,
                record_count,
                batch_size,
            }
        } else {
            BatchEvent::BatchClosed {
                batch_index,
                record_count,
                batch_size,
            }
        });

        Some(batch)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub(crate) fn batches_closed(&self) -> usize {
        self.closed
    }

    pub(crate) fn discarded(&self) -> usize {
        self.discarded
    }
}

/// Splits records into batches that respect a set of [`BatchLimits`]
///
/// Holds no per-call state, so one `Batcher` can be cloned or shared across
/// threads and reused for any number of inputs.
#[derive(Clone)]
pub struct Batcher {
    limits: BatchLimits,
    observer: Arc<dyn BatchObserver>,
}

impl Batcher {
    /// Creates a new batcher
    ///
    /// # Arguments
    /// * `limits` - Per-record and per-batch ceilings, in bytes and records
    ///
    /// # Returns
    /// `Err(BatchError::InvalidLimits)` if any limit is zero or
    /// `max_record_size > max_batch_size`
    pub fn new(limits: BatchLimits) -> Result<Self, BatchError> {
        limits.validate()?;
        Ok(Self {
            limits,
            observer: Arc::new(NoopObserver),
        })
    }

    /// Attach an observer that receives discard and flush events
    pub fn with_observer(mut self, observer: Arc<dyn BatchObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn limits(&self) -> &BatchLimits {
        &self.limits
    }

    pub(crate) fn observer(&self) -> Arc<dyn BatchObserver> {
        self.observer.clone()
    }

    /// Split `records` into batches, collecting them all
    ///
    /// # Returns
    /// * `Ok(batches)` in input order, none of them empty
    /// * `Err(BatchError::OversizedRecord)` under [`OversizedPolicy::Reject`];
    ///   no partial result is returned
    pub fn split<T, I, F>(&self, records: I, size_fn: F) -> Result<Vec<Vec<T>>, BatchError>
    where
        I: IntoIterator<Item = T>,
        F: FnMut(&T) -> u64,
    {
        self.batches(records, size_fn).collect()
    }

    /// Like [`Batcher::split`] but with a size function that can fail
    ///
    /// The first measurement failure stops processing and is returned as
    /// `BatchError::Measure`.
    pub fn try_split<T, I, F, E>(&self, records: I, size_fn: F) -> Result<Vec<Vec<T>>, BatchError>
    where
        I: IntoIterator<Item = T>,
        F: FnMut(&T) -> Result<u64, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        self.try_batches(records, size_fn).collect()
    }

    /// Lazily batch `records`, yielding each batch as soon as it is closed
    ///
    /// The iterator owns everything it needs and does not borrow the batcher.
    pub fn batches<T, I, F>(
        &self,
        records: I,
        mut size_fn: F,
    ) -> Batches<I::IntoIter, impl FnMut(&T) -> Result<u64, Infallible> + use<T, I, F>, Infallible>
    where
        I: IntoIterator<Item = T>,
        F: FnMut(&T) -> u64,
    {
        self.try_batches(records, move |record: &T| Ok::<u64, Infallible>(size_fn(record)))
    }

    /// Lazily batch `records` with a fallible size function
    pub fn try_batches<T, I, F, E>(&self, records: I, size_fn: F) -> Batches<I::IntoIter, F, E>
    where
        I: IntoIterator<Item = T>,
        F: FnMut(&T) -> Result<u64, E>,
    {
        Batches::new(
            records.into_iter(),
            size_fn,
            Accumulator::new(self.limits),
            self.observer.clone(),
        )
    }
}

impl fmt::Debug for Batcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batcher")
            .field("limits", &self.limits)
            .finish_non_exhaustive()
    }
}

/// Split `records` into batches bounded by `limits`
///
/// Limits are validated before any record is measured.
pub fn split_into_batches<T, I, F>(
    records: I,
    limits: BatchLimits,
    size_fn: F,
) -> Result<Vec<Vec<T>>, BatchError>
where
    I: IntoIterator<Item = T>,
    F: FnMut(&T) -> u64,
{
    Batcher::new(limits)?.split(records, size_fn)
}
