//! Lazy batch iterator
//!
//! Pulls records from the source only as needed and keeps at most one open
//! batch in memory, so arbitrarily long inputs can be batched in constant
//! memory per batch.

use crate::{BatchError, batch::engine::Accumulator, observer::BatchObserver};
use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::sync::Arc;

/// Iterator over the batches of a record source
///
/// Created by [`crate::batch::Batcher::batches`] and
/// [`crate::batch::Batcher::try_batches`]. Once an error has been yielded the
/// iterator is exhausted.
pub struct Batches<I: Iterator, F, E> {
    source: I,
    size_fn: F,
    accumulator: Accumulator<I::Item>,
    observer: Arc<dyn BatchObserver>,
    /// Input index of the next record pulled from `source`
    next_index: usize,
    done: bool,
    _error: PhantomData<fn() -> E>,
}

impl<I: Iterator, F, E> Batches<I, F, E> {
    pub(crate) fn new(
        source: I,
        size_fn: F,
        accumulator: Accumulator<I::Item>,
        observer: Arc<dyn BatchObserver>,
    ) -> Self {
        Self {
            source,
            size_fn,
            accumulator,
            observer,
            next_index: 0,
            done: false,
            _error: PhantomData,
        }
    }

    /// Records discarded as oversized so far
    pub fn discarded(&self) -> usize {
        self.accumulator.discarded()
    }

    /// Records pulled from the source so far, discarded ones included
    pub fn records_seen(&self) -> usize {
        self.next_index
    }
}

impl<I, F, E> Iterator for Batches<I, F, E>
where
    I: Iterator,
    F: FnMut(&I::Item) -> Result<u64, E>,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = Result<Vec<I::Item>, BatchError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        for record in self.source.by_ref() {
            let index = self.next_index;
            self.next_index += 1;

            let size = match (self.size_fn)(&record) {
                Ok(size) => size,
                Err(e) => {
                    self.done = true;
                    return Some(Err(BatchError::Measure {
                        index,
                        source: Box::new(e),
                    }));
                }
            };

            match self
                .accumulator
                .push(index, record, size, self.observer.as_ref())
            {
                Ok(Some(batch)) => return Some(Ok(batch)),
                Ok(None) => {}
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        self.done = true;
        self.accumulator
            .close(self.observer.as_ref(), true)
            .map(Ok)
    }
}

impl<I, F, E> FusedIterator for Batches<I, F, E>
where
    I: Iterator,
    F: FnMut(&I::Item) -> Result<u64, E>,
    E: std::error::Error + Send + Sync + 'static,
{
}
