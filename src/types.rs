use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What to do with a record whose measured size exceeds `max_record_size`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OversizedPolicy {
    /// Drop the record and report it through the observer
    #[default]
    Discard,
    /// Fail the whole call on the first oversized record
    Reject,
}

/// Limits applied to every batch
///
/// All sizes are in bytes, the same unit the size function must return.
/// Doubles as the `[limits]` section of the configuration file; missing
/// fields fall back to [`BatchLimits::default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BatchLimits {
    pub max_record_size: u64,
    pub max_batch_size: u64,
    pub max_batch_count: usize,
    pub oversized: OversizedPolicy,
}

impl BatchLimits {
    pub fn new(max_record_size: u64, max_batch_size: u64, max_batch_count: usize) -> Self {
        Self {
            max_record_size,
            max_batch_size,
            max_batch_count,
            oversized: OversizedPolicy::Discard,
        }
    }

    pub fn with_oversized(mut self, policy: OversizedPolicy) -> Self {
        self.oversized = policy;
        self
    }

    /// Check the limits before any record is processed
    ///
    /// A record ceiling above the batch ceiling would let a single eligible
    /// record form a batch larger than `max_batch_size`, so it is rejected too.
    pub fn validate(&self) -> Result<(), BatchError> {
        if self.max_record_size == 0 {
            return Err(BatchError::InvalidLimits(
                "max_record_size must be positive".into(),
            ));
        }
        if self.max_batch_size == 0 {
            return Err(BatchError::InvalidLimits(
                "max_batch_size must be positive".into(),
            ));
        }
        if self.max_batch_count == 0 {
            return Err(BatchError::InvalidLimits(
                "max_batch_count must be positive".into(),
            ));
        }
        if self.max_record_size > self.max_batch_size {
            return Err(BatchError::InvalidLimits(format!(
                "max_record_size ({}) exceeds max_batch_size ({})",
                self.max_record_size, self.max_batch_size
            )));
        }
        Ok(())
    }
}

impl Default for BatchLimits {
    /// 1 MiB per record, 5 MiB and 500 records per batch
    fn default() -> Self {
        Self::new(1024 * 1024, 5 * 1024 * 1024, 500)
    }
}

/// Event reported to a [`crate::observer::BatchObserver`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BatchEvent {
    /// A record was dropped because it alone exceeds `max_record_size`
    #[serde(rename = "discard")]
    Discarded { index: usize, record_size: u64 },
    /// A batch was closed because the next record would break a limit
    BatchClosed {
        batch_index: usize,
        record_count: usize,
        batch_size: u64,
    },
    /// The trailing batch was closed at end of input
    BatchFinal {
        batch_index: usize,
        record_count: usize,
        batch_size: u64,
    },
}

/// Batching errors
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Invalid batch limits: {0}")]
    InvalidLimits(String),

    #[error("Record {index} is {record_size} bytes, above the {max_record_size} byte limit")]
    OversizedRecord {
        index: usize,
        record_size: u64,
        max_record_size: u64,
    },

    #[error("Failed to measure record {index}: {source}")]
    Measure {
        index: usize,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}
