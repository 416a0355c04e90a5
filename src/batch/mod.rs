//! Batch Creation Module
//!
//! This module groups records into size- and count-bounded batches:
//! - Batcher: Validated limits plus the greedy single-pass algorithm
//! - Batches: Lazy iterator yielding one batch at a time
//! - BatchPipeline: Async channel-to-channel batching with optional linger flush

mod engine;
mod stream;
pub mod orchestrator;


pub use engine::{Batcher, split_into_batches};
pub use stream::Batches;
pub use orchestrator::{BatchPipeline, PipelineStats};
