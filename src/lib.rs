//! Greedy record batching.
//!
//! Groups an ordered sequence of variable-size records into batches bounded by
//! a per-record size ceiling, a per-batch size ceiling and a per-batch record
//! count. Used in front of bulk-write APIs and message producers that impose
//! such limits on a single submission.

pub mod types; // Limits, events and errors shared by every module.
pub mod size; // Size measurement helpers.
pub mod observer; // Observability hooks for discards and flushes.
pub mod batch; // The batching algorithm, lazy iterator and async pipeline.
pub mod config; // Defines and loads configuration.
pub mod logging; // tracing-subscriber setup.
pub mod input; // Newline-delimited record reader.
pub mod output; // Staged batch files for the command-line driver.

pub use types::*;
pub use config::Config;
pub use batch::{Batcher, split_into_batches};
