//! Storage layer: one JSONL dataset per game, merged by draw id.

mod error;
pub use error::StoreError;

mod dataset;
pub use dataset::{DatasetStore, MergeOutcome, merge_records};
