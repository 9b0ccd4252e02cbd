//! Training orchestration for the dynamic-graph link model.
//!
//! The orchestrator drives the batch lifecycle: admit events, build
//! messages from pre-batch memory, embed endpoints, take a decoder step
//! against sampled negatives, then commit memory updates in timestamp
//! order. A failing batch is rolled back whole; the stream continues.

use thiserror::Error;

use lantern_core::DomainError;

pub mod batch;
pub mod checkpoint;
pub mod loss;
pub mod orchestrator;
pub mod sampler;

#[cfg(test)]
mod tests_determinism;
#[cfg(test)]
mod tests_proptest;

pub use batch::{check_chronological, chunk_stream, BatchPhase, PhaseTracker};
pub use checkpoint::{CheckpointError, Snapshot};
pub use loss::{bce, bce_dlogit, LossStats};
pub use orchestrator::{BatchOutcome, Trainer};
pub use sampler::NegativeEdgeSampler;

#[derive(Debug, Error)]
pub enum TrainError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("invalid phase transition {from:?} -> {to:?}")]
    Phase { from: BatchPhase, to: BatchPhase },

    #[error("event {event_id} at {ts_us}us precedes batch predecessor at {prev_ts_us}us")]
    BatchOrder {
        event_id: u64,
        ts_us: i64,
        prev_ts_us: i64,
    },
}
