//! Error taxonomy for the streaming core.
//!
//! Cold start (a node or neighbor history that simply does not exist yet) is
//! deliberately not represented here; it is a normal fallback path, never an
//! error.

use thiserror::Error;

use crate::domain::NodeId;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DomainError {
    /// Incoming event precedes the stream watermark beyond tolerance.
    /// The event is quarantined; the stream continues.
    #[error("out-of-order event {event_id}: ts={ts_us}us < watermark={last_ts_us}us")]
    OutOfOrderEvent {
        event_id: u64,
        ts_us: i64,
        last_ts_us: i64,
    },

    /// Attempted memory update with a timestamp older than the node's last
    /// update. Indicates an ordering bug in batch construction; fatal to the
    /// batch, never partially applied.
    #[error("stale update for {node}: t={ts_us}us < last_update={last_update_us}us")]
    StaleUpdate {
        node: NodeId,
        ts_us: i64,
        last_update_us: i64,
    },

    /// Reading memory "as of t" would observe state written at a later time.
    #[error("temporal leak for {node}: query t={query_us}us but memory updated at {last_update_us}us")]
    TemporalLeak {
        node: NodeId,
        query_us: i64,
        last_update_us: i64,
    },

    /// Edge feature vector arity differs from the configured dimensionality.
    /// The offending event is rejected; the stream continues.
    #[error("feature dimension mismatch on event {event_id}: got {got}, expected {expected}")]
    FeatureDimensionMismatch {
        event_id: u64,
        got: usize,
        expected: usize,
    },
}
