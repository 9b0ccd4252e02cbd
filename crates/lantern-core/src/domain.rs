//! Domain types for the authentication event stream.
//!
//! Events carry microsecond timestamps and an opaque edge feature vector.
//! The `EventValidator` is the single admission gate: it enforces the
//! monotonic input invariant (with a configurable tolerance), checks feature
//! arity, and stamps every admitted event with an ingestion sequence number
//! used downstream as the deterministic tie-break for identical timestamps.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::DomainError;

// ============================================================================
// TIME HELPERS
// ============================================================================

/// Compute time delta with saturating subtraction to prevent wraparound.
/// If timestamps go backwards (now < last), returns 0 instead of wrapping.
///
/// # Arguments
/// * `now_us` - Current timestamp in microseconds
/// * `last_us` - Previous timestamp in microseconds
#[inline]
pub fn dt_us(now_us: i64, last_us: i64) -> u64 {
    if now_us >= last_us {
        (now_us - last_us) as u64
    } else {
        0
    }
}

/// Compute time delta in seconds with saturating subtraction.
/// Convenience wrapper around dt_us for floating-point calculations.
#[inline]
pub fn dt_sec(now_us: i64, last_us: i64) -> f32 {
    (dt_us(now_us, last_us) as f32) / 1_000_000.0
}

// ============================================================================
// NODES & EVENTS
// ============================================================================

/// Stable identifier for an entity (machine, user, credential).
///
/// Nodes are created on first appearance in the event stream and are never
/// destroyed for the lifetime of the process.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A single timestamped authentication event between two entities.
///
/// Immutable once ingested. Timestamps are expected to be non-decreasing
/// across the stream; violations beyond the configured tolerance are
/// quarantined by the [`EventValidator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// External event identifier
    pub id: u64,
    /// Source entity (the authenticating side)
    pub src: NodeId,
    /// Destination entity (the authenticated-to side)
    pub dst: NodeId,
    /// Event timestamp in microseconds
    pub ts_us: i64,
    /// Opaque edge feature vector of fixed, configured arity
    pub features: Array1<f32>,
}

impl Event {
    pub fn new(id: u64, src: NodeId, dst: NodeId, ts_us: i64, features: Array1<f32>) -> Self {
        Self {
            id,
            src,
            dst,
            ts_us,
            features,
        }
    }
}

/// An event that passed admission, stamped with its ingestion sequence
/// number. The sequence number is the deterministic tie-break when two
/// events carry an identical timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmittedEvent {
    pub event: Event,
    pub seq: u64,
}

impl AdmittedEvent {
    #[inline]
    pub fn ts_us(&self) -> i64 {
        self.event.ts_us
    }
}

// ============================================================================
// ADMISSION GATE
// ============================================================================

/// Stream admission gate enforcing the monotonic input invariant.
///
/// An event whose timestamp precedes the watermark by more than
/// `tolerance_us` is quarantined (the stream continues). An event with the
/// wrong feature arity is rejected the same way. Admitted events receive a
/// strictly increasing sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventValidator {
    expected_dim: usize,
    tolerance_us: i64,
    last_ts_us: Option<i64>,
    next_seq: u64,
    quarantined: u64,
}

impl EventValidator {
    pub fn new(expected_dim: usize, tolerance_us: i64) -> Self {
        Self {
            expected_dim,
            tolerance_us,
            last_ts_us: None,
            next_seq: 0,
            quarantined: 0,
        }
    }

    /// Admit one event, or quarantine it.
    ///
    /// # Returns
    /// * `Ok(admitted)` - Event passed the gate and received a sequence number
    /// * `Err(_)` - Event quarantined; internal state is untouched apart from
    ///   the quarantine counter, and the stream may continue
    pub fn admit(&mut self, event: Event) -> Result<AdmittedEvent, DomainError> {
        if event.features.len() != self.expected_dim {
            self.quarantined += 1;
            warn!(
                event_id = event.id,
                got = event.features.len(),
                expected = self.expected_dim,
                "feature arity mismatch, event quarantined"
            );
            return Err(DomainError::FeatureDimensionMismatch {
                event_id: event.id,
                got: event.features.len(),
                expected: self.expected_dim,
            });
        }

        if let Some(last) = self.last_ts_us {
            if event.ts_us < last - self.tolerance_us {
                self.quarantined += 1;
                warn!(
                    event_id = event.id,
                    ts_us = event.ts_us,
                    last_ts_us = last,
                    "timestamp regression, event quarantined"
                );
                return Err(DomainError::OutOfOrderEvent {
                    event_id: event.id,
                    ts_us: event.ts_us,
                    last_ts_us: last,
                });
            }
            // Within tolerance: accept as-is, watermark never moves backwards.
            self.last_ts_us = Some(last.max(event.ts_us));
        } else {
            self.last_ts_us = Some(event.ts_us);
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        Ok(AdmittedEvent { event, seq })
    }

    /// Highest timestamp admitted so far.
    pub fn watermark_us(&self) -> Option<i64> {
        self.last_ts_us
    }

    /// Number of events quarantined since creation.
    pub fn quarantined(&self) -> u64 {
        self.quarantined
    }

    /// Next ingestion sequence number to be assigned.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Restore watermark and sequence counter from a checkpoint.
    pub fn resume_at(&mut self, watermark_us: Option<i64>, next_seq: u64) {
        self.last_ts_us = watermark_us;
        self.next_seq = next_seq;
    }
}
