//! Batch lifecycle: phase machine, chronology check, stream chunking.
//!
//! A batch moves through a fixed sequence of phases. Each transition is
//! validated so a coding error in the orchestrator surfaces as a hard
//! `Phase` error instead of silently corrupting state. `reset` is the only
//! unconditional edge; it is taken both on commit and on rejection.

use lantern_core::AdmittedEvent;

use crate::TrainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    Idle,
    BatchLoaded,
    MessagesBuilt,
    EmbeddingsPre,
    LossComputed,
    MemoriesUpdated,
    EmbeddingsPost,
}

impl BatchPhase {
    fn allows(self, next: BatchPhase) -> bool {
        use BatchPhase::*;
        matches!(
            (self, next),
            (Idle, BatchLoaded)
                | (BatchLoaded, MessagesBuilt)
                | (MessagesBuilt, EmbeddingsPre)
                | (EmbeddingsPre, LossComputed)
                | (LossComputed, MemoriesUpdated)
                | (MemoriesUpdated, EmbeddingsPost)
        )
    }
}

/// Tracks the current phase and rejects out-of-sequence transitions.
#[derive(Debug)]
pub struct PhaseTracker {
    current: BatchPhase,
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            current: BatchPhase::Idle,
        }
    }

    pub fn current(&self) -> BatchPhase {
        self.current
    }

    pub fn transition(&mut self, next: BatchPhase) -> Result<(), TrainError> {
        if !self.current.allows(next) {
            return Err(TrainError::Phase {
                from: self.current,
                to: next,
            });
        }
        self.current = next;
        Ok(())
    }

    /// Return to `Idle` from any phase.
    pub fn reset(&mut self) {
        self.current = BatchPhase::Idle;
    }
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Verify that batch timestamps never decrease. Ties are fine; the commit
/// order breaks them by ingestion sequence.
pub fn check_chronological(batch: &[AdmittedEvent]) -> Result<(), TrainError> {
    for pair in batch.windows(2) {
        if pair[1].ts_us() < pair[0].ts_us() {
            return Err(TrainError::BatchOrder {
                event_id: pair[1].event.id,
                ts_us: pair[1].ts_us(),
                prev_ts_us: pair[0].ts_us(),
            });
        }
    }
    Ok(())
}

/// Splits an admitted stream into contiguous fixed-size batches. The final
/// chunk may be short.
pub fn chunk_stream(events: &[AdmittedEvent], batch_size: usize) -> Vec<&[AdmittedEvent]> {
    events.chunks(batch_size.max(1)).collect()
}
