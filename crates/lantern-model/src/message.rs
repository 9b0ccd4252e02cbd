//! Message construction for memory updates.
//!
//! Each event produces one message per endpoint, derived from the pre-event
//! memories of both endpoints, a continuous encoding of the time since that
//! endpoint's last update, and the edge feature vector. Messages are
//! transient: they are consumed by the memory updater within the same batch
//! and never persisted.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use lantern_core::{dt_sec, AdmittedEvent, DomainError, MessageKind, NodeId};

use crate::memory::MemoryStore;
use crate::nn::{concat, relu, Linear};
use crate::time_encoding::{TimeEncoder, TimeShiftStats};

/// A pending memory update for one endpoint of one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub target: NodeId,
    pub content: Array1<f32>,
    pub ts_us: i64,
    /// Ingestion sequence of the originating event, the intra-batch
    /// tie-break for equal timestamps
    pub seq: u64,
    pub event_id: u64,
}

/// Builds per-endpoint messages from events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageBuilder {
    kind: MessageKind,
    /// Hidden layer used by the mlp variant; identity keeps the raw
    /// concatenation
    hidden: Option<(Linear, Linear)>,
    raw_dim: usize,
}

impl MessageBuilder {
    pub fn new(kind: MessageKind, raw_dim: usize, seed: u64) -> Self {
        let hidden = match kind {
            MessageKind::Identity => None,
            MessageKind::Mlp => Some((
                Linear::seeded(raw_dim, raw_dim, seed),
                Linear::seeded(raw_dim, raw_dim, seed.wrapping_add(1)),
            )),
        };
        Self {
            kind,
            hidden,
            raw_dim,
        }
    }

    /// Output message width. Both variants preserve the raw width so the
    /// updater's input dimension is independent of the variant.
    pub fn message_dim(&self) -> usize {
        self.raw_dim
    }

    /// Build the two endpoint messages for an event, reading only state
    /// written strictly before the event's own timestamp.
    pub fn build(
        &self,
        admitted: &AdmittedEvent,
        store: &MemoryStore,
        encoder: &TimeEncoder,
        stats: &TimeShiftStats,
    ) -> Result<(Message, Message), DomainError> {
        let event = &admitted.event;
        let src_mem = store.memory_as_of(event.src, event.ts_us)?;
        let dst_mem = store.memory_as_of(event.dst, event.ts_us)?;
        let src_last = store.last_update(event.src);
        let dst_last = store.last_update(event.dst);

        let src_msg = self.assemble(
            event.src,
            &src_mem,
            &dst_mem,
            elapsed(event.ts_us, src_last),
            admitted,
            encoder,
            stats,
        );
        let dst_msg = self.assemble(
            event.dst,
            &dst_mem,
            &src_mem,
            elapsed(event.ts_us, dst_last),
            admitted,
            encoder,
            stats,
        );
        Ok((src_msg, dst_msg))
    }

    #[allow(clippy::too_many_arguments)]
    fn assemble(
        &self,
        target: NodeId,
        self_mem: &Array1<f32>,
        other_mem: &Array1<f32>,
        dt_seconds: f32,
        admitted: &AdmittedEvent,
        encoder: &TimeEncoder,
        stats: &TimeShiftStats,
    ) -> Message {
        let phi = encoder.encode(dt_seconds, stats);
        let raw = concat(&[
            self_mem.view(),
            other_mem.view(),
            phi.view(),
            admitted.event.features.view(),
        ]);
        let content = match (&self.kind, &self.hidden) {
            (MessageKind::Identity, _) => raw,
            (MessageKind::Mlp, Some((l1, l2))) => {
                l2.forward(relu(&l1.forward(raw.view())).view())
            }
            // Unreachable: the constructor materializes the layers for Mlp.
            (MessageKind::Mlp, None) => raw,
        };
        Message {
            target,
            content,
            ts_us: admitted.event.ts_us,
            seq: admitted.seq,
            event_id: admitted.event.id,
        }
    }
}

fn elapsed(ts_us: i64, last_update_us: Option<i64>) -> f32 {
    match last_update_us {
        Some(last) => dt_sec(ts_us, last),
        None => 0.0,
    }
}
