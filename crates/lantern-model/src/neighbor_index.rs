//! Per-node temporal neighbor index.
//!
//! Each node keeps a bounded ring of its most recent interactions, sorted by
//! timestamp ascending with ingestion sequence as the tie-break. Queries are
//! strictly-before a caller-supplied time; the exclusion is per-query, never
//! a global cutoff, so the same index serves both "before this node's own
//! update" and "before this event seen from the other endpoint".

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use lantern_core::{NodeId, SamplingKind};

/// One interaction as seen from a node: the other endpoint, when, and with
/// what edge features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub neighbor: NodeId,
    pub ts_us: i64,
    pub features: Array1<f32>,
    pub event_id: u64,
    /// Ingestion sequence number, the deterministic tie-break for equal
    /// timestamps
    pub seq: u64,
}

/// Bounded per-node interaction history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborIndex {
    rings: HashMap<NodeId, VecDeque<InteractionRecord>>,
    capacity: usize,
    sampling: SamplingKind,
    sample_seed: u64,
}

impl NeighborIndex {
    pub fn new(capacity: usize, sampling: SamplingKind, sample_seed: u64) -> Self {
        Self {
            rings: HashMap::new(),
            capacity,
            sampling,
            sample_seed,
        }
    }

    /// Append an interaction to `node`'s ring. Amortized O(1) for in-order
    /// input; an input within the stream tolerance that lands slightly out
    /// of order is placed by backward scan so rings stay sorted.
    pub fn record(
        &mut self,
        node: NodeId,
        neighbor: NodeId,
        ts_us: i64,
        features: Array1<f32>,
        event_id: u64,
        seq: u64,
    ) {
        let ring = self.rings.entry(node).or_default();
        let record = InteractionRecord {
            neighbor,
            ts_us,
            features,
            event_id,
            seq,
        };
        let pos = ring
            .iter()
            .rposition(|r| (r.ts_us, r.seq) <= (ts_us, seq))
            .map(|i| i + 1)
            .unwrap_or(0);
        ring.insert(pos, record);
        if ring.len() > self.capacity {
            ring.pop_front();
        }
    }

    /// Record both directions of an event in one call.
    pub fn record_event(
        &mut self,
        src: NodeId,
        dst: NodeId,
        ts_us: i64,
        features: &Array1<f32>,
        event_id: u64,
        seq: u64,
    ) {
        self.record(src, dst, ts_us, features.clone(), event_id, seq);
        self.record(dst, src, ts_us, features.clone(), event_id, seq);
    }

    /// Up to `k` interactions of `node` strictly before `t`, most recent
    /// first. Ties on timestamp resolve by ingestion order, the later
    /// ingestion counting as more recent. Cold start returns an empty vec.
    ///
    /// With `SamplingKind::Uniform` the result is a seeded uniform draw from
    /// the full strictly-before window instead of the recency head; the draw
    /// is keyed on `(node, t)` so repeated identical queries agree.
    pub fn neighbors_before(&self, node: NodeId, t_us: i64, k: usize) -> Vec<&InteractionRecord> {
        let Some(ring) = self.rings.get(&node) else {
            return Vec::new();
        };
        let before: Vec<&InteractionRecord> =
            ring.iter().filter(|r| r.ts_us < t_us).collect();
        match self.sampling {
            SamplingKind::Recency => {
                before.into_iter().rev().take(k).collect()
            }
            SamplingKind::Uniform => {
                if before.len() <= k {
                    return before.into_iter().rev().collect();
                }
                let mut rng = StdRng::seed_from_u64(
                    self.sample_seed ^ node.0.wrapping_mul(0x9e3779b97f4a7c15) ^ t_us as u64,
                );
                let mut picked: Vec<usize> = Vec::with_capacity(k);
                while picked.len() < k {
                    let i = rng.gen_range(0..before.len());
                    if !picked.contains(&i) {
                        picked.push(i);
                    }
                }
                picked.sort_unstable_by(|a, b| b.cmp(a));
                picked.into_iter().map(|i| before[i]).collect()
            }
        }
    }

    /// Number of interactions currently held for `node`.
    pub fn degree(&self, node: NodeId) -> usize {
        self.rings.get(&node).map(|r| r.len()).unwrap_or(0)
    }

    /// All node ids with at least one recorded interaction.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.rings.keys().copied()
    }
}
