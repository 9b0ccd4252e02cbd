//! Per-node memory store and recurrent memory updaters.
//!
//! The store is the only mutable state in the encoder. Every write goes
//! through [`MemoryStore::update`], which enforces the monotonic-timestamp
//! precondition; every causally-sensitive read goes through
//! [`MemoryStore::memory_as_of`], which refuses to hand out state written at
//! a later time than the caller's query. Batch atomicity is built on
//! [`MemoryStore::backup`] / [`MemoryStore::restore`] of the touched nodes.

use blake3::Hasher;
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use lantern_core::{DomainError, NodeId, UpdaterKind};

use crate::nn::{sigmoid, Linear};

/// Memory vector plus the timestamp of its last mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMemory {
    pub vector: Array1<f32>,
    pub last_update_us: Option<i64>,
}

/// Saved state of the nodes touched by a batch, for atomic rollback.
/// `None` marks a node that did not exist before the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryBackup {
    entries: Vec<(NodeId, Option<NodeMemory>)>,
}

/// Indexed store mapping node ids to memory state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStore {
    dim: usize,
    nodes: HashMap<NodeId, NodeMemory>,
}

impl MemoryStore {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            nodes: HashMap::new(),
        }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Current memory and last-update time. A never-seen node reads as the
    /// zero vector with no update time (cold start, not an error).
    pub fn read(&self, node: NodeId) -> (Array1<f32>, Option<i64>) {
        match self.nodes.get(&node) {
            Some(m) => (m.vector.clone(), m.last_update_us),
            None => (Array1::zeros(self.dim), None),
        }
    }

    /// Timestamp of `node`'s last memory mutation, if any.
    pub fn last_update(&self, node: NodeId) -> Option<i64> {
        self.nodes.get(&node).and_then(|m| m.last_update_us)
    }

    /// Memory of `node` as of time `t`.
    ///
    /// Hands out the current value only if it was last written at or before
    /// `t`; state written later is invisible to a query at `t`.
    pub fn memory_as_of(&self, node: NodeId, t_us: i64) -> Result<Array1<f32>, DomainError> {
        match self.nodes.get(&node) {
            Some(m) => {
                if let Some(last) = m.last_update_us {
                    if last > t_us {
                        return Err(DomainError::TemporalLeak {
                            node,
                            query_us: t_us,
                            last_update_us: last,
                        });
                    }
                }
                Ok(m.vector.clone())
            }
            None => Ok(Array1::zeros(self.dim)),
        }
    }

    /// Replace `node`'s memory, verifying the timestamp precondition.
    ///
    /// # Returns
    /// * `Ok(())` - Memory replaced, `last_update_us` set to `t_us`
    /// * `Err(StaleUpdate)` - `t_us` precedes the node's last update; state
    ///   is untouched
    pub fn update(
        &mut self,
        node: NodeId,
        new_memory: Array1<f32>,
        t_us: i64,
    ) -> Result<(), DomainError> {
        let entry = self.nodes.entry(node).or_insert_with(|| NodeMemory {
            vector: Array1::zeros(self.dim),
            last_update_us: None,
        });
        if let Some(last) = entry.last_update_us {
            if t_us < last {
                return Err(DomainError::StaleUpdate {
                    node,
                    ts_us: t_us,
                    last_update_us: last,
                });
            }
        }
        entry.vector = new_memory;
        entry.last_update_us = Some(t_us);
        Ok(())
    }

    /// Capture pre-batch state of the given nodes.
    pub fn backup(&self, nodes: impl IntoIterator<Item = NodeId>) -> MemoryBackup {
        let mut entries = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for node in nodes {
            if seen.insert(node) {
                entries.push((node, self.nodes.get(&node).cloned()));
            }
        }
        MemoryBackup { entries }
    }

    /// Roll the touched nodes back to their backed-up state.
    pub fn restore(&mut self, backup: MemoryBackup) {
        for (node, state) in backup.entries {
            match state {
                Some(m) => {
                    self.nodes.insert(node, m);
                }
                None => {
                    self.nodes.remove(&node);
                }
            }
        }
    }

    /// Number of nodes with materialized memory.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Order-independent digest of the full store, for determinism checks
    /// and checkpoint integrity.
    pub fn state_digest(&self) -> String {
        let mut ids: Vec<NodeId> = self.nodes.keys().copied().collect();
        ids.sort_unstable();
        let mut hasher = Hasher::new();
        for id in ids {
            let m = &self.nodes[&id];
            hasher.update(&id.0.to_le_bytes());
            hasher.update(&m.last_update_us.unwrap_or(i64::MIN).to_le_bytes());
            for v in m.vector.iter() {
                hasher.update(&v.to_le_bytes());
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}

// ============================================================================
// RECURRENT MEMORY UPDATERS
// ============================================================================

/// Folds one message into a node's memory vector.
pub trait MemoryUpdater: Send + Sync {
    fn apply(&self, memory: ArrayView1<f32>, message: ArrayView1<f32>) -> Array1<f32>;
}

/// Gated recurrent transition. The gates keep the state in [-1, 1] without
/// explicit clamping: the output is a convex mix of the previous state and a
/// tanh candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GruUpdater {
    w_z: Linear,
    u_z: Linear,
    w_r: Linear,
    u_r: Linear,
    w_h: Linear,
    u_h: Linear,
}

impl GruUpdater {
    pub fn seeded(memory_dim: usize, message_dim: usize, seed: u64) -> Self {
        Self {
            w_z: Linear::seeded(message_dim, memory_dim, seed),
            u_z: Linear::seeded(memory_dim, memory_dim, seed.wrapping_add(1)),
            w_r: Linear::seeded(message_dim, memory_dim, seed.wrapping_add(2)),
            u_r: Linear::seeded(memory_dim, memory_dim, seed.wrapping_add(3)),
            w_h: Linear::seeded(message_dim, memory_dim, seed.wrapping_add(4)),
            u_h: Linear::seeded(memory_dim, memory_dim, seed.wrapping_add(5)),
        }
    }
}

impl MemoryUpdater for GruUpdater {
    fn apply(&self, memory: ArrayView1<f32>, message: ArrayView1<f32>) -> Array1<f32> {
        let z = (self.w_z.forward(message) + self.u_z.forward(memory)).mapv(sigmoid);
        let r = (self.w_r.forward(message) + self.u_r.forward(memory)).mapv(sigmoid);
        let gated = &r * &memory;
        let candidate =
            (self.w_h.forward(message) + self.u_h.forward(gated.view())).mapv(f32::tanh);
        let keep = z.mapv(|v| 1.0 - v);
        &keep * &memory + &z * &candidate
    }
}

/// Plain tanh recurrence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VanillaRnnUpdater {
    w: Linear,
    u: Linear,
}

impl VanillaRnnUpdater {
    pub fn seeded(memory_dim: usize, message_dim: usize, seed: u64) -> Self {
        Self {
            w: Linear::seeded(message_dim, memory_dim, seed),
            u: Linear::seeded(memory_dim, memory_dim, seed.wrapping_add(1)),
        }
    }
}

impl MemoryUpdater for VanillaRnnUpdater {
    fn apply(&self, memory: ArrayView1<f32>, message: ArrayView1<f32>) -> Array1<f32> {
        (self.w.forward(message) + self.u.forward(memory)).mapv(f32::tanh)
    }
}

/// Build the configured updater with deterministic seeded weights.
pub fn build_updater(
    kind: UpdaterKind,
    memory_dim: usize,
    message_dim: usize,
    seed: u64,
) -> Box<dyn MemoryUpdater> {
    match kind {
        UpdaterKind::Gru => Box::new(GruUpdater::seeded(memory_dim, message_dim, seed)),
        UpdaterKind::Rnn => Box::new(VanillaRnnUpdater::seeded(memory_dim, message_dim, seed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn test_cold_read_is_zero() {
        let store = MemoryStore::new(4);
        let (mem, last) = store.read(NodeId(1));
        assert_eq!(mem, Array1::zeros(4));
        assert!(last.is_none());
    }

    #[test]
    fn test_update_sets_timestamp() {
        let mut store = MemoryStore::new(2);
        store.update(NodeId(1), arr1(&[0.5, -0.5]), 1000).unwrap();
        let (mem, last) = store.read(NodeId(1));
        assert_eq!(mem, arr1(&[0.5, -0.5]));
        assert_eq!(last, Some(1000));
    }

    #[test]
    fn test_stale_update_rejected_without_side_effects() {
        let mut store = MemoryStore::new(2);
        store.update(NodeId(1), arr1(&[0.1, 0.1]), 2000).unwrap();
        let res = store.update(NodeId(1), arr1(&[0.9, 0.9]), 1000);
        assert!(matches!(res, Err(DomainError::StaleUpdate { .. })));
        let (mem, last) = store.read(NodeId(1));
        assert_eq!(mem, arr1(&[0.1, 0.1]));
        assert_eq!(last, Some(2000));
    }

    #[test]
    fn test_equal_timestamp_update_allowed() {
        let mut store = MemoryStore::new(2);
        store.update(NodeId(1), arr1(&[0.1, 0.1]), 1000).unwrap();
        assert!(store.update(NodeId(1), arr1(&[0.2, 0.2]), 1000).is_ok());
    }

    #[test]
    fn test_memory_as_of_refuses_future_state() {
        let mut store = MemoryStore::new(2);
        store.update(NodeId(1), arr1(&[0.3, 0.3]), 2000).unwrap();
        assert!(store.memory_as_of(NodeId(1), 2000).is_ok());
        assert!(store.memory_as_of(NodeId(1), 3000).is_ok());
        let res = store.memory_as_of(NodeId(1), 1999);
        assert!(matches!(res, Err(DomainError::TemporalLeak { .. })));
    }

    #[test]
    fn test_backup_restore_roundtrip() {
        let mut store = MemoryStore::new(2);
        store.update(NodeId(1), arr1(&[0.1, 0.1]), 1000).unwrap();
        let digest_before = store.state_digest();

        let backup = store.backup([NodeId(1), NodeId(2)]);
        store.update(NodeId(1), arr1(&[0.9, 0.9]), 2000).unwrap();
        store.update(NodeId(2), arr1(&[0.5, 0.5]), 2000).unwrap();
        assert_ne!(store.state_digest(), digest_before);

        store.restore(backup);
        assert_eq!(store.state_digest(), digest_before);
        // Node 2 did not exist before the backup and is gone again.
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_gru_output_bounded() {
        let updater = GruUpdater::seeded(4, 8, 42);
        let mut mem = Array1::zeros(4);
        let msg = arr1(&[1.0, -1.0, 0.5, 0.5, 2.0, -2.0, 0.0, 1.0]);
        for _ in 0..50 {
            mem = updater.apply(mem.view(), msg.view());
        }
        for &v in mem.iter() {
            assert!(v.is_finite());
            assert!((-1.0..=1.0).contains(&v));
        }
    }

    #[test]
    fn test_updater_order_sensitivity() {
        // Folding two messages in different orders must be observable;
        // this is why intra-batch commits sort by timestamp.
        let updater = GruUpdater::seeded(4, 8, 42);
        let m1 = arr1(&[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0]);
        let m2 = arr1(&[0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
        let zero = Array1::zeros(4);
        let ab = updater.apply(updater.apply(zero.view(), m1.view()).view(), m2.view());
        let ba = updater.apply(updater.apply(zero.view(), m2.view()).view(), m1.view());
        assert_ne!(ab, ba);
    }

    #[test]
    fn test_rnn_updater_finite() {
        let updater = VanillaRnnUpdater::seeded(4, 8, 7);
        let out = updater.apply(Array1::zeros(4).view(), Array1::ones(8).view());
        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|v| v.is_finite() && v.abs() <= 1.0));
    }
}
