//! Time-conditioned node embeddings.
//!
//! An embedding is computed on demand for an explicit `(node, t)` pair; the
//! module never picks "current" memory on its own. The store resolves the
//! correct snapshot for `t` and refuses state written later, so the caller's
//! causal intent is always honored. Four variants are supported; the
//! attention variant aggregates the k most recent temporal neighbors with
//! per-neighbor time encodings.

use ndarray::{s, Array1};
use serde::{Deserialize, Serialize};

use lantern_core::{dt_sec, DomainError, EmbeddingKind, ModelConfig, NodeId};

use crate::memory::MemoryStore;
use crate::neighbor_index::NeighborIndex;
use crate::nn::{concat, relu, softmax, Linear};
use crate::time_encoding::{TimeEncoder, TimeShiftStats};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemporalEmbedding {
    kind: EmbeddingKind,
    heads: usize,
    neighbor_k: usize,
    embed_dim: usize,
    /// Query projection over `[memory | phi(0)]`
    w_query: Linear,
    /// Key projection over `[neighbor_memory | phi(dt) | edge_features]`
    w_key: Linear,
    w_value: Linear,
    /// Memory-only projection, also the zero-neighbor fallback
    w_memory: Linear,
    /// Combines attention output with the memory projection
    w_out: Linear,
    /// Elapsed-time modulation for the time variant
    w_time: Linear,
    /// Returned for nodes with neither memory nor history
    default_vector: Array1<f32>,
}

impl TemporalEmbedding {
    pub fn new(config: &ModelConfig) -> Self {
        let m = config.memory_dim;
        let t = config.time_dim;
        let e = config.edge_dim;
        let d = config.embed_dim;
        let seed = config.init_seed;
        Self {
            kind: config.embedding,
            heads: config.attention_heads,
            neighbor_k: config.neighbor_k,
            embed_dim: d,
            w_query: Linear::seeded(m + t, d, seed.wrapping_add(10)),
            w_key: Linear::seeded(m + t + e, d, seed.wrapping_add(11)),
            w_value: Linear::seeded(m + t + e, d, seed.wrapping_add(12)),
            w_memory: Linear::seeded(m, d, seed.wrapping_add(13)),
            w_out: Linear::seeded(2 * d, d, seed.wrapping_add(14)),
            w_time: Linear::seeded(t, m, seed.wrapping_add(15)),
            default_vector: Array1::from_elem(d, config.cold_start_value),
        }
    }

    pub fn embed_dim(&self) -> usize {
        self.embed_dim
    }

    /// Embedding of `node` at query time `t_us`.
    ///
    /// # Edge cases
    /// * Never-seen node with no history: the configured cold-start vector
    /// * Memory present but zero neighbors before `t`: memory-only projection
    /// * Fewer than k neighbors: all available records are used
    pub fn embed(
        &self,
        node: NodeId,
        t_us: i64,
        store: &MemoryStore,
        index: &NeighborIndex,
        encoder: &TimeEncoder,
        stats: &TimeShiftStats,
    ) -> Result<Array1<f32>, DomainError> {
        let last = store.last_update(node);
        if last.is_none() && index.degree(node) == 0 {
            return Ok(self.default_vector.clone());
        }
        let memory = store.memory_as_of(node, t_us)?;

        match self.kind {
            EmbeddingKind::Identity => Ok(memory),
            EmbeddingKind::Time => {
                let dt = last.map(|l| dt_sec(t_us, l)).unwrap_or(0.0);
                let phi = encoder.encode(dt, stats);
                let gain = self.w_time.forward(phi.view()).mapv(|v| 1.0 + v);
                Ok(&memory * &gain)
            }
            EmbeddingKind::GraphAttention | EmbeddingKind::GraphSum => {
                self.aggregate(node, t_us, &memory, store, index, encoder, stats)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn aggregate(
        &self,
        node: NodeId,
        t_us: i64,
        memory: &Array1<f32>,
        store: &MemoryStore,
        index: &NeighborIndex,
        encoder: &TimeEncoder,
        stats: &TimeShiftStats,
    ) -> Result<Array1<f32>, DomainError> {
        let neighbors = index.neighbors_before(node, t_us, self.neighbor_k);
        let mem_proj = self.w_memory.forward(memory.view());
        if neighbors.is_empty() {
            return Ok(relu(&mem_proj));
        }

        let mut keys = Vec::with_capacity(neighbors.len());
        let mut values = Vec::with_capacity(neighbors.len());
        for record in &neighbors {
            let n_mem = store.memory_as_of(record.neighbor, t_us)?;
            let phi = encoder.encode(dt_sec(t_us, record.ts_us), stats);
            let kv_in = concat(&[n_mem.view(), phi.view(), record.features.view()]);
            keys.push(self.w_key.forward(kv_in.view()));
            values.push(self.w_value.forward(kv_in.view()));
        }

        let aggregated = match self.kind {
            EmbeddingKind::GraphAttention => {
                let phi0 = encoder.encode(0.0, stats);
                let query = self
                    .w_query
                    .forward(concat(&[memory.view(), phi0.view()]).view());
                self.attend(&query, &keys, &values)
            }
            _ => {
                // graph_sum: mean-pooled value projections
                let mut sum = Array1::zeros(self.embed_dim);
                for v in &values {
                    sum = sum + v;
                }
                sum / values.len() as f32
            }
        };

        let combined = concat(&[aggregated.view(), mem_proj.view()]);
        Ok(relu(&self.w_out.forward(combined.view())))
    }

    /// Scaled dot-product attention, one softmax per head over the
    /// neighbor set.
    fn attend(&self, query: &Array1<f32>, keys: &[Array1<f32>], values: &[Array1<f32>]) -> Array1<f32> {
        let head_dim = self.embed_dim / self.heads;
        let scale = 1.0 / (head_dim as f32).sqrt();
        let mut out = Array1::zeros(self.embed_dim);
        for h in 0..self.heads {
            let lo = h * head_dim;
            let hi = lo + head_dim;
            let q_h = query.slice(s![lo..hi]);
            let scores: Vec<f32> = keys
                .iter()
                .map(|k| q_h.dot(&k.slice(s![lo..hi])) * scale)
                .collect();
            let weights = softmax(&scores);
            let mut head_out = out.slice_mut(s![lo..hi]);
            for (w, v) in weights.iter().zip(values.iter()) {
                head_out.scaled_add(*w, &v.slice(s![lo..hi]));
            }
        }
        out
    }
}
