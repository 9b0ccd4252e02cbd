//! The training orchestrator.
//!
//! Owns every piece of model state and drives the batch lifecycle. Within a
//! batch, all messages and embeddings are computed against the memory as it
//! stood when the batch started; memory commits happen afterwards, sorted by
//! `(timestamp, sequence)` so two runs over the same admitted stream produce
//! identical memory state. A batch either commits whole or rolls back whole;
//! rejection never stops the stream.

use ndarray::Array1;
use tracing::{info, warn};
use uuid::Uuid;

use lantern_core::{
    dt_sec, AdmittedEvent, ConfigError, DomainError, Event, EventValidator, LanternConfig, NodeId,
};
use lantern_model::{
    build_updater, LinkDecoder, MemoryStore, MemoryUpdater, Message, MessageBuilder,
    NeighborIndex, TemporalEmbedding, TimeEncoder, TimeShiftStats,
};

use crate::batch::{check_chronological, chunk_stream, BatchPhase, PhaseTracker};
use crate::loss::LossStats;
use crate::sampler::NegativeEdgeSampler;

/// Result of one batch pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BatchOutcome {
    /// All memory updates applied; the neighbor index absorbed the batch.
    Committed { mean_loss: f32, events: usize },
    /// Rolled back whole; model state equals the pre-batch state.
    Rejected,
}

pub struct Trainer {
    pub(crate) config: LanternConfig,
    pub(crate) run_id: Uuid,
    pub(crate) validator: EventValidator,
    pub(crate) store: MemoryStore,
    pub(crate) index: NeighborIndex,
    pub(crate) encoder: TimeEncoder,
    pub(crate) stats: TimeShiftStats,
    pub(crate) builder: MessageBuilder,
    pub(crate) updater: Box<dyn MemoryUpdater>,
    pub(crate) embedding: TemporalEmbedding,
    pub(crate) decoder: LinkDecoder,
    pub(crate) sampler: NegativeEdgeSampler,
    pub(crate) phase: PhaseTracker,
    pub(crate) batches_committed: u64,
    pub(crate) batches_rejected: u64,
}

impl Trainer {
    /// Build a trainer from a validated configuration. All learnable-shaped
    /// weights are derived from `init_seed`, so two trainers built from the
    /// same configuration are bit-for-bit identical.
    pub fn new(config: LanternConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let m = &config.model;
        let message_dim = config.message_dim();
        Ok(Self {
            run_id: Uuid::new_v4(),
            validator: EventValidator::new(m.edge_dim, config.stream.tolerance_us),
            store: MemoryStore::new(m.memory_dim),
            index: NeighborIndex::new(m.neighbor_capacity, m.sampling, m.init_seed),
            encoder: TimeEncoder::with_dim(m.time_dim),
            stats: TimeShiftStats::new(),
            builder: MessageBuilder::new(m.message, message_dim, m.init_seed.wrapping_add(30)),
            updater: build_updater(
                m.updater,
                m.memory_dim,
                message_dim,
                m.init_seed.wrapping_add(40),
            ),
            embedding: TemporalEmbedding::new(m),
            decoder: LinkDecoder::new(
                m.embed_dim,
                m.decoder_hidden_dim,
                config.trainer.learning_rate,
                m.init_seed,
            ),
            sampler: NegativeEdgeSampler::new(config.trainer.sampler_seed),
            phase: PhaseTracker::new(),
            batches_committed: 0,
            batches_rejected: 0,
            config,
        })
    }

    pub fn config(&self) -> &LanternConfig {
        &self.config
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn batches_committed(&self) -> u64 {
        self.batches_committed
    }

    pub fn batches_rejected(&self) -> u64 {
        self.batches_rejected
    }

    /// Events quarantined at the admission gate since creation or resume.
    pub fn quarantined(&self) -> u64 {
        self.validator.quarantined()
    }

    /// Order-independent digest of the full memory store.
    pub fn memory_digest(&self) -> String {
        self.store.state_digest()
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.store
    }

    pub fn neighbor_index(&self) -> &NeighborIndex {
        &self.index
    }

    /// Admit a raw event stream and train on it in chronologically
    /// contiguous batches. Quarantined events are dropped with a warning;
    /// the rest proceed.
    pub fn train_stream(
        &mut self,
        events: impl IntoIterator<Item = Event>,
    ) -> Result<Vec<BatchOutcome>, crate::TrainError> {
        let mut admitted = Vec::new();
        for event in events {
            // The gate logs quarantines itself.
            if let Ok(a) = self.validator.admit(event) {
                admitted.push(a);
            }
        }
        let batch_size = self.config.trainer.batch_size;
        let mut outcomes = Vec::new();
        for chunk in chunk_stream(&admitted, batch_size) {
            outcomes.push(self.train_batch(chunk)?);
        }
        Ok(outcomes)
    }

    /// One full batch pass: sample negatives, build messages and embeddings
    /// from pre-batch memory, take a decoder step per labeled pair, then
    /// commit memory updates in `(timestamp, sequence)` order.
    ///
    /// # Returns
    /// * `Ok(Committed)` - Batch applied; counters and index updated
    /// * `Ok(Rejected)` - Batch rolled back whole; the stream may continue
    /// * `Err(_)` - Orchestration bug (phase misuse), not a data problem
    pub fn train_batch(
        &mut self,
        batch: &[AdmittedEvent],
    ) -> Result<BatchOutcome, crate::TrainError> {
        if batch.is_empty() {
            return Ok(BatchOutcome::Committed {
                mean_loss: 0.0,
                events: 0,
            });
        }
        self.phase.transition(BatchPhase::BatchLoaded)?;

        if let Err(err) = check_chronological(batch) {
            warn!(%err, "batch not chronological, rejecting");
            return Ok(self.reject());
        }

        // Grow the sampling universe before drawing, so intra-batch nodes
        // are eligible as negatives.
        for admitted in batch {
            self.sampler.observe(admitted.event.src);
            self.sampler.observe(admitted.event.dst);
        }
        let negatives_per_positive = self.config.trainer.negatives_per_positive;
        let mut negatives: Vec<Vec<NodeId>> = Vec::with_capacity(batch.len());
        for admitted in batch {
            let mut drawn = Vec::with_capacity(negatives_per_positive);
            for _ in 0..negatives_per_positive {
                if let Some(node) = self.sampler.sample_destination(admitted.event.dst) {
                    drawn.push(node);
                }
            }
            negatives.push(drawn);
        }

        // Per-endpoint elapsed times, observed into the normalization stats
        // only if the batch commits.
        let mut elapsed = Vec::new();
        for admitted in batch {
            for node in [admitted.event.src, admitted.event.dst] {
                if let Some(last) = self.store.last_update(node) {
                    elapsed.push(dt_sec(admitted.ts_us(), last));
                }
            }
        }

        let built: Result<Vec<(Message, Message)>, DomainError> = batch
            .iter()
            .map(|a| self.builder.build(a, &self.store, &self.encoder, &self.stats))
            .collect();
        let built = match built {
            Ok(pairs) => pairs,
            Err(err) => {
                warn!(%err, "message construction failed, rejecting batch");
                return Ok(self.reject());
            }
        };
        self.phase.transition(BatchPhase::MessagesBuilt)?;

        let mut pairs: Vec<(Array1<f32>, Array1<f32>, f32)> = Vec::new();
        let embedded: Result<(), DomainError> = (|| {
            for (i, admitted) in batch.iter().enumerate() {
                let t = admitted.ts_us();
                let src_emb = self.embed_at(admitted.event.src, t)?;
                let dst_emb = self.embed_at(admitted.event.dst, t)?;
                for &neg in &negatives[i] {
                    let neg_emb = self.embed_at(neg, t)?;
                    pairs.push((src_emb.clone(), neg_emb, 0.0));
                }
                pairs.push((src_emb, dst_emb, 1.0));
            }
            Ok(())
        })();
        if let Err(err) = embedded {
            warn!(%err, "embedding failed, rejecting batch");
            return Ok(self.reject());
        }
        self.phase.transition(BatchPhase::EmbeddingsPre)?;

        let mut loss = LossStats::new();
        for (src_emb, dst_emb, label) in &pairs {
            loss.record(self.decoder.learn(src_emb.view(), dst_emb.view(), *label));
        }
        self.phase.transition(BatchPhase::LossComputed)?;

        let mut messages: Vec<Message> = built.into_iter().flat_map(|(s, d)| [s, d]).collect();
        let backup = self.store.backup(messages.iter().map(|m| m.target));
        messages.sort_by_key(|m| (m.ts_us, m.seq));
        for msg in &messages {
            let (memory, _) = self.store.read(msg.target);
            let next = self.updater.apply(memory.view(), msg.content.view());
            if let Err(err) = self.store.update(msg.target, next, msg.ts_us) {
                warn!(%err, "memory commit failed, rolling batch back");
                self.store.restore(backup);
                return Ok(self.reject());
            }
        }
        self.phase.transition(BatchPhase::MemoriesUpdated)?;

        // The index absorbs the batch only after every commit succeeded.
        for admitted in batch {
            let event = &admitted.event;
            self.index.record_event(
                event.src,
                event.dst,
                event.ts_us,
                &event.features,
                event.id,
                admitted.seq,
            );
        }
        for dt in elapsed {
            self.stats.observe(dt);
        }

        self.batches_committed += 1;
        let mean_loss = loss.mean();
        info!(
            events = batch.len(),
            pairs = loss.count(),
            mean_loss = f64::from(mean_loss),
            committed = self.batches_committed,
            "batch committed"
        );
        self.phase.reset();
        Ok(BatchOutcome::Committed {
            mean_loss,
            events: batch.len(),
        })
    }

    /// Link probability for a candidate `src -> dst` edge at query time
    /// `t_us`. Read-only: no memory, index, or decoder state changes.
    pub fn score_event(&self, src: NodeId, dst: NodeId, t_us: i64) -> Result<f32, DomainError> {
        let src_emb = self.embed_at(src, t_us)?;
        let dst_emb = self.embed_at(dst, t_us)?;
        Ok(self.decoder.score(src_emb.view(), dst_emb.view()))
    }

    /// Embedding of `node` at query time `t_us`, for downstream consumers
    /// that want the representation rather than a link probability.
    pub fn embed_at(&self, node: NodeId, t_us: i64) -> Result<Array1<f32>, DomainError> {
        self.embedding
            .embed(node, t_us, &self.store, &self.index, &self.encoder, &self.stats)
    }

    fn reject(&mut self) -> BatchOutcome {
        self.phase.reset();
        self.batches_rejected += 1;
        BatchOutcome::Rejected
    }
}
