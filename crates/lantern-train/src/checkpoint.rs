//! Checkpointing at batch boundaries.
//!
//! A snapshot carries only state that cannot be rebuilt from configuration:
//! memory, the neighbor index, time-shift statistics, the trained decoder,
//! and the stream position. Fixed-weight components are reconstructed from
//! the configured seed on load. The file format is a hex digest line
//! followed by the JSON payload; the digest covers the exact payload bytes,
//! so corruption is detected before deserialization.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use lantern_core::{ConfigError, LanternConfig, NodeId};
use lantern_model::{LinkDecoder, MemoryStore, NeighborIndex, TimeShiftStats};

use crate::orchestrator::Trainer;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed checkpoint: {0}")]
    Format(String),
    #[error("checkpoint digest mismatch: stored {stored}, computed {computed}")]
    DigestMismatch { stored: String, computed: String },
    #[error("checkpointed config invalid: {0}")]
    Invalid(#[from] ConfigError),
}

/// Serializable trainer state at a batch boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub run_id: Uuid,
    pub config: LanternConfig,
    pub memory: MemoryStore,
    pub index: NeighborIndex,
    pub stats: TimeShiftStats,
    pub decoder: LinkDecoder,
    pub watermark_us: Option<i64>,
    pub next_seq: u64,
    pub batches_committed: u64,
    pub batches_rejected: u64,
}

impl Snapshot {
    /// Serialize and write to `path`, digest line first.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<(), CheckpointError> {
        let payload = serde_json::to_vec(self)?;
        let digest = blake3::hash(&payload).to_hex().to_string();
        let mut bytes = Vec::with_capacity(digest.len() + 1 + payload.len());
        bytes.extend_from_slice(digest.as_bytes());
        bytes.push(b'\n');
        bytes.extend_from_slice(&payload);
        fs::write(&path, bytes)?;
        info!(
            path = %path.as_ref().display(),
            batches = self.batches_committed,
            "checkpoint written"
        );
        Ok(())
    }

    /// Read from `path`, verifying the digest before deserializing and the
    /// configuration before handing the snapshot out.
    pub fn read_from(path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
        let raw = fs::read(path)?;
        let newline = raw
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| CheckpointError::Format("missing digest header".into()))?;
        let stored = std::str::from_utf8(&raw[..newline])
            .map_err(|_| CheckpointError::Format("digest header is not UTF-8".into()))?
            .to_string();
        let payload = &raw[newline + 1..];
        let computed = blake3::hash(payload).to_hex().to_string();
        if stored != computed {
            return Err(CheckpointError::DigestMismatch { stored, computed });
        }
        let snapshot: Snapshot = serde_json::from_slice(payload)?;
        snapshot.config.validate()?;
        Ok(snapshot)
    }
}

impl Trainer {
    /// Capture the current state. Callers take snapshots between batches;
    /// mid-batch state is never observable from outside `train_batch`.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            run_id: self.run_id,
            config: self.config.clone(),
            memory: self.store.clone(),
            index: self.index.clone(),
            stats: self.stats.clone(),
            decoder: self.decoder.clone(),
            watermark_us: self.validator.watermark_us(),
            next_seq: self.validator.next_seq(),
            batches_committed: self.batches_committed,
            batches_rejected: self.batches_rejected,
        }
    }

    /// Rebuild a trainer from a snapshot. Fixed-weight components come from
    /// the configured seed; the sampling universe is reseeded from the
    /// materialized nodes in sorted order so resumed runs stay deterministic.
    pub fn from_snapshot(snapshot: Snapshot) -> Result<Self, ConfigError> {
        let mut trainer = Trainer::new(snapshot.config)?;
        trainer.run_id = snapshot.run_id;
        trainer.store = snapshot.memory;
        trainer.index = snapshot.index;
        trainer.stats = snapshot.stats;
        trainer.decoder = snapshot.decoder;
        trainer
            .validator
            .resume_at(snapshot.watermark_us, snapshot.next_seq);
        trainer.batches_committed = snapshot.batches_committed;
        trainer.batches_rejected = snapshot.batches_rejected;
        let mut nodes: Vec<NodeId> = trainer.store.node_ids().collect();
        nodes.sort_unstable();
        for node in nodes {
            trainer.sampler.observe(node);
        }
        Ok(trainer)
    }
}
