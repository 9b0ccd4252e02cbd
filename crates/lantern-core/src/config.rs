//! Configuration for the encoder/decoder core.
//!
//! All dimensional disagreements are caught by [`LanternConfig::validate`]
//! at startup; this is the only error class that halts the process. Per-event
//! problems (arity, ordering) are quarantined at the stream gate instead.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Temporal embedding variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingKind {
    /// Multi-head attention over recent temporal neighbors (default)
    GraphAttention,
    /// Mean-pooled neighbor projection
    GraphSum,
    /// Memory passthrough (requires embed_dim == memory_dim)
    Identity,
    /// Memory modulated by elapsed-time encoding (requires embed_dim == memory_dim)
    Time,
}

/// Recurrent memory transition variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdaterKind {
    /// Gated recurrent update (default)
    Gru,
    /// Plain tanh recurrence
    Rnn,
}

/// Message function variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Raw concatenation of memories, time encoding, and edge features (default)
    Identity,
    /// Concatenation followed by a single hidden layer
    Mlp,
}

/// Neighbor selection strategy for embedding queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingKind {
    /// k most recent interactions strictly before the query time (default)
    Recency,
    /// Seeded uniform draw from all interactions strictly before the query time
    Uniform,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Per-node memory vector dimension
    pub memory_dim: usize,
    /// Time encoding dimension
    pub time_dim: usize,
    /// Embedding dimension produced for decoder input
    pub embed_dim: usize,
    /// Edge feature arity expected on every event
    pub edge_dim: usize,
    /// Neighbor fan-in per embedding query
    pub neighbor_k: usize,
    /// Bounded per-node interaction ring capacity
    pub neighbor_capacity: usize,
    /// Attention heads (graph_attention only)
    pub attention_heads: usize,
    /// Hidden width of the link decoder
    pub decoder_hidden_dim: usize,
    /// Fill value of the cold-start embedding for never-seen nodes
    pub cold_start_value: f32,
    pub embedding: EmbeddingKind,
    pub updater: UpdaterKind,
    pub message: MessageKind,
    pub sampling: SamplingKind,
    /// Seed for deterministic weight initialization
    pub init_seed: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            memory_dim: 32,
            time_dim: 16,
            embed_dim: 32,
            edge_dim: 4,
            neighbor_k: 10,
            neighbor_capacity: 64,
            attention_heads: 2,
            decoder_hidden_dim: 64,
            cold_start_value: 0.0,
            embedding: EmbeddingKind::GraphAttention,
            updater: UpdaterKind::Gru,
            message: MessageKind::Identity,
            sampling: SamplingKind::Recency,
            init_seed: 0x1a57e41,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Chronologically contiguous events per batch
    pub batch_size: usize,
    /// SGD learning rate for the link decoder
    pub learning_rate: f32,
    /// Negative pairs sampled per positive event
    pub negatives_per_positive: usize,
    /// Seed for negative sampling
    pub sampler_seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            batch_size: 200,
            learning_rate: 1e-4,
            negatives_per_positive: 1,
            sampler_seed: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Tolerated timestamp regression before quarantine, in microseconds
    pub tolerance_us: i64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self { tolerance_us: 0 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LanternConfig {
    pub model: ModelConfig,
    pub trainer: TrainerConfig,
    pub stream: StreamConfig,
}

impl LanternConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Startup-only consistency checks. A failure here halts the process;
    /// nothing past this point is allowed to disagree on dimensions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.model;
        if m.memory_dim == 0 {
            return Err(ConfigError::Validation("memory_dim must be > 0".into()));
        }
        if m.time_dim < 2 {
            return Err(ConfigError::Validation(
                "time_dim must be >= 2 (one linear component plus periodic basis)".into(),
            ));
        }
        if m.embed_dim == 0 {
            return Err(ConfigError::Validation("embed_dim must be > 0".into()));
        }
        if m.edge_dim == 0 {
            return Err(ConfigError::Validation("edge_dim must be > 0".into()));
        }
        if m.neighbor_k == 0 || m.neighbor_k > m.neighbor_capacity {
            return Err(ConfigError::Validation(format!(
                "neighbor_k must be in 1..={}, got {}",
                m.neighbor_capacity, m.neighbor_k
            )));
        }
        if m.attention_heads == 0 || m.embed_dim % m.attention_heads != 0 {
            return Err(ConfigError::Validation(format!(
                "attention_heads ({}) must divide embed_dim ({})",
                m.attention_heads, m.embed_dim
            )));
        }
        if matches!(m.embedding, EmbeddingKind::Identity | EmbeddingKind::Time)
            && m.embed_dim != m.memory_dim
        {
            return Err(ConfigError::Validation(format!(
                "{:?} embedding requires embed_dim == memory_dim ({} != {})",
                m.embedding, m.embed_dim, m.memory_dim
            )));
        }
        if m.decoder_hidden_dim == 0 {
            return Err(ConfigError::Validation(
                "decoder_hidden_dim must be > 0".into(),
            ));
        }
        let t = &self.trainer;
        if t.batch_size == 0 {
            return Err(ConfigError::Validation("batch_size must be > 0".into()));
        }
        if t.learning_rate <= 0.0 || t.learning_rate >= 1.0 {
            return Err(ConfigError::Validation(format!(
                "learning_rate must be in (0, 1), got {}",
                t.learning_rate
            )));
        }
        if t.negatives_per_positive == 0 {
            return Err(ConfigError::Validation(
                "negatives_per_positive must be > 0".into(),
            ));
        }
        if self.stream.tolerance_us < 0 {
            return Err(ConfigError::Validation(
                "tolerance_us must be non-negative".into(),
            ));
        }
        Ok(())
    }

    /// Width of the raw message vector:
    /// `[self_memory | other_memory | time_encoding | edge_features]`.
    pub fn message_dim(&self) -> usize {
        2 * self.model.memory_dim + self.model.time_dim + self.model.edge_dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        assert!(LanternConfig::default().validate().is_ok());
    }

    #[test]
    fn test_head_divisibility_enforced() {
        let mut config = LanternConfig::default();
        config.model.attention_heads = 3;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_identity_embedding_dimension_rule() {
        let mut config = LanternConfig::default();
        config.model.embedding = EmbeddingKind::Identity;
        config.model.embed_dim = 16;
        config.model.memory_dim = 32;
        assert!(config.validate().is_err());
        config.model.embed_dim = 32;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_toml_str() {
        let raw = r#"
            [model]
            memory_dim = 16
            time_dim = 8
            embed_dim = 16
            edge_dim = 4
            neighbor_k = 5
            neighbor_capacity = 32
            attention_heads = 2
            decoder_hidden_dim = 32
            cold_start_value = 0.0
            embedding = "graph_attention"
            updater = "gru"
            message = "identity"
            sampling = "recency"
            init_seed = 42

            [trainer]
            batch_size = 50
            learning_rate = 0.001
            negatives_per_positive = 1
            sampler_seed = 9

            [stream]
            tolerance_us = 0
        "#;
        let config = LanternConfig::from_toml_str(raw).unwrap();
        assert_eq!(config.model.memory_dim, 16);
        assert_eq!(config.model.embedding, EmbeddingKind::GraphAttention);
        assert_eq!(config.message_dim(), 16 * 2 + 8 + 4);
    }

    #[test]
    fn test_batch_size_zero_rejected() {
        let mut config = LanternConfig::default();
        config.trainer.batch_size = 0;
        assert!(config.validate().is_err());
    }
}
