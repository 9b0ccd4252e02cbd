//! Lantern core domain: event stream types, admission gate, and configuration.
//!
//! This crate carries no learned components. It defines the monotonic
//! timestamp discipline, the quarantine semantics for malformed input, and
//! the configuration surface shared by the model and training crates.

pub mod config;
pub mod domain;
pub mod errors;

#[cfg(test)]
mod tests_proptest;

pub use config::{
    ConfigError, EmbeddingKind, LanternConfig, MessageKind, ModelConfig, SamplingKind,
    StreamConfig, TrainerConfig, UpdaterKind,
};
pub use domain::{dt_sec, dt_us, AdmittedEvent, Event, EventValidator, NodeId};
pub use errors::DomainError;
