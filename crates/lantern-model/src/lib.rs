//! Lantern model: the continuous-time dynamic-graph encoder/decoder.
//!
//! Components mirror the data flow: events feed the temporal neighbor index
//! and the message builder; messages are folded into per-node memory by a
//! recurrent updater; the embedding module attends over recent neighbors at
//! an explicit query time; the link decoder turns ordered embedding pairs
//! into link probabilities. All learnable-shaped weights are initialized
//! from a configured seed so runs are reproducible bit-for-bit; only the
//! decoder's parameters move during training.

pub mod decoder;
pub mod embedding;
pub mod memory;
pub mod message;
pub mod neighbor_index;
pub mod nn;
pub mod time_encoding;

#[cfg(test)]
mod tests_proptest;

pub use decoder::LinkDecoder;
pub use embedding::TemporalEmbedding;
pub use memory::{
    build_updater, GruUpdater, MemoryBackup, MemoryStore, MemoryUpdater, NodeMemory,
    VanillaRnnUpdater,
};
pub use message::{Message, MessageBuilder};
pub use neighbor_index::{InteractionRecord, NeighborIndex};
pub use time_encoding::{TimeEncoder, TimeShiftStats};
