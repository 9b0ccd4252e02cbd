//! Negative edge sampling for self-supervised training.
//!
//! Draws destination nodes from the observed node universe to form
//! contrastive non-edges. The generator is seeded so a run is reproducible;
//! the rejection loop is capped so a tiny universe can never stall a batch.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

use lantern_core::NodeId;

const MAX_REJECTIONS: usize = 16;

#[derive(Debug)]
pub struct NegativeEdgeSampler {
    rng: StdRng,
    universe: Vec<NodeId>,
    seen: HashSet<NodeId>,
}

impl NegativeEdgeSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            universe: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Register a node as part of the sampling universe.
    pub fn observe(&mut self, node: NodeId) {
        if self.seen.insert(node) {
            self.universe.push(node);
        }
    }

    pub fn universe_size(&self) -> usize {
        self.universe.len()
    }

    /// Draw a destination distinct from `exclude`. Returns `None` only when
    /// no distinct node exists yet.
    pub fn sample_destination(&mut self, exclude: NodeId) -> Option<NodeId> {
        if self.universe.is_empty()
            || (self.universe.len() == 1 && self.universe[0] == exclude)
        {
            return None;
        }
        for _ in 0..MAX_REJECTIONS {
            let pick = self.universe[self.rng.gen_range(0..self.universe.len())];
            if pick != exclude {
                return Some(pick);
            }
        }
        // Rejection cap hit: fall back to the first distinct node.
        self.universe.iter().copied().find(|n| *n != exclude)
    }
}
