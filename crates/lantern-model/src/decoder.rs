//! Link decoder: maps an ordered pair of embeddings to a link probability.
//!
//! Authentication is directional, so the decoder is asymmetric by
//! construction: the source embedding always occupies the first half of the
//! input. Scoring is a pure function of the inputs; `learn` performs one
//! analytic gradient step of binary cross-entropy through the two layers.

use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::nn::{concat, relu, sigmoid, Linear};

const PROB_EPS: f32 = 1e-6;
const WEIGHT_CLAMP: f32 = 5.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkDecoder {
    w1: Linear,
    w2: Linear,
    learning_rate: f32,
}

impl LinkDecoder {
    pub fn new(embed_dim: usize, hidden_dim: usize, learning_rate: f32, seed: u64) -> Self {
        Self {
            w1: Linear::seeded(2 * embed_dim, hidden_dim, seed.wrapping_add(20)),
            w2: Linear::seeded(hidden_dim, 1, seed.wrapping_add(21)),
            learning_rate,
        }
    }

    /// Probability that a src→dst link exists. No hidden state is read or
    /// written.
    pub fn score<'a>(&self, src: ArrayView1<'a, f32>, dst: ArrayView1<'a, f32>) -> f32 {
        let x = concat(&[src, dst]);
        let h = relu(&self.w1.forward(x.view()));
        let logit = self.w2.forward(h.view())[0];
        sigmoid(logit)
    }

    /// One SGD step of binary cross-entropy for a labeled pair.
    ///
    /// # Arguments
    /// * `label` - 1.0 for an observed event, 0.0 for a sampled negative
    ///
    /// # Returns
    /// The pre-step loss contribution of this pair.
    pub fn learn<'a>(&mut self, src: ArrayView1<'a, f32>, dst: ArrayView1<'a, f32>, label: f32) -> f32 {
        let x = concat(&[src, dst]);
        let pre = self.w1.forward(x.view());
        let h = relu(&pre);
        let logit = self.w2.forward(h.view())[0];
        let p = sigmoid(logit).clamp(PROB_EPS, 1.0 - PROB_EPS);
        let loss = -(label * p.ln() + (1.0 - label) * (1.0 - p).ln());

        // dL/dlogit for sigmoid + BCE
        let dlogit = p - label;

        let hidden = h.len();
        let mut dh = Array1::zeros(hidden);
        for j in 0..hidden {
            if pre[j] > 0.0 {
                dh[j] = dlogit * self.w2.weight[[0, j]];
            }
        }

        let lr = self.learning_rate;
        for j in 0..hidden {
            let w = self.w2.weight[[0, j]] - lr * dlogit * h[j];
            self.w2.weight[[0, j]] = w.clamp(-WEIGHT_CLAMP, WEIGHT_CLAMP);
        }
        self.w2.bias[0] -= lr * dlogit;

        for j in 0..hidden {
            if dh[j] == 0.0 {
                continue;
            }
            for i in 0..x.len() {
                let w = self.w1.weight[[j, i]] - lr * dh[j] * x[i];
                self.w1.weight[[j, i]] = w.clamp(-WEIGHT_CLAMP, WEIGHT_CLAMP);
            }
            self.w1.bias[j] -= lr * dh[j];
        }

        loss
    }
}
