//! Small dense-layer primitives shared by the updaters, the embedding
//! module, and the link decoder.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// A dense layer `y = W x + b` with deterministic seeded initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Linear {
    pub weight: Array2<f32>,
    pub bias: Array1<f32>,
}

impl Linear {
    /// Create a layer with uniform init in `[-limit, limit]` where
    /// `limit = 1/sqrt(in_dim)`, drawn from a seeded generator so that two
    /// runs with the same seed produce bit-identical parameters.
    pub fn seeded(in_dim: usize, out_dim: usize, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let limit = 1.0 / (in_dim as f32).sqrt();
        let weight =
            Array2::from_shape_fn((out_dim, in_dim), |_| rng.gen_range(-limit..limit));
        let bias = Array1::zeros(out_dim);
        Self { weight, bias }
    }

    #[inline]
    pub fn forward(&self, x: ArrayView1<f32>) -> Array1<f32> {
        self.weight.dot(&x) + &self.bias
    }

    pub fn in_dim(&self) -> usize {
        self.weight.len_of(Axis(1))
    }

    pub fn out_dim(&self) -> usize {
        self.weight.len_of(Axis(0))
    }
}

#[inline]
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[inline]
pub fn relu(x: &Array1<f32>) -> Array1<f32> {
    x.mapv(|v| v.max(0.0))
}

/// Concatenate 1-d views into a fresh owned vector.
pub fn concat(parts: &[ArrayView1<f32>]) -> Array1<f32> {
    let total: usize = parts.iter().map(|p| p.len()).sum();
    let mut buf = Vec::with_capacity(total);
    for part in parts {
        buf.extend(part.iter().copied());
    }
    Array1::from_vec(buf)
}

/// Numerically stable softmax over a score slice.
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum > 0.0 {
        exps.iter().map(|e| e / sum).collect()
    } else {
        vec![1.0 / scores.len() as f32; scores.len()]
    }
}
