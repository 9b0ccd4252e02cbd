//! Continuous-time encoding of elapsed time.
//!
//! Fixed-length snapshots cannot represent irregular inter-event gaps, so
//! elapsed time is mapped through a continuous basis instead: the first
//! component is the normalized delta itself (keeps the map order-preserving),
//! the remaining components are a cosine basis with log-spaced frequencies so
//! that both sub-second bursts and week-long gaps land in distinguishable
//! regions of the encoding space.

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Running statistics over observed inter-event deltas (seconds), used to
/// normalize elapsed time before encoding. Welford's online update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeShiftStats {
    count: u64,
    mean: f64,
    m2: f64,
}

impl TimeShiftStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, dt_sec: f32) {
        self.count += 1;
        let delta = dt_sec as f64 - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (dt_sec as f64 - self.mean);
    }

    pub fn mean(&self) -> f32 {
        self.mean as f32
    }

    pub fn std(&self) -> f32 {
        if self.count < 2 {
            1.0
        } else {
            let var = self.m2 / (self.count - 1) as f64;
            (var.sqrt() as f32).max(1e-6)
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Center and scale a delta by the observed distribution.
    /// With fewer than two observations this is the identity.
    pub fn normalize(&self, dt_sec: f32) -> f32 {
        if self.count < 2 {
            dt_sec
        } else {
            (dt_sec - self.mean()) / self.std()
        }
    }
}

/// Cosine-basis time encoder with one linear lead component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEncoder {
    /// Angular frequencies for the periodic components, log-spaced
    omega: Array1<f32>,
    dim: usize,
}

impl TimeEncoder {
    /// Build an encoder of `dim` components. Component 0 is linear; the
    /// remaining `dim - 1` frequencies are log-spaced from `1/max_period`
    /// up to `1/min_period` (periods in seconds).
    pub fn new(dim: usize, min_period_sec: f32, max_period_sec: f32) -> Self {
        let periodic = dim.saturating_sub(1);
        let lo = (1.0 / max_period_sec).ln();
        let hi = (1.0 / min_period_sec).ln();
        let omega = Array1::from_shape_fn(periodic, |i| {
            let frac = if periodic > 1 {
                i as f32 / (periodic - 1) as f32
            } else {
                0.0
            };
            (lo + frac * (hi - lo)).exp() * std::f32::consts::TAU
        });
        Self { omega, dim }
    }

    /// Default spectrum: periods from 1 second up to 30 days.
    pub fn with_dim(dim: usize) -> Self {
        Self::new(dim, 1.0, 30.0 * 24.0 * 3600.0)
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Encode an elapsed time (seconds, non-negative) into the basis.
    /// `stats` normalizes the linear component only; the periodic basis sees
    /// the raw delta so its phase keeps physical meaning.
    pub fn encode(&self, dt_sec: f32, stats: &TimeShiftStats) -> Array1<f32> {
        let mut out = Array1::zeros(self.dim);
        out[0] = stats.normalize(dt_sec);
        for (i, w) in self.omega.iter().enumerate() {
            out[i + 1] = (w * dt_sec).cos();
        }
        out
    }
}
