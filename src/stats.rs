// COE: Aggregation of Edge, Cloud, and Vehicular-Cloud offloading traces
// Copyright (C) 2024-2025 The COE authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//! Order statistics and confidence intervals over lists of latency samples.

use serde::Serialize;
use statrs::statistics::Statistics;

/// Quantile of a sorted sample list with linear interpolation between the closest ranks.
/// `p` is given in percent.
fn quantile_sorted(sorted: &[f64], p: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

/// Percentile `p` (in percent) of `samples`. Returns 0 for an empty list.
pub fn percentile(samples: &[f64], p: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    quantile_sorted(&sorted, p)
}

/// A single sample is duplicated, and an empty list becomes two zeros, such that the variance is
/// defined.
pub fn padded(samples: &[f64]) -> Vec<f64> {
    match samples {
        [] => vec![0.0, 0.0],
        [x] => vec![*x, *x],
        _ => samples.to_vec(),
    }
}

/// Summary of the offloading times observed in one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct LatencyPercentiles {
    pub mean: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

impl LatencyPercentiles {
    /// Compute the summary from the raw samples. An empty list yields all zeros.
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let mut sorted = padded(samples);
        sorted.sort_by(f64::total_cmp);
        Self {
            mean: sorted.iter().mean(),
            p50: quantile_sorted(&sorted, 50.0),
            p90: quantile_sorted(&sorted, 90.0),
            p95: quantile_sorted(&sorted, 95.0),
            p99: quantile_sorted(&sorted, 99.0),
        }
    }
}

/// Symmetric confidence interval around the sample mean.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ConfidenceInterval {
    pub mean: f64,
    /// Half width of the interval.
    pub delta: f64,
}

impl ConfidenceInterval {
    /// 95% interval using the normal approximation.
    pub fn normal_95(samples: &[f64]) -> Self {
        Self::with_z(samples, 1.96)
    }

    pub fn with_z(samples: &[f64], z: f64) -> Self {
        let values = padded(samples);
        let mean = values.iter().mean();
        let std_dev = values.iter().std_dev();
        Self {
            mean,
            delta: z * std_dev / (values.len() as f64).sqrt(),
        }
    }

    pub fn lower(&self) -> f64 {
        self.mean - self.delta
    }

    pub fn upper(&self) -> f64 {
        self.mean + self.delta
    }
}
