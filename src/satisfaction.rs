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
//! Completed requests per paradigm and their share of all completed requests.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{accumulator::BucketSummary, records::Paradigm};

/// Share of completed requests served by every paradigm, in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ParadigmShares {
    pub edge: f64,
    pub cloud: f64,
    pub vcc: f64,
}

impl ParadigmShares {
    pub fn get(&self, paradigm: Paradigm) -> f64 {
        match paradigm {
            Paradigm::Edge => self.edge,
            Paradigm::Cloud => self.cloud,
            Paradigm::Vcc => self.vcc,
        }
    }
}

/// Average number of completed requests per run, per paradigm and x-axis value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SatisfiedRequests {
    pub x_axis: Vec<f64>,
    pub per_paradigm: BTreeMap<Paradigm, Vec<f64>>,
}

impl SatisfiedRequests {
    /// Build from the summaries of one accumulation per paradigm over the same offloading files.
    /// The bucket counts are divided by the number of files read.
    pub fn from_summaries<'a>(
        summaries: impl IntoIterator<Item = (Paradigm, &'a BucketSummary)>,
    ) -> Self {
        let mut result = Self::default();
        for (paradigm, summary) in summaries {
            if result.x_axis.is_empty() {
                result.x_axis = summary.x_values();
            }
            let files = summary.files.max(1) as f64;
            result
                .per_paradigm
                .insert(paradigm, summary.series(|b| b.count as f64 / files));
        }
        result
    }

    pub fn get(&self, paradigm: Paradigm, k: usize) -> f64 {
        self.per_paradigm
            .get(&paradigm)
            .and_then(|v| v.get(k))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn total(&self, k: usize) -> f64 {
        self.per_paradigm.values().filter_map(|v| v.get(k)).sum()
    }

    /// Shares per x-axis value. A value without any completed request reports zeros.
    pub fn shares(&self) -> Vec<ParadigmShares> {
        (0..self.x_axis.len())
            .map(|k| {
                let total = self.total(k);
                if total == 0.0 {
                    return ParadigmShares::default();
                }
                ParadigmShares {
                    edge: 100.0 * self.get(Paradigm::Edge, k) / total,
                    cloud: 100.0 * self.get(Paradigm::Cloud, k) / total,
                    vcc: 100.0 * self.get(Paradigm::Vcc, k) / total,
                }
            })
            .collect()
    }
}
