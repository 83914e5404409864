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
//! Bucketed accumulation of offloading traces.
//!
//! Every row whose paradigm passes the filter and whose bucketing key equals one of the x-axis
//! values contributes its latency phases to that bucket. Rows with a key outside the x-axis are
//! not errors; they are only counted as unmatched.

use std::{fs::File, io::Read, path::Path};

use serde::Serialize;

use crate::{
    anomaly::{AnomalyKind, AnomalyLog},
    config::{AnalysisConfig, XAxis},
    event::{decompose, TimeComponents, TraceEvent},
    parser::read_events,
    records::{Field, Paradigm, Schema},
    stats::{ConfidenceInterval, LatencyPercentiles},
    Error,
};

/// Which rows take part in an accumulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ParadigmFilter {
    Any,
    Only(Paradigm),
}

impl ParadigmFilter {
    pub fn matches(&self, paradigm: Option<Paradigm>) -> bool {
        match self {
            Self::Any => true,
            Self::Only(p) => paradigm == Some(*p),
        }
    }
}

impl From<Paradigm> for ParadigmFilter {
    fn from(p: Paradigm) -> Self {
        Self::Only(p)
    }
}

/// Running sums of one x-axis value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigurationBucket {
    /// Number of matching events.
    pub count: usize,
    /// Number of matching events that carried the intermediate instants.
    pub decomposed: usize,
    /// Sum of the offloading time of all matching events.
    pub offloading_sum: f64,
    /// Sum of the phases of all decomposed events.
    pub phase_sums: TimeComponents,
    /// Offloading time of every matching event.
    pub samples: Vec<f64>,
}

impl ConfigurationBucket {
    pub fn add(&mut self, offloading: f64, components: Option<TimeComponents>) {
        self.count += 1;
        self.offloading_sum += offloading;
        self.samples.push(offloading);
        if let Some(c) = components {
            self.decomposed += 1;
            self.phase_sums.offloading += c.offloading;
            self.phase_sums.uplink += c.uplink;
            self.phase_sums.queueing += c.queueing;
            self.phase_sums.elaboration += c.elaboration;
            self.phase_sums.downlink += c.downlink;
        }
    }

    /// Mean of the phases. A bucket without events reports zeros, not `NaN`.
    pub fn mean(&self) -> TimeComponents {
        let n = self.count.max(1) as f64;
        let d = self.decomposed.max(1) as f64;
        TimeComponents {
            offloading: self.offloading_sum / n,
            uplink: self.phase_sums.uplink / d,
            queueing: self.phase_sums.queueing / d,
            elaboration: self.phase_sums.elaboration / d,
            downlink: self.phase_sums.downlink / d,
        }
    }
}

/// Uplink, elaboration, and downlink in percent of their sum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PhaseShares {
    pub uplink: f64,
    pub elaboration: f64,
    pub downlink: f64,
}

impl PhaseShares {
    pub fn of(mean: &TimeComponents) -> Self {
        let total = mean.uplink + mean.elaboration + mean.downlink;
        if total == 0.0 {
            return Self::default();
        }
        Self {
            uplink: 100.0 * mean.uplink / total,
            elaboration: 100.0 * mean.elaboration / total,
            downlink: 100.0 * mean.downlink / total,
        }
    }
}

/// Finished statistics of one x-axis value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketStats {
    pub x: f64,
    pub count: usize,
    pub mean: TimeComponents,
    pub percentiles: LatencyPercentiles,
    pub shares: PhaseShares,
    pub interval: ConfidenceInterval,
}

/// Result of one accumulation pass. Read-only once produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketSummary {
    pub key: Field,
    pub paradigm: ParadigmFilter,
    pub buckets: Vec<BucketStats>,
    /// Rows that passed the paradigm filter but whose key matched no x-axis value.
    pub unmatched: usize,
    pub files: usize,
    pub anomalies: AnomalyLog,
}

impl BucketSummary {
    /// One value per x-axis position.
    pub fn series(&self, f: impl Fn(&BucketStats) -> f64) -> Vec<f64> {
        self.buckets.iter().map(f).collect()
    }

    pub fn x_values(&self) -> Vec<f64> {
        self.series(|b| b.x)
    }

    pub fn total_count(&self) -> usize {
        self.buckets.iter().map(|b| b.count).sum()
    }
}

/// Accumulator for one (analysis, paradigm) pair over an arbitrary number of files.
#[derive(Debug, Clone)]
pub struct BucketedAccumulator {
    schema: Schema,
    key: Field,
    x_axis: XAxis,
    filter: ParadigmFilter,
    buckets: Vec<ConfigurationBucket>,
    unmatched: usize,
    files: usize,
    anomalies: AnomalyLog,
}

impl BucketedAccumulator {
    /// Create an accumulator bucketing on `key`. Fails if the schema has no column for the key.
    pub fn new(
        schema: Schema,
        key: Field,
        x_axis: XAxis,
        filter: impl Into<ParadigmFilter>,
    ) -> Result<Self, Error> {
        schema.require(key)?;
        Ok(Self {
            buckets: vec![ConfigurationBucket::default(); x_axis.len()],
            schema,
            key,
            x_axis,
            filter: filter.into(),
            unmatched: 0,
            files: 0,
            anomalies: AnomalyLog::new(),
        })
    }

    pub fn for_analysis(
        schema: Schema,
        analysis: &AnalysisConfig,
        filter: impl Into<ParadigmFilter>,
    ) -> Result<Self, Error> {
        Self::new(schema, analysis.key, analysis.x_axis.clone(), filter)
    }

    pub fn buckets(&self) -> &[ConfigurationBucket] {
        &self.buckets
    }

    /// Add a single event. Returns the index of the bucket it was added to.
    pub fn accumulate_event(&mut self, event: &TraceEvent, source: &str) -> Option<usize> {
        if !self.filter.matches(event.paradigm) {
            return None;
        }
        for field in &event.malformed {
            self.anomalies.push(
                AnomalyKind::MalformedValue,
                format!("{field} in {source}: [{}]", event.raw),
            );
        }
        let Some(value) = event.value(self.key) else {
            self.unmatched += 1;
            return None;
        };
        let Some(idx) = self.x_axis.position(value) else {
            self.unmatched += 1;
            return None;
        };
        let components = decompose(event, format_args!("{}={value}, {source}", self.key));
        if components.map(|c| c.is_anomalous()).unwrap_or(false) {
            self.anomalies.push(
                AnomalyKind::NegativeDuration,
                format!("{}={value}, {source}: [{}]", self.key, event.raw),
            );
        }
        self.buckets[idx].add(event.offloading_time(), components);
        Some(idx)
    }

    /// Read all rows of a headerless CSV source. Rows that do not fit the schema are skipped and
    /// recorded. Returns the number of rows added to a bucket.
    pub fn accumulate_reader<R: Read>(&mut self, reader: R, source: &str) -> usize {
        self.files += 1;
        let schema = self.schema.clone();
        let mut added = 0;
        for (line, event) in read_events(reader, &schema) {
            match event {
                Ok(event) => {
                    if self.accumulate_event(&event, source).is_some() {
                        added += 1;
                    }
                }
                Err(e) => self.anomalies.warn(
                    AnomalyKind::MalformedRow,
                    format!("{source}, line {line}: {e}"),
                ),
            }
        }
        added
    }

    /// Read every file in order. A file that cannot be opened contributes nothing, and is logged.
    pub fn accumulate_paths<P: AsRef<Path>>(&mut self, paths: impl IntoIterator<Item = P>) -> usize {
        let mut added = 0;
        for path in paths {
            let path = path.as_ref();
            match File::open(path) {
                Ok(file) => added += self.accumulate_reader(file, &path.display().to_string()),
                Err(e) => {
                    self.files += 1;
                    self.anomalies.warn(
                        AnomalyKind::MissingFile,
                        format!("{}: {e}", path.display()),
                    );
                }
            }
        }
        log::debug!(
            "Accumulated {added} rows of {:?} on {} from {} files",
            self.filter,
            self.key,
            self.files
        );
        added
    }

    /// Divide the sums by the counts and compute the percentiles of every bucket.
    pub fn finalize(self) -> BucketSummary {
        let buckets = self
            .x_axis
            .iter()
            .zip(&self.buckets)
            .map(|(x, bucket)| {
                let mean = bucket.mean();
                BucketStats {
                    x,
                    count: bucket.count,
                    mean,
                    percentiles: LatencyPercentiles::from_samples(&bucket.samples),
                    shares: PhaseShares::of(&mean),
                    interval: ConfidenceInterval::normal_95(&bucket.samples),
                }
            })
            .collect();
        BucketSummary {
            key: self.key,
            paradigm: self.filter,
            buckets,
            unmatched: self.unmatched,
            files: self.files,
            anomalies: self.anomalies,
        }
    }
}
