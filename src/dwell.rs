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
//! Dwell time of vehicles in the vehicular cloud, per time window of the simulation.
//!
//! A vehicle entering the cloud is logged with an `IN` row, leaving it with an `OUT` row. The dwell
//! time of an entry is the time until the next exit of the same vehicle, relative to the
//! simulation duration. Entries are grouped into windows by their entry time.

use std::{fs::File, io::Read, path::Path};

use coe_utils::SENTINEL_SECONDS;
use serde::Serialize;

use crate::{
    anomaly::{AnomalyKind, AnomalyLog},
    config::DwellWindows,
    parser::parse_time,
    records::{DwellRecord, Transition},
};

/// Mean relative dwell time per window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DwellSummary {
    /// Upper (exclusive) bound of every window, in seconds.
    pub window_ends: Vec<f64>,
    pub entries: Vec<usize>,
    pub mean: Vec<f64>,
    pub anomalies: AnomalyLog,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DwellAnalysis {
    vehicles_num: u32,
    duration: f64,
    step: f64,
    window_ends: Vec<f64>,
}

impl DwellAnalysis {
    /// Windows end at `start`, `start + step`, ..., up to (excluding) `duration + step`.
    pub fn new(vehicles_num: u32, duration: f64, windows: DwellWindows) -> Self {
        let stop = duration + windows.step;
        let window_ends = (0..)
            .map(|i| windows.start + i as f64 * windows.step)
            .take_while(|x| *x < stop)
            .collect();
        Self {
            vehicles_num,
            duration,
            step: windows.step,
            window_ends,
        }
    }

    pub fn window_ends(&self) -> &[f64] {
        &self.window_ends
    }

    fn window_of(&self, time: f64) -> Option<usize> {
        self.window_ends
            .iter()
            .position(|end| end - self.step <= time && time < *end)
    }

    /// Read all dwell rows of a source, skipping rows that cannot be deserialized.
    pub fn read_records<R: Read>(reader: R, source: &str, anomalies: &mut AnomalyLog) -> Vec<DwellRecord> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        csv.deserialize()
            .enumerate()
            .filter_map(|(line, record)| match record {
                Ok(r) => Some(r),
                Err(e) => {
                    anomalies.warn(
                        AnomalyKind::MalformedRow,
                        format!("{source}, line {}: {e}", line + 1),
                    );
                    None
                }
            })
            .collect()
    }

    /// Relative dwell time of every entry of one run, grouped by window.
    pub fn dwell_times(
        &self,
        records: &[DwellRecord],
        source: &str,
        anomalies: &mut AnomalyLog,
    ) -> Vec<Vec<f64>> {
        let times: Vec<f64> = records
            .iter()
            .map(|r| {
                parse_time(&r.time).unwrap_or_else(|| {
                    anomalies.warn(
                        AnomalyKind::MalformedValue,
                        format!("{source}: cannot convert dwell time `{}`", r.time),
                    );
                    SENTINEL_SECONDS
                })
            })
            .collect();

        let mut result = vec![Vec::new(); self.window_ends.len()];
        for (entry, t_in) in records.iter().zip(&times) {
            if entry.transition != Transition::In || entry.cars_number != self.vehicles_num as f64 {
                continue;
            }
            let Some(window) = self.window_of(*t_in) else {
                continue;
            };
            let exit = records
                .iter()
                .zip(&times)
                .find(|(r, t)| r.transition == Transition::Out && r.address == entry.address && *t > t_in);
            if let Some((_, t_out)) = exit {
                result[window].push((t_out - t_in) / self.duration);
            }
        }
        result
    }

    /// Mean dwell time per window over all runs. A missing file contributes nothing; a window
    /// without entries reports zero.
    pub fn analyze_paths<P: AsRef<Path>>(&self, paths: impl IntoIterator<Item = P>) -> DwellSummary {
        let mut anomalies = AnomalyLog::new();
        let mut samples = vec![Vec::new(); self.window_ends.len()];
        for path in paths {
            let path = path.as_ref();
            let source = path.display().to_string();
            let records = match File::open(path) {
                Ok(file) => Self::read_records(file, &source, &mut anomalies),
                Err(e) => {
                    anomalies.warn(AnomalyKind::MissingFile, format!("{source}: {e}"));
                    continue;
                }
            };
            for (window, times) in self
                .dwell_times(&records, &source, &mut anomalies)
                .into_iter()
                .enumerate()
            {
                samples[window].extend(times);
            }
        }
        self.summarize(samples, anomalies)
    }

    fn summarize(&self, samples: Vec<Vec<f64>>, anomalies: AnomalyLog) -> DwellSummary {
        DwellSummary {
            window_ends: self.window_ends.clone(),
            entries: samples.iter().map(Vec::len).collect(),
            mean: samples
                .iter()
                .map(|s| s.iter().sum::<f64>() / s.len().max(1) as f64)
                .collect(),
            anomalies,
        }
    }
}
