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
//! Number of vehicles that actually take part in the vehicular cloud.
//!
//! The used-cars column of a VCC row holds the number of configured vehicles that are not part of
//! the cloud when the request is served. The participating vehicles are the configured count minus
//! that value, averaged over all matching rows of all files.

use std::{fs::File, io::Read, path::Path};

use serde::Serialize;

use crate::{
    anomaly::{AnomalyKind, AnomalyLog},
    config::XAxis,
    event::TraceEvent,
    parser::read_events,
    records::{Field, Paradigm, Schema},
    Error,
};

/// Average number of participating vehicles per x-axis value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleUsage {
    pub x_axis: Vec<f64>,
    pub rows: Vec<usize>,
    pub average_used: Vec<f64>,
    pub anomalies: AnomalyLog,
}

#[derive(Debug, Clone)]
pub struct VehicleAccumulator {
    schema: Schema,
    key: Field,
    x_axis: XAxis,
    rows: Vec<usize>,
    used: Vec<f64>,
    anomalies: AnomalyLog,
}

impl VehicleAccumulator {
    pub fn new(schema: Schema, key: Field, x_axis: XAxis) -> Result<Self, Error> {
        schema.require(key)?;
        schema.require(Field::UsedCars)?;
        Ok(Self {
            rows: vec![0; x_axis.len()],
            used: vec![0.0; x_axis.len()],
            schema,
            key,
            x_axis,
            anomalies: AnomalyLog::new(),
        })
    }

    /// Add one row, if it was served by the vehicular cloud and its key is on the x-axis.
    pub fn accumulate_event(&mut self, event: &TraceEvent, source: &str) -> Option<usize> {
        if event.paradigm != Some(Paradigm::Vcc) {
            return None;
        }
        let x = event.value(self.key)?;
        let idx = self.x_axis.position(x)?;
        let Some(not_in_cloud) = event.value(Field::UsedCars) else {
            self.anomalies.push(
                AnomalyKind::MalformedValue,
                format!("{source}: no used cars in [{}]", event.raw),
            );
            return None;
        };
        let configured = event.value(Field::CarsNumber).unwrap_or(x);
        let participating = configured - not_in_cloud;
        if participating < 0.0 {
            self.anomalies.warn(
                AnomalyKind::NegativeDelta,
                format!(
                    "{source}: {not_in_cloud} vehicles outside the cloud, but only {configured} configured, row [{}]",
                    event.raw
                ),
            );
        }
        self.rows[idx] += 1;
        self.used[idx] += participating;
        Some(idx)
    }

    pub fn accumulate_reader<R: Read>(&mut self, reader: R, source: &str) {
        let schema = self.schema.clone();
        for (line, event) in read_events(reader, &schema) {
            match event {
                Ok(event) => {
                    self.accumulate_event(&event, source);
                }
                Err(e) => self.anomalies.warn(
                    AnomalyKind::MalformedRow,
                    format!("{source}, line {line}: {e}"),
                ),
            }
        }
    }

    pub fn accumulate_paths<P: AsRef<Path>>(&mut self, paths: impl IntoIterator<Item = P>) {
        for path in paths {
            let path = path.as_ref();
            match File::open(path) {
                Ok(file) => self.accumulate_reader(file, &path.display().to_string()),
                Err(e) => self.anomalies.warn(
                    AnomalyKind::MissingFile,
                    format!("{}: {e}", path.display()),
                ),
            }
        }
    }

    pub fn finalize(self) -> VehicleUsage {
        VehicleUsage {
            x_axis: self.x_axis.to_vec(),
            average_used: self
                .used
                .iter()
                .zip(&self.rows)
                .map(|(used, rows)| used / (*rows).max(1) as f64)
                .collect(),
            rows: self.rows,
            anomalies: self.anomalies,
        }
    }
}
