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
//! Library for aggregating the traces of Edge, Cloud, and Vehicular-Cloud offloading experiments
//! into latency statistics and per-stage failure attribution.

pub mod accumulator;
pub mod anomaly;
pub mod config;
pub mod dwell;
pub mod engine;
pub mod event;
pub mod failure;
pub mod parser;
pub mod paths;
pub mod records;
pub mod report;
pub mod satisfaction;
pub mod stats;
pub mod util;
pub mod vehicles;

#[cfg(test)]
mod test;

/// Errors that make an analysis impossible. Data-quality problems are never reported through this
/// type; they end up in the [`anomaly::AnomalyLog`] instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub mod prelude {
    pub use super::{
        accumulator::{BucketSummary, BucketedAccumulator, ParadigmFilter},
        anomaly::{Anomaly, AnomalyKind, AnomalyLog},
        config::{AnalysisConfig, AnalysisKind, ExperimentConfig, XAxis},
        event::{TimeComponents, TraceEvent},
        failure::{Stage, StageCounts, StageLosses},
        records::{Field, Paradigm, Schema, Strategy},
        report::{AnalysisReport, ReportSink},
        Error,
    };
}
