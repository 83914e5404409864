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
//! Location of the trace files written by the simulator.
//!
//! The offloading campaign stores its files as
//! `{root}/csv_files/{scenario}/{run_instant}/{strategy}[/{speed}]/{stage}_{analysis}_{x}_{seed}.csv`,
//! the speed campaign as `{root}/csv_files/{speed}/{stage}_{speed}_{seed}.csv`.

use std::path::{Path, PathBuf};

use coe_utils::other::format_axis_value;
use itertools::Itertools;

use crate::{
    config::{AnalysisKind, XAxis},
    failure::Stage,
    records::{Paradigm, Schema, Strategy},
    util::PathBufExt,
};

/// Kind of trace file, named by the prefix the simulator uses.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumIter,
    strum_macros::EnumString,
)]
pub enum TraceStage {
    #[strum(serialize = "offloading_time")]
    OffloadingTime,
    #[strum(serialize = "total_sent_packets")]
    TotalSentPackets,
    #[strum(serialize = "total_VCC_sent_packets")]
    VccSentPackets,
    #[strum(serialize = "total_EDGE_sent_packets")]
    EdgeSentPackets,
    #[strum(serialize = "total_CLOUD_sent_packets")]
    CloudSentPackets,
    #[strum(serialize = "total_VCC_received_from_edge_packets")]
    VccReceivedFromEdge,
    #[strum(serialize = "total_VCC_rejected_packets_cause_full_queue")]
    VccRejectedFullQueue,
    #[strum(serialize = "response_offloading_passing_in_gNB")]
    ResponseThroughGateway,
    #[strum(serialize = "dwell_time")]
    DwellTime,
}

impl TraceStage {
    /// Column layout of the files of this stage. Dwell-time files are not event traces.
    pub fn schema(&self) -> Option<Schema> {
        match self {
            Self::OffloadingTime => Some(Schema::offloading()),
            Self::TotalSentPackets => Some(Schema::sent()),
            Self::DwellTime => None,
            _ => Some(Schema::packets()),
        }
    }
}

impl TraceStage {
    /// Packets sent by the gateway to the given paradigm.
    pub fn sent_to(paradigm: Paradigm) -> Self {
        match paradigm {
            Paradigm::Edge => Self::EdgeSentPackets,
            Paradigm::Cloud => Self::CloudSentPackets,
            Paradigm::Vcc => Self::VccSentPackets,
        }
    }
}

impl From<Stage> for TraceStage {
    fn from(stage: Stage) -> Self {
        match stage {
            Stage::Issued => Self::TotalSentPackets,
            Stage::GatewayReceived => Self::VccSentPackets,
            Stage::VccReceived => Self::VccReceivedFromEdge,
            Stage::VccRejected => Self::VccRejectedFullQueue,
            Stage::ResponseSent => Self::ResponseThroughGateway,
            Stage::Delivered => Self::OffloadingTime,
        }
    }
}

/// Directory holding the trace files of one configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracePath {
    dir: PathBuf,
}

impl TracePath {
    pub fn campaign(
        root: impl AsRef<Path>,
        scenario: &str,
        run_instant: &str,
        strategy: Strategy,
        speed: Option<&str>,
    ) -> Self {
        let dir = root
            .as_ref()
            .then("csv_files")
            .then(scenario)
            .then(run_instant)
            .then(strategy.to_string());
        Self {
            dir: match speed {
                Some(speed) => dir.then(speed),
                None => dir,
            },
        }
    }

    pub fn speed_campaign(root: impl AsRef<Path>, speed: &str) -> Self {
        Self {
            dir: root.as_ref().then("csv_files").then(speed),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File of one analysis run. The x value is written without a fraction if it is integral; if
    /// that file does not exist but one with the fraction written out does (e.g., `4445.0`), the
    /// latter is returned.
    pub fn analysis_file(&self, stage: TraceStage, kind: AnalysisKind, x: f64, seed: u32) -> PathBuf {
        let candidates = [format_axis_value(x), format!("{x:?}")];
        let mut paths = candidates
            .iter()
            .unique()
            .map(|x| self.dir.clone().then(format!("{stage}_{kind}_{x}_{seed}.csv")));
        let first = paths.next().unwrap_or_else(|| self.dir.clone());
        if first.exists() {
            return first;
        }
        paths.find(|p| p.exists()).unwrap_or(first)
    }

    pub fn speed_file(&self, stage: TraceStage, speed: &str, seed: u32) -> PathBuf {
        self.dir.clone().then(format!("{stage}_{speed}_{seed}.csv"))
    }

    /// Files of an analysis for all given seeds and x values, seeds varying fastest within one x.
    pub fn analysis_files(
        &self,
        stage: TraceStage,
        kind: AnalysisKind,
        x_axis: &XAxis,
        seeds: &[u32],
    ) -> Vec<PathBuf> {
        x_axis
            .iter()
            .flat_map(|x| seeds.iter().map(move |s| (x, *s)))
            .map(|(x, seed)| self.analysis_file(stage, kind, x, seed))
            .collect()
    }

    /// Seeds for which a file of the given stage exists for any x value on the axis, in ascending
    /// order.
    pub fn discover_seeds(&self, stage: TraceStage, kind: AnalysisKind, x_axis: &XAxis) -> Vec<u32> {
        let pattern = format!(
            "{}/{stage}_{kind}_*.csv",
            glob::Pattern::escape(&self.dir.to_string_lossy())
        );
        let prefix = format!("{stage}_{kind}_");
        let entries = match glob::glob(&pattern) {
            Ok(entries) => entries,
            Err(e) => {
                log::error!("Invalid pattern {pattern}: {e}");
                return Vec::new();
            }
        };
        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|path| {
                let name = path.file_name()?.to_string_lossy().to_string();
                let (x, seed) = name
                    .strip_prefix(&prefix)?
                    .strip_suffix(".csv")?
                    .rsplit_once('_')?;
                let x: f64 = x.parse().ok()?;
                x_axis.position(x)?;
                Some(seed.to_string())
            })
            .unique()
            .sorted_by(|a, b| human_sort::compare(a, b))
            .filter_map(|seed| seed.parse().ok())
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    #[test]
    fn stage_names() {
        assert_eq!(TraceStage::OffloadingTime.to_string(), "offloading_time");
        assert_eq!(
            TraceStage::from(Stage::VccRejected).to_string(),
            "total_VCC_rejected_packets_cause_full_queue"
        );
        assert_eq!(
            TraceStage::from(Stage::ResponseSent).to_string(),
            "response_offloading_passing_in_gNB"
        );
        assert_eq!(TraceStage::DwellTime.schema(), None);
        assert_eq!(TraceStage::EdgeSentPackets.schema(), Some(Schema::packets()));
    }

    #[test]
    fn campaign_layout() {
        let path = TracePath::campaign(
            "/data",
            "RectangleScenario",
            "06-13-2024-22:59",
            Strategy::VccAndCc,
            Some("speed1"),
        );
        assert_eq!(
            path.analysis_file(TraceStage::OffloadingTime, AnalysisKind::Workload, 100.0, 3),
            PathBuf::from(
                "/data/csv_files/RectangleScenario/06-13-2024-22:59/VCC_and_CC/speed1/offloading_time_workload_100_3.csv"
            )
        );
        assert_eq!(
            path.analysis_file(TraceStage::VccSentPackets, AnalysisKind::VccResources, 555.625, 0),
            PathBuf::from(
                "/data/csv_files/RectangleScenario/06-13-2024-22:59/VCC_and_CC/speed1/total_VCC_sent_packets_vcc_resources_555.625_0.csv"
            )
        );
        let speed = TracePath::speed_campaign("/data", "speed2");
        assert_eq!(
            speed.speed_file(TraceStage::TotalSentPackets, "speed2", 11),
            PathBuf::from("/data/csv_files/speed2/total_sent_packets_speed2_11.csv")
        );
    }

    #[test]
    fn files_on_disk() {
        let root = std::env::temp_dir().join(format!("coe-paths-{}", std::process::id()));
        let path = TracePath::campaign(&root, "S", "run", Strategy::EcAndCc, None);
        fs::create_dir_all(path.dir()).unwrap();
        for name in [
            "offloading_time_vcc_resources_4445.0_2.csv",
            "offloading_time_vcc_resources_4445.0_10.csv",
            "offloading_time_vcc_resources_71120_1.csv",
            "offloading_time_vcc_resources_999_5.csv",
            "offloading_time_workload_100_7.csv",
        ] {
            fs::write(path.dir().join(name), "").unwrap();
        }
        let axis = XAxis::new([4445.0, 71120.0]).unwrap();
        assert_eq!(
            path.discover_seeds(TraceStage::OffloadingTime, AnalysisKind::VccResources, &axis),
            vec![1, 2, 10]
        );
        assert_eq!(
            path.analysis_file(TraceStage::OffloadingTime, AnalysisKind::VccResources, 4445.0, 2),
            path.dir().join("offloading_time_vcc_resources_4445.0_2.csv")
        );
        let files = path.analysis_files(
            TraceStage::OffloadingTime,
            AnalysisKind::VccResources,
            &axis,
            &[1, 2],
        );
        assert_eq!(files.len(), 4);
        assert_eq!(files[3], path.dir().join("offloading_time_vcc_resources_71120_2.csv"));
        fs::remove_dir_all(&root).unwrap();
    }
}
