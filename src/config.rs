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
//! Immutable configuration records describing which analyses run over which trace files.

use std::{fs, path::Path};

use ordered_float::NotNan;
use serde::{Deserialize, Serialize};

use crate::{
    records::{Field, Paradigm, Strategy},
    Error,
};

/// Ordered list of target values of an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct XAxis {
    values: Vec<NotNan<f64>>,
}

impl XAxis {
    pub fn new(values: impl IntoIterator<Item = f64>) -> Result<Self, Error> {
        let values = values
            .into_iter()
            .map(|x| {
                NotNan::new(x).map_err(|_| Error::Config("x-axis values must not be NaN".to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { values })
    }

    /// Single-valued axis, used when all rows of a file belong to the same configuration.
    pub fn single(value: f64) -> Self {
        Self {
            values: vec![NotNan::new(value).unwrap_or_default()],
        }
    }

    /// Index of the first axis value equal to `value`. Column values are normalized to `f64`
    /// before, so `4445` and `4445.0` both match `4445.0`; the comparison itself is exact.
    pub fn position(&self, value: f64) -> Option<usize> {
        self.values.iter().position(|x| x.into_inner() == value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<f64> {
        self.values.get(index).map(|x| x.into_inner())
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().map(|x| x.into_inner())
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.iter().collect()
    }
}

impl TryFrom<Vec<f64>> for XAxis {
    type Error = Error;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<XAxis> for Vec<f64> {
    fn from(axis: XAxis) -> Self {
        axis.to_vec()
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Deserialize,
    Serialize,
    strum::Display,
    strum::EnumIter,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
/// The experiment parameter varied along the x-axis. The name is also part of the file names.
pub enum AnalysisKind {
    UsersNumber,
    Workload,
    EdgeResources,
    CarsNumber,
    VccResources,
}

/// One analysis: which column is the bucketing key and which values it takes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub kind: AnalysisKind,
    pub x_axis: XAxis,
    /// Field used to bucket rows. Resolved through the schema of each file, so the same analysis
    /// works for offloading and packet files.
    pub key: Field,
    pub x_label: String,
}

fn axis(values: &[f64]) -> XAxis {
    XAxis {
        values: values.iter().filter_map(|x| NotNan::new(*x).ok()).collect(),
    }
}

impl AnalysisConfig {
    pub fn users_number() -> Self {
        Self {
            kind: AnalysisKind::UsersNumber,
            x_axis: axis(&[
                1.0, 2.0, 5.0, 10.0, 15.0, 20.0, 25.0, 30.0, 40.0, 50.0, 60.0, 80.0, 100.0, 150.0,
            ]),
            key: Field::UsersNumber,
            x_label: "Users".to_string(),
        }
    }

    pub fn workload() -> Self {
        Self {
            kind: AnalysisKind::Workload,
            x_axis: axis(&[
                100.0, 200.0, 400.0, 500.0, 600.0, 800.0, 1000.0, 2000.0, 3000.0, 4000.0, 6000.0,
                8000.0, 10000.0,
            ]),
            key: Field::Workload,
            x_label: "Workload [MI]".to_string(),
        }
    }

    pub fn edge_resources() -> Self {
        Self {
            kind: AnalysisKind::EdgeResources,
            x_axis: axis(&[
                74907.0, 149814.0, 224721.0, 374535.0, 599256.0, 749070.0, 1498140.0, 2247210.0,
            ]),
            key: Field::EdgeResources,
            x_label: "Edge resources [MIPS]".to_string(),
        }
    }

    pub fn cars_number() -> Self {
        Self {
            kind: AnalysisKind::CarsNumber,
            x_axis: axis(&[10.0, 20.0, 40.0, 60.0]),
            key: Field::CarsNumber,
            x_label: "Vehicles".to_string(),
        }
    }

    pub fn vcc_resources() -> Self {
        Self {
            kind: AnalysisKind::VccResources,
            x_axis: axis(&[
                555.625, 1111.25, 2222.5, 4445.0, 8890.0, 35560.0, 71120.0, 142240.0, 213360.0,
            ]),
            key: Field::VccResources,
            x_label: "Per vehicle resources [MIPS]".to_string(),
        }
    }
}

/// A batch of runs executed at the same instant, identified by the directory name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInstant {
    pub name: String,
    /// Seeds to load. If empty, the seeds are discovered from the offloading files on disk.
    #[serde(default)]
    pub seeds: Vec<u32>,
}

/// Settings of one offloading strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub strategy: Strategy,
    pub paradigms: Vec<Paradigm>,
    /// Sub-directories of the vehicle speed profiles, e.g., `speed0`.
    pub speeds: Vec<String>,
    pub analyses: Vec<AnalysisConfig>,
}

/// Time windows of the dwell-time analysis, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DwellWindows {
    pub start: f64,
    pub step: f64,
}

impl Default for DwellWindows {
    fn default() -> Self {
        Self {
            start: 5.0,
            step: 10.0,
        }
    }
}

/// A vehicle speed profile of the speed campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedProfile {
    /// Directory and file name tag, e.g., `speed0`.
    pub name: String,
    /// Average vehicle speed in km/h.
    pub km_h: f64,
}

/// Campaign varying the vehicle speed, with one set of files per speed profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeedCampaign {
    pub speeds: Vec<SpeedProfile>,
    pub seeds: Vec<u32>,
    /// Packet size of a response, used to recognize responses passing through the gateway.
    pub response_size: i64,
}

impl Default for SpeedCampaign {
    fn default() -> Self {
        Self {
            speeds: [("speed0", 13.1), ("speed1", 50.0), ("speed2", 100.0)]
                .into_iter()
                .map(|(name, km_h)| SpeedProfile {
                    name: name.to_string(),
                    km_h,
                })
                .collect(),
            seeds: vec![0, 1, 3, 4, 5, 7, 8, 9, 10, 11],
            response_size: 4028,
        }
    }
}

impl SpeedCampaign {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let content = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Complete description of an experiment campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    pub scenarios: Vec<String>,
    pub run_instants: Vec<RunInstant>,
    pub strategies: Vec<StrategyConfig>,
    /// Fleet size considered by the dwell-time analysis.
    pub vehicles_num: u32,
    /// Simulated time of each run, in seconds.
    pub simulation_duration: f64,
    /// Packet size of a response, used to recognize responses passing through the gateway.
    pub response_size: i64,
    #[serde(default)]
    pub dwell_windows: DwellWindows,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        let shared = [AnalysisConfig::users_number(), AnalysisConfig::workload()];
        Self {
            scenarios: vec!["RectangleScenario".to_string()],
            run_instants: vec![RunInstant {
                name: "06-13-2024-22:59".to_string(),
                seeds: vec![0, 1, 2, 3, 4, 6, 7, 8, 9],
            }],
            strategies: vec![
                StrategyConfig {
                    strategy: Strategy::EcAndCc,
                    paradigms: Strategy::EcAndCc.paradigms().to_vec(),
                    speeds: vec!["speed0".to_string()],
                    analyses: shared
                        .iter()
                        .cloned()
                        .chain([AnalysisConfig::edge_resources()])
                        .collect(),
                },
                StrategyConfig {
                    strategy: Strategy::VccAndCc,
                    paradigms: Strategy::VccAndCc.paradigms().to_vec(),
                    speeds: vec![
                        "speed0".to_string(),
                        "speed1".to_string(),
                        "speed2".to_string(),
                    ],
                    analyses: shared
                        .iter()
                        .cloned()
                        .chain([
                            AnalysisConfig::cars_number(),
                            AnalysisConfig::vcc_resources(),
                        ])
                        .collect(),
                },
            ],
            vehicles_num: 40,
            simulation_duration: 120.0,
            response_size: 4028,
            dwell_windows: DwellWindows::default(),
        }
    }
}

impl ExperimentConfig {
    /// Load a campaign description from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.simulation_duration <= 0.0 {
            return Err(Error::Config(
                "simulation duration must be positive".to_string(),
            ));
        }
        if self.dwell_windows.step <= 0.0 {
            return Err(Error::Config("dwell window step must be positive".to_string()));
        }
        for strategy in &self.strategies {
            if let Some(p) = strategy
                .paradigms
                .iter()
                .find(|p| !strategy.strategy.paradigms().contains(p))
            {
                return Err(Error::Config(format!(
                    "paradigm {p} is not served under strategy {}",
                    strategy.strategy
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn axis_matching() {
        let axis = XAxis::new([10.0, 20.0, 555.625, 74907.0]).unwrap();
        assert_eq!(axis.position(10.0), Some(0));
        assert_eq!(axis.position(20.0), Some(1));
        assert_eq!(axis.position(555.625), Some(2));
        assert_eq!(axis.position(74907.0), Some(3));
        assert_eq!(axis.position(74907.0 + 1e-6), None);
        assert_eq!(axis.position(555.625 * (1.0 + 1e-12)), None);
        assert_eq!(axis.position(15.0), None);
        assert_eq!(axis.position(10.5), None);
        assert!(XAxis::new([1.0, f64::NAN]).is_err());
    }

    #[test]
    fn kind_names() {
        assert_eq!(AnalysisKind::UsersNumber.to_string(), "users_number");
        assert_eq!(AnalysisKind::VccResources.to_string(), "vcc_resources");
    }

    #[test]
    fn config_roundtrip_through_json() {
        let config = ExperimentConfig::default();
        config.validate().unwrap();
        let json = serde_json::to_string_pretty(&config).unwrap();
        assert!(json.contains("\"EC_and_CC\""));
        assert!(json.contains("\"users_number\""));
        let back: ExperimentConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn speed_campaign_defaults() {
        let campaign = SpeedCampaign::default();
        assert_eq!(campaign.speeds.len(), 3);
        assert_eq!(campaign.speeds[1].name, "speed1");
        assert_eq!(campaign.speeds[2].km_h, 100.0);
        assert_eq!(campaign.seeds.len(), 10);
    }

    #[test]
    fn invalid_config() {
        let mut config = ExperimentConfig::default();
        config.strategies[0].paradigms.push(Paradigm::Vcc);
        assert!(config.validate().is_err());

        let json = r#"{"kind": "workload", "x_axis": [100, 200], "key": "workload", "x_label": "W"}"#;
        let analysis: AnalysisConfig = serde_json::from_str(json).unwrap();
        assert_eq!(analysis.x_axis.to_vec(), vec![100.0, 200.0]);
    }
}
