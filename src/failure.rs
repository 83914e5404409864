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
//! Failure attribution along the delivery path of an offloaded request.
//!
//! A request is issued by a user, received by the gateway, forwarded to the vehicular cloud, either
//! rejected there because the queue is full or answered, and the answer finally passes through the
//! gateway back to the user. Counting the packets observed at every stage, the difference between
//! two consecutive stages is the share of requests lost in between.

use std::{collections::BTreeMap, fs::File, io::Read, path::Path};

use serde::Serialize;

use crate::{
    anomaly::{AnomalyKind, AnomalyLog},
    config::XAxis,
    parser::FieldValue,
    records::{Field, Paradigm, Schema},
    Error,
};

/// Observation points on the delivery path, in path order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    strum::Display,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Issued,
    GatewayReceived,
    VccReceived,
    VccRejected,
    ResponseSent,
    Delivered,
}

/// Average number of requests observed at each stage for one configuration value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StageCounts {
    pub issued: f64,
    pub gateway_received: f64,
    pub vcc_received: f64,
    pub vcc_rejected: f64,
    pub response_sent: f64,
    pub delivered: f64,
}

impl StageCounts {
    pub fn get(&self, stage: Stage) -> f64 {
        match stage {
            Stage::Issued => self.issued,
            Stage::GatewayReceived => self.gateway_received,
            Stage::VccReceived => self.vcc_received,
            Stage::VccRejected => self.vcc_rejected,
            Stage::ResponseSent => self.response_sent,
            Stage::Delivered => self.delivered,
        }
    }

    pub fn set(&mut self, stage: Stage, value: f64) {
        match stage {
            Stage::Issued => self.issued = value,
            Stage::GatewayReceived => self.gateway_received = value,
            Stage::VccReceived => self.vcc_received = value,
            Stage::VccRejected => self.vcc_rejected = value,
            Stage::ResponseSent => self.response_sent = value,
            Stage::Delivered => self.delivered = value,
        }
    }

    /// Pairs of stages whose counts must not increase along the path. Rejected requests and sent
    /// responses both leave the vehicular cloud, so together they are bounded by its input.
    fn violations(&self) -> Vec<String> {
        let mut violations = Vec::new();
        let mut check = |upstream: &str, a: f64, downstream: &str, b: f64| {
            if b > a {
                violations.push(format!("{downstream} ({b}) > {upstream} ({a})"));
            }
        };
        check("issued", self.issued, "gateway_received", self.gateway_received);
        check("gateway_received", self.gateway_received, "vcc_received", self.vcc_received);
        check(
            "vcc_received",
            self.vcc_received,
            "vcc_rejected + response_sent",
            self.vcc_rejected + self.response_sent,
        );
        check("response_sent", self.response_sent, "delivered", self.delivered);
        violations
    }
}

/// Share of the issued requests (in percent) lost between consecutive stages.
///
/// Values are kept signed, such that all shares plus the delivered share always add up to 100%.
/// A negative share means that the counts are not monotonic, which is reported as an anomaly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StageLosses {
    pub issue_to_gateway: f64,
    pub gateway_to_vcc: f64,
    /// Requests rejected by a vehicle because its queue was full.
    pub rejected: f64,
    /// Requests accepted by the vehicular cloud without a response reaching the gateway.
    pub vcc_to_response: f64,
    pub response_to_user: f64,
    pub delivered: f64,
}

impl StageLosses {
    /// Attribute the lost requests of one configuration to the stages where they were lost.
    ///
    /// If no request was issued, everything is reported as zero and a warning is recorded.
    pub fn attribute(counts: &StageCounts, context: &str, anomalies: &mut AnomalyLog) -> Self {
        for violation in counts.violations() {
            anomalies.warn(
                AnomalyKind::NonMonotonicStages,
                format!("{context}: {violation}"),
            );
        }
        if counts.issued == 0.0 {
            anomalies.warn(
                AnomalyKind::ZeroDenominator,
                format!("{context}: no issued requests, reporting zero losses"),
            );
            return Self::default();
        }
        let share = |x: f64| 100.0 * x / counts.issued;
        Self {
            issue_to_gateway: share(counts.issued - counts.gateway_received),
            gateway_to_vcc: share(counts.gateway_received - counts.vcc_received),
            rejected: share(counts.vcc_rejected),
            vcc_to_response: share(counts.vcc_received - counts.vcc_rejected - counts.response_sent),
            response_to_user: share(counts.response_sent - counts.delivered),
            delivered: share(counts.delivered),
        }
    }

    /// Percentage of issued requests that never got an answer.
    pub fn unsatisfied(&self) -> f64 {
        self.issue_to_gateway
            + self.gateway_to_vcc
            + self.rejected
            + self.vcc_to_response
            + self.response_to_user
    }

    /// Named losses in path order, without the delivered share.
    pub fn losses(&self) -> [(&'static str, f64); 5] {
        [
            ("User to gNB (requests)", self.issue_to_gateway),
            ("gNB to VCC (requests)", self.gateway_to_vcc),
            ("gNB to VCC (rejected requests)", self.rejected),
            ("VCC to gNB (response)", self.vcc_to_response),
            ("gNB to User (response)", self.response_to_user),
        ]
    }
}

/// How the rows of a stage file are distributed among configuration values.
#[derive(Debug, Clone, PartialEq)]
pub enum Bucketing {
    /// All rows belong to one configuration, e.g., one file per speed profile.
    All,
    /// Rows are assigned by the value of `field`.
    Key { field: Field, x_axis: XAxis },
}

impl Bucketing {
    fn len(&self) -> usize {
        match self {
            Self::All => 1,
            Self::Key { x_axis, .. } => x_axis.len(),
        }
    }
}

/// Counts the rows of one stage over a list of files, per configuration value, and averages them
/// per file. A file that cannot be read still counts as a (empty) run.
#[derive(Debug, Clone)]
pub struct StageCounter {
    key: Option<(usize, XAxis)>,
    size: Option<(usize, i64)>,
    counts: Vec<f64>,
    files: usize,
    anomalies: AnomalyLog,
}

impl StageCounter {
    pub fn new(schema: &Schema, bucketing: Bucketing) -> Result<Self, Error> {
        let counts = vec![0.0; bucketing.len()];
        let key = match bucketing {
            Bucketing::All => None,
            Bucketing::Key { field, x_axis } => Some((schema.require(field)?, x_axis)),
        };
        Ok(Self {
            key,
            size: None,
            counts,
            files: 0,
            anomalies: AnomalyLog::new(),
        })
    }

    /// Only count rows whose size column equals `size`.
    pub fn with_size(mut self, schema: &Schema, size: i64) -> Result<Self, Error> {
        self.size = Some((schema.require(Field::Size)?, size));
        Ok(self)
    }

    fn bucket_of(&mut self, row: &csv::StringRecord, source: &str) -> Option<usize> {
        if let Some((position, size)) = self.size {
            let Some(value) = row.get(position).and_then(FieldValue::parse) else {
                self.anomalies.warn(
                    AnomalyKind::MalformedValue,
                    format!(
                        "{source}: size column {position} of row [{}] is not a number",
                        row.iter().collect::<Vec<_>>().join(",")
                    ),
                );
                return None;
            };
            if value.as_i64() != Some(size) {
                return None;
            }
        }
        let Some((position, x_axis)) = &self.key else {
            return Some(0);
        };
        match row.get(*position).and_then(FieldValue::parse) {
            Some(value) => x_axis.position(value.as_f64()),
            None => {
                self.anomalies.warn(
                    AnomalyKind::MalformedValue,
                    format!(
                        "{source}: column {position} of row [{}] is not a number",
                        row.iter().collect::<Vec<_>>().join(",")
                    ),
                );
                None
            }
        }
    }

    pub fn count_reader<R: Read>(&mut self, reader: R, source: &str) {
        self.files += 1;
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);
        for (line, record) in csv.records().enumerate() {
            match record {
                Ok(row) => {
                    if let Some(idx) = self.bucket_of(&row, source) {
                        self.counts[idx] += 1.0;
                    }
                }
                Err(e) => self.anomalies.warn(
                    AnomalyKind::MalformedRow,
                    format!("{source}, line {}: {e}", line + 1),
                ),
            }
        }
    }

    pub fn count_paths<P: AsRef<Path>>(&mut self, paths: impl IntoIterator<Item = P>) {
        for path in paths {
            let path = path.as_ref();
            match File::open(path) {
                Ok(file) => self.count_reader(file, &path.display().to_string()),
                Err(e) => {
                    self.files += 1;
                    self.anomalies.warn(
                        AnomalyKind::MissingFile,
                        format!("{}: {e}", path.display()),
                    );
                }
            }
        }
    }

    /// Average count per file for every configuration value.
    pub fn finalize(self) -> (Vec<f64>, AnomalyLog) {
        let files = self.files.max(1) as f64;
        (
            self.counts.into_iter().map(|c| c / files).collect(),
            self.anomalies,
        )
    }
}

/// Percentage of requests sent to a paradigm that were not satisfied, for one configuration value.
/// The vehicular-cloud failures are split into those caused by vehicles leaving the cloud while
/// serving a request, and the rest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ParadigmFailureRates {
    pub edge: f64,
    pub cloud: f64,
    pub vcc_mobility: f64,
    pub vcc_no_mobility: f64,
}

impl ParadigmFailureRates {
    pub fn get(&self, paradigm: Paradigm) -> f64 {
        match paradigm {
            Paradigm::Edge => self.edge,
            Paradigm::Cloud => self.cloud,
            Paradigm::Vcc => self.vcc_mobility + self.vcc_no_mobility,
        }
    }
}

/// `100 * (total - satisfied) / total`, with a zero denominator or a negative difference reported
/// as zero and recorded.
fn failed_share(
    total: f64,
    satisfied: f64,
    what: &str,
    context: &str,
    anomalies: &mut AnomalyLog,
) -> f64 {
    if total == 0.0 {
        log::debug!("{context}: no {what}, reporting 0% failures");
        anomalies.push(AnomalyKind::ZeroDenominator, format!("{context}: no {what}"));
        return 0.0;
    }
    let delta = total - satisfied;
    if delta < 0.0 {
        anomalies.warn(
            AnomalyKind::NegativeDelta,
            format!("{context}: {satisfied} satisfied but only {total} {what}"),
        );
        return 0.0;
    }
    100.0 * delta / total
}

/// Failure rates per configuration value.
///
/// `sent` holds, for every paradigm served by the strategy, the average number of requests sent
/// to it; `satisfied` the average number of completed requests. `received_by_vehicle` is the
/// average number of requests that actually reached a vehicle, used to split VCC failures. Every
/// element is guarded on its own.
pub fn failure_rates(
    x_axis: &XAxis,
    sent: &BTreeMap<Paradigm, Vec<f64>>,
    satisfied: &BTreeMap<Paradigm, Vec<f64>>,
    received_by_vehicle: Option<&[f64]>,
    context: &str,
    anomalies: &mut AnomalyLog,
) -> Vec<ParadigmFailureRates> {
    let at = |values: Option<&Vec<f64>>, k: usize| values.and_then(|v| v.get(k)).copied();
    x_axis
        .iter()
        .enumerate()
        .map(|(k, x)| {
            let context = format!("{context}, x={x}");
            let rate = |p: Paradigm, anomalies: &mut AnomalyLog| match at(sent.get(&p), k) {
                Some(total) => failed_share(
                    total,
                    at(satisfied.get(&p), k).unwrap_or(0.0),
                    &format!("requests sent to {p}"),
                    &context,
                    anomalies,
                ),
                None => 0.0,
            };
            let edge = rate(Paradigm::Edge, anomalies);
            let cloud = rate(Paradigm::Cloud, anomalies);
            let vcc = rate(Paradigm::Vcc, anomalies);
            let vcc_mobility = match received_by_vehicle.and_then(|r| r.get(k)) {
                Some(received) => failed_share(
                    *received,
                    at(satisfied.get(&Paradigm::Vcc), k).unwrap_or(0.0),
                    "requests received by vehicles",
                    &context,
                    anomalies,
                ),
                None => 0.0,
            };
            let mut vcc_no_mobility = vcc - vcc_mobility;
            if vcc_no_mobility < 0.0 {
                anomalies.warn(
                    AnomalyKind::NegativeDelta,
                    format!(
                        "{context}: mobility failures ({vcc_mobility:.3}%) exceed VCC failures ({vcc:.3}%)"
                    ),
                );
                vcc_no_mobility = 0.0;
            }
            ParadigmFailureRates {
                edge,
                cloud,
                vcc_mobility,
                vcc_no_mobility,
            }
        })
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn counts(values: [f64; 6]) -> StageCounts {
        StageCounts {
            issued: values[0],
            gateway_received: values[1],
            vcc_received: values[2],
            vcc_rejected: values[3],
            response_sent: values[4],
            delivered: values[5],
        }
    }

    #[test]
    fn attribution_example() {
        let mut anomalies = AnomalyLog::new();
        let losses = StageLosses::attribute(
            &counts([100.0, 95.0, 90.0, 3.0, 85.0, 80.0]),
            "test",
            &mut anomalies,
        );
        assert_eq!(losses.issue_to_gateway, 5.0);
        assert_eq!(losses.gateway_to_vcc, 5.0);
        assert_eq!(losses.rejected, 3.0);
        assert_eq!(losses.vcc_to_response, 2.0);
        assert_eq!(losses.response_to_user, 5.0);
        assert_eq!(losses.delivered, 80.0);
        assert!((losses.unsatisfied() + losses.delivered - 100.0).abs() < 1e-6);
        assert!(anomalies.is_empty());
    }

    #[test]
    fn identity_holds_for_any_counts() {
        use rand::prelude::*;
        let mut rng = StdRng::seed_from_u64(7);
        let mut anomalies = AnomalyLog::new();
        for _ in 0..1000 {
            let issued = rng.gen_range(1.0..10000.0);
            let c = counts([
                issued,
                rng.gen_range(0.0..issued),
                rng.gen_range(0.0..issued),
                rng.gen_range(0.0..issued),
                rng.gen_range(0.0..issued),
                rng.gen_range(0.0..issued),
            ]);
            let losses = StageLosses::attribute(&c, "random", &mut anomalies);
            let total: f64 = losses.losses().iter().map(|(_, x)| x).sum::<f64>() + losses.delivered;
            assert!((total - 100.0).abs() < 1e-6, "{c:?} -> {losses:?}");
        }
    }

    #[test]
    fn zero_issued() {
        let mut anomalies = AnomalyLog::new();
        let losses = StageLosses::attribute(&StageCounts::default(), "empty", &mut anomalies);
        assert_eq!(losses, StageLosses::default());
        assert_eq!(anomalies.count(AnomalyKind::ZeroDenominator), 1);
    }

    #[test]
    fn non_monotonic_counts_are_reported() {
        let mut anomalies = AnomalyLog::new();
        let losses = StageLosses::attribute(
            &counts([100.0, 101.0, 90.0, 10.0, 85.0, 80.0]),
            "bad",
            &mut anomalies,
        );
        assert_eq!(anomalies.count(AnomalyKind::NonMonotonicStages), 2);
        assert_eq!(losses.issue_to_gateway, -1.0);
        assert_eq!(losses.vcc_to_response, -5.0);
        assert!((losses.unsatisfied() + losses.delivered - 100.0).abs() < 1e-6);
    }

    #[test]
    fn stage_counter_by_key() {
        let schema = Schema::packets();
        let mut counter = StageCounter::new(
            &schema,
            Bucketing::Key {
                field: Field::UsersNumber,
                x_axis: XAxis::new([10.0, 20.0]).unwrap(),
            },
        )
        .unwrap();
        let run0 = "1,1024,+0ns,0.1,2,0.1,40,10,74907,555.625,100,30,0\n\
                    1,1024,+0ns,0.1,2,0.1,40,20,74907,555.625,100,30,0\n\
                    1,1024,+0ns,0.1,2,0.1,40,20,74907,555.625,100,30,0\n\
                    1,1024,+0ns,0.1,2,0.1,40,30,74907,555.625,100,30,0\n";
        let run1 = "1,1024,+0ns,0.1,2,0.1,40,10.0,74907,555.625,100,30,0\n";
        counter.count_reader(run0.as_bytes(), "run0");
        counter.count_reader(run1.as_bytes(), "run1");
        counter.count_paths(["/nonexistent/total_VCC_sent_packets.csv"]);
        let (averages, anomalies) = counter.finalize();
        assert_eq!(averages, vec![2.0 / 3.0, 2.0 / 3.0]);
        assert_eq!(anomalies.count(AnomalyKind::MissingFile), 1);
    }

    #[test]
    fn stage_counter_size_filter() {
        let schema = Schema::packets();
        let mut counter = StageCounter::new(&schema, Bucketing::All)
            .unwrap()
            .with_size(&schema, 4028)
            .unwrap();
        let rows = "1,4028,+0ns,0.1,2,0.1,40,10,74907,555.625,100,30,0\n\
                    1,1024,+0ns,0.1,2,0.1,40,10,74907,555.625,100,30,0\n\
                    1,4028,+0ns,0.1,2,0.1,40,10,74907,555.625,100,30,0\n\
                    1,big,+0ns,0.1,2,0.1,40,10,74907,555.625,100,30,0\n";
        counter.count_reader(rows.as_bytes(), "mem");
        let (averages, anomalies) = counter.finalize();
        assert_eq!(averages, vec![2.0]);
        assert_eq!(anomalies.count(AnomalyKind::MalformedValue), 1);
    }

    #[test]
    fn failure_rates_with_mobility() {
        let x_axis = XAxis::new([10.0, 20.0]).unwrap();
        let sent = BTreeMap::from([
            (Paradigm::Cloud, vec![50.0, 0.0]),
            (Paradigm::Vcc, vec![100.0, 100.0]),
        ]);
        let satisfied = BTreeMap::from([
            (Paradigm::Cloud, vec![45.0, 0.0]),
            (Paradigm::Vcc, vec![80.0, 90.0]),
        ]);
        let received = [90.0, 80.0];
        let mut anomalies = AnomalyLog::new();
        let rates = failure_rates(
            &x_axis,
            &sent,
            &satisfied,
            Some(&received),
            "VCC_and_CC",
            &mut anomalies,
        );
        assert_eq!(rates[0].edge, 0.0);
        assert_eq!(rates[0].cloud, 10.0);
        assert!((rates[0].vcc_mobility - 100.0 * 10.0 / 90.0).abs() < 1e-9);
        assert!((rates[0].vcc_no_mobility - (20.0 - 100.0 * 10.0 / 90.0)).abs() < 1e-9);
        assert!((rates[0].get(Paradigm::Vcc) - 20.0).abs() < 1e-9);

        // more VCC completions than requests received by vehicles, and no cloud traffic
        assert_eq!(rates[1].cloud, 0.0);
        assert_eq!(rates[1].vcc_mobility, 0.0);
        assert_eq!(rates[1].vcc_no_mobility, 10.0);
        assert_eq!(anomalies.count(AnomalyKind::NegativeDelta), 1);
        assert_eq!(anomalies.count(AnomalyKind::ZeroDenominator), 1);
    }
}
