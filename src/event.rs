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
//! Describes a single offloaded request and the decomposition of its latency into phases.

use std::{collections::BTreeMap, fmt::Display};

use serde::Serialize;

use crate::{
    parser::FieldValue,
    records::{Field, Paradigm},
};

/// Lifecycle record of one offloaded request. All instants are in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEvent {
    /// Identifier of the issuing user, not unique across files.
    pub user_id: String,
    pub size: Option<i64>,
    /// `None` if the schema has no paradigm column or the code is unknown.
    pub paradigm: Option<Paradigm>,
    pub t_issue: f64,
    pub t_complete: f64,
    pub t_uplink_done: Option<f64>,
    pub t_queue_done: Option<f64>,
    /// Carried as a duration by the simulator.
    pub elaboration_time: Option<f64>,
    /// All numeric experiment parameters of the row, keyed by their field.
    pub config: BTreeMap<Field, FieldValue>,
    /// Fields whose value could not be parsed and was replaced by a sentinel.
    pub malformed: Vec<Field>,
    /// The row as read from the file, for diagnostics.
    pub raw: String,
}

impl TraceEvent {
    /// Normalized numeric value of a configuration field.
    pub fn value(&self, field: Field) -> Option<f64> {
        self.config.get(&field).map(FieldValue::as_f64)
    }

    pub fn offloading_time(&self) -> f64 {
        self.t_complete - self.t_issue
    }
}

/// Latency of a request split into its phases, in seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TimeComponents {
    pub offloading: f64,
    pub uplink: f64,
    pub queueing: f64,
    pub elaboration: f64,
    pub downlink: f64,
}

impl TimeComponents {
    /// Compute the phases of an event. Returns `None` if the event does not carry the
    /// intermediate instants (e.g., rows of the packet files).
    ///
    /// The four phases always sum up to the offloading time, also for anomalous rows.
    pub fn of(event: &TraceEvent) -> Option<Self> {
        let t_uplink_done = event.t_uplink_done?;
        let t_queue_done = event.t_queue_done?;
        let elaboration = event.elaboration_time?;
        Some(Self {
            offloading: event.t_complete - event.t_issue,
            uplink: t_uplink_done - event.t_issue,
            queueing: t_queue_done - t_uplink_done,
            elaboration,
            downlink: (event.t_complete - t_queue_done) - elaboration,
        })
    }

    /// A negative phase means the instants are out of order or a value was misparsed.
    pub fn is_anomalous(&self) -> bool {
        self.downlink < 0.0 || self.uplink < 0.0 || self.queueing < 0.0 || self.elaboration < 0.0
    }

    pub fn sum_of_phases(&self) -> f64 {
        self.uplink + self.queueing + self.elaboration + self.downlink
    }
}

/// Decompose the latency of `event`, logging a data-quality warning with `context` and the full
/// row if the downlink phase comes out negative. The values are returned regardless.
pub fn decompose(event: &TraceEvent, context: impl Display) -> Option<TimeComponents> {
    let components = TimeComponents::of(event)?;
    if components.downlink < 0.0 {
        log::warn!(
            "Negative downlink time {:.9}s ({context}, paradigm={}): offloading={:.9}, uplink={:.9}, queueing={:.9}, elaboration={:.9}, row [{}]",
            components.downlink,
            event
                .paradigm
                .map(|p| p.to_string())
                .unwrap_or_else(|| "?".to_string()),
            components.offloading,
            components.uplink,
            components.queueing,
            components.elaboration,
            event.raw,
        );
    }
    Some(components)
}

#[cfg(test)]
mod test {
    use super::*;

    fn event(t_issue: f64, t_uplink: f64, t_queue: f64, elaboration: f64, t_complete: f64) -> TraceEvent {
        TraceEvent {
            user_id: "0".to_string(),
            size: Some(1024),
            paradigm: Some(Paradigm::Edge),
            t_issue,
            t_complete,
            t_uplink_done: Some(t_uplink),
            t_queue_done: Some(t_queue),
            elaboration_time: Some(elaboration),
            config: BTreeMap::new(),
            malformed: Vec::new(),
            raw: String::new(),
        }
    }

    #[test]
    fn phases() {
        let c = TimeComponents::of(&event(1.0, 1.002, 1.005, 0.003, 1.01)).unwrap();
        assert!((c.offloading - 0.01).abs() < 1e-12);
        assert!((c.uplink - 0.002).abs() < 1e-12);
        assert!((c.queueing - 0.003).abs() < 1e-12);
        assert_eq!(c.elaboration, 0.003);
        assert!((c.downlink - 0.002).abs() < 1e-12);
        assert!(!c.is_anomalous());
    }

    #[test]
    fn phases_sum_to_offloading_time() {
        for (ti, tu, tq, e, tc) in [
            (0.0, 0.1, 0.2, 0.05, 0.4),
            (12.345678901, 12.35, 12.4, 0.001, 12.402),
            (100.0, 100.5, 100.25, 3.0, 101.0),
            (3.3, 3.30001, 3.30002, 0.00001, 3.31),
        ] {
            let c = TimeComponents::of(&event(ti, tu, tq, e, tc)).unwrap();
            assert!((c.sum_of_phases() - c.offloading).abs() < 1e-9);
        }
    }

    #[test]
    fn negative_downlink_is_returned() {
        // elaboration longer than the time left after the queue
        let c = decompose(&event(1.0, 1.001, 1.002, 0.5, 1.01), "users=10").unwrap();
        assert!(c.downlink < 0.0);
        assert!(c.is_anomalous());
        assert!((c.sum_of_phases() - c.offloading).abs() < 1e-9);
    }

    #[test]
    fn packet_rows_have_no_phases() {
        let mut e = event(1.0, 1.0, 1.0, 0.0, 1.0);
        e.t_uplink_done = None;
        assert_eq!(TimeComponents::of(&e), None);
        assert_eq!(decompose(&e, "none"), None);
    }
}
