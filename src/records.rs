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
//! Module defining the categorical types and the positional column layout of the trace files.

use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Deserialize,
    Serialize,
    strum::Display,
    strum::EnumIter,
    strum_macros::EnumString,
    strum_macros::FromRepr,
)]
#[repr(u8)]
/// Where a request was processed. The numeric representation is the code written by the
/// simulator into the `paradigm` column.
pub enum Paradigm {
    #[serde(rename = "EDGE")]
    #[strum(serialize = "EDGE")]
    Edge = 0,
    #[serde(rename = "CLOUD")]
    #[strum(serialize = "CLOUD")]
    Cloud = 1,
    #[serde(rename = "VCC")]
    #[strum(serialize = "VCC")]
    Vcc = 2,
}

impl Paradigm {
    /// Decode the paradigm from the numeric code of a trace row.
    pub fn from_code(code: i64) -> Option<Self> {
        u8::try_from(code).ok().and_then(Self::from_repr)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Deserialize,
    Serialize,
    strum::Display,
    strum::EnumIter,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
/// Offloading strategy of an experiment, i.e., which paradigm is tried before falling back to the
/// cloud.
pub enum Strategy {
    #[serde(rename = "EC_and_CC")]
    #[strum(serialize = "EC_and_CC")]
    EcAndCc,
    #[serde(rename = "VCC_and_CC")]
    #[strum(serialize = "VCC_and_CC")]
    VccAndCc,
}

impl Strategy {
    /// Paradigms that can serve a request under this strategy.
    pub fn paradigms(&self) -> [Paradigm; 2] {
        match self {
            Self::EcAndCc => [Paradigm::Edge, Paradigm::Cloud],
            Self::VccAndCc => [Paradigm::Cloud, Paradigm::Vcc],
        }
    }

    /// The paradigm tried first.
    pub fn first(&self) -> Paradigm {
        match self {
            Self::EcAndCc => Paradigm::Edge,
            Self::VccAndCc => Paradigm::Vcc,
        }
    }

    /// Name used in comparison charts.
    pub fn label(&self) -> &'static str {
        match self {
            Self::EcAndCc => "ECFirst",
            Self::VccAndCc => "VCCFirst",
        }
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Deserialize,
    Serialize,
    strum::Display,
    strum::EnumIter,
    strum_macros::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
/// Named column of a trace file. Its position is given by a [`Schema`].
pub enum Field {
    UserId,
    Size,
    /// Instant the user issued the request (nanosecond encoding).
    TimeInitial,
    /// Instant the record was written (decimal seconds).
    TimeFinal,
    Paradigm,
    InterarrivalTime,
    CarsNumber,
    UsersNumber,
    /// Instant the request reached the processing node.
    UplinkInstant,
    /// Duration of the processing itself, not an instant.
    ElaborationTime,
    EdgeResources,
    VccResources,
    /// Instant the request left the processing queue.
    QueueingInstant,
    Workload,
    /// Vehicles of the configured fleet that were not part of the vehicular cloud when the record
    /// was written.
    UsedCars,
    VehicleQueueLength,
}

/// Positional descriptor of a headerless trace file: the field at index `i` is the content of
/// column `i`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "Vec<Field>", into = "Vec<Field>")]
pub struct Schema {
    fields: Vec<Field>,
}

impl TryFrom<Vec<Field>> for Schema {
    type Error = Error;

    fn try_from(fields: Vec<Field>) -> Result<Self, Self::Error> {
        Self::new(fields)
    }
}

impl From<Schema> for Vec<Field> {
    fn from(schema: Schema) -> Self {
        schema.fields
    }
}

impl Schema {
    pub fn new(fields: Vec<Field>) -> Result<Self, Error> {
        for (i, field) in fields.iter().enumerate() {
            if fields[..i].contains(field) {
                return Err(Error::Config(format!("field {field} appears twice in the schema")));
            }
        }
        Ok(Self { fields })
    }

    /// The 16-column layout of the `offloading_time` files, written once a response reaches the
    /// user.
    pub fn offloading() -> Self {
        Self {
            fields: vec![
                Field::UserId,
                Field::Size,
                Field::TimeInitial,
                Field::TimeFinal,
                Field::Paradigm,
                Field::InterarrivalTime,
                Field::CarsNumber,
                Field::UsersNumber,
                Field::UplinkInstant,
                Field::ElaborationTime,
                Field::EdgeResources,
                Field::VccResources,
                Field::QueueingInstant,
                Field::Workload,
                Field::UsedCars,
                Field::VehicleQueueLength,
            ],
        }
    }

    /// The 13-column layout of the per-stage packet files (sent to a paradigm, received by a
    /// vehicle, rejected, ...).
    pub fn packets() -> Self {
        Self {
            fields: vec![
                Field::UserId,
                Field::Size,
                Field::TimeInitial,
                Field::TimeFinal,
                Field::Paradigm,
                Field::InterarrivalTime,
                Field::CarsNumber,
                Field::UsersNumber,
                Field::EdgeResources,
                Field::VccResources,
                Field::Workload,
                Field::UsedCars,
                Field::VehicleQueueLength,
            ],
        }
    }

    /// The 2-column layout of the `total_sent_packets` files written by the users.
    pub fn sent() -> Self {
        Self {
            fields: vec![Field::UserId, Field::TimeInitial],
        }
    }

    pub fn position(&self, field: Field) -> Option<usize> {
        self.fields.iter().position(|f| *f == field)
    }

    /// Like [`Schema::position`], but fails for fields the schema does not carry.
    pub fn require(&self, field: Field) -> Result<usize, Error> {
        self.position(field)
            .ok_or_else(|| Error::Config(format!("schema has no column for field {field}")))
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Direction of a dwell-time record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum Transition {
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
}

/// A vehicle entering or leaving the set of usable neighbors of the gateway.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DwellRecord {
    pub node_id: u32,
    pub cars_number: f64,
    pub address: String,
    /// Simulator time encoding, converted with [`coe_utils::ns_to_seconds`].
    pub time: String,
    pub transition: Transition,
    pub reason: String,
    #[serde(default)]
    pub position: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn paradigm_codes() {
        assert_eq!(Paradigm::from_code(0), Some(Paradigm::Edge));
        assert_eq!(Paradigm::from_code(1), Some(Paradigm::Cloud));
        assert_eq!(Paradigm::from_code(2), Some(Paradigm::Vcc));
        assert_eq!(Paradigm::from_code(3), None);
        assert_eq!(Paradigm::from_code(-1), None);
        assert_eq!(Paradigm::Vcc.to_string(), "VCC");
        assert_eq!(Paradigm::from_str("CLOUD").unwrap(), Paradigm::Cloud);
    }

    #[test]
    fn schema_positions() {
        let offloading = Schema::offloading();
        assert_eq!(offloading.len(), 16);
        assert_eq!(offloading.position(Field::UsersNumber), Some(7));
        assert_eq!(offloading.position(Field::Workload), Some(13));
        assert_eq!(offloading.position(Field::EdgeResources), Some(10));
        assert_eq!(offloading.position(Field::VccResources), Some(11));
        assert_eq!(offloading.position(Field::CarsNumber), Some(6));

        let packets = Schema::packets();
        assert_eq!(packets.len(), 13);
        assert_eq!(packets.position(Field::UsersNumber), Some(7));
        assert_eq!(packets.position(Field::Workload), Some(10));
        assert_eq!(packets.position(Field::EdgeResources), Some(8));
        assert_eq!(packets.position(Field::VccResources), Some(9));
        assert_eq!(packets.position(Field::UsedCars), Some(11));
        assert!(packets.require(Field::UplinkInstant).is_err());
    }

    #[test]
    fn schema_rejects_duplicates() {
        assert!(Schema::new(vec![Field::UserId, Field::Size, Field::UserId]).is_err());
        let schema: Schema = serde_json::from_str(r#"["user_id", "time_initial"]"#).unwrap();
        assert_eq!(schema, Schema::sent());
        assert!(serde_json::from_str::<Schema>(r#"["user_id", "size", "user_id"]"#).is_err());
        assert_eq!(
            serde_json::to_string(&Schema::sent()).unwrap(),
            r#"["user_id","time_initial"]"#
        );
    }

    #[test]
    fn dwell_record_from_csv() {
        let data = "3,40,7.0.0.2,+5000000000ns,IN,range,100:200\n3,40,7.0.0.2,+9000000000ns,OUT,used\n";
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(data.as_bytes());
        let records: Vec<DwellRecord> = csv.deserialize().collect::<Result<_, _>>().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].transition, Transition::In);
        assert_eq!(records[0].position.as_deref(), Some("100:200"));
        assert_eq!(records[1].transition, Transition::Out);
        assert_eq!(records[1].position, None);
    }
}
