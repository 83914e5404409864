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
//! Record parser turning one headerless trace row into a [`TraceEvent`].
//!
//! Numeric columns may be written either as integers or as decimals, and timestamps either in
//! the simulator's nanosecond encoding or as decimal seconds. The representation is detected per
//! value. A malformed value never aborts the batch: it is logged, replaced by a sentinel, and
//! remembered in [`TraceEvent::malformed`].

use std::{collections::BTreeMap, fmt, io::Read};

use coe_utils::{try_ns_to_seconds, SENTINEL_SECONDS};

use crate::{
    event::TraceEvent,
    records::{Field, Paradigm, Schema},
};

/// A numeric column value, keeping track of how it was written.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Decimal(f64),
}

impl FieldValue {
    /// Parse a numeric column. A value containing a decimal separator or an exponent is a decimal,
    /// everything else is first tried as an integer.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.contains(['.', 'e', 'E']) {
            return raw.parse::<f64>().ok().filter(|x| x.is_finite()).map(Self::Decimal);
        }
        raw.parse::<i64>().map(Self::Integer).ok().or_else(|| {
            raw.parse::<f64>()
                .ok()
                .filter(|x| x.is_finite())
                .map(Self::Decimal)
        })
    }

    /// Normalized value used for comparisons with x-axis values.
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Integer(x) => *x as f64,
            Self::Decimal(x) => *x,
        }
    }

    /// Integral value, if the column holds one (`10` and `10.0` both qualify).
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(x) => Some(*x),
            Self::Decimal(x) if x.fract() == 0.0 && x.abs() < i64::MAX as f64 => Some(*x as i64),
            Self::Decimal(_) => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(x) => write!(f, "{x}"),
            Self::Decimal(x) => write!(f, "{x}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("row has {len} columns, but field {field} is expected at position {position}")]
    MissingColumn {
        field: Field,
        position: usize,
        len: usize,
    },
    #[error("schema does not describe the required field {0}")]
    MissingField(Field),
    #[error("unreadable row: {0}")]
    Unreadable(String),
}

/// Parse a time column, detecting whether it is written in the nanosecond encoding or in decimal
/// seconds.
pub fn parse_time(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    if raw.ends_with("ns") {
        try_ns_to_seconds(raw).ok()
    } else {
        raw.parse::<f64>().ok().filter(|x| x.is_finite())
    }
}

/// Parse one row into a [`TraceEvent`] using the column positions of `schema`.
///
/// The schema must at least describe the issue and completion instants. Rows shorter than the
/// schema are rejected, since positions would be meaningless. Individual malformed values are
/// logged and replaced by a sentinel instead.
pub fn parse_row(row: &csv::StringRecord, schema: &Schema) -> Result<TraceEvent, ParseError> {
    for required in [Field::TimeInitial, Field::TimeFinal] {
        if schema.position(required).is_none() {
            return Err(ParseError::MissingField(required));
        }
    }
    if row.len() < schema.len() {
        let (position, field) = schema
            .fields()
            .iter()
            .enumerate()
            .nth(row.len())
            .map(|(i, f)| (i, *f))
            .unwrap_or((row.len(), Field::UserId));
        return Err(ParseError::MissingColumn {
            field,
            position,
            len: row.len(),
        });
    }

    let raw = row.iter().collect::<Vec<_>>().join(",");
    let mut malformed = Vec::new();
    let mut time = |field: Field| -> Option<f64> {
        let value = &row[schema.position(field)?];
        Some(parse_time(value).unwrap_or_else(|| {
            log::warn!("Cannot convert {field} value `{value}` to seconds in row [{raw}]");
            malformed.push(field);
            SENTINEL_SECONDS
        }))
    };

    let t_issue = time(Field::TimeInitial).unwrap_or(SENTINEL_SECONDS);
    let t_complete = time(Field::TimeFinal).unwrap_or(SENTINEL_SECONDS);
    let t_uplink_done = time(Field::UplinkInstant);
    let t_queue_done = time(Field::QueueingInstant);
    let elaboration_time = time(Field::ElaborationTime);

    let mut config = BTreeMap::new();
    for (position, field) in schema.fields().iter().enumerate() {
        if matches!(
            field,
            Field::UserId
                | Field::TimeInitial
                | Field::TimeFinal
                | Field::UplinkInstant
                | Field::QueueingInstant
                | Field::ElaborationTime
        ) {
            continue;
        }
        match FieldValue::parse(&row[position]) {
            Some(value) => {
                config.insert(*field, value);
            }
            None => {
                log::warn!(
                    "Cannot parse {field} value `{}` as a number in row [{raw}]",
                    &row[position]
                );
                malformed.push(*field);
            }
        }
    }

    let paradigm = match config.get(&Field::Paradigm) {
        Some(code) => {
            let paradigm = code.as_i64().and_then(Paradigm::from_code);
            if paradigm.is_none() {
                log::warn!("Unknown paradigm code {code} in row [{raw}]");
                malformed.push(Field::Paradigm);
            }
            paradigm
        }
        None => None,
    };

    Ok(TraceEvent {
        user_id: schema
            .position(Field::UserId)
            .map(|i| row[i].trim().to_string())
            .unwrap_or_default(),
        size: config.get(&Field::Size).and_then(FieldValue::as_i64),
        paradigm,
        t_issue,
        t_complete,
        t_uplink_done,
        t_queue_done,
        elaboration_time,
        config,
        malformed,
        raw,
    })
}

/// Iterate over the events of a headerless CSV source. Each item carries the line number (starting
/// at 1) for diagnostics.
pub fn read_events<'a, R: Read + 'a>(
    reader: R,
    schema: &'a Schema,
) -> impl Iterator<Item = (usize, Result<TraceEvent, ParseError>)> + 'a {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader)
        .into_records()
        .enumerate()
        .map(move |(i, record)| {
            let event = record
                .map_err(|e| ParseError::Unreadable(e.to_string()))
                .and_then(|r| parse_row(&r, schema));
            (i + 1, event)
        })
}
