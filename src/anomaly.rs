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
//! Data-quality anomalies observed while reducing traces. None of them stops an analysis; they are
//! logged when observed and collected here so that a caller can inspect them with the results.

use std::{collections::HashSet, fmt};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum AnomalyKind {
    /// A value could not be parsed and was replaced by a sentinel.
    MalformedValue,
    /// A row did not match the schema at all and was skipped.
    MalformedRow,
    /// A latency phase came out negative.
    NegativeDuration,
    /// A later pipeline stage observed more requests than an earlier one.
    NonMonotonicStages,
    /// A failure count would be negative and was clamped to zero.
    NegativeDelta,
    /// A ratio had a zero denominator and was reported as zero.
    ZeroDenominator,
    /// An input file could not be read; it contributes zero.
    MissingFile,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    /// Human readable context: file, configuration value, paradigm, raw row.
    pub context: String,
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.context)
    }
}

/// Ordered collection of anomalies.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AnomalyLog {
    entries: Vec<Anomaly>,
}

impl AnomalyLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an anomaly that was already logged by the component observing it.
    pub fn push(&mut self, kind: AnomalyKind, context: impl Into<String>) {
        self.entries.push(Anomaly {
            kind,
            context: context.into(),
        });
    }

    /// Log a warning and record the anomaly.
    pub fn warn(&mut self, kind: AnomalyKind, context: impl Into<String>) {
        let context = context.into();
        log::warn!("{kind}: {context}");
        self.push(kind, context);
    }

    pub fn extend(&mut self, other: AnomalyLog) {
        self.entries.extend(other.entries);
    }

    /// Append the entries of `other` that are not yet present, e.g., a missing file observed by
    /// several passes over the same file list. Repeated entries within `other` are all kept.
    pub fn merge(&mut self, other: AnomalyLog) {
        let known: HashSet<Anomaly> = self.entries.iter().cloned().collect();
        self.entries
            .extend(other.entries.into_iter().filter(|a| !known.contains(a)));
    }

    pub fn count(&self, kind: AnomalyKind) -> usize {
        self.entries.iter().filter(|a| a.kind == kind).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Anomaly> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a AnomalyLog {
    type Item = &'a Anomaly;
    type IntoIter = std::slice::Iter<'a, Anomaly>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn collect_and_count() {
        let mut log = AnomalyLog::new();
        assert!(log.is_empty());
        log.push(AnomalyKind::MissingFile, "a.csv");
        log.warn(AnomalyKind::ZeroDenominator, "x=10");
        let mut other = AnomalyLog::new();
        other.push(AnomalyKind::MissingFile, "b.csv");
        log.extend(other);
        assert_eq!(log.len(), 3);
        let mut again = AnomalyLog::new();
        again.push(AnomalyKind::MissingFile, "a.csv");
        again.push(AnomalyKind::MissingFile, "c.csv");
        log.merge(again);
        assert_eq!(log.count(AnomalyKind::MissingFile), 3);
        assert_eq!(
            log.iter().map(|a| a.to_string()).collect::<Vec<_>>(),
            vec![
                "[missing_file] a.csv",
                "[zero_denominator] x=10",
                "[missing_file] b.csv",
                "[missing_file] c.csv"
            ]
        );
    }

    #[test]
    fn merge_keeps_repeated_rows_of_one_pass() {
        let pass = || {
            let mut log = AnomalyLog::new();
            log.push(AnomalyKind::MalformedValue, "a.csv: column 7 of row [x] is not a number");
            log.push(AnomalyKind::MalformedValue, "a.csv: column 7 of row [x] is not a number");
            log
        };
        let mut log = AnomalyLog::new();
        log.merge(pass());
        assert_eq!(log.count(AnomalyKind::MalformedValue), 2);
        log.merge(pass());
        assert_eq!(log.count(AnomalyKind::MalformedValue), 2);
    }
}
