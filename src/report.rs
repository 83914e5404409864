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
//! Output of finished aggregates. The engine hands every finished result to a [`ReportSink`] as an
//! [`AnalysisReport`]: one or more series with one value per x-axis position.

use std::{
    fs,
    path::{Path, PathBuf},
};

use coe_utils::other::format_axis_value;
use itertools::Itertools;
use plotly::{
    common::{DashType, ErrorData, ErrorType, Line, Mode},
    layout::{Axis, BarMode},
    Bar, Plot, Scatter,
};
use serde::Serialize;

use crate::{util::PathBufExt, Error};

/// Latency classes drawn as horizontal reference lines in latency charts, in seconds.
pub const LATENCY_CLASSES: [(&str, f64); 3] = [
    ("Real time (16 ms)", 0.016),
    ("Interactive (100 ms)", 0.1),
    ("Best effort (500 ms)", 0.5),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ChartKind {
    Lines,
    StackedBars,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: String,
    pub values: Vec<f64>,
    /// Half width of the confidence interval of every value.
    pub error: Option<Vec<f64>>,
}

impl Series {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
            error: None,
        }
    }

    pub fn with_error(mut self, error: Vec<f64>) -> Self {
        self.error = Some(error);
        self
    }
}

/// A finished aggregate, ready to be written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    /// Directories below the output root, e.g., scenario, strategy and speed.
    pub scope: Vec<String>,
    /// File stem of the report.
    pub name: String,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub x: Vec<f64>,
    pub series: Vec<Series>,
    pub chart: ChartKind,
    pub reference_lines: Vec<(String, f64)>,
}

impl AnalysisReport {
    pub fn new(scope: Vec<String>, name: impl Into<String>, x: Vec<f64>) -> Self {
        let name = name.into();
        Self {
            scope,
            title: name.clone(),
            name,
            x_label: String::new(),
            y_label: String::new(),
            x,
            series: Vec::new(),
            chart: ChartKind::Lines,
            reference_lines: Vec::new(),
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn labels(mut self, x_label: impl Into<String>, y_label: impl Into<String>) -> Self {
        self.x_label = x_label.into();
        self.y_label = y_label.into();
        self
    }

    pub fn chart(mut self, chart: ChartKind) -> Self {
        self.chart = chart;
        self
    }

    pub fn series(mut self, series: Series) -> Self {
        self.series.push(series);
        self
    }

    pub fn latency_classes(mut self) -> Self {
        self.reference_lines.extend(
            LATENCY_CLASSES
                .iter()
                .map(|(name, y)| (name.to_string(), *y)),
        );
        self
    }

    fn x_labels(&self) -> Vec<String> {
        self.x.iter().map(|x| format_axis_value(*x)).collect()
    }

    /// Every series must have one value per x-axis position.
    pub fn check(&self) -> Result<(), Error> {
        for s in &self.series {
            let error_len = s.error.as_ref().map(Vec::len).unwrap_or(self.x.len());
            if s.values.len() != self.x.len() || error_len != self.x.len() {
                return Err(Error::Config(format!(
                    "series {} of report {} has {} values for {} x values",
                    s.name,
                    self.name,
                    s.values.len(),
                    self.x.len()
                )));
            }
        }
        Ok(())
    }
}

/// Consumer of finished reports.
pub trait ReportSink {
    fn consume(&mut self, report: &AnalysisReport) -> Result<(), Error>;
}

/// Keeps all reports in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub reports: Vec<AnalysisReport>,
}

impl MemorySink {
    pub fn find(&self, name: &str) -> Option<&AnalysisReport> {
        self.reports.iter().find(|r| r.name == name)
    }
}

impl ReportSink for MemorySink {
    fn consume(&mut self, report: &AnalysisReport) -> Result<(), Error> {
        report.check()?;
        self.reports.push(report.clone());
        Ok(())
    }
}

fn report_dir(root: &Path, report: &AnalysisReport) -> Result<PathBuf, Error> {
    let dir = report
        .scope
        .iter()
        .fold(root.to_path_buf(), |dir, part| dir.then(part));
    fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Writes every report as a table with one row per x value.
#[derive(Debug, Clone)]
pub struct CsvSink {
    root: PathBuf,
}

impl CsvSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ReportSink for CsvSink {
    fn consume(&mut self, report: &AnalysisReport) -> Result<(), Error> {
        report.check()?;
        let path = report_dir(&self.root, report)?.then(format!("{}.csv", report.name));
        let mut writer = csv::WriterBuilder::new().from_path(&path)?;

        let x_label = if report.x_label.is_empty() {
            "x"
        } else {
            report.x_label.as_str()
        };
        let header = std::iter::once(x_label.to_string())
            .chain(report.series.iter().flat_map(|s| {
                std::iter::once(s.name.clone())
                    .chain(s.error.as_ref().map(|_| format!("{} (ci)", s.name)))
            }))
            .collect_vec();
        writer.write_record(&header)?;

        for (k, x) in report.x_labels().into_iter().enumerate() {
            let row = std::iter::once(x)
                .chain(report.series.iter().flat_map(|s| {
                    std::iter::once(s.values[k].to_string())
                        .chain(s.error.as_ref().map(|e| e[k].to_string()))
                }))
                .collect_vec();
            writer.write_record(&row)?;
        }
        writer.flush()?;
        log::debug!("Written {}", path.display());
        Ok(())
    }
}

/// Writes every report as an interactive HTML chart.
#[derive(Debug, Clone)]
pub struct PlotSink {
    root: PathBuf,
}

impl PlotSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn plot(report: &AnalysisReport) -> Plot {
        let x = report.x_labels();
        let mut plot = Plot::new();
        let mut layout = plot
            .layout()
            .clone()
            .title(format!("<b>{}</b>", report.title))
            .x_axis(Axis::new().title(report.x_label.as_str()))
            .y_axis(Axis::new().title(report.y_label.as_str()).show_grid(true));

        match report.chart {
            ChartKind::Lines => {
                for s in &report.series {
                    let mut trace = Scatter::new(x.clone(), s.values.clone())
                        .name(&s.name)
                        .mode(Mode::LinesMarkers);
                    if let Some(error) = &s.error {
                        trace = trace.error_y(ErrorData::new(ErrorType::Data).array(error.clone()));
                    }
                    plot.add_trace(trace);
                }
            }
            ChartKind::StackedBars => {
                layout = layout.bar_mode(BarMode::Stack);
                for s in &report.series {
                    plot.add_trace(Bar::new(x.clone(), s.values.clone()).name(&s.name));
                }
            }
        }

        if let (Some(first), Some(last)) = (x.first(), x.last()) {
            for (name, y) in &report.reference_lines {
                let trace = Scatter::new(vec![first.clone(), last.clone()], vec![*y, *y])
                    .name(name)
                    .mode(Mode::Lines)
                    .line(Line::new().color("#a0a0a0").width(1.0).dash(DashType::Dash));
                plot.add_trace(trace);
            }
        }

        plot.set_layout(layout);
        plot
    }
}

impl ReportSink for PlotSink {
    fn consume(&mut self, report: &AnalysisReport) -> Result<(), Error> {
        report.check()?;
        let path = report_dir(&self.root, report)?.then(format!("{}.html", report.name));
        Self::plot(report).write_html(&path);
        log::debug!("Plotted {}", path.display());
        Ok(())
    }
}

/// Forwards every report to all inner sinks.
pub struct MultiSink(pub Vec<Box<dyn ReportSink>>);

impl ReportSink for MultiSink {
    fn consume(&mut self, report: &AnalysisReport) -> Result<(), Error> {
        for sink in self.0.iter_mut() {
            sink.consume(report)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn report() -> AnalysisReport {
        AnalysisReport::new(
            vec!["RectangleScenario".to_string(), "EC_and_CC".to_string()],
            "users_number_offloading_time",
            vec![1.0, 2.0, 555.625],
        )
        .labels("Users", "Offloading time [s]")
        .series(Series::new("EDGE", vec![0.01, 0.02, 0.03]).with_error(vec![0.001, 0.0, 0.002]))
        .series(Series::new("CLOUD", vec![0.1, 0.2, 0.3]))
        .latency_classes()
    }

    #[test]
    fn length_check() {
        assert!(report().check().is_ok());
        let bad = report().series(Series::new("VCC", vec![1.0]));
        assert!(bad.check().is_err());
        let mut sink = MemorySink::default();
        assert!(sink.consume(&bad).is_err());
        sink.consume(&report()).unwrap();
        assert_eq!(sink.find("users_number_offloading_time").unwrap().reference_lines.len(), 3);
    }

    #[test]
    fn csv_table() {
        let root = std::env::temp_dir().join(format!("coe-report-{}", std::process::id()));
        CsvSink::new(&root).consume(&report()).unwrap();
        let content = fs::read_to_string(
            root.join("RectangleScenario/EC_and_CC/users_number_offloading_time.csv"),
        )
        .unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "Users,EDGE,EDGE (ci),CLOUD");
        assert_eq!(lines[1], "1,0.01,0.001,0.1");
        assert_eq!(lines[3], "555.625,0.03,0.002,0.3");
        fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn html_chart() {
        let root = std::env::temp_dir().join(format!("coe-plot-{}", std::process::id()));
        let sinks: Vec<Box<dyn ReportSink>> = vec![
            Box::new(PlotSink::new(&root)),
            Box::new(CsvSink::new(&root)),
        ];
        let mut sink = MultiSink(sinks);
        sink.consume(&report().chart(ChartKind::StackedBars)).unwrap();
        let dir = root.join("RectangleScenario/EC_and_CC");
        let html = fs::read_to_string(dir.join("users_number_offloading_time.html")).unwrap();
        assert!(html.contains("Users"));
        assert!(html.contains("Offloading time [s]"));
        assert!(dir.join("users_number_offloading_time.csv").exists());
        fs::remove_dir_all(&root).unwrap();
    }
}
