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
//! Driver of an experiment campaign.
//!
//! The engine enumerates every scenario, strategy, speed profile and analysis of an
//! [`ExperimentConfig`], resolves the trace files of each configuration, runs all reductions over
//! them and hands the finished aggregates to a [`ReportSink`].

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use indicatif::ProgressBar;
use strum::IntoEnumIterator;

use crate::{
    accumulator::{BucketSummary, BucketedAccumulator},
    anomaly::AnomalyLog,
    config::{AnalysisConfig, AnalysisKind, ExperimentConfig, SpeedCampaign, StrategyConfig, XAxis},
    dwell::{DwellAnalysis, DwellSummary},
    failure::{failure_rates, Bucketing, Stage, StageCounter, StageCounts, StageLosses},
    paths::{TracePath, TraceStage},
    records::{Paradigm, Schema, Strategy},
    report::{AnalysisReport, ChartKind, ReportSink, Series},
    satisfaction::SatisfiedRequests,
    vehicles::VehicleAccumulator,
    Error,
};

/// Count the requests observed at every stage of the delivery path. `files_of` returns the files of
/// one stage; the counts are averaged per file. Responses are recognized by their packet size.
pub fn count_stages<F>(files_of: F, response_size: i64) -> Result<(StageCounts, AnomalyLog), Error>
where
    F: Fn(TraceStage) -> Vec<PathBuf>,
{
    let mut counts = StageCounts::default();
    let mut anomalies = AnomalyLog::new();
    for stage in Stage::iter() {
        let trace_stage = TraceStage::from(stage);
        let schema = trace_stage.schema().unwrap_or_else(Schema::packets);
        let mut counter = StageCounter::new(&schema, Bucketing::All)?;
        if stage == Stage::ResponseSent {
            counter = counter.with_size(&schema, response_size)?;
        }
        counter.count_paths(files_of(trace_stage));
        let (averages, stage_anomalies) = counter.finalize();
        counts.set(stage, averages.first().copied().unwrap_or(0.0));
        anomalies.merge(stage_anomalies);
    }
    Ok((counts, anomalies))
}

fn loss_report(scope: Vec<String>, name: &str, x: Vec<f64>, losses: &[StageLosses]) -> AnalysisReport {
    let mut report = AnalysisReport::new(scope, name, x).chart(ChartKind::StackedBars);
    for (i, (label, _)) in StageLosses::default().losses().iter().enumerate() {
        report = report.series(Series::new(
            *label,
            losses.iter().map(|l| l.losses()[i].1).collect(),
        ));
    }
    report
}

/// Attribute the failures of every speed profile of the speed campaign.
pub fn speed_campaign(
    root: impl AsRef<Path>,
    campaign: &SpeedCampaign,
    sink: &mut dyn ReportSink,
) -> Result<(Vec<StageLosses>, AnomalyLog), Error> {
    let mut anomalies = AnomalyLog::new();
    let mut losses = Vec::new();
    for speed in &campaign.speeds {
        let path = TracePath::speed_campaign(root.as_ref(), &speed.name);
        let (counts, count_anomalies) = count_stages(
            |stage| {
                campaign
                    .seeds
                    .iter()
                    .map(|seed| path.speed_file(stage, &speed.name, *seed))
                    .collect()
            },
            campaign.response_size,
        )?;
        anomalies.merge(count_anomalies);
        log::info!("{} ({} km/h): {counts:?}", speed.name, speed.km_h);
        losses.push(StageLosses::attribute(
            &counts,
            &format!("speed {}", speed.name),
            &mut anomalies,
        ));
    }
    let report = loss_report(
        vec!["speed".to_string()],
        "speed_stage_losses",
        campaign.speeds.iter().map(|s| s.km_h).collect(),
        &losses,
    )
    .title("Failures along the offloading path")
    .labels("Average speed of vehicles [km/h]", "Failure rate [%]");
    sink.consume(&report)?;
    Ok((losses, anomalies))
}

/// Trace files of one (scenario, strategy, speed, analysis) configuration, over all run instants.
struct TraceSet {
    kind: AnalysisKind,
    runs: Vec<(TracePath, Vec<u32>)>,
}

impl TraceSet {
    fn files(&self, stage: TraceStage, x_axis: &XAxis) -> Vec<PathBuf> {
        self.runs
            .iter()
            .flat_map(|(path, seeds)| path.analysis_files(stage, self.kind, x_axis, seeds))
            .collect()
    }

    fn files_at(&self, stage: TraceStage, x: f64) -> Vec<PathBuf> {
        self.files(stage, &XAxis::single(x))
    }
}

/// Mean offloading time of the primary paradigm of a strategy, kept to compare strategies.
#[derive(Debug, Clone)]
struct ComparisonEntry {
    strategy: Strategy,
    x: Vec<f64>,
    mean: Vec<f64>,
}

pub struct Engine {
    root: PathBuf,
    config: ExperimentConfig,
    analyses: Option<Vec<AnalysisKind>>,
    strategies: Option<Vec<Strategy>>,
    progress: Option<ProgressBar>,
}

impl Engine {
    pub fn new(root: impl Into<PathBuf>, config: ExperimentConfig) -> Self {
        Self {
            root: root.into(),
            config,
            analyses: None,
            strategies: None,
            progress: None,
        }
    }

    /// Restrict the run to the given analyses.
    pub fn analyses(mut self, kinds: Vec<AnalysisKind>) -> Self {
        self.analyses = Some(kinds);
        self
    }

    /// Restrict the run to the given strategies.
    pub fn strategies(mut self, strategies: Vec<Strategy>) -> Self {
        self.strategies = Some(strategies);
        self
    }

    pub fn progress(mut self, bar: ProgressBar) -> Self {
        self.progress = Some(bar);
        self
    }

    fn selected_strategies(&self) -> impl Iterator<Item = &StrategyConfig> {
        self.config.strategies.iter().filter(|s| {
            self.strategies
                .as_ref()
                .map(|f| f.contains(&s.strategy))
                .unwrap_or(true)
        })
    }

    fn selected_analyses<'a>(
        &'a self,
        strategy: &'a StrategyConfig,
    ) -> impl Iterator<Item = &'a AnalysisConfig> {
        strategy.analyses.iter().filter(|a| {
            self.analyses
                .as_ref()
                .map(|f| f.contains(&a.kind))
                .unwrap_or(true)
        })
    }

    /// Number of configurations the run will process.
    pub fn num_configurations(&self) -> usize {
        self.config.scenarios.len()
            * self
                .selected_strategies()
                .map(|s| s.speeds.len() * self.selected_analyses(s).count())
                .sum::<usize>()
    }

    fn trace_set(
        &self,
        scenario: &str,
        strategy: Strategy,
        speed: &str,
        analysis: &AnalysisConfig,
    ) -> TraceSet {
        let runs = self
            .config
            .run_instants
            .iter()
            .map(|run| {
                let path = TracePath::campaign(&self.root, scenario, &run.name, strategy, Some(speed));
                let seeds = if run.seeds.is_empty() {
                    path.discover_seeds(TraceStage::OffloadingTime, analysis.kind, &analysis.x_axis)
                } else {
                    run.seeds.clone()
                };
                (path, seeds)
            })
            .collect();
        TraceSet {
            kind: analysis.kind,
            runs,
        }
    }

    /// Process every selected configuration and hand the results to `sink`. Returns all anomalies
    /// observed on the way.
    pub fn run(&self, sink: &mut dyn ReportSink) -> Result<AnomalyLog, Error> {
        let mut anomalies = AnomalyLog::new();
        let mut comparison: BTreeMap<(String, AnalysisKind), Vec<ComparisonEntry>> = BTreeMap::new();

        for scenario in &self.config.scenarios {
            for strategy in self.selected_strategies() {
                let mut dwell: Vec<(String, DwellSummary)> = Vec::new();
                for speed in &strategy.speeds {
                    for analysis in self.selected_analyses(strategy) {
                        log::info!(
                            "Processing {scenario}, {}, {speed}, {}",
                            strategy.strategy,
                            analysis.kind
                        );
                        let outcome =
                            self.run_analysis(scenario, strategy, speed, analysis, sink, &mut anomalies)?;
                        if let Some(outcome) = outcome {
                            if let Some(summary) = outcome.dwell {
                                dwell.push((speed.clone(), summary));
                            }
                            if let Some(entry) = outcome.comparison {
                                comparison
                                    .entry((scenario.clone(), analysis.kind))
                                    .or_default()
                                    .push(entry);
                            }
                        }
                        if let Some(bar) = &self.progress {
                            bar.inc(1);
                        }
                    }
                }
                if !dwell.is_empty() {
                    self.report_dwell(scenario, strategy.strategy, dwell, sink, &mut anomalies)?;
                }
            }
        }

        for ((scenario, kind), entries) in comparison {
            Self::report_comparison(&scenario, kind, &entries, sink)?;
        }

        if let Some(bar) = &self.progress {
            bar.finish();
        }
        Ok(anomalies)
    }

    fn run_analysis(
        &self,
        scenario: &str,
        strategy: &StrategyConfig,
        speed: &str,
        analysis: &AnalysisConfig,
        sink: &mut dyn ReportSink,
        anomalies: &mut AnomalyLog,
    ) -> Result<Option<AnalysisOutcome>, Error> {
        let traces = self.trace_set(scenario, strategy.strategy, speed, analysis);
        let x_axis = &analysis.x_axis;
        let offloading = traces.files(TraceStage::OffloadingTime, x_axis);
        if !offloading.iter().any(|p| p.exists()) {
            log::info!(
                "No traces for {scenario}, {}, {speed}, {}",
                strategy.strategy,
                analysis.kind
            );
            return Ok(None);
        }
        let scope = vec![
            scenario.to_string(),
            strategy.strategy.to_string(),
            speed.to_string(),
        ];
        let kind = analysis.kind;
        let x = x_axis.to_vec();
        let context = format!("{scenario}, {}, {speed}, {kind}", strategy.strategy);
        let has_vcc = strategy.paradigms.contains(&Paradigm::Vcc);

        // latency per paradigm
        let mut summaries: Vec<(Paradigm, BucketSummary)> = Vec::new();
        for paradigm in &strategy.paradigms {
            let mut acc = BucketedAccumulator::for_analysis(Schema::offloading(), analysis, *paradigm)?;
            acc.accumulate_paths(&offloading);
            let summary = acc.finalize();
            log::debug!(
                "{context}, {paradigm}: {} rows, {} outside the x-axis",
                summary.total_count(),
                summary.unmatched
            );
            anomalies.merge(summary.anomalies.clone());
            summaries.push((*paradigm, summary));
        }
        self.report_latency(&scope, analysis, &summaries, sink)?;

        // satisfied requests
        let satisfied = SatisfiedRequests::from_summaries(summaries.iter().map(|(p, s)| (*p, s)));
        let shares = satisfied.shares();
        let mut report = AnalysisReport::new(scope.clone(), format!("{kind}_satisfied_requests"), x.clone())
            .title(format!("Satisfied requests per paradigm ({kind})"))
            .labels(&analysis.x_label, "Total satisfied requests [%]")
            .chart(ChartKind::StackedBars);
        for paradigm in &strategy.paradigms {
            report = report.series(Series::new(
                paradigm.to_string(),
                shares.iter().map(|s| s.get(*paradigm)).collect(),
            ));
        }
        sink.consume(&report)?;

        // failed requests per paradigm
        let mut sent = BTreeMap::new();
        for paradigm in &strategy.paradigms {
            let schema = Schema::packets();
            let mut counter = StageCounter::new(
                &schema,
                Bucketing::Key {
                    field: analysis.key,
                    x_axis: x_axis.clone(),
                },
            )?;
            counter.count_paths(traces.files(TraceStage::sent_to(*paradigm), x_axis));
            let (averages, counter_anomalies) = counter.finalize();
            anomalies.merge(counter_anomalies);
            sent.insert(*paradigm, averages);
        }
        let received_by_vehicle = if has_vcc {
            let mut counter = StageCounter::new(
                &Schema::packets(),
                Bucketing::Key {
                    field: analysis.key,
                    x_axis: x_axis.clone(),
                },
            )?;
            counter.count_paths(traces.files(TraceStage::VccReceivedFromEdge, x_axis));
            let (averages, counter_anomalies) = counter.finalize();
            anomalies.merge(counter_anomalies);
            Some(averages)
        } else {
            None
        };
        let rates = failure_rates(
            x_axis,
            &sent,
            &satisfied.per_paradigm,
            received_by_vehicle.as_deref(),
            &context,
            anomalies,
        );
        let mut report = AnalysisReport::new(scope.clone(), format!("{kind}_failed_requests"), x.clone())
            .title(format!("Failed requests per paradigm ({kind})"))
            .labels(&analysis.x_label, "Failed requests [%]")
            .chart(ChartKind::StackedBars);
        if has_vcc {
            report = report
                .series(Series::new(
                    "Vehicular Cloud not caused by mobility",
                    rates.iter().map(|r| r.vcc_no_mobility).collect(),
                ))
                .series(Series::new(
                    "Vehicular Cloud caused by mobility",
                    rates.iter().map(|r| r.vcc_mobility).collect(),
                ));
        }
        if strategy.paradigms.contains(&Paradigm::Edge) {
            report = report.series(Series::new("Edge", rates.iter().map(|r| r.edge).collect()));
        }
        if strategy.paradigms.contains(&Paradigm::Cloud) {
            report = report.series(Series::new("Cloud", rates.iter().map(|r| r.cloud).collect()));
        }
        sink.consume(&report)?;

        if has_vcc {
            // vehicles participating in the vehicular cloud
            // every request sent to the vehicular cloud, completed or not
            let mut vehicles = VehicleAccumulator::new(Schema::packets(), analysis.key, x_axis.clone())?;
            vehicles.accumulate_paths(traces.files(TraceStage::sent_to(Paradigm::Vcc), x_axis));
            let usage = vehicles.finalize();
            anomalies.merge(usage.anomalies.clone());
            sink.consume(
                &AnalysisReport::new(scope.clone(), format!("{kind}_used_vehicles"), x.clone())
                    .title(format!("Vehicles in the vehicular cloud ({kind})"))
                    .labels(&analysis.x_label, "Average used vehicles")
                    .series(Series::new("Used vehicles", usage.average_used)),
            )?;

            // failures along the delivery path
            let mut losses = Vec::with_capacity(x.len());
            for value in &x {
                let (counts, count_anomalies) =
                    count_stages(|stage| traces.files_at(stage, *value), self.config.response_size)?;
                anomalies.merge(count_anomalies);
                losses.push(StageLosses::attribute(
                    &counts,
                    &format!("{context}, x={value}"),
                    anomalies,
                ));
            }
            sink.consume(
                &loss_report(scope.clone(), &format!("{kind}_stage_losses"), x.clone(), &losses)
                    .title(format!("Failures along the offloading path ({kind})"))
                    .labels(&analysis.x_label, "Failure rate [%]"),
            )?;
        }

        let dwell = (has_vcc && kind == AnalysisKind::CarsNumber).then(|| {
            DwellAnalysis::new(
                self.config.vehicles_num,
                self.config.simulation_duration,
                self.config.dwell_windows,
            )
            .analyze_paths(traces.files(TraceStage::DwellTime, x_axis))
        });

        let comparison = (matches!(kind, AnalysisKind::Workload | AnalysisKind::UsersNumber)
            && strategy.speeds.first().map(String::as_str) == Some(speed))
        .then(|| {
            summaries
                .iter()
                .find(|(p, _)| *p == strategy.strategy.first())
                .map(|(_, s)| ComparisonEntry {
                    strategy: strategy.strategy,
                    x: s.x_values(),
                    mean: s.series(|b| b.mean.offloading),
                })
        })
        .flatten();

        Ok(Some(AnalysisOutcome { dwell, comparison }))
    }

    fn report_latency(
        &self,
        scope: &[String],
        analysis: &AnalysisConfig,
        summaries: &[(Paradigm, BucketSummary)],
        sink: &mut dyn ReportSink,
    ) -> Result<(), Error> {
        let kind = analysis.kind;
        let x = analysis.x_axis.to_vec();
        let y_label = "Offloading time [s]";

        let mut report = AnalysisReport::new(scope.to_vec(), format!("{kind}_offloading_time"), x.clone())
            .title(format!("Mean offloading time ({kind})"))
            .labels(&analysis.x_label, y_label)
            .latency_classes();
        for (paradigm, summary) in summaries {
            report = report.series(
                Series::new(paradigm.to_string(), summary.series(|b| b.mean.offloading))
                    .with_error(summary.series(|b| b.interval.delta)),
            );
        }
        sink.consume(&report)?;

        for (paradigm, summary) in summaries {
            sink.consume(
                &AnalysisReport::new(scope.to_vec(), format!("{kind}_phases_{paradigm}"), x.clone())
                    .title(format!("Offloading time per phase, {paradigm} ({kind})"))
                    .labels(&analysis.x_label, y_label)
                    .chart(ChartKind::StackedBars)
                    .series(Series::new("Uplink", summary.series(|b| b.mean.uplink)))
                    .series(Series::new("Queueing", summary.series(|b| b.mean.queueing)))
                    .series(Series::new("Elaboration", summary.series(|b| b.mean.elaboration)))
                    .series(Series::new("Downlink", summary.series(|b| b.mean.downlink))),
            )?;
            sink.consume(
                &AnalysisReport::new(scope.to_vec(), format!("{kind}_phase_shares_{paradigm}"), x.clone())
                    .title(format!("Offloading time share per phase, {paradigm} ({kind})"))
                    .labels(&analysis.x_label, "Offloading Time [%]")
                    .chart(ChartKind::StackedBars)
                    .series(Series::new("Uplink", summary.series(|b| b.shares.uplink)))
                    .series(Series::new("Elaboration", summary.series(|b| b.shares.elaboration)))
                    .series(Series::new("Downlink", summary.series(|b| b.shares.downlink))),
            )?;
            sink.consume(
                &AnalysisReport::new(scope.to_vec(), format!("{kind}_percentiles_{paradigm}"), x.clone())
                    .title(format!("Offloading time percentiles, {paradigm} ({kind})"))
                    .labels(&analysis.x_label, y_label)
                    .series(Series::new("Mean", summary.series(|b| b.percentiles.mean)))
                    .series(Series::new("50 percentile", summary.series(|b| b.percentiles.p50)))
                    .series(Series::new("90 percentile", summary.series(|b| b.percentiles.p90)))
                    .series(Series::new("95 percentile", summary.series(|b| b.percentiles.p95)))
                    .series(Series::new("99 percentile", summary.series(|b| b.percentiles.p99)))
                    .latency_classes(),
            )?;
        }
        Ok(())
    }

    fn report_dwell(
        &self,
        scenario: &str,
        strategy: Strategy,
        dwell: Vec<(String, DwellSummary)>,
        sink: &mut dyn ReportSink,
        anomalies: &mut AnomalyLog,
    ) -> Result<(), Error> {
        let Some(window_ends) = dwell.first().map(|(_, d)| d.window_ends.clone()) else {
            return Ok(());
        };
        let mut report = AnalysisReport::new(
            vec![scenario.to_string(), strategy.to_string()],
            "dwell_time",
            window_ends,
        )
        .title(format!(
            "Dwell time of {} vehicles in the vehicular cloud",
            self.config.vehicles_num
        ))
        .labels("Simulation time [s]", "Dwell time / simulation duration");
        for (speed, summary) in dwell {
            anomalies.merge(summary.anomalies);
            report = report.series(Series::new(speed, summary.mean));
        }
        sink.consume(&report)
    }

    fn report_comparison(
        scenario: &str,
        kind: AnalysisKind,
        entries: &[ComparisonEntry],
        sink: &mut dyn ReportSink,
    ) -> Result<(), Error> {
        let Some(first) = entries.first() else {
            return Ok(());
        };
        let mut report = AnalysisReport::new(
            vec![scenario.to_string()],
            format!("{kind}_strategy_comparison"),
            first.x.clone(),
        )
        .title(format!("Offloading strategies ({kind})"))
        .labels(kind.to_string(), "Offloading time [s]")
        .latency_classes();
        for entry in entries {
            if entry.x != first.x {
                log::warn!(
                    "Cannot compare {} with {} on {kind}: different x-axis",
                    entry.strategy,
                    first.strategy
                );
                continue;
            }
            report = report.series(Series::new(entry.strategy.label(), entry.mean.clone()));
        }
        sink.consume(&report)
    }
}

/// Results of one analysis that are reported across configurations.
struct AnalysisOutcome {
    dwell: Option<DwellSummary>,
    comparison: Option<ComparisonEntry>,
}
