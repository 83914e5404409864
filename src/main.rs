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
use std::{fmt, fs, path::PathBuf};

use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use coe::{
    config::{AnalysisKind, ExperimentConfig},
    engine::Engine,
    records::Strategy,
    report::{CsvSink, MultiSink, PlotSink, ReportSink},
    util::{self, PathBufExt},
};
use coe_utils::other::get_timestamp;

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    /// Root directory of the simulation output (containing `csv_files/`).
    #[arg(short, long, default_value = "./data/")]
    data_path: String,
    /// Directory for the generated tables and plots.
    #[arg(short, long, default_value = "./results/")]
    output_path: String,
    /// JSON description of the experiment campaign. Uses the built-in campaign if omitted.
    #[arg(short, long)]
    config: Option<String>,
    /// Analysis to run.
    #[arg(short, long, value_enum, default_value_t = Analysis::All)]
    analysis: Analysis,
    /// Offloading strategy to analyze.
    #[arg(short, long, value_enum, default_value_t = StrategyFilter::All)]
    strategy: StrategyFilter,
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::All)]
    format: Format,
    /// Show a progress bar (logs to stderr instead of using `log4rs.yml`).
    #[arg(long)]
    progress: bool,
    /// Print the campaign description as JSON and exit.
    #[arg(long)]
    print_config: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
enum Analysis {
    /// Runs all analyses of every strategy.
    #[default]
    All,
    /// Varies the number of users.
    UsersNumber,
    /// Varies the workload of a request.
    Workload,
    /// Varies the computing resources of the edge server.
    EdgeResources,
    /// Varies the number of vehicles.
    CarsNumber,
    /// Varies the computing resources of every vehicle.
    VccResources,
}

impl Analysis {
    fn kind(&self) -> Option<AnalysisKind> {
        match self {
            Analysis::All => None,
            Analysis::UsersNumber => Some(AnalysisKind::UsersNumber),
            Analysis::Workload => Some(AnalysisKind::Workload),
            Analysis::EdgeResources => Some(AnalysisKind::EdgeResources),
            Analysis::CarsNumber => Some(AnalysisKind::CarsNumber),
            Analysis::VccResources => Some(AnalysisKind::VccResources),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
enum StrategyFilter {
    #[default]
    All,
    /// Edge first, cloud as fallback.
    EcAndCc,
    /// Vehicular cloud first, cloud as fallback.
    VccAndCc,
}

impl fmt::Display for StrategyFilter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StrategyFilter::All => write!(f, "All"),
            StrategyFilter::EcAndCc => write!(f, "{}", Strategy::EcAndCc),
            StrategyFilter::VccAndCc => write!(f, "{}", Strategy::VccAndCc),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
enum Format {
    /// Writes CSV tables and HTML plots.
    #[default]
    All,
    Csv,
    Html,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => ExperimentConfig::from_file(path)?,
        None => ExperimentConfig::default(),
    };
    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let multi = if args.progress {
        Some(util::init_progress_logging())
    } else {
        util::init_logging();
        None
    };

    let mut engine = Engine::new(&args.data_path, config);
    if let Some(kind) = args.analysis.kind() {
        engine = engine.analyses(vec![kind]);
    }
    match args.strategy {
        StrategyFilter::All => {}
        StrategyFilter::EcAndCc => engine = engine.strategies(vec![Strategy::EcAndCc]),
        StrategyFilter::VccAndCc => engine = engine.strategies(vec![Strategy::VccAndCc]),
    }
    if let Some(multi) = multi {
        let bar = multi.add(ProgressBar::new(engine.num_configurations() as u64));
        bar.set_style(
            ProgressStyle::with_template("[{bar:80}] {pos:>3}/{len:3}, elapsed: {elapsed}, eta: {eta}")?
                .progress_chars("##-"),
        );
        engine = engine.progress(bar);
    }

    let output = PathBuf::from(&args.output_path);
    let mut sinks: Vec<Box<dyn ReportSink>> = Vec::new();
    if matches!(args.format, Format::All | Format::Csv) {
        sinks.push(Box::new(CsvSink::new(&output)));
    }
    if matches!(args.format, Format::All | Format::Html) {
        sinks.push(Box::new(PlotSink::new(&output)));
    }
    let mut sink = MultiSink(sinks);

    log::info!(
        "Analyzing {} ({}, {:?}) into {}",
        args.data_path,
        args.strategy,
        args.analysis,
        output.display()
    );
    let anomalies = engine.run(&mut sink)?;

    fs::create_dir_all(&output)?;
    let anomalies_path = output.clone().then_ts("anomalies_{}.json", &get_timestamp());
    fs::write(&anomalies_path, serde_json::to_string_pretty(&anomalies)?)?;
    if anomalies.is_empty() {
        log::info!("No data-quality anomalies observed");
    } else {
        log::warn!(
            "Observed {} data-quality anomalies, see {}",
            anomalies.len(),
            anomalies_path.display()
        );
    }

    Ok(())
}
