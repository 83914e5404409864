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
//! Attributes the failed requests of the speed campaign to the stages of the offloading path.
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use coe::{
    config::SpeedCampaign,
    engine::speed_campaign,
    report::{CsvSink, MultiSink, PlotSink, ReportSink},
    util,
};

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
struct Args {
    /// Root directory of the speed campaign (containing `csv_files/`).
    #[arg(short, long, default_value = "./data/")]
    data_path: String,
    /// Directory for the generated table and plot.
    #[arg(short, long, default_value = "./results/")]
    output_path: String,
    /// JSON description of the speed profiles and seeds. Uses the built-in campaign if omitted.
    #[arg(short, long)]
    config: Option<String>,
}

fn main() -> Result<()> {
    util::init_logging();
    let args = Args::parse();

    let campaign = match &args.config {
        Some(path) => SpeedCampaign::from_file(path)
            .with_context(|| format!("Cannot load the speed campaign from {path}"))?,
        None => SpeedCampaign::default(),
    };

    let output = PathBuf::from(&args.output_path);
    let sinks: Vec<Box<dyn ReportSink>> = vec![
        Box::new(CsvSink::new(&output)),
        Box::new(PlotSink::new(&output)),
    ];
    let mut sink = MultiSink(sinks);
    let (losses, anomalies) = speed_campaign(&args.data_path, &campaign, &mut sink)
        .with_context(|| format!("Cannot process the speed campaign in {}", args.data_path))?;

    for (speed, losses) in campaign.speeds.iter().zip(&losses) {
        println!(
            "{} ({} km/h): {}, unsatisfied {:.3}%, delivered {:.3}%",
            speed.name,
            speed.km_h,
            losses
                .losses()
                .iter()
                .map(|(stage, x)| format!("{stage} {x:.3}%"))
                .collect::<Vec<_>>()
                .join(", "),
            losses.unsatisfied(),
            losses.delivered
        );
    }
    if !anomalies.is_empty() {
        log::warn!("Observed {} data-quality anomalies", anomalies.len());
        for anomaly in &anomalies {
            log::debug!("{anomaly}");
        }
    }

    Ok(())
}
