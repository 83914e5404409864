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
use super::{check_diff, TempDir};
use crate::{
    anomaly::AnomalyKind,
    config::{AnalysisConfig, ExperimentConfig, RunInstant, SpeedCampaign, SpeedProfile, StrategyConfig, XAxis},
    engine::{speed_campaign, Engine},
    records::Strategy,
    report::MemorySink,
};

fn offloading_vcc(users: u32) -> String {
    format!("1,1024,+2000000000ns,2.03,2,0.1,40,{users},+2010000000ns,+10000000ns,74907,555.625,+2015000000ns,100,30,0")
}

fn offloading_cloud(users: u32) -> String {
    format!("2,1024,+1000000000ns,1.1,1,0.1,40,{users},+1020000000ns,+50000000ns,74907,555.625,+1030000000ns,100,30,0")
}

fn packet(size: u32, paradigm: u8, users: u32) -> String {
    packet_outside_cloud(size, paradigm, users, 30)
}

fn packet_outside_cloud(size: u32, paradigm: u8, users: u32, outside: u32) -> String {
    format!("1,{size},+2000000000ns,2.001,{paradigm},0.1,40,{users},74907,555.625,100,{outside},0")
}

fn sent(user: u32) -> String {
    format!("{user},+1000000000ns")
}

fn vcc_config() -> ExperimentConfig {
    let mut users = AnalysisConfig::users_number();
    users.x_axis = XAxis::new([10.0, 20.0]).unwrap();
    ExperimentConfig {
        scenarios: vec!["S".to_string()],
        run_instants: vec![RunInstant {
            name: "run".to_string(),
            seeds: vec![0, 1],
        }],
        strategies: vec![StrategyConfig {
            strategy: Strategy::VccAndCc,
            paradigms: Strategy::VccAndCc.paradigms().to_vec(),
            speeds: vec!["speed0".to_string(), "speed1".to_string()],
            analyses: vec![users, AnalysisConfig::workload()],
        }],
        ..Default::default()
    }
}

fn write_vcc_campaign(dir: &TempDir) {
    let base = "csv_files/S/run/VCC_and_CC/speed0";
    for users in [10, 20] {
        for seed in [0, 1] {
            let file = |stage: &str| format!("{base}/{stage}_users_number_{users}_{seed}.csv");
            dir.write(
                file("offloading_time"),
                &[offloading_vcc(users), offloading_cloud(users)],
            );
            dir.write(file("total_sent_packets"), &(0..4).map(sent).collect::<Vec<_>>());
            dir.write(
                file("total_VCC_sent_packets"),
                &vec![packet_outside_cloud(1024, 2, users, 5); 3],
            );
            dir.write(file("total_CLOUD_sent_packets"), &[packet(1024, 1, users)]);
            dir.write(
                file("total_VCC_received_from_edge_packets"),
                &vec![packet(1024, 2, users); 2],
            );
            dir.write(file("total_VCC_rejected_packets_cause_full_queue"), &[]);
            dir.write(
                file("response_offloading_passing_in_gNB"),
                &[packet(4028, 2, users), packet(1024, 2, users), packet(4028, 2, users)],
            );
        }
    }
}

#[test]
fn vcc_campaign() {
    let dir = TempDir::new("campaign");
    write_vcc_campaign(&dir);

    let engine = Engine::new(dir.path(), vcc_config());
    assert_eq!(engine.num_configurations(), 4);
    let mut sink = MemorySink::default();
    let anomalies = engine.run(&mut sink).unwrap();

    // speed1 and the workload analysis have no traces and are skipped
    assert_eq!(sink.reports.len(), 12);
    assert!(anomalies.is_empty(), "{anomalies:?}");

    let offloading = sink.find("users_number_offloading_time").unwrap();
    assert_eq!(offloading.scope, vec!["S", "VCC_and_CC", "speed0"]);
    assert_eq!(offloading.x, vec![10.0, 20.0]);
    let vcc = offloading.series.iter().find(|s| s.name == "VCC").unwrap();
    for k in 0..2 {
        check_diff(0.03, vcc.values[k], 1e-9, "mean VCC offloading time");
        check_diff(0.0, vcc.error.as_ref().unwrap()[k], 1e-9, "VCC confidence interval");
    }

    let phases = sink.find("users_number_phases_CLOUD").unwrap();
    let downlink = phases.series.iter().find(|s| s.name == "Downlink").unwrap();
    check_diff(0.02, downlink.values[0], 1e-9, "cloud downlink");

    let satisfied = sink.find("users_number_satisfied_requests").unwrap();
    assert!(satisfied.series.iter().all(|s| s.values == vec![50.0, 50.0]));

    let failed = sink.find("users_number_failed_requests").unwrap();
    let value = |name: &str| failed.series.iter().find(|s| s.name == name).unwrap().values[0];
    check_diff(50.0, value("Vehicular Cloud caused by mobility"), 1e-9, "mobility failures");
    check_diff(
        100.0 * 1.0 / 1.5 - 50.0,
        value("Vehicular Cloud not caused by mobility"),
        1e-9,
        "other VCC failures",
    );
    check_diff(0.0, value("Cloud"), 1e-9, "cloud failures");

    // counted over the requests sent to the vehicular cloud, not the completed ones
    let used = sink.find("users_number_used_vehicles").unwrap();
    assert_eq!(used.series[0].values, vec![35.0, 35.0]);

    let losses = sink.find("users_number_stage_losses").unwrap();
    let expected = [25.0, 25.0, 0.0, 0.0, 0.0];
    for (series, exp) in losses.series.iter().zip(expected) {
        check_diff(exp, series.values[1], 1e-9, &series.name);
    }

    let comparison = sink.find("users_number_strategy_comparison").unwrap();
    assert_eq!(comparison.scope, vec!["S"]);
    assert_eq!(comparison.series[0].name, "VCCFirst");
}

#[test]
fn missing_traces_are_recorded() {
    let dir = TempDir::new("missing");
    write_vcc_campaign(&dir);
    std::fs::remove_file(
        dir.path()
            .join("csv_files/S/run/VCC_and_CC/speed0/offloading_time_users_number_20_1.csv"),
    )
    .unwrap();

    let mut sink = MemorySink::default();
    let anomalies = Engine::new(dir.path(), vcc_config()).run(&mut sink).unwrap();
    assert_eq!(anomalies.count(AnomalyKind::MissingFile), 1);
    let offloading = sink.find("users_number_offloading_time").unwrap();
    assert!(offloading
        .series
        .iter()
        .all(|s| s.values.iter().all(|x| x.is_finite())));
}

#[test]
fn speed_campaign_losses() {
    let dir = TempDir::new("speed");
    let base = "csv_files/speed0";
    let file = |stage: &str| format!("{base}/{stage}_speed0_0.csv");
    dir.write(file("total_sent_packets"), &(0..100).map(sent).collect::<Vec<_>>());
    dir.write(file("total_VCC_sent_packets"), &vec![packet(1024, 2, 10); 95]);
    dir.write(
        file("total_VCC_received_from_edge_packets"),
        &vec![packet(1024, 2, 10); 90],
    );
    dir.write(
        file("total_VCC_rejected_packets_cause_full_queue"),
        &vec![packet(1024, 2, 10); 3],
    );
    let mut responses = vec![packet(4028, 2, 10); 85];
    responses.extend(vec![packet(1024, 2, 10); 10]);
    dir.write(file("response_offloading_passing_in_gNB"), &responses);
    dir.write(file("offloading_time"), &vec![offloading_vcc(10); 80]);

    let campaign = SpeedCampaign {
        speeds: vec![SpeedProfile {
            name: "speed0".to_string(),
            km_h: 13.1,
        }],
        seeds: vec![0],
        response_size: 4028,
    };
    let mut sink = MemorySink::default();
    let (losses, anomalies) = speed_campaign(dir.path(), &campaign, &mut sink).unwrap();
    assert!(anomalies.is_empty(), "{anomalies:?}");
    let l = losses[0];
    check_diff(5.0, l.issue_to_gateway, 1e-9, "user to gateway");
    check_diff(5.0, l.gateway_to_vcc, 1e-9, "gateway to VCC");
    check_diff(3.0, l.rejected, 1e-9, "rejected");
    check_diff(2.0, l.vcc_to_response, 1e-9, "VCC to gateway");
    check_diff(5.0, l.response_to_user, 1e-9, "gateway to user");
    check_diff(80.0, l.delivered, 1e-9, "delivered");
    check_diff(100.0, l.unsatisfied() + l.delivered, 1e-6, "identity");

    let report = sink.find("speed_stage_losses").unwrap();
    assert_eq!(report.x, vec![13.1]);
    assert_eq!(report.series.len(), 5);
}
