//! Road-network distance degrades to great-circle without surfacing errors.
//!
//! Uses local endpoints that refuse or never answer, so no routing service
//! is needed.

mod fixtures;

use std::collections::HashSet;
use std::net::TcpListener;
use std::thread;
use std::time::Duration;

use chrono::NaiveDate;

use fixtures::*;
use visit_planner::config::PlannerConfig;
use visit_planner::distance::{DistanceMode, DistanceProvider, FallbackMatrix};
use visit_planner::error::DistanceError;
use visit_planner::haversine::HaversineMatrix;
use visit_planner::model::{Cluster, ClusterId, Scope, ScopeSnapshot};
use visit_planner::ors::{OrsClient, OrsConfig};
use visit_planner::planner::Planner;
use visit_planner::sequencer::sequence_cluster;
use visit_planner::traits::DistanceMatrixProvider;

fn unreachable_ors() -> OrsConfig {
    OrsConfig {
        matrix_endpoint: "http://127.0.0.1:9/ors/v2/matrix/driving-car".to_string(),
        api_key: Some("test-key".to_string()),
        ..OrsConfig::default()
    }
}

/// Accepts connections and never writes a response.
fn silent_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    thread::spawn(move || {
        let mut held = Vec::new();
        for stream in listener.incoming().flatten() {
            held.push(stream);
        }
    });
    format!("http://{addr}/ors/v2/matrix/driving-car")
}

fn cluster() -> Cluster {
    Cluster::new(ClusterId(0), BARANGAYS[1].name, candidates_around(&BARANGAYS[1], "p", 25))
}

#[test]
fn unreachable_service_falls_back_per_call() {
    let client = OrsClient::new(unreachable_ors(), Duration::from_millis(500)).unwrap();
    let provider = FallbackMatrix::new(client, true);
    let locations: Vec<(f64, f64)> = cluster().members.iter().map(|m| m.location()).collect();

    let matrix = provider.matrix_for(&locations).unwrap();

    assert_eq!(matrix, HaversineMatrix.matrix(&locations));
    assert!(provider.cache().is_some_and(|cache| cache.is_empty()));
}

#[test]
fn network_mode_still_sequences_every_stop() {
    let provider = DistanceProvider::new(DistanceMode::Network, &unreachable_ors(), Duration::from_millis(500));
    let cluster = cluster();

    let route = sequence_cluster(&cluster, Some(DEPOTS[0].coords()), &provider);
    let expected = sequence_cluster(&cluster, Some(DEPOTS[0].coords()), &HaversineMatrix);

    let mut indices: Vec<u32> = route.stops.iter().map(|s| s.stop_index).collect();
    indices.sort_unstable();
    assert_eq!(indices, (1..=25).collect::<Vec<_>>());
    assert_eq!(route, expected);
}

#[test]
fn silent_service_times_out_and_still_sequences() {
    let config = OrsConfig {
        matrix_endpoint: silent_endpoint(),
        ..OrsConfig::default()
    };
    let timeout = Duration::from_millis(300);

    let client = OrsClient::new(config.clone(), timeout).unwrap();
    let err = client
        .matrix_for(&[BARANGAYS[0].coords(), BARANGAYS[1].coords()])
        .unwrap_err();
    assert!(matches!(err, DistanceError::Timeout), "got {err:?}");

    let provider = DistanceProvider::new(DistanceMode::Network, &config, timeout);
    let cluster = cluster();
    let route = sequence_cluster(&cluster, Some(DEPOTS[0].coords()), &provider);

    let mut indices: Vec<u32> = route.stops.iter().map(|s| s.stop_index).collect();
    indices.sort_unstable();
    assert_eq!(indices, (1..=25).collect::<Vec<_>>());
    assert_eq!(route, sequence_cluster(&cluster, Some(DEPOTS[0].coords()), &HaversineMatrix));
}

#[test]
fn disabled_service_falls_back() {
    let config = OrsConfig {
        enabled: false,
        ..unreachable_ors()
    };
    let provider = DistanceProvider::new(DistanceMode::Network, &config, Duration::from_secs(1));
    let locations = [BARANGAYS[0].coords(), BARANGAYS[1].coords()];
    assert_eq!(provider.matrix_for(&locations).unwrap(), HaversineMatrix.matrix(&locations));
}

#[test]
fn planner_in_network_mode_completes() {
    let config = PlannerConfig {
        distance_mode: DistanceMode::Network,
        request_timeout_secs: 1,
        start_date: NaiveDate::from_ymd_opt(2025, 4, 1),
        ors: unreachable_ors(),
        ..PlannerConfig::default()
    };
    let planner = Planner::new(config).unwrap();
    let depot = DEPOTS[1].coords();
    let snapshot = ScopeSnapshot::new(
        Scope::new("dist-2").with_depot(depot.0, depot.1),
        candidates_by_area(&[45, 12]),
        HashSet::new(),
        agents(2),
    );

    let plan = planner.plan(&snapshot).unwrap();

    assert_eq!(plan.records.len(), 57);
    assert!(!plan.report.is_degraded());
}
