//! Flatten assignments and routes into plan records.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use crate::assign::Assignments;
use crate::calendar::{iso_week, weekday_index};
use crate::model::{AgentId, CandidateId, Cluster, ClusterId};
use crate::sequencer::ClusterRoute;

/// One scheduled visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanRecord {
    pub cluster_id: ClusterId,
    pub area_code: String,
    pub agent_id: AgentId,
    pub territory: String,
    pub date: NaiveDate,
    /// Monday = 1.
    pub weekday: u32,
    pub candidate_id: CandidateId,
    pub display_name: String,
    pub stop_index: u32,
    pub route_code: String,
    pub route_name: String,
}

/// `{territory}_W{iso week}_D{weekday}`, e.g. `T01_W14_D2`.
pub fn route_code(territory: &str, date: NaiveDate) -> String {
    let week = iso_week(date);
    let day = weekday_index(date);
    if territory.is_empty() {
        format!("W{week:02}_D{day}")
    } else {
        format!("{territory}_W{week:02}_D{day}")
    }
}

pub fn route_name(agent: &AgentId, date: NaiveDate) -> String {
    format!("Route {agent} {}", date.format("%Y-%m-%d"))
}

/// Build records in slot order, stops in visit order.
///
/// Clusters without a slot produce nothing. Deterministic for identical inputs.
pub fn emit_records(clusters: &[Cluster], assignments: &Assignments, routes: &[ClusterRoute]) -> Vec<PlanRecord> {
    let clusters_by_id: HashMap<ClusterId, &Cluster> = clusters.iter().map(|c| (c.id, c)).collect();
    let routes_by_id: HashMap<ClusterId, &ClusterRoute> = routes.iter().map(|r| (r.cluster_id, r)).collect();

    let mut records = Vec::new();
    for slot in &assignments.slots {
        let (Some(cluster), Some(route)) = (clusters_by_id.get(&slot.cluster_id), routes_by_id.get(&slot.cluster_id)) else {
            warn!(cluster = %slot.cluster_id, "assigned cluster has no route; skipping");
            continue;
        };

        let names: HashMap<&CandidateId, &str> = cluster
            .members
            .iter()
            .map(|member| (&member.id, member.display_name.as_str()))
            .collect();
        let code = route_code(&slot.territory, slot.date);
        let name = route_name(&slot.agent_id, slot.date);

        records.extend(route.stops.iter().map(|stop| PlanRecord {
            cluster_id: cluster.id,
            area_code: cluster.area_code.clone(),
            agent_id: slot.agent_id.clone(),
            territory: slot.territory.clone(),
            date: slot.date,
            weekday: weekday_index(slot.date),
            candidate_id: stop.candidate_id.clone(),
            display_name: names.get(&stop.candidate_id).copied().unwrap_or_default().to_string(),
            stop_index: stop.stop_index,
            route_code: code.clone(),
            route_name: name.clone(),
        }));
    }
    records
}
