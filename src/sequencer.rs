//! Visit order within a cluster.
//!
//! Greedy nearest neighbor over one distance matrix per cluster. With a depot
//! the route starts at the member nearest the depot; without one it starts at
//! the first member. The depot never receives a stop index.

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::haversine::HaversineMatrix;
use crate::model::{Candidate, CandidateId, Cluster, ClusterId};
use crate::traits::{DistanceMatrix, DistanceMatrixProvider};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stop {
    pub candidate_id: CandidateId,
    /// 1-based position in the visit order.
    pub stop_index: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClusterRoute {
    pub cluster_id: ClusterId,
    pub stops: Vec<Stop>,
    /// Length of the sequenced path, including the depot leg when present.
    pub total_km: f64,
}

impl ClusterRoute {
    pub fn stop_index_of(&self, id: &CandidateId) -> Option<u32> {
        self.stops
            .iter()
            .find(|stop| &stop.candidate_id == id)
            .map(|stop| stop.stop_index)
    }
}

pub fn sequence_cluster<M>(cluster: &Cluster, depot: Option<(f64, f64)>, provider: &M) -> ClusterRoute
where
    M: DistanceMatrixProvider + ?Sized,
{
    let members = &cluster.members;
    if members.is_empty() {
        return ClusterRoute {
            cluster_id: cluster.id,
            stops: Vec::new(),
            total_km: 0.0,
        };
    }

    let offset = usize::from(depot.is_some());
    let locations: Vec<(f64, f64)> = depot
        .into_iter()
        .chain(members.iter().map(Candidate::location))
        .collect();
    let matrix = matrix_or_fallback(cluster.id, &locations, provider);
    let distance = |from: usize, to: usize| matrix[from][to];

    let first = if depot.is_some() {
        nearest(0, members.len(), offset, &[], &distance).unwrap_or(0)
    } else {
        0
    };

    let mut visited = vec![false; members.len()];
    let mut order = Vec::with_capacity(members.len());
    let mut total_km = if depot.is_some() { distance(0, offset + first) } else { 0.0 };
    visited[first] = true;
    order.push(first);

    let mut current = first;
    while order.len() < members.len() {
        let next = nearest(offset + current, members.len(), offset, &visited, &distance)
            .or_else(|| visited.iter().position(|seen| !seen))
            .unwrap_or(current);
        total_km += distance(offset + current, offset + next);
        visited[next] = true;
        order.push(next);
        current = next;
    }

    let stops = order
        .into_iter()
        .zip(1u32..)
        .map(|(member, stop_index)| Stop {
            candidate_id: members[member].id.clone(),
            stop_index,
        })
        .collect();

    debug!(cluster = %cluster.id, stops = members.len(), total_km, "sequenced cluster");
    ClusterRoute {
        cluster_id: cluster.id,
        stops,
        total_km,
    }
}

/// Sequence every cluster in parallel; output order follows `clusters`.
pub fn sequence_all<M>(clusters: &[Cluster], depot: Option<(f64, f64)>, provider: &M) -> Vec<ClusterRoute>
where
    M: DistanceMatrixProvider + ?Sized,
{
    clusters
        .par_iter()
        .map(|cluster| sequence_cluster(cluster, depot, provider))
        .collect()
}

/// Unvisited member nearest to matrix row `from`. Ties keep the lowest index.
fn nearest(
    from: usize,
    count: usize,
    offset: usize,
    visited: &[bool],
    distance: &impl Fn(usize, usize) -> f64,
) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for member in 0..count {
        if visited.get(member).copied().unwrap_or(false) {
            continue;
        }
        let km = distance(from, offset + member);
        if best.is_none_or(|(_, best_km)| km < best_km) {
            best = Some((member, km));
        }
    }
    best.map(|(member, _)| member)
}

fn matrix_or_fallback<M>(cluster: ClusterId, locations: &[(f64, f64)], provider: &M) -> DistanceMatrix
where
    M: DistanceMatrixProvider + ?Sized,
{
    match provider.matrix_for(locations) {
        Ok(matrix) if is_square(&matrix, locations.len()) => matrix,
        Ok(matrix) => {
            warn!(cluster = %cluster, rows = matrix.len(), expected = locations.len(), "distance matrix has wrong shape; using great-circle");
            HaversineMatrix.matrix(locations)
        }
        Err(err) => {
            warn!(cluster = %cluster, error = %err, "distance provider failed; using great-circle");
            HaversineMatrix.matrix(locations)
        }
    }
}

fn is_square(matrix: &DistanceMatrix, n: usize) -> bool {
    matrix.len() == n && matrix.iter().all(|row| row.len() == n)
}
