//! Capacity-bounded area allocation.
//!
//! Areas are consumed largest first. Each area is clustered on demand and its
//! clusters are committed while they fit in the monthly budget; the area that
//! crosses the budget contributes only its first clusters, and everything
//! after it is deferred to a later run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info, warn};

use crate::error::{ClusteringError, PlanError};
use crate::model::{Area, Candidate, Cluster, ClusterId};
use crate::traits::Clusterer;

/// Coarse-grained cancellation, checked between areas.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clear a previous cancellation so the owner can run again.
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Running totals threaded through the allocation walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AllocatorState {
    /// Next run-wide cluster id.
    pub next_cluster_id: u32,
    /// Clusters committed so far.
    pub consumed: usize,
}

impl AllocatorState {
    fn take_id(&mut self) -> ClusterId {
        let id = ClusterId(self.next_cluster_id);
        self.next_cluster_id += 1;
        id
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferralReason {
    /// Budget was exhausted before the area was reached.
    CapacityReached,
    /// Only the first `taken` of `total` clusters were committed.
    Partial { taken: usize, total: usize },
    /// The area could not be clustered.
    ClusteringFailed(String),
}

/// Candidates of an area left for a future run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredArea {
    pub area_code: String,
    pub deferred_candidates: usize,
    pub reason: DeferralReason,
}

/// A committed cluster that breaches the size bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSizeViolation {
    pub cluster_id: ClusterId,
    pub area_code: String,
    pub size: usize,
    pub max: usize,
}

#[derive(Debug, Clone, Default)]
pub struct Allocation {
    pub clusters: Vec<Cluster>,
    pub state: AllocatorState,
    pub deferred: Vec<DeferredArea>,
    pub violations: Vec<ClusterSizeViolation>,
}

impl Allocation {
    pub fn committed_candidates(&self) -> usize {
        self.clusters.iter().map(Cluster::len).sum()
    }
}

/// Commit clusters area by area until `capacity` is consumed.
///
/// `areas` must already be sorted by descending candidate count.
pub fn allocate<C: Clusterer + ?Sized>(
    areas: &[Area],
    capacity: usize,
    max_cluster_size: usize,
    clusterer: &C,
    cancel: &CancelFlag,
) -> Result<Allocation, PlanError> {
    let mut allocation = Allocation::default();
    let mut state = AllocatorState::default();

    for (position, area) in areas.iter().enumerate() {
        if cancel.is_cancelled() {
            warn!(area = %area.code, "allocation cancelled");
            return Err(PlanError::Cancelled);
        }

        if state.consumed >= capacity {
            info!(
                consumed = state.consumed,
                capacity,
                deferred_areas = areas.len() - position,
                "monthly capacity reached"
            );
            allocation
                .deferred
                .extend(areas[position..].iter().map(|rest| DeferredArea {
                    area_code: rest.code.clone(),
                    deferred_candidates: rest.len(),
                    reason: DeferralReason::CapacityReached,
                }));
            break;
        }

        if area.is_empty() {
            continue;
        }

        let points: Vec<(f64, f64)> = area.candidates.iter().map(Candidate::location).collect();
        let groups = match clusterer.partition(&points, max_cluster_size) {
            Ok(groups) => groups,
            Err(ClusteringError::ConstraintViolation { partition, group, size, max }) => {
                error!(area = %area.code, group, size, max, "clusterer breached size bound; keeping partition");
                partition
            }
            Err(err) => {
                error!(area = %area.code, error = %err, "failed to cluster area; skipping");
                allocation.deferred.push(DeferredArea {
                    area_code: area.code.clone(),
                    deferred_candidates: area.len(),
                    reason: DeferralReason::ClusteringFailed(err.to_string()),
                });
                continue;
            }
        };
        let groups: Vec<Vec<usize>> = groups.into_iter().filter(|g| !g.is_empty()).collect();

        let total = groups.len();
        let remaining = capacity - state.consumed;
        let take = total.min(remaining);

        if take < total {
            let deferred_candidates: usize = groups[take..].iter().map(Vec::len).sum();
            info!(
                area = %area.code,
                taken = take,
                total,
                deferred_candidates,
                "partial selection to land on capacity"
            );
            allocation.deferred.push(DeferredArea {
                area_code: area.code.clone(),
                deferred_candidates,
                reason: DeferralReason::Partial { taken: take, total },
            });
        }

        for group in groups.into_iter().take(take) {
            let members: Vec<Candidate> = group
                .iter()
                .filter_map(|index| area.candidates.get(*index).cloned())
                .collect();
            let cluster = Cluster::new(state.take_id(), area.code.clone(), members);
            if cluster.len() > max_cluster_size {
                allocation.violations.push(ClusterSizeViolation {
                    cluster_id: cluster.id,
                    area_code: area.code.clone(),
                    size: cluster.len(),
                    max: max_cluster_size,
                });
            }
            debug!(cluster = %cluster.id, area = %area.code, size = cluster.len(), "committed cluster");
            allocation.clusters.push(cluster);
        }
        state.consumed += take;

        info!(
            area = %area.code,
            candidates = area.len(),
            clusters = take,
            consumed = state.consumed,
            capacity,
            "allocated area"
        );
    }

    allocation.state = state;
    Ok(allocation)
}
