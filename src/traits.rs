//! Boundary traits for the planning engine.
//!
//! The engine never talks to a store, a sink or a routing service directly.
//! Applications implement these for their own infrastructure.

use std::collections::HashSet;

use crate::emitter::PlanRecord;
use crate::error::{BoxError, ClusteringError, DistanceError};
use crate::model::{Agent, Candidate, CandidateId, Scope};

/// Square distance matrix in kilometers, indexed by the provided location order.
pub type DistanceMatrix = Vec<Vec<f64>>;

/// Lists the candidate sites of a scope.
///
/// Candidates must already carry a coordinate and an area code.
pub trait CandidateSource {
    fn list_candidates(&self, scope: &Scope) -> Result<Vec<Candidate>, BoxError>;
}

/// Lists candidate ids to leave out of a run (already visited or scheduled).
pub trait ExclusionSource {
    fn list_excluded_ids(&self, scope: &Scope) -> Result<HashSet<CandidateId>, BoxError>;
}

/// Provides the agent roster of a scope.
pub trait AgentRoster {
    fn list_agents(&self, scope: &Scope) -> Result<Vec<Agent>, BoxError>;
}

/// Write-only destination for a completed plan.
///
/// Called once per scope run with the full batch.
pub trait PlanSink {
    fn emit_plan(&self, scope: &Scope, records: &[PlanRecord]) -> Result<(), BoxError>;
}

/// Provides a distance matrix for a set of (lat, lng) locations.
///
/// Implementations are shared across sequencing workers and must be `Sync`.
pub trait DistanceMatrixProvider: Sync {
    fn matrix_for(&self, locations: &[(f64, f64)]) -> Result<DistanceMatrix, DistanceError>;
}

/// Partitions the (lat, lng) points of one area into groups of at most
/// `max_size` members each, returned as index lists into `points`.
pub trait Clusterer {
    fn partition(
        &self,
        points: &[(f64, f64)],
        max_size: usize,
    ) -> Result<Vec<Vec<usize>>, ClusteringError>;
}

impl<T: DistanceMatrixProvider + ?Sized> DistanceMatrixProvider for &T {
    fn matrix_for(&self, locations: &[(f64, f64)]) -> Result<DistanceMatrix, DistanceError> {
        (**self).matrix_for(locations)
    }
}
