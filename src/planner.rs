//! Scope orchestration: load inputs once, then allocate, post-process,
//! assign, sequence and emit.
//!
//! Everything up to slot assignment runs sequentially because capacity
//! bookkeeping and the round-robin walk are stateful across the run. Only
//! per-cluster sequencing fans out.

use chrono::{Datelike, Local, NaiveDate};
use tracing::{error, info, warn};

use crate::allocator::{CancelFlag, ClusterSizeViolation, DeferredArea, allocate};
use crate::assign::{AssignmentCollision, Assignments, assign_slots};
use crate::calendar::monthly_capacity;
use crate::clustering::BalancedKMeans;
use crate::config::PlannerConfig;
use crate::distance::DistanceProvider;
use crate::emitter::{PlanRecord, emit_records};
use crate::error::{InputError, PlanError};
use crate::model::{Cluster, ClusterId, Scope, ScopeSnapshot, group_into_areas};
use crate::postprocess::{MergeShortfall, post_process};
use crate::sequencer::{ClusterRoute, sequence_all};
use crate::traits::{AgentRoster, CandidateSource, Clusterer, DistanceMatrixProvider, ExclusionSource, PlanSink};

/// Summary of one scope run.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanReport {
    pub scope_id: String,
    pub start_date: NaiveDate,
    pub capacity: usize,
    pub areas: usize,
    pub eligible_candidates: usize,
    pub clusters_committed: usize,
    pub clusters_assigned: usize,
    pub merged: usize,
    pub rebalanced_groups: usize,
    pub deferred: Vec<DeferredArea>,
    pub shortfalls: Vec<MergeShortfall>,
    /// Breaches reported by the clusterer, before post-processing.
    pub clustering_violations: Vec<ClusterSizeViolation>,
    /// Breaches still present in the final clusters.
    pub violations: Vec<ClusterSizeViolation>,
    pub collisions: Vec<AssignmentCollision>,
    pub dropped: Vec<ClusterId>,
    pub records: usize,
}

impl PlanReport {
    /// A run is degraded when an invariant broke but planning carried on.
    pub fn is_degraded(&self) -> bool {
        !self.clustering_violations.is_empty()
            || !self.violations.is_empty()
            || !self.collisions.is_empty()
            || !self.dropped.is_empty()
    }
}

/// Everything a scope run produced, before it reaches a sink.
#[derive(Debug, Clone)]
pub struct ScopePlan {
    pub clusters: Vec<Cluster>,
    pub assignments: Assignments,
    pub routes: Vec<ClusterRoute>,
    pub records: Vec<PlanRecord>,
    pub report: PlanReport,
}

/// Result of one scope within a batch.
#[derive(Debug)]
pub struct ScopeOutcome {
    pub scope_id: String,
    pub result: Result<PlanReport, PlanError>,
}

pub struct Planner<C = BalancedKMeans, M = DistanceProvider> {
    config: PlannerConfig,
    clusterer: C,
    distance: M,
    cancel: CancelFlag,
}

impl Planner {
    /// Build a planner with the configured clusterer and distance provider.
    pub fn new(config: PlannerConfig) -> Result<Self, PlanError> {
        config.validate()?;
        let clusterer = config.clusterer();
        let distance = config.distance_provider();
        info!(mode = ?distance.mode(), "distance provider ready");
        Ok(Self {
            config,
            clusterer,
            distance,
            cancel: CancelFlag::new(),
        })
    }
}

impl<C: Clusterer, M: DistanceMatrixProvider> Planner<C, M> {
    pub fn with_components(config: PlannerConfig, clusterer: C, distance: M) -> Result<Self, PlanError> {
        config.validate()?;
        Ok(Self {
            config,
            clusterer,
            distance,
            cancel: CancelFlag::new(),
        })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Handle for aborting a run between areas.
    ///
    /// The flag stays set, and every later run fails with
    /// [`PlanError::Cancelled`], until [`CancelFlag::reset`] is called.
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Plan the month of the configured start date, or the current month.
    pub fn plan(&self, snapshot: &ScopeSnapshot) -> Result<ScopePlan, PlanError> {
        let requested = self.config.start_date.unwrap_or_else(|| Local::now().date_naive());
        self.plan_from(snapshot, requested)
    }

    /// Plan the month containing `requested_start`.
    #[tracing::instrument(skip_all, fields(scope = %snapshot.scope.id, month = %requested_start.format("%Y-%m")))]
    pub fn plan_from(&self, snapshot: &ScopeSnapshot, requested_start: NaiveDate) -> Result<ScopePlan, PlanError> {
        if snapshot.agents.is_empty() {
            return Err(InputError::NoAgents.into());
        }
        let areas = group_into_areas(&snapshot.candidates, &snapshot.excluded, &self.config.include_kinds);
        if areas.is_empty() {
            return Err(InputError::NoCandidates.into());
        }
        let eligible_candidates: usize = areas.iter().map(|area| area.len()).sum();

        let calendar = self.config.calendar();
        let start = calendar.plan_start(requested_start, self.config.start_policy)?;
        let capacity = monthly_capacity(
            requested_start.year(),
            requested_start.month(),
            snapshot.agents.len(),
            &calendar,
        )?;
        info!(
            agents = snapshot.agents.len(),
            areas = areas.len(),
            candidates = eligible_candidates,
            capacity,
            start = %start,
            "planning scope"
        );

        let mut allocation = allocate(
            &areas,
            capacity,
            self.config.max_cluster_size,
            &self.clusterer,
            &self.cancel,
        )?;
        let clusters_committed = allocation.clusters.len();

        let post = post_process(&mut allocation.clusters, &self.config.post_process_options());
        let clusters = allocation.clusters;

        let assignments = assign_slots(&clusters, &snapshot.agents, start, capacity, &calendar)?;
        let routes = sequence_all(&clusters, snapshot.scope.depot, &self.distance);
        let records = emit_records(&clusters, &assignments, &routes);

        let report = PlanReport {
            scope_id: snapshot.scope.id.clone(),
            start_date: start,
            capacity,
            areas: areas.len(),
            eligible_candidates,
            clusters_committed,
            clusters_assigned: assignments.slots.len(),
            merged: post.merged,
            rebalanced_groups: post.rebalanced_groups,
            deferred: allocation.deferred,
            shortfalls: post.shortfalls,
            clustering_violations: allocation.violations,
            violations: post.violations,
            collisions: assignments.collisions.clone(),
            dropped: assignments.dropped.clone(),
            records: records.len(),
        };

        if report.is_degraded() {
            warn!(
                clustering_violations = report.clustering_violations.len(),
                violations = report.violations.len(),
                collisions = report.collisions.len(),
                dropped = report.dropped.len(),
                "scope planned in degraded state"
            );
        }
        info!(
            clusters = report.clusters_assigned,
            records = report.records,
            deferred_areas = report.deferred.len(),
            "scope planned"
        );

        Ok(ScopePlan {
            clusters,
            assignments,
            routes,
            records,
            report,
        })
    }

    /// Load a scope from its sources, plan it and hand the batch to `sink`.
    pub fn run_scope<S, E, R, K>(
        &self,
        scope: &Scope,
        candidates: &S,
        exclusions: &E,
        roster: &R,
        sink: &K,
    ) -> Result<PlanReport, PlanError>
    where
        S: CandidateSource + ?Sized,
        E: ExclusionSource + ?Sized,
        R: AgentRoster + ?Sized,
        K: PlanSink + ?Sized,
    {
        let snapshot = load_snapshot(scope, candidates, exclusions, roster)?;
        let plan = self.plan(&snapshot)?;
        sink.emit_plan(scope, &plan.records).map_err(PlanError::Emit)?;
        Ok(plan.report)
    }

    /// Run scopes one after another. A failed scope is logged and the batch
    /// moves on; cancellation stops the batch.
    pub fn run_batch<S, E, R, K>(
        &self,
        scopes: &[Scope],
        candidates: &S,
        exclusions: &E,
        roster: &R,
        sink: &K,
    ) -> Vec<ScopeOutcome>
    where
        S: CandidateSource + ?Sized,
        E: ExclusionSource + ?Sized,
        R: AgentRoster + ?Sized,
        K: PlanSink + ?Sized,
    {
        let mut outcomes = Vec::with_capacity(scopes.len());
        for scope in scopes {
            let result = self.run_scope(scope, candidates, exclusions, roster, sink);
            let cancelled = matches!(result, Err(PlanError::Cancelled));
            if let Err(err) = &result {
                error!(scope = %scope.id, error = %err, "scope failed");
            }
            outcomes.push(ScopeOutcome {
                scope_id: scope.id.clone(),
                result,
            });
            if cancelled {
                break;
            }
        }
        outcomes
    }
}

/// Read every input of a scope exactly once.
pub fn load_snapshot<S, E, R>(
    scope: &Scope,
    candidates: &S,
    exclusions: &E,
    roster: &R,
) -> Result<ScopeSnapshot, PlanError>
where
    S: CandidateSource + ?Sized,
    E: ExclusionSource + ?Sized,
    R: AgentRoster + ?Sized,
{
    let listed = candidates.list_candidates(scope).map_err(PlanError::Source)?;
    let excluded = exclusions.list_excluded_ids(scope).map_err(PlanError::Source)?;
    let agents = roster.list_agents(scope).map_err(PlanError::Source)?;
    Ok(ScopeSnapshot::new(scope.clone(), listed, excluded, agents))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::haversine::HaversineMatrix;
    use crate::model::{Agent, Candidate};
    use std::collections::HashSet;

    fn snapshot(candidates: usize, agents: usize) -> ScopeSnapshot {
        let candidates = (0..candidates)
            .map(|i| Candidate::new(format!("p{i}"), 14.55 + (i % 10) as f64 * 0.002, 121.0 + (i / 10) as f64 * 0.002, "brgy-1"))
            .collect();
        let agents = (0..agents).map(|i| Agent::new(format!("ag{i}"), format!("T{i}"))).collect();
        ScopeSnapshot::new(Scope::new("dist-1"), candidates, HashSet::new(), agents)
    }

    fn planner() -> Planner<BalancedKMeans, HaversineMatrix> {
        Planner::with_components(PlannerConfig::default(), BalancedKMeans::default(), HaversineMatrix).unwrap()
    }

    fn april() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
    }

    #[test]
    fn plans_every_eligible_candidate_under_capacity() {
        let plan = planner().plan_from(&snapshot(130, 2), april()).unwrap();
        assert_eq!(plan.report.capacity, 52);
        assert_eq!(plan.report.clusters_committed, 3);
        assert_eq!(plan.records.len(), 130);
        assert!(!plan.report.is_degraded());
        assert_eq!(plan.report.start_date, april());
    }

    #[test]
    fn empty_inputs_are_input_errors() {
        let err = planner().plan_from(&snapshot(0, 2), april()).unwrap_err();
        assert!(matches!(err, PlanError::Input(InputError::NoCandidates)));
        let err = planner().plan_from(&snapshot(10, 0), april()).unwrap_err();
        assert!(matches!(err, PlanError::Input(InputError::NoAgents)));
    }

    #[test]
    fn cancelled_planner_aborts() {
        let planner = planner();
        planner.cancel_flag().cancel();
        let err = planner.plan_from(&snapshot(10, 1), april()).unwrap_err();
        assert!(matches!(err, PlanError::Cancelled));
    }

    #[test]
    fn reset_flag_allows_another_run() {
        let planner = planner();
        let cancel = planner.cancel_flag();
        cancel.cancel();
        assert!(planner.plan_from(&snapshot(10, 1), april()).is_err());

        cancel.reset();
        let plan = planner.plan_from(&snapshot(10, 1), april()).unwrap();
        assert_eq!(plan.records.len(), 10);
    }

    /// Splits 70/30 regardless of the bound and reports the breach.
    struct Lopsided;

    impl Clusterer for Lopsided {
        fn partition(
            &self,
            points: &[(f64, f64)],
            max_size: usize,
        ) -> Result<Vec<Vec<usize>>, crate::error::ClusteringError> {
            let split = points.len() * 7 / 10;
            Err(crate::error::ClusteringError::ConstraintViolation {
                partition: vec![(0..split).collect(), (split..points.len()).collect()],
                group: 0,
                size: split,
                max: max_size,
            })
        }
    }

    #[test]
    fn clusterer_breach_flags_run_even_after_rebalance() {
        let planner = Planner::with_components(PlannerConfig::default(), Lopsided, HaversineMatrix).unwrap();
        let plan = planner.plan_from(&snapshot(100, 2), april()).unwrap();

        let sizes: Vec<usize> = plan.clusters.iter().map(Cluster::len).collect();
        assert_eq!(sizes, vec![50, 50]);
        assert!(plan.report.violations.is_empty());
        assert_eq!(plan.report.clustering_violations.len(), 1);
        assert_eq!(plan.report.clustering_violations[0].size, 70);
        assert!(plan.report.is_degraded());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = PlannerConfig {
            max_cluster_size: 0,
            ..PlannerConfig::default()
        };
        assert!(Planner::new(config).is_err());
    }
}
