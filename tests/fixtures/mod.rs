//! Test fixtures for visit-planner.
//!
//! Provides realistic test data including:
//! - Metro Manila barangay centers and depots
//! - Builders for candidates, agents and scopes
//! - In-memory implementations of the boundary traits

#![allow(dead_code)]

pub mod manila_sites;

pub use manila_sites::*;

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use visit_planner::emitter::PlanRecord;
use visit_planner::error::BoxError;
use visit_planner::model::{Agent, Candidate, CandidateId, Scope};
use visit_planner::traits::{AgentRoster, CandidateSource, ExclusionSource, PlanSink};

// ============================================================================
// Builders
// ============================================================================

/// `count` candidates on a tight grid around `site`, ids `{prefix}-{i}`.
pub fn candidates_around(site: &Site, prefix: &str, count: usize) -> Vec<Candidate> {
    (0..count)
        .map(|i| {
            let row = (i % 12) as f64;
            let col = (i / 12) as f64;
            Candidate::new(
                format!("{prefix}-{i}"),
                site.lat + row * 0.0015,
                site.lng + col * 0.0015,
                site.name,
            )
            .with_name(format!("{} store {i}", site.name))
        })
        .collect()
}

/// Candidates for the first `sizes.len()` barangays, one size each.
pub fn candidates_by_area(sizes: &[usize]) -> Vec<Candidate> {
    sizes
        .iter()
        .zip(BARANGAYS)
        .enumerate()
        .flat_map(|(n, (size, site))| candidates_around(site, &format!("b{n}"), *size))
        .collect()
}

pub fn agents(count: usize) -> Vec<Agent> {
    (0..count)
        .map(|i| Agent::new(format!("AG{i:02}"), format!("T{i:02}")))
        .collect()
}

// ============================================================================
// In-memory boundary implementations
// ============================================================================

#[derive(Debug, Default)]
pub struct InMemoryStore {
    candidates: HashMap<String, Vec<Candidate>>,
    excluded: HashMap<String, HashSet<CandidateId>>,
    agents: HashMap<String, Vec<Agent>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scope(mut self, scope: &str, candidates: Vec<Candidate>, agents: Vec<Agent>) -> Self {
        self.candidates.insert(scope.to_string(), candidates);
        self.agents.insert(scope.to_string(), agents);
        self
    }

    pub fn exclude(mut self, scope: &str, ids: &[&str]) -> Self {
        self.excluded
            .entry(scope.to_string())
            .or_default()
            .extend(ids.iter().map(|id| CandidateId::new(*id)));
        self
    }
}

impl CandidateSource for InMemoryStore {
    fn list_candidates(&self, scope: &Scope) -> Result<Vec<Candidate>, BoxError> {
        Ok(self.candidates.get(&scope.id).cloned().unwrap_or_default())
    }
}

impl ExclusionSource for InMemoryStore {
    fn list_excluded_ids(&self, scope: &Scope) -> Result<HashSet<CandidateId>, BoxError> {
        Ok(self.excluded.get(&scope.id).cloned().unwrap_or_default())
    }
}

impl AgentRoster for InMemoryStore {
    fn list_agents(&self, scope: &Scope) -> Result<Vec<Agent>, BoxError> {
        Ok(self.agents.get(&scope.id).cloned().unwrap_or_default())
    }
}

/// Source that always fails, for error-path tests.
pub struct UnreachableStore;

impl CandidateSource for UnreachableStore {
    fn list_candidates(&self, _scope: &Scope) -> Result<Vec<Candidate>, BoxError> {
        Err("candidate store offline".into())
    }
}

/// Sink that keeps every emitted batch, optionally refusing one scope.
#[derive(Debug, Default)]
pub struct RecordingSink {
    batches: Mutex<Vec<(String, Vec<PlanRecord>)>>,
    reject_scope: Option<String>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting(scope: &str) -> Self {
        Self {
            batches: Mutex::new(Vec::new()),
            reject_scope: Some(scope.to_string()),
        }
    }

    pub fn batches(&self) -> Vec<(String, Vec<PlanRecord>)> {
        self.batches.lock().unwrap().clone()
    }
}

impl PlanSink for RecordingSink {
    fn emit_plan(&self, scope: &Scope, records: &[PlanRecord]) -> Result<(), BoxError> {
        if self.reject_scope.as_deref() == Some(scope.id.as_str()) {
            return Err(format!("sink refused scope {}", scope.id).into());
        }
        self.batches
            .lock()
            .unwrap()
            .push((scope.id.clone(), records.to_vec()));
        Ok(())
    }
}
