//! Slot assignment: bind each cluster to one unique (agent, date) slot.
//!
//! Clusters are dealt round-robin across the roster; after a full round the
//! date advances to the next working day. Uniqueness follows from that walk,
//! and the used-slot set only exists to catch a broken roster.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate};
use tracing::{error, info};

use crate::calendar::WorkCalendar;
use crate::error::InputError;
use crate::model::{Agent, AgentId, Cluster, ClusterId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotAssignment {
    pub cluster_id: ClusterId,
    pub agent_id: AgentId,
    pub territory: String,
    pub date: NaiveDate,
}

/// A second cluster landed on an already used slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentCollision {
    pub cluster_id: ClusterId,
    pub agent_id: AgentId,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Assignments {
    pub slots: Vec<SlotAssignment>,
    /// Clusters beyond capacity, never scheduled.
    pub dropped: Vec<ClusterId>,
    pub collisions: Vec<AssignmentCollision>,
}

/// Assign `clusters`, in order, to slots starting at `start`.
///
/// `start` is expected to be a working day already normalized by
/// [`WorkCalendar::plan_start`]; a rest day is moved forward.
pub fn assign_slots(
    clusters: &[Cluster],
    agents: &[Agent],
    start: NaiveDate,
    capacity: usize,
    calendar: &WorkCalendar,
) -> Result<Assignments, InputError> {
    if agents.is_empty() {
        return Err(InputError::NoAgents);
    }

    let mut assignments = Assignments::default();
    let mut schedulable = clusters;
    if clusters.len() > capacity {
        error!(
            clusters = clusters.len(),
            capacity,
            "more clusters than monthly capacity; dropping the excess"
        );
        let (kept, excess) = clusters.split_at(capacity);
        assignments.dropped = excess.iter().map(|c| c.id).collect();
        schedulable = kept;
    }

    let invalid = InputError::InvalidCalendar {
        year: start.year(),
        month: start.month(),
    };
    let mut current = calendar.working_day_on_or_after(start).ok_or_else(|| invalid.clone())?;
    let mut used: HashSet<(&AgentId, NaiveDate)> = HashSet::new();

    for (i, cluster) in schedulable.iter().enumerate() {
        if i > 0 && i % agents.len() == 0 {
            current = calendar.next_working_day(current).ok_or_else(|| invalid.clone())?;
        }
        let agent = &agents[i % agents.len()];

        if !used.insert((&agent.id, current)) {
            error!(cluster = %cluster.id, agent = %agent.id, date = %current, "slot already taken; dropping assignment");
            assignments.collisions.push(AssignmentCollision {
                cluster_id: cluster.id,
                agent_id: agent.id.clone(),
                date: current,
            });
            continue;
        }

        assignments.slots.push(SlotAssignment {
            cluster_id: cluster.id,
            agent_id: agent.id.clone(),
            territory: agent.territory_code.clone(),
            date: current,
        });
    }

    info!(
        assigned = assignments.slots.len(),
        agents = agents.len(),
        dropped = assignments.dropped.len(),
        collisions = assignments.collisions.len(),
        "assigned clusters to slots"
    );
    Ok(assignments)
}
