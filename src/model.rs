//! Planning domain types: candidates, areas, clusters, agents and scopes.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Identifier of a candidate site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandidateId(pub String);

impl CandidateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for CandidateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a field agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Run-wide cluster identifier, allocated from a flat counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClusterId(pub u32);

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What kind of site a candidate is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    Customer,
    Prospect,
    Unknown,
}

impl CandidateKind {
    pub const ALL: [CandidateKind; 3] = [
        CandidateKind::Customer,
        CandidateKind::Prospect,
        CandidateKind::Unknown,
    ];

    /// Classify a raw store-supplied type tag.
    pub fn classify(raw: Option<&str>) -> Self {
        match raw.map(|tag| tag.trim().to_ascii_lowercase()) {
            Some(tag) if tag == "customer" => CandidateKind::Customer,
            Some(tag) if tag == "prospect" || tag == "prospective" => CandidateKind::Prospect,
            _ => CandidateKind::Unknown,
        }
    }
}

/// A geolocated site eligible for inclusion in a route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: CandidateId,
    pub lat: f64,
    pub lon: f64,
    pub area_code: String,
    pub display_name: String,
    pub kind: CandidateKind,
}

impl Candidate {
    pub fn new(id: impl Into<String>, lat: f64, lon: f64, area_code: impl Into<String>) -> Self {
        Self {
            id: CandidateId::new(id),
            lat,
            lon,
            area_code: area_code.into(),
            display_name: String::new(),
            kind: CandidateKind::Prospect,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_kind(mut self, kind: CandidateKind) -> Self {
        self.kind = kind;
        self
    }

    /// Location coordinates (lat, lng).
    pub fn location(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }

    /// A usable coordinate is finite, in range and not the (0, 0) placeholder.
    pub fn has_valid_location(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
            && !(self.lat == 0.0 && self.lon == 0.0)
    }
}

/// An administrative grouping of candidates.
#[derive(Debug, Clone, PartialEq)]
pub struct Area {
    pub code: String,
    pub name: String,
    pub candidates: Vec<Candidate>,
}

impl Area {
    pub fn new(code: impl Into<String>, name: impl Into<String>, candidates: Vec<Candidate>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            candidates,
        }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Group eligible candidates into areas, largest first.
///
/// Candidates that are excluded, of a kind outside `include_kinds`, or lack a
/// usable coordinate are dropped. Areas keep first-appearance order among
/// equal counts.
pub fn group_into_areas(
    candidates: &[Candidate],
    excluded: &HashSet<CandidateId>,
    include_kinds: &[CandidateKind],
) -> Vec<Area> {
    let mut areas: Vec<Area> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut seen: HashSet<&CandidateId> = HashSet::new();

    for candidate in candidates {
        if excluded.contains(&candidate.id) || !include_kinds.contains(&candidate.kind) {
            continue;
        }
        if !candidate.has_valid_location() {
            tracing::debug!(candidate = %candidate.id, "dropping candidate without usable coordinate");
            continue;
        }
        if !seen.insert(&candidate.id) {
            tracing::debug!(candidate = %candidate.id, "dropping duplicate candidate");
            continue;
        }

        let slot = *index.entry(candidate.area_code.as_str()).or_insert_with(|| {
            areas.push(Area::new(
                candidate.area_code.clone(),
                candidate.area_code.clone(),
                Vec::new(),
            ));
            areas.len() - 1
        });
        areas[slot].candidates.push(candidate.clone());
    }

    // Stable sort keeps input order for equal counts.
    areas.sort_by(|a, b| b.len().cmp(&a.len()));
    areas
}

/// A size-bounded group of candidates visited together on one route.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub id: ClusterId,
    pub area_code: String,
    pub members: Vec<Candidate>,
}

impl Cluster {
    pub fn new(id: ClusterId, area_code: impl Into<String>, members: Vec<Candidate>) -> Self {
        Self {
            id,
            area_code: area_code.into(),
            members,
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn candidate_ids(&self) -> impl Iterator<Item = &CandidateId> {
        self.members.iter().map(|member| &member.id)
    }

    /// Mean coordinate of the members, `None` for an empty cluster.
    pub fn centroid(&self) -> Option<(f64, f64)> {
        centroid_of(self.members.iter().map(Candidate::location))
    }
}

pub(crate) fn centroid_of(points: impl Iterator<Item = (f64, f64)>) -> Option<(f64, f64)> {
    let mut count = 0usize;
    let (mut lat, mut lon) = (0.0, 0.0);
    for (p_lat, p_lon) in points {
        lat += p_lat;
        lon += p_lon;
        count += 1;
    }
    if count == 0 {
        return None;
    }
    Some((lat / count as f64, lon / count as f64))
}

/// A field agent on the scope's roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub territory_code: String,
}

impl Agent {
    pub fn new(id: impl Into<String>, territory_code: impl Into<String>) -> Self {
        Self {
            id: AgentId::new(id),
            territory_code: territory_code.into(),
        }
    }
}

/// The unit of planning: one distributor and its optional depot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    pub id: String,
    pub name: String,
    pub depot: Option<(f64, f64)>,
}

impl Scope {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            depot: None,
        }
    }

    pub fn with_depot(mut self, lat: f64, lon: f64) -> Self {
        self.depot = Some((lat, lon));
        self
    }
}

/// Read-only inputs for one scope, loaded once before any planning work.
///
/// Cloning is cheap; every field is shared.
#[derive(Debug, Clone)]
pub struct ScopeSnapshot {
    pub scope: Arc<Scope>,
    pub candidates: Arc<[Candidate]>,
    pub excluded: Arc<HashSet<CandidateId>>,
    pub agents: Arc<[Agent]>,
}

impl ScopeSnapshot {
    pub fn new(
        scope: Scope,
        candidates: Vec<Candidate>,
        excluded: HashSet<CandidateId>,
        agents: Vec<Agent>,
    ) -> Self {
        Self {
            scope: Arc::new(scope),
            candidates: candidates.into(),
            excluded: Arc::new(excluded),
            agents: agents.into(),
        }
    }
}
