//! Error taxonomy for planning runs.
//!
//! Only [`PlanError`] ever aborts a scope. Clustering and distance errors are
//! absorbed by their callers and surface as entries in the run report.

use thiserror::Error;

/// Boxed error returned by external collaborators (stores, sinks).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Empty or invalid scope input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("invalid calendar input: year {year}, month {month}")]
    InvalidCalendar { year: i32, month: u32 },
    #[error("scope has no eligible candidates")]
    NoCandidates,
    #[error("scope has no agents")]
    NoAgents,
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failure produced by a [`crate::traits::Clusterer`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ClusteringError {
    /// A produced group breaches the size bounds. The partition is kept so the
    /// caller can decide what to do with it.
    #[error("cluster group {group} has {size} members, bound is 1..={max}")]
    ConstraintViolation {
        partition: Vec<Vec<usize>>,
        group: usize,
        size: usize,
        max: usize,
    },
    #[error("cannot cluster: {0}")]
    Degenerate(String),
}

/// Failure of a distance matrix provider. Never surfaced past the sequencer.
#[derive(Debug, Error)]
pub enum DistanceError {
    #[error("network distance provider is disabled")]
    Disabled,
    #[error("distance request timed out")]
    Timeout,
    #[error("distance request failed: {0}")]
    Http(reqwest::Error),
    #[error("distance service returned HTTP {0}")]
    Status(u16),
    #[error("malformed distance matrix: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for DistanceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DistanceError::Timeout
        } else if let Some(status) = err.status() {
            DistanceError::Status(status.as_u16())
        } else {
            DistanceError::Http(err)
        }
    }
}

/// Error that aborts a single scope run.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error(transparent)]
    Input(#[from] InputError),
    #[error("failed to load scope input: {0}")]
    Source(#[source] BoxError),
    #[error("failed to emit plan: {0}")]
    Emit(#[source] BoxError),
    #[error("run cancelled")]
    Cancelled,
    #[error("failed to parse configuration: {0}")]
    Config(#[from] toml::de::Error),
}
