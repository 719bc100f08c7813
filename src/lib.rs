//! visit-planner core
//!
//! Monthly field-visit planning: group candidate sites by area, allocate
//! size-bounded clusters against agent capacity, bind clusters to
//! (agent, date) slots and sequence the stops of each route.

pub mod allocator;
pub mod assign;
pub mod calendar;
pub mod clustering;
pub mod config;
pub mod distance;
pub mod emitter;
pub mod error;
pub mod haversine;
pub mod model;
pub mod ors;
pub mod planner;
pub mod postprocess;
pub mod sequencer;
pub mod traits;

pub use config::PlannerConfig;
pub use error::PlanError;
pub use planner::{PlanReport, Planner};
