//! Planner configuration, loadable from TOML.

use std::time::Duration;

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::calendar::{StartPolicy, WorkCalendar};
use crate::clustering::{BalancedKMeans, DEFAULT_SEED};
use crate::distance::{DistanceMode, DistanceProvider};
use crate::error::{InputError, PlanError};
use crate::model::CandidateKind;
use crate::ors::OrsConfig;
use crate::postprocess::PostProcessOptions;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub max_cluster_size: usize,
    pub min_merge_threshold: usize,
    pub min_rebalance_target_size: usize,
    pub rebalance_std_threshold: f64,
    /// Any day in the planning month, as `"YYYY-MM-DD"`. Defaults to today.
    pub start_date: Option<NaiveDate>,
    pub start_policy: StartPolicy,
    pub rest_day: Weekday,
    /// Seed for the clusterer's initial centers.
    pub seed: u64,
    pub include_kinds: Vec<CandidateKind>,
    pub distance_mode: DistanceMode,
    pub request_timeout_secs: u64,
    pub ors: OrsConfig,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_cluster_size: 60,
            min_merge_threshold: 20,
            min_rebalance_target_size: 40,
            rebalance_std_threshold: 10.0,
            start_date: None,
            start_policy: StartPolicy::default(),
            rest_day: Weekday::Sun,
            seed: DEFAULT_SEED,
            include_kinds: CandidateKind::ALL.to_vec(),
            distance_mode: DistanceMode::default(),
            request_timeout_secs: 30,
            ors: OrsConfig::default(),
        }
    }
}

impl PlannerConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, PlanError> {
        let config: PlannerConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), InputError> {
        if self.max_cluster_size == 0 {
            return Err(invalid("max_cluster_size must be greater than 0"));
        }
        if self.min_merge_threshold > self.max_cluster_size {
            return Err(invalid("min_merge_threshold must not exceed max_cluster_size"));
        }
        if self.min_rebalance_target_size == 0 {
            return Err(invalid("min_rebalance_target_size must be greater than 0"));
        }
        if self.min_rebalance_target_size > self.max_cluster_size {
            return Err(invalid("min_rebalance_target_size must not exceed max_cluster_size"));
        }
        if !self.rebalance_std_threshold.is_finite() || self.rebalance_std_threshold < 0.0 {
            return Err(invalid("rebalance_std_threshold must be a finite, non-negative number"));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs must be greater than 0"));
        }
        if self.include_kinds.is_empty() {
            return Err(invalid("include_kinds must name at least one kind"));
        }
        Ok(())
    }

    pub fn post_process_options(&self) -> PostProcessOptions {
        PostProcessOptions {
            max_cluster_size: self.max_cluster_size,
            min_merge_threshold: self.min_merge_threshold,
            min_rebalance_target_size: self.min_rebalance_target_size,
            rebalance_std_threshold: self.rebalance_std_threshold,
        }
    }

    pub fn calendar(&self) -> WorkCalendar {
        WorkCalendar::new(self.rest_day)
    }

    pub fn clusterer(&self) -> BalancedKMeans {
        BalancedKMeans::new(self.seed)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn distance_provider(&self) -> DistanceProvider {
        DistanceProvider::new(self.distance_mode, &self.ors, self.request_timeout())
    }
}

fn invalid(message: &str) -> InputError {
    InputError::InvalidConfig(message.to_string())
}
