//! Pipeline configuration
//!
//! Defaults: a 30 minute idle gap, a 30 second credit for the last page of
//! every session, top 5 pages per user, top 10 globally and a preview of the
//! first 3 sessions.

use crate::error::ComputeError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest inter-event gap (seconds) still counted as active browsing
pub const GAP_THRESHOLD_SECONDS: f64 = 1800.0;

/// Fixed per-session credit (seconds) for time spent on the final page
pub const TAIL_ESTIMATE_SECONDS: f64 = 30.0;

/// Ranked pages shown in a per-user report
pub const USER_TOP_PAGES: usize = 5;

/// Ranked pages shown in the global summary
pub const GLOBAL_TOP_PAGES: usize = 10;

/// Sessions included in a per-user travel history preview
pub const HISTORY_PREVIEW_SESSIONS: usize = 3;

/// How the average session duration is derived from the total
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AveragePolicy {
    /// `round(total_seconds / sessions)`
    #[default]
    Seconds,
    /// `round(round(total_seconds / 60) / sessions)` minutes, reported in seconds
    RoundedMinutes,
}

/// Tunables for session reconstruction, dwell estimation and ranking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementConfig {
    pub gap_threshold_secs: f64,
    pub tail_estimate_secs: f64,
    pub user_top_pages: usize,
    pub global_top_pages: usize,
    pub history_preview_sessions: usize,
    pub average_policy: AveragePolicy,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            gap_threshold_secs: GAP_THRESHOLD_SECONDS,
            tail_estimate_secs: TAIL_ESTIMATE_SECONDS,
            user_top_pages: USER_TOP_PAGES,
            global_top_pages: GLOBAL_TOP_PAGES,
            history_preview_sessions: HISTORY_PREVIEW_SESSIONS,
            average_policy: AveragePolicy::Seconds,
        }
    }
}

impl EngagementConfig {
    /// Parse and validate a JSON config. Missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ComputeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file
    pub fn load(path: &Path) -> Result<Self, ComputeError> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            ComputeError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, ComputeError> {
        serde_json::to_string_pretty(self).map_err(ComputeError::JsonError)
    }

    pub fn validate(&self) -> Result<(), ComputeError> {
        if !self.gap_threshold_secs.is_finite() || self.gap_threshold_secs <= 0.0 {
            return Err(ComputeError::ConfigError(
                "gap_threshold_secs must be a positive number".to_string(),
            ));
        }
        if !self.tail_estimate_secs.is_finite() || self.tail_estimate_secs < 0.0 {
            return Err(ComputeError::ConfigError(
                "tail_estimate_secs must be zero or positive".to_string(),
            ));
        }
        if self.user_top_pages == 0 || self.global_top_pages == 0 {
            return Err(ComputeError::ConfigError(
                "top page counts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
