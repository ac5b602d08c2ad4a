//! Bulk import of page views and user rosters
//!
//! Accepts a JSON array or NDJSON (one object per line) of page views whose
//! timestamps are preserved as given.

use crate::error::ComputeError;
use crate::store::EventStore;
use crate::types::{NewPageView, UserProfile};
use serde::Serialize;

/// Parser and loader for page-view exports
pub struct ViewImporter;

impl ViewImporter {
    /// Parse a JSON string containing an array of page views
    pub fn parse_array(json: &str) -> Result<Vec<NewPageView>, ComputeError> {
        let views: Vec<NewPageView> = serde_json::from_str(json)?;
        for (idx, view) in views.iter().enumerate() {
            Self::validate(view)
                .map_err(|e| ComputeError::ParseError(format!("entry {}: {}", idx, e)))?;
        }
        Ok(views)
    }

    /// Parse NDJSON (newline-delimited JSON) containing page views
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<NewPageView>, ComputeError> {
        let mut views = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let view: NewPageView = serde_json::from_str(trimmed).map_err(|e| {
                ComputeError::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
            })?;
            Self::validate(&view).map_err(|e| {
                ComputeError::ParseError(format!("line {}: {}", line_num + 1, e))
            })?;
            views.push(view);
        }
        Ok(views)
    }

    /// Reject views missing an identifier
    pub fn validate(view: &NewPageView) -> Result<(), String> {
        if view.user_id.trim().is_empty() {
            return Err("user_id must not be empty".to_string());
        }
        if view.session_id.trim().is_empty() {
            return Err("session_id must not be empty".to_string());
        }
        if view.page_name.trim().is_empty() {
            return Err("page_name must not be empty".to_string());
        }
        Ok(())
    }

    /// Insert every view. Failed inserts are logged and counted, not retried.
    pub fn import<S: EventStore>(store: &S, views: Vec<NewPageView>) -> ImportReport {
        let mut report = ImportReport::default();
        for view in views {
            match store.insert(view) {
                Ok(_) => report.inserted += 1,
                Err(e) => {
                    log::warn!("failed to import page view: {}", e);
                    report.failed += 1;
                }
            }
        }
        log::info!(
            "imported {} page views ({} failed)",
            report.inserted,
            report.failed
        );
        report
    }

    /// Parse a JSON array of user profiles, ordered by name (id when unnamed)
    pub fn parse_roster(json: &str) -> Result<Vec<UserProfile>, ComputeError> {
        let mut roster: Vec<UserProfile> = serde_json::from_str(json)?;
        roster.sort_by_cached_key(|p| p.name.as_deref().unwrap_or(&p.id).to_lowercase());
        Ok(roster)
    }
}

/// Outcome of a bulk import
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub inserted: usize,
    pub failed: usize,
}
