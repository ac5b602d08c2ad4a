//! Engagement aggregation
//!
//! Orchestrates the pipeline per user: store read → session reconstruction →
//! dwell estimation + popularity ranking → summary. Every run is a pure
//! function of the events read; nothing is cached between calls.

use crate::config::EngagementConfig;
use crate::dwell::{average_session_minutes, average_session_seconds, DwellEstimator};
use crate::error::StoreError;
use crate::ranking::{rank, tally};
use crate::reconstruct::reconstruct;
use crate::store::EventStore;
use crate::types::{
    EngagementSummary, GlobalSummary, PageViewEvent, Session, UserProfile, UserReport,
};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;

/// A successfully built report paired with the user it belongs to
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserOutcome {
    pub profile: UserProfile,
    pub report: UserReport,
}

/// Builds per-user and global engagement summaries from an event store
pub struct EngagementAggregator<S> {
    store: S,
    config: EngagementConfig,
    estimator: DwellEstimator,
}

impl<S: EventStore> EngagementAggregator<S> {
    /// Create an aggregator with default settings
    pub fn new(store: S) -> Self {
        Self::with_config(store, EngagementConfig::default())
    }

    pub fn with_config(store: S, config: EngagementConfig) -> Self {
        let estimator = DwellEstimator::from_config(&config);
        Self {
            store,
            config,
            estimator,
        }
    }

    pub fn config(&self) -> &EngagementConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read a user's events and summarize them
    pub fn build_user_report(&self, user_id: &str) -> Result<UserReport, StoreError> {
        let events = self.store.query_by_user(user_id)?;
        Ok(self.summarize_user(user_id, &events))
    }

    /// Summarize an already-fetched event list. Empty input is `NoActivity`.
    pub fn summarize_user(&self, user_id: &str, events: &[PageViewEvent]) -> UserReport {
        if events.is_empty() {
            return UserReport::NoActivity {
                user_id: user_id.to_string(),
            };
        }

        let sessions = reconstruct(events);
        let total_active_seconds = self.estimator.estimate_active_seconds(&sessions);
        let session_count = sessions.len();
        // Non-empty input always yields at least one session
        let policy = self.config.average_policy;
        let average = average_session_seconds(total_active_seconds, session_count, policy)
            .unwrap_or_default();
        let average_minutes = average_session_minutes(total_active_seconds, session_count, policy)
            .unwrap_or_default();
        let top_pages = rank(events, self.config.user_top_pages);

        let preview = self.config.history_preview_sessions;
        let session_histories = sessions.iter().take(preview).map(Session::history).collect();
        let more_sessions = session_count.saturating_sub(preview) as u64;

        log::debug!(
            "user {}: {} views, {} sessions, {:.0}s active",
            user_id,
            events.len(),
            session_count,
            total_active_seconds
        );

        UserReport::Active(EngagementSummary {
            user_id: user_id.to_string(),
            total_views: events.len() as u64,
            session_count: session_count as u64,
            total_active_seconds,
            average_session_seconds: average,
            average_session_minutes: average_minutes,
            top_pages,
            session_histories,
            more_sessions,
        })
    }

    /// Summary across all users within optional inclusive bounds
    pub fn build_global_summary(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<GlobalSummary, StoreError> {
        let events = self.store.query_in_range(start, end)?;
        Ok(self.summarize_global(&events, start, end))
    }

    /// Global counts and ranking. No dwell time is computed at this scope.
    pub fn summarize_global(
        &self,
        events: &[PageViewEvent],
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> GlobalSummary {
        let unique_users: HashSet<&str> = events.iter().map(|e| e.user_id.as_str()).collect();
        let unique_sessions: HashSet<&str> =
            events.iter().map(|e| e.session_id.as_str()).collect();

        GlobalSummary {
            start,
            end,
            total_page_views: events.len() as u64,
            unique_users: unique_users.len() as u64,
            unique_sessions: unique_sessions.len() as u64,
            most_visited_pages: rank(events, self.config.global_top_pages),
            page_views_by_page: tally(events),
        }
    }

    /// One session's events in order; `NotFound` when the session is unknown
    pub fn session_trail(&self, session_id: &str) -> Result<Session, StoreError> {
        let events = self.store.query_by_session(session_id)?;
        reconstruct(&events)
            .into_sessions()
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::NotFound(format!("session {session_id}")))
    }

    /// A user's latest page views, newest first
    pub fn recent_activity(
        &self,
        user_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<PageViewEvent>, StoreError> {
        self.store.recent_for_user(user_id, limit)
    }

    /// Every user with recorded activity
    pub fn roster(&self) -> Result<Vec<UserProfile>, StoreError> {
        Ok(self
            .store
            .distinct_users()?
            .into_iter()
            .map(UserProfile::from_id)
            .collect())
    }

    /// Build reports for many users in parallel.
    ///
    /// A read failure for one user is logged and that user is skipped; the
    /// rest of the batch still completes.
    pub fn build_all_user_reports(&self, users: &[UserProfile]) -> Vec<UserOutcome> {
        let outcomes: Vec<UserOutcome> = users
            .par_iter()
            .filter_map(|profile| match self.build_user_report(&profile.id) {
                Ok(report) => Some(UserOutcome {
                    profile: profile.clone(),
                    report,
                }),
                Err(e) => {
                    log::warn!("skipping user {}: {}", profile.id, e);
                    None
                }
            })
            .collect();

        log::info!(
            "built {} of {} user reports",
            outcomes.len(),
            users.len()
        );
        outcomes
    }
}
