//! Core data types for Engagement Flux
//!
//! Page-view events are the only persisted entity. Everything else in this
//! module is derived per report run and discarded afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single recorded navigation. Write-once; never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageViewEvent {
    /// Unique identifier assigned by the store at insertion
    pub id: String,
    /// Opaque identifier of the acting user
    pub user_id: String,
    /// Token grouping events from one continuous browsing session
    pub session_id: String,
    /// Logical page/view identifier
    pub page_name: String,
    /// Previously viewed page, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer_page: Option<String>,
    /// When the view occurred
    pub timestamp: DateTime<Utc>,
}

/// A page view that has not been assigned an id yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPageView {
    pub user_id: String,
    pub session_id: String,
    pub page_name: String,
    #[serde(default)]
    pub referrer_page: Option<String>,
    /// Defaults to the moment of deserialization when absent
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl NewPageView {
    /// Build a view stamped with the current time
    pub fn now(
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        page_name: impl Into<String>,
        referrer_page: Option<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            page_name: page_name.into(),
            referrer_page,
            timestamp: Utc::now(),
        }
    }

    /// Attach the store-assigned id
    pub fn into_event(self, id: String) -> PageViewEvent {
        PageViewEvent {
            id,
            user_id: self.user_id,
            session_id: self.session_id,
            page_name: self.page_name,
            referrer_page: self.referrer_page,
            timestamp: self.timestamp,
        }
    }
}

/// A session id plus its events sorted ascending by timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub session_id: String,
    pub events: Vec<PageViewEvent>,
}

impl Session {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Timestamp of the earliest event
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.events.first().map(|e| e.timestamp)
    }

    /// Timestamp of the latest event
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.events.last().map(|e| e.timestamp)
    }

    /// Ordered page trail for display
    pub fn history(&self) -> SessionHistory {
        SessionHistory {
            session_id: self.session_id.clone(),
            entries: self
                .events
                .iter()
                .map(|e| HistoryEntry {
                    page_name: e.page_name.clone(),
                    timestamp: e.timestamp,
                })
                .collect(),
        }
    }
}

/// A page and how many times it was viewed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCount {
    pub page_name: String,
    pub count: u64,
}

/// One step of a session trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub page_name: String,
    pub timestamp: DateTime<Utc>,
}

/// Ordered page sequence of one session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionHistory {
    pub session_id: String,
    pub entries: Vec<HistoryEntry>,
}

/// Engagement summary for a single user with at least one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementSummary {
    pub user_id: String,
    /// Number of page views
    pub total_views: u64,
    /// Number of distinct session ids
    pub session_count: u64,
    /// Estimated active time across all sessions
    pub total_active_seconds: f64,
    /// Average per session, rounded to a whole second
    pub average_session_seconds: u64,
    /// Average per session, rounded once to a whole minute
    pub average_session_minutes: u64,
    /// Most viewed pages, descending
    pub top_pages: Vec<PageCount>,
    /// Preview of the first few sessions
    pub session_histories: Vec<SessionHistory>,
    /// Sessions not included in the preview
    pub more_sessions: u64,
}

impl EngagementSummary {
    /// Total active time rounded to whole minutes
    pub fn total_active_minutes(&self) -> u64 {
        (self.total_active_seconds / 60.0).round() as u64
    }
}

/// Result of a per-user report. Absence of activity is not a zeroed summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UserReport {
    NoActivity { user_id: String },
    Active(EngagementSummary),
}

impl UserReport {
    pub fn user_id(&self) -> &str {
        match self {
            UserReport::NoActivity { user_id } => user_id,
            UserReport::Active(summary) => &summary.user_id,
        }
    }

    pub fn summary(&self) -> Option<&EngagementSummary> {
        match self {
            UserReport::NoActivity { .. } => None,
            UserReport::Active(summary) => Some(summary),
        }
    }
}

/// Summary across all users within an optional time window
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
    pub total_page_views: u64,
    pub unique_users: u64,
    pub unique_sessions: u64,
    /// Top pages, descending
    pub most_visited_pages: Vec<PageCount>,
    /// Full tally in first-seen order
    pub page_views_by_page: Vec<PageCount>,
}

/// A user known to the reporting roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub office: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl UserProfile {
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            email: None,
            office: None,
            role: None,
        }
    }

    /// Whether the profile carries roster details beyond the id
    pub fn has_details(&self) -> bool {
        self.office.is_some() || self.role.is_some()
    }

    /// Display label: `name (email)`, falling back to the id
    pub fn label(&self) -> String {
        match (&self.name, &self.email) {
            (Some(name), Some(email)) => format!("{name} ({email})"),
            (Some(name), None) => name.clone(),
            (None, Some(email)) => format!("{} ({email})", self.id),
            (None, None) => self.id.clone(),
        }
    }
}
