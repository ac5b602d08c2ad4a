//! Event store abstraction
//!
//! The store holds the append-only page-view log. Reads never assume the
//! stored order is chronological; every query that promises ordering sorts
//! explicitly, breaking timestamp ties by insertion order.

mod memory;
mod sqlite;

pub use memory::MemoryEventStore;
pub use sqlite::SqliteEventStore;

use crate::error::StoreError;
use crate::types::{NewPageView, PageViewEvent};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Read/write contract of the page-view log
pub trait EventStore: Send + Sync {
    /// Append one view, returning it with its assigned id
    fn insert(&self, view: NewPageView) -> Result<PageViewEvent, StoreError>;

    /// All events of a user, ascending by timestamp
    fn query_by_user(&self, user_id: &str) -> Result<Vec<PageViewEvent>, StoreError>;

    /// Latest events of a user, newest first, optionally limited
    fn recent_for_user(
        &self,
        user_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<PageViewEvent>, StoreError>;

    /// All events of a session, ascending by timestamp
    fn query_by_session(&self, session_id: &str) -> Result<Vec<PageViewEvent>, StoreError>;

    /// Events within inclusive, optional bounds, ascending by timestamp
    fn query_in_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<PageViewEvent>, StoreError>;

    /// Every user id with at least one event, in first-seen order
    fn distinct_users(&self) -> Result<Vec<String>, StoreError>;

    /// Number of stored events
    fn count(&self) -> Result<u64, StoreError>;
}

impl<S: EventStore + ?Sized> EventStore for Arc<S> {
    fn insert(&self, view: NewPageView) -> Result<PageViewEvent, StoreError> {
        (**self).insert(view)
    }

    fn query_by_user(&self, user_id: &str) -> Result<Vec<PageViewEvent>, StoreError> {
        (**self).query_by_user(user_id)
    }

    fn recent_for_user(
        &self,
        user_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<PageViewEvent>, StoreError> {
        (**self).recent_for_user(user_id, limit)
    }

    fn query_by_session(&self, session_id: &str) -> Result<Vec<PageViewEvent>, StoreError> {
        (**self).query_by_session(session_id)
    }

    fn query_in_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<PageViewEvent>, StoreError> {
        (**self).query_in_range(start, end)
    }

    fn distinct_users(&self) -> Result<Vec<String>, StoreError> {
        (**self).distinct_users()
    }

    fn count(&self) -> Result<u64, StoreError> {
        (**self).count()
    }
}

/// Whether `timestamp` falls within inclusive, optional bounds
pub(crate) fn within_range(
    timestamp: DateTime<Utc>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
) -> bool {
    start.map_or(true, |s| timestamp >= s) && end.map_or(true, |e| timestamp <= e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_within_range_inclusive_bounds() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 31, 0, 0, 0).unwrap();

        assert!(within_range(start, Some(start), Some(end)));
        assert!(within_range(end, Some(start), Some(end)));
        assert!(!within_range(end + chrono::Duration::seconds(1), Some(start), Some(end)));
        assert!(within_range(end + chrono::Duration::days(400), Some(start), None));
        assert!(within_range(start - chrono::Duration::days(400), None, None));
    }
}
