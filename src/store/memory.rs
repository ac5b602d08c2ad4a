//! In-process event store

use super::{within_range, EventStore};
use crate::error::StoreError;
use crate::types::{NewPageView, PageViewEvent};
use chrono::{DateTime, Utc};
use std::sync::{RwLock, RwLockReadGuard};
use uuid::Uuid;

/// Append-only log kept in memory, in insertion order
#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: RwLock<Vec<PageViewEvent>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with already-identified events (e.g. a replayed export)
    pub fn from_events(events: Vec<PageViewEvent>) -> Self {
        Self {
            events: RwLock::new(events),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<PageViewEvent>>, StoreError> {
        self.events
            .read()
            .map_err(|_| StoreError::Unavailable("event log lock poisoned".to_string()))
    }

    fn select_sorted<F>(&self, keep: F) -> Result<Vec<PageViewEvent>, StoreError>
    where
        F: Fn(&PageViewEvent) -> bool,
    {
        let mut selected: Vec<PageViewEvent> =
            self.read()?.iter().filter(|e| keep(e)).cloned().collect();
        // Stable: equal timestamps keep insertion order
        selected.sort_by_key(|e| e.timestamp);
        Ok(selected)
    }
}

impl EventStore for MemoryEventStore {
    fn insert(&self, view: NewPageView) -> Result<PageViewEvent, StoreError> {
        let event = view.into_event(Uuid::new_v4().to_string());
        self.events
            .write()
            .map_err(|_| StoreError::Unavailable("event log lock poisoned".to_string()))?
            .push(event.clone());
        Ok(event)
    }

    fn query_by_user(&self, user_id: &str) -> Result<Vec<PageViewEvent>, StoreError> {
        self.select_sorted(|e| e.user_id == user_id)
    }

    fn recent_for_user(
        &self,
        user_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<PageViewEvent>, StoreError> {
        let mut events: Vec<PageViewEvent> = self
            .read()?
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = limit {
            events.truncate(limit);
        }
        Ok(events)
    }

    fn query_by_session(&self, session_id: &str) -> Result<Vec<PageViewEvent>, StoreError> {
        self.select_sorted(|e| e.session_id == session_id)
    }

    fn query_in_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<PageViewEvent>, StoreError> {
        self.select_sorted(|e| within_range(e.timestamp, start, end))
    }

    fn distinct_users(&self) -> Result<Vec<String>, StoreError> {
        let events = self.read()?;
        let mut users: Vec<String> = Vec::new();
        for event in events.iter() {
            if !users.contains(&event.user_id) {
                users.push(event.user_id.clone());
            }
        }
        Ok(users)
    }

    fn count(&self) -> Result<u64, StoreError> {
        Ok(self.read()?.len() as u64)
    }
}
