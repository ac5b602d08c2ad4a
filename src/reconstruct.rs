//! Session reconstruction
//!
//! Groups events by session id and orders each group chronologically.
//! Sessions are demarcated by their id alone, never by elapsed time.

use crate::types::{PageViewEvent, Session};
use std::collections::HashMap;

/// Sessions keyed by id, iterated in the order each id was first encountered
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionMap {
    sessions: Vec<Session>,
    index: HashMap<String, usize>,
}

impl SessionMap {
    /// Number of distinct session ids
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn get(&self, session_id: &str) -> Option<&Session> {
        self.index.get(session_id).map(|&i| &self.sessions[i])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Session> {
        self.sessions.iter()
    }

    /// Number of events across all sessions
    pub fn total_events(&self) -> usize {
        self.sessions.iter().map(Session::len).sum()
    }

    pub fn into_sessions(self) -> Vec<Session> {
        self.sessions
    }
}

impl<'a> IntoIterator for &'a SessionMap {
    type Item = &'a Session;
    type IntoIter = std::slice::Iter<'a, Session>;

    fn into_iter(self) -> Self::IntoIter {
        self.sessions.iter()
    }
}

/// Group events by session id and sort every group ascending by timestamp.
///
/// The sort is stable, so events sharing a timestamp keep their input order.
pub fn reconstruct(events: &[PageViewEvent]) -> SessionMap {
    let mut map = SessionMap::default();
    let SessionMap { sessions, index } = &mut map;

    for event in events {
        let slot = *index.entry(event.session_id.clone()).or_insert_with(|| {
            sessions.push(Session {
                session_id: event.session_id.clone(),
                events: Vec::new(),
            });
            sessions.len() - 1
        });
        sessions[slot].events.push(event.clone());
    }

    for session in sessions.iter_mut() {
        session.events.sort_by_key(|e| e.timestamp);
    }

    log::debug!(
        "reconstructed {} sessions from {} events",
        map.len(),
        events.len()
    );
    map
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    pub(crate) fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap()
    }

    pub(crate) fn event(session: &str, page: &str, secs: i64) -> PageViewEvent {
        PageViewEvent {
            id: format!("{session}-{page}-{secs}"),
            user_id: "user-1".to_string(),
            session_id: session.to_string(),
            page_name: page.to_string(),
            referrer_page: None,
            timestamp: base_time() + chrono::Duration::seconds(secs),
        }
    }

    fn pages(session: &Session) -> Vec<&str> {
        session.events.iter().map(|e| e.page_name.as_str()).collect()
    }

    #[test]
    fn test_empty_input() {
        let map = reconstruct(&[]);
        assert!(map.is_empty());
        assert_eq!(map.total_events(), 0);
    }

    #[test]
    fn test_groups_by_session_and_sorts() {
        let events = vec![
            event("s1", "map", 600),
            event("s2", "solo", 30),
            event("s1", "home", 0),
            event("s1", "projects", 60),
        ];

        let map = reconstruct(&events);
        assert_eq!(map.len(), 2);
        assert_eq!(map.total_events(), 4);
        assert_eq!(pages(map.get("s1").unwrap()), vec!["home", "projects", "map"]);
        assert_eq!(pages(map.get("s2").unwrap()), vec!["solo"]);
    }

    #[test]
    fn test_iteration_follows_first_appearance() {
        let events = vec![
            event("late", "a", 5000),
            event("early", "b", 0),
            event("late", "c", 10),
        ];

        let map = reconstruct(&events);
        let order: Vec<&str> = map.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(order, vec!["late", "early"]);
    }

    #[test]
    fn test_timestamp_ties_keep_input_order() {
        let events = vec![
            event("s1", "second", 10),
            event("s1", "third", 10),
            event("s1", "first", 0),
        ];

        let map = reconstruct(&events);
        assert_eq!(pages(map.get("s1").unwrap()), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_session_count_matches_distinct_ids() {
        let events: Vec<PageViewEvent> = (0..20)
            .map(|i| event(&format!("s{}", i % 7), "page", i * 13))
            .collect();

        let map = reconstruct(&events);
        assert_eq!(map.len(), 7);
        assert_eq!(map.total_events(), 20);
    }
}
