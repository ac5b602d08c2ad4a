//! Dwell-time estimation
//!
//! Active time is a heuristic, not instrumented duration. Within each session,
//! every gap between consecutive views shorter than the gap threshold counts as
//! active time; longer gaps are treated as idle and dropped without splitting
//! the session. Each session then gets a fixed tail credit for its last page,
//! which has no following view to bound it.

use crate::config::{AveragePolicy, EngagementConfig, GAP_THRESHOLD_SECONDS, TAIL_ESTIMATE_SECONDS};
use crate::reconstruct::SessionMap;
use crate::types::{PageViewEvent, Session};

/// Gap-threshold dwell-time estimator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DwellEstimator {
    gap_threshold_secs: f64,
    tail_estimate_secs: f64,
}

impl Default for DwellEstimator {
    fn default() -> Self {
        Self::new(GAP_THRESHOLD_SECONDS, TAIL_ESTIMATE_SECONDS)
    }
}

impl DwellEstimator {
    pub fn new(gap_threshold_secs: f64, tail_estimate_secs: f64) -> Self {
        Self {
            gap_threshold_secs,
            tail_estimate_secs,
        }
    }

    pub fn from_config(config: &EngagementConfig) -> Self {
        Self::new(config.gap_threshold_secs, config.tail_estimate_secs)
    }

    /// Active seconds of one session whose events are sorted by timestamp
    pub fn session_active_seconds(&self, session: &Session) -> f64 {
        let counted: f64 = session
            .events
            .windows(2)
            .map(|pair| delta_seconds(&pair[0], &pair[1]))
            .filter(|delta| *delta < self.gap_threshold_secs)
            .sum();
        counted + self.tail_estimate_secs
    }

    /// Single total across all sessions
    pub fn estimate_active_seconds(&self, sessions: &SessionMap) -> f64 {
        sessions
            .iter()
            .fold(0.0, |total, session| total + self.session_active_seconds(session))
    }
}

/// Seconds from `earlier` to `later`, at millisecond resolution
fn delta_seconds(earlier: &PageViewEvent, later: &PageViewEvent) -> f64 {
    (later.timestamp - earlier.timestamp).num_milliseconds() as f64 / 1000.0
}

/// Average session duration in whole seconds, or `None` when there are no sessions.
///
/// `RoundedMinutes` rounds the total to minutes before dividing and rounds
/// again, so the result is always a whole number of minutes.
pub fn average_session_seconds(
    total_active_seconds: f64,
    session_count: usize,
    policy: AveragePolicy,
) -> Option<u64> {
    if session_count == 0 {
        return None;
    }
    let sessions = session_count as f64;
    let average = match policy {
        AveragePolicy::Seconds => (total_active_seconds / sessions).round(),
        AveragePolicy::RoundedMinutes => {
            let total_minutes = (total_active_seconds / 60.0).round();
            (total_minutes / sessions).round() * 60.0
        }
    };
    Some(average as u64)
}

/// Average session duration in whole minutes, rounded once from the unrounded
/// average so it never exceeds the rounded total for a single session.
pub fn average_session_minutes(
    total_active_seconds: f64,
    session_count: usize,
    policy: AveragePolicy,
) -> Option<u64> {
    if session_count == 0 {
        return None;
    }
    let sessions = session_count as f64;
    let minutes = match policy {
        AveragePolicy::Seconds => (total_active_seconds / sessions / 60.0).round(),
        AveragePolicy::RoundedMinutes => ((total_active_seconds / 60.0).round() / sessions).round(),
    };
    Some(minutes as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconstruct::reconstruct;
    use crate::reconstruct::tests::event;

    #[test]
    fn test_single_session_with_short_gaps() {
        // home@0, home@60, map@600 -> 60 + 540 + 30 tail
        let events = vec![
            event("s1", "home", 0),
            event("s1", "home", 60),
            event("s1", "map", 600),
        ];
        let sessions = reconstruct(&events);

        let total = DwellEstimator::default().estimate_active_seconds(&sessions);
        assert_eq!(total, 630.0);
        assert_eq!(
            average_session_seconds(total, sessions.len(), AveragePolicy::Seconds),
            Some(630)
        );
    }

    #[test]
    fn test_long_gap_excluded_without_splitting() {
        let events = vec![event("s1", "solo", 0), event("s2", "a", 0), event("s2", "b", 2400)];
        let sessions = reconstruct(&events);

        let total = DwellEstimator::default().estimate_active_seconds(&sessions);
        assert_eq!(sessions.len(), 2);
        assert_eq!(total, 60.0);
        assert_eq!(average_session_seconds(total, 2, AveragePolicy::Seconds), Some(30));
    }

    #[test]
    fn test_gap_exactly_at_threshold_is_idle() {
        let events = vec![event("s1", "a", 0), event("s1", "b", 1800)];
        let total = DwellEstimator::default().estimate_active_seconds(&reconstruct(&events));
        assert_eq!(total, 30.0);

        let events = vec![event("s1", "a", 0), event("s1", "b", 1799)];
        let total = DwellEstimator::default().estimate_active_seconds(&reconstruct(&events));
        assert_eq!(total, 1829.0);
    }

    #[test]
    fn test_unsorted_input_is_sorted_before_deltas() {
        // Naive arrival order would produce negative and oversized deltas
        let events = vec![event("s1", "c", 3000), event("s1", "a", 0), event("s1", "b", 1500)];
        let total = DwellEstimator::default().estimate_active_seconds(&reconstruct(&events));
        assert_eq!(total, 1500.0 + 1500.0 + 30.0);
    }

    #[test]
    fn test_tail_estimate_is_a_floor() {
        let events: Vec<_> = (0..30)
            .map(|i| event(&format!("s{}", i % 4), "p", (i * 977) % 5000))
            .collect();
        let sessions = reconstruct(&events);
        let total = DwellEstimator::default().estimate_active_seconds(&sessions);
        assert!(total >= 30.0 * sessions.len() as f64);
    }

    #[test]
    fn test_all_gaps_idle_yields_exact_tail_total() {
        let events: Vec<_> = (0..12)
            .map(|i| event(&format!("s{}", i % 3), "p", i * 1800))
            .collect();
        let sessions = reconstruct(&events);
        let total = DwellEstimator::default().estimate_active_seconds(&sessions);
        assert_eq!(total, 30.0 * 3.0);
    }

    #[test]
    fn test_sub_second_deltas() {
        let mut second = event("s1", "b", 0);
        second.timestamp += chrono::Duration::milliseconds(1500);
        let events = vec![event("s1", "a", 0), second];
        let total = DwellEstimator::default().estimate_active_seconds(&reconstruct(&events));
        assert_eq!(total, 31.5);
    }

    #[test]
    fn test_custom_thresholds() {
        let events = vec![event("s1", "a", 0), event("s1", "b", 120)];
        let estimator = DwellEstimator::new(60.0, 0.0);
        assert_eq!(estimator.estimate_active_seconds(&reconstruct(&events)), 0.0);
    }

    #[test]
    fn test_average_without_sessions() {
        assert_eq!(average_session_seconds(0.0, 0, AveragePolicy::Seconds), None);
        assert_eq!(average_session_seconds(0.0, 0, AveragePolicy::RoundedMinutes), None);
    }

    #[test]
    fn test_average_policies_differ_on_short_sessions() {
        // Three tail-only sessions: 90s total
        assert_eq!(average_session_seconds(90.0, 3, AveragePolicy::Seconds), Some(30));
        // round(90/60) = 2 minutes, round(2/3) = 1 minute
        assert_eq!(average_session_seconds(90.0, 3, AveragePolicy::RoundedMinutes), Some(60));
    }

    #[test]
    fn test_average_minutes_rounded_once() {
        // 89.6s: rounding to 90s first would give 2m, the total shows 1m
        assert_eq!(average_session_seconds(89.6, 1, AveragePolicy::Seconds), Some(90));
        assert_eq!(average_session_minutes(89.6, 1, AveragePolicy::Seconds), Some(1));
        assert_eq!(average_session_minutes(90.0, 1, AveragePolicy::Seconds), Some(2));
        assert_eq!(average_session_minutes(90.0, 3, AveragePolicy::RoundedMinutes), Some(1));
        assert_eq!(average_session_minutes(0.0, 0, AveragePolicy::Seconds), None);
    }

    #[test]
    fn test_average_rounds_half_up() {
        assert_eq!(average_session_seconds(61.0, 2, AveragePolicy::Seconds), Some(31));
        assert_eq!(average_session_seconds(60.0, 2, AveragePolicy::Seconds), Some(30));
    }
}
