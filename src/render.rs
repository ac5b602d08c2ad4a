//! Textual report rendering
//!
//! Produces the human-readable form of per-user and global reports. The text
//! layout is for people, not machines; use [`crate::encoder`] for JSON.

use crate::aggregator::UserOutcome;
use crate::error::ComputeError;
use crate::types::{
    EngagementSummary, GlobalSummary, PageCount, SessionHistory, UserProfile, UserReport,
};
use chrono::{DateTime, FixedOffset, Local, Offset, Utc};
use std::fmt::Write;

const ARROW: &str = " →";

/// Renders reports as markdown-flavoured text with times in a fixed offset
pub struct TextRenderer {
    offset: FixedOffset,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self::local()
    }
}

impl TextRenderer {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    /// Use the machine's current local offset
    pub fn local() -> Self {
        Self::new(Local::now().offset().fix())
    }

    /// Render one user's report under the profile's display label
    pub fn render_user(&self, profile: &UserProfile, report: &UserReport) -> String {
        let mut out = String::new();
        match report {
            UserReport::NoActivity { .. } => {
                let _ = writeln!(out, "{}: No activity yet", profile.label());
                let _ = writeln!(out);
            }
            UserReport::Active(summary) => {
                self.write_summary(&mut out, profile, summary);
                let _ = writeln!(out, "\n---\n");
            }
        }
        out
    }

    /// Render a batch in the order given
    pub fn render_batch(&self, outcomes: &[UserOutcome]) -> String {
        outcomes
            .iter()
            .map(|o| self.render_user(&o.profile, &o.report))
            .collect()
    }

    pub fn render_global(&self, summary: &GlobalSummary) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "## Global Summary");
        let window = match (summary.start, summary.end) {
            (None, None) => "all time".to_string(),
            (start, end) => format!(
                "{} .. {}",
                start.map_or("beginning".to_string(), |s| s.to_rfc3339()),
                end.map_or("now".to_string(), |e| e.to_rfc3339())
            ),
        };
        let _ = writeln!(out, "\n**Window:** {window}");
        let _ = writeln!(out, "- Total Page Views: {}", summary.total_page_views);
        let _ = writeln!(out, "- Unique Users: {}", summary.unique_users);
        let _ = writeln!(out, "- Unique Sessions: {}", summary.unique_sessions);
        write_top_pages(&mut out, &summary.most_visited_pages);
        out
    }

    pub fn offset(&self) -> &FixedOffset {
        &self.offset
    }

    /// Clock time in the renderer's offset, e.g. `2:05:09 PM`
    pub fn format_time(&self, timestamp: DateTime<Utc>) -> String {
        timestamp
            .with_timezone(&self.offset)
            .format("%-I:%M:%S %p")
            .to_string()
    }

    fn write_summary(&self, out: &mut String, profile: &UserProfile, summary: &EngagementSummary) {
        let _ = writeln!(out, "#### {}", profile.label());
        let _ = writeln!(out, "\n**Summary:**");
        let _ = writeln!(out, "- Total Page Views: {}", summary.total_views);
        let _ = writeln!(out, "- Sessions: {}", summary.session_count);
        let _ = writeln!(out, "- Total Time Spent: {}m", summary.total_active_minutes());
        let _ = writeln!(
            out,
            "- Average Session Duration: {}m",
            summary.average_session_minutes
        );
        if profile.has_details() {
            let office = profile.office.as_deref().unwrap_or("Not specified");
            let role = profile.role.as_deref().unwrap_or("Not specified");
            let _ = writeln!(out, "- Office: {office}");
            let _ = writeln!(out, "- Role: {role}");
        }

        write_top_pages(out, &summary.top_pages);

        if !summary.session_histories.is_empty() {
            let _ = writeln!(out, "\n**Travel History:**");
            for (idx, history) in summary.session_histories.iter().enumerate() {
                self.write_history(out, idx + 1, history);
            }
        }
        if summary.more_sessions > 0 {
            let _ = writeln!(out, "\n_...and {} more sessions_", summary.more_sessions);
        }
    }

    fn write_history(&self, out: &mut String, number: usize, history: &SessionHistory) {
        let _ = writeln!(out, "\nSession {number}:");
        let last = history.entries.len().saturating_sub(1);
        for (idx, entry) in history.entries.iter().enumerate() {
            let time = self.format_time(entry.timestamp);
            let arrow = if idx < last { ARROW } else { "" };
            let _ = writeln!(out, "  {}. {} ({}){}", idx + 1, entry.page_name, time, arrow);
        }
    }
}

fn write_top_pages(out: &mut String, pages: &[PageCount]) {
    let _ = writeln!(out, "\n**Most Visited Pages:**");
    for page in pages {
        let _ = writeln!(out, "- {}: {} visits", page.page_name, page.count);
    }
}

/// Parse `Z`, `+HH:MM`, `-HH:MM` or `+HHMM` into a fixed offset
pub fn parse_utc_offset(value: &str) -> Result<FixedOffset, ComputeError> {
    let invalid = || ComputeError::ParseError(format!("invalid UTC offset: {value}"));
    let value = value.trim();
    if value.eq_ignore_ascii_case("z") || value.eq_ignore_ascii_case("utc") {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, rest) = if let Some(rest) = value.strip_prefix('+') {
        (1, rest)
    } else if let Some(rest) = value.strip_prefix('-') {
        (-1, rest)
    } else {
        return Err(invalid());
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
    if minutes >= 60 {
        return Err(invalid());
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HistoryEntry, UserProfile};
    use chrono::TimeZone;

    fn utc_renderer() -> TextRenderer {
        TextRenderer::new(FixedOffset::east_opt(0).unwrap())
    }

    fn sample_summary() -> EngagementSummary {
        let base = Utc.with_ymd_and_hms(2024, 1, 15, 14, 0, 0).unwrap();
        EngagementSummary {
            user_id: "u1".to_string(),
            total_views: 3,
            session_count: 4,
            total_active_seconds: 630.0,
            average_session_seconds: 158,
            average_session_minutes: 3,
            top_pages: vec![
                PageCount {
                    page_name: "home".to_string(),
                    count: 2,
                },
                PageCount {
                    page_name: "map".to_string(),
                    count: 1,
                },
            ],
            session_histories: vec![SessionHistory {
                session_id: "s1".to_string(),
                entries: vec![
                    HistoryEntry {
                        page_name: "home".to_string(),
                        timestamp: base,
                    },
                    HistoryEntry {
                        page_name: "map".to_string(),
                        timestamp: base + chrono::Duration::seconds(600),
                    },
                ],
            }],
            more_sessions: 3,
        }
    }

    fn ada() -> UserProfile {
        UserProfile {
            id: "u1".to_string(),
            name: Some("Ada".to_string()),
            email: Some("ada@example.com".to_string()),
            office: None,
            role: None,
        }
    }

    #[test]
    fn test_render_active_user() {
        let report = UserReport::Active(sample_summary());
        let text = utc_renderer().render_user(&ada(), &report);

        assert!(text.starts_with("#### Ada (ada@example.com)\n"));
        assert!(text.contains("- Total Page Views: 3\n"));
        assert!(text.contains("- Sessions: 4\n"));
        assert!(text.contains("- Total Time Spent: 11m\n"));
        assert!(text.contains("- Average Session Duration: 3m\n"));
        assert!(text.contains("- home: 2 visits\n"));
        assert!(text.contains("Session 1:\n  1. home (2:00:00 PM) →\n  2. map (2:10:00 PM)\n"));
        assert!(text.contains("_...and 3 more sessions_"));
        assert!(!text.contains("- Office:"));
    }

    #[test]
    fn test_render_roster_details() {
        let profile = UserProfile {
            role: Some("Researcher".to_string()),
            ..ada()
        };
        let text = utc_renderer().render_user(&profile, &UserReport::Active(sample_summary()));
        assert!(text.contains(
            "- Average Session Duration: 3m\n- Office: Not specified\n- Role: Researcher\n"
        ));
    }

    #[test]
    fn test_more_sessions_note_without_preview() {
        let summary = EngagementSummary {
            session_histories: vec![],
            more_sessions: 4,
            ..sample_summary()
        };
        let text = utc_renderer().render_user(&ada(), &UserReport::Active(summary));
        assert!(!text.contains("**Travel History:**"));
        assert!(text.contains("_...and 4 more sessions_"));
    }

    #[test]
    fn test_render_average_not_above_total() {
        let summary = EngagementSummary {
            session_count: 1,
            total_active_seconds: 89.6,
            average_session_seconds: 90,
            average_session_minutes: 1,
            more_sessions: 0,
            ..sample_summary()
        };
        let text = utc_renderer().render_user(&ada(), &UserReport::Active(summary));
        assert!(text.contains("- Total Time Spent: 1m\n"));
        assert!(text.contains("- Average Session Duration: 1m\n"));
    }

    #[test]
    fn test_render_no_activity() {
        let report = UserReport::NoActivity {
            user_id: "u2".to_string(),
        };
        let text = utc_renderer().render_user(&UserProfile::from_id("u2"), &report);
        assert_eq!(text, "u2: No activity yet\n\n");
    }

    #[test]
    fn test_render_respects_offset() {
        let renderer = TextRenderer::new(parse_utc_offset("-05:00").unwrap());
        let text = renderer.render_user(&ada(), &UserReport::Active(sample_summary()));
        assert!(text.contains("1. home (9:00:00 AM) →"));
    }

    #[test]
    fn test_render_batch_uses_profile_labels() {
        let outcomes = vec![UserOutcome {
            profile: UserProfile {
                name: Some("Grace".to_string()),
                ..UserProfile::from_id("u9")
            },
            report: UserReport::NoActivity {
                user_id: "u9".to_string(),
            },
        }];
        assert_eq!(utc_renderer().render_batch(&outcomes), "Grace: No activity yet\n\n");
    }

    #[test]
    fn test_render_global() {
        let summary = GlobalSummary {
            start: None,
            end: None,
            total_page_views: 5,
            unique_users: 2,
            unique_sessions: 3,
            most_visited_pages: vec![PageCount {
                page_name: "home".to_string(),
                count: 3,
            }],
            page_views_by_page: vec![],
        };
        let text = utc_renderer().render_global(&summary);
        assert!(text.contains("**Window:** all time"));
        assert!(text.contains("- Unique Sessions: 3"));
        assert!(text.contains("- home: 3 visits"));
    }

    #[test]
    fn test_format_time_twelve_hour_clock() {
        let renderer = TextRenderer::new(parse_utc_offset("+02:00").unwrap());
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 22, 5, 9).unwrap();
        assert_eq!(renderer.format_time(ts), "12:05:09 AM");
    }

    #[test]
    fn test_parse_utc_offset() {
        assert_eq!(parse_utc_offset("Z").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_utc_offset("+05:30").unwrap().local_minus_utc(), 19800);
        assert_eq!(parse_utc_offset("-0800").unwrap().local_minus_utc(), -28800);
        assert!(parse_utc_offset("05:00").is_err());
        assert!(parse_utc_offset("+5").is_err());
        assert!(parse_utc_offset("+05:75").is_err());
    }
}
