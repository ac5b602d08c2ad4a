//! SQLite-backed event store

use super::EventStore;
use crate::error::StoreError;
use crate::types::{NewPageView, PageViewEvent};
use chrono::{DateTime, SubsecRound, Utc};
use rusqlite::{params, Connection, Params, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

pub const SCHEMA_VERSION: i32 = 1;

const SELECT_COLUMNS: &str =
    "SELECT id, user_id, session_id, page_name, referrer_page, timestamp_ms FROM user_page_views";

/// Create tables if they do not exist yet
fn create_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        -- Append-only page-view log
        CREATE TABLE IF NOT EXISTS user_page_views (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            session_id TEXT NOT NULL,
            page_name TEXT NOT NULL,
            referrer_page TEXT,
            timestamp_ms INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_views_user ON user_page_views(user_id, timestamp_ms);
        CREATE INDEX IF NOT EXISTS idx_views_session ON user_page_views(session_id, timestamp_ms);
        CREATE INDEX IF NOT EXISTS idx_views_timestamp ON user_page_views(timestamp_ms);
        "#,
    )?;
    conn.execute(
        "INSERT OR REPLACE INTO meta (key, value) VALUES ('version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

/// Raw table row before timestamp conversion
struct PageViewRow {
    id: String,
    user_id: String,
    session_id: String,
    page_name: String,
    referrer_page: Option<String>,
    timestamp_ms: i64,
}

impl PageViewRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            session_id: row.get(2)?,
            page_name: row.get(3)?,
            referrer_page: row.get(4)?,
            timestamp_ms: row.get(5)?,
        })
    }

    fn into_event(self) -> Result<PageViewEvent, StoreError> {
        let timestamp = DateTime::<Utc>::from_timestamp_millis(self.timestamp_ms).ok_or_else(|| {
            StoreError::QueryFailed(format!(
                "event {} has out-of-range timestamp {}",
                self.id, self.timestamp_ms
            ))
        })?;
        Ok(PageViewEvent {
            id: self.id,
            user_id: self.user_id,
            session_id: self.session_id,
            page_name: self.page_name,
            referrer_page: self.referrer_page,
            timestamp,
        })
    }
}

/// Page-view log persisted in a SQLite database
pub struct SqliteEventStore {
    conn: Mutex<Connection>,
}

impl SqliteEventStore {
    /// Open (or create) a database file
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| {
            StoreError::Unavailable(format!("cannot open {}: {}", path.display(), e))
        })?;

        // WAL lets report runs read while recorders write
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Self::with_connection(conn)
    }

    /// Private database that disappears with the store
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        create_tables(&conn).map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("connection lock poisoned".to_string()))
    }

    fn query_events<P: Params>(
        &self,
        filter: &str,
        params: P,
    ) -> Result<Vec<PageViewEvent>, StoreError> {
        let conn = self.lock()?;
        let sql = format!("{SELECT_COLUMNS} {filter}");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params, PageViewRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(PageViewRow::into_event).collect()
    }
}

impl EventStore for SqliteEventStore {
    fn insert(&self, view: NewPageView) -> Result<PageViewEvent, StoreError> {
        let mut event = view.into_event(Uuid::new_v4().to_string());
        // Stored at millisecond resolution; return what a read would
        event.timestamp = event.timestamp.trunc_subsecs(3);
        self.lock()?.execute(
            "INSERT INTO user_page_views
                 (id, user_id, session_id, page_name, referrer_page, timestamp_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.id,
                event.user_id,
                event.session_id,
                event.page_name,
                event.referrer_page,
                event.timestamp.timestamp_millis(),
            ],
        )?;
        Ok(event)
    }

    fn query_by_user(&self, user_id: &str) -> Result<Vec<PageViewEvent>, StoreError> {
        self.query_events(
            "WHERE user_id = ?1 ORDER BY timestamp_ms ASC, rowid ASC",
            params![user_id],
        )
    }

    fn recent_for_user(
        &self,
        user_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<PageViewEvent>, StoreError> {
        // Negative LIMIT means unbounded
        let limit = limit.map_or(-1, |l| l as i64);
        self.query_events(
            "WHERE user_id = ?1 ORDER BY timestamp_ms DESC, rowid DESC LIMIT ?2",
            params![user_id, limit],
        )
    }

    fn query_by_session(&self, session_id: &str) -> Result<Vec<PageViewEvent>, StoreError> {
        self.query_events(
            "WHERE session_id = ?1 ORDER BY timestamp_ms ASC, rowid ASC",
            params![session_id],
        )
    }

    fn query_in_range(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<PageViewEvent>, StoreError> {
        self.query_events(
            "WHERE (?1 IS NULL OR timestamp_ms >= ?1) AND (?2 IS NULL OR timestamp_ms <= ?2)
             ORDER BY timestamp_ms ASC, rowid ASC",
            params![
                start.map(|t| t.timestamp_millis()),
                end.map(|t| t.timestamp_millis())
            ],
        )
    }

    fn distinct_users(&self) -> Result<Vec<String>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT user_id FROM user_page_views GROUP BY user_id ORDER BY MIN(rowid) ASC",
        )?;
        let users = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    fn count(&self) -> Result<u64, StoreError> {
        let count: i64 =
            self.lock()?
                .query_row("SELECT COUNT(*) FROM user_page_views", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    fn view(user: &str, session: &str, page: &str, secs: i64) -> NewPageView {
        NewPageView {
            user_id: user.to_string(),
            session_id: session.to_string(),
            page_name: page.to_string(),
            referrer_page: None,
            timestamp: at(secs),
        }
    }

    fn pages(events: &[PageViewEvent]) -> Vec<&str> {
        events.iter().map(|e| e.page_name.as_str()).collect()
    }

    #[test]
    fn test_insert_and_read_back() {
        let store = SqliteEventStore::open_in_memory().unwrap();
        let mut new_view = view("u1", "s1", "map", 60);
        new_view.referrer_page = Some("home".to_string());

        let inserted = store.insert(new_view).unwrap();
        let events = store.query_by_user("u1").unwrap();

        assert_eq!(events, vec![inserted]);
        assert_eq!(events[0].referrer_page.as_deref(), Some("home"));
        assert_eq!(events[0].timestamp, at(60));
    }

    #[test]
    fn test_insert_truncates_to_milliseconds() {
        let store = SqliteEventStore::open_in_memory().unwrap();
        let mut new_view = view("u1", "s1", "home", 0);
        new_view.timestamp = at(0) + chrono::Duration::microseconds(1_234_567);

        let inserted = store.insert(new_view).unwrap();
        assert_eq!(inserted.timestamp, at(0) + chrono::Duration::milliseconds(1_234));
        assert_eq!(store.query_by_session("s1").unwrap(), vec![inserted]);
    }

    #[test]
    fn test_ordering_and_ties() {
        let store = SqliteEventStore::open_in_memory().unwrap();
        store.insert(view("u1", "s1", "late", 600)).unwrap();
        store.insert(view("u1", "s1", "tie-a", 60)).unwrap();
        store.insert(view("u1", "s1", "tie-b", 60)).unwrap();
        store.insert(view("u1", "s1", "first", 0)).unwrap();

        let by_session = store.query_by_session("s1").unwrap();
        assert_eq!(pages(&by_session), vec!["first", "tie-a", "tie-b", "late"]);

        let recent = store.recent_for_user("u1", Some(3)).unwrap();
        assert_eq!(pages(&recent), vec!["late", "tie-b", "tie-a"]);
        assert_eq!(store.recent_for_user("u1", None).unwrap().len(), 4);
    }

    #[test]
    fn test_range_bounds_are_optional_and_inclusive() {
        let store = SqliteEventStore::open_in_memory().unwrap();
        store.insert(view("u1", "s1", "a", 0)).unwrap();
        store.insert(view("u2", "s2", "b", 100)).unwrap();
        store.insert(view("u1", "s3", "c", 200)).unwrap();

        let all = store.query_in_range(None, None).unwrap();
        assert_eq!(all.len(), 3);

        let bounded = store.query_in_range(Some(at(100)), Some(at(200))).unwrap();
        assert_eq!(pages(&bounded), vec!["b", "c"]);

        let open_end = store.query_in_range(Some(at(150)), None).unwrap();
        assert_eq!(pages(&open_end), vec!["c"]);
    }

    #[test]
    fn test_distinct_users_and_count() {
        let store = SqliteEventStore::open_in_memory().unwrap();
        store.insert(view("zoe", "s1", "a", 50)).unwrap();
        store.insert(view("adam", "s2", "b", 0)).unwrap();
        store.insert(view("zoe", "s1", "c", 70)).unwrap();

        assert_eq!(store.distinct_users().unwrap(), vec!["zoe", "adam"]);
        assert_eq!(store.count().unwrap(), 3);
    }

    #[test]
    fn test_open_file_database_persists() {
        let path = std::env::temp_dir().join(format!("engagement-flux-{}.db", Uuid::new_v4()));
        {
            let store = SqliteEventStore::open(&path).unwrap();
            store.insert(view("u1", "s1", "home", 0)).unwrap();
        }
        let reopened = SqliteEventStore::open(&path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);

        drop(reopened);
        let _ = std::fs::remove_file(&path);
    }
}
