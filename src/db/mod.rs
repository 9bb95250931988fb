//! Database module

mod schema;

pub mod ingest;
pub mod reports;
pub mod sites;

use std::str::FromStr;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqliteSynchronous};
use sqlx::{Pool, QueryBuilder, Sqlite, SqlitePool};

use crate::config::DatabaseConfig;

pub const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// A tracked website. The tenancy boundary: every event, session and rollup
/// row is scoped by `site_id`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Site {
    pub id: i64,
    pub name: String,
    pub domain: String,
    pub api_key: String,
    pub created_at: i64,
}

/// One stored tracked action (pageview or custom event). Immutable once
/// created; removed only by the per-site clear-stats operation.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Event {
    pub id: i64,
    pub site_id: i64,
    pub session_id: String,
    pub user_id: String,
    /// Stored in anonymized form only (/24 for IPv4, /64 for IPv6).
    pub ip: String,
    pub url: String,
    pub referrer: String,
    pub user_agent: String,
    pub device: String,
    pub browser: String,
    pub os: String,
    pub screen: String,
    pub is_bot: bool,
    pub country: String,
    pub subdivision: String,
    pub city: String,
    pub isp: String,
    pub event_type: String,
    pub event_value: String,
    pub created_at: i64,
}

/// A fully enriched beacon, ready for the ingestion pipeline.
#[derive(Debug, Clone, Default)]
pub struct NewEvent {
    pub site_id: i64,
    pub session_id: String,
    pub user_id: String,
    pub ip: String,
    pub url: String,
    pub referrer: String,
    pub user_agent: String,
    pub device: String,
    pub browser: String,
    pub os: String,
    pub screen: String,
    pub is_bot: bool,
    pub country: String,
    pub subdivision: String,
    pub city: String,
    pub isp: String,
    pub event_type: String,
    pub event_value: String,
}

/// One visit window per (site_id, session_id). `end_time` is the rolling
/// expiry (`last touch + window`), `duration` the span since `start_time`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Session {
    pub id: i64,
    pub site_id: i64,
    pub session_id: String,
    pub user_id: String,
    pub ip: String,
    pub start_time: i64,
    pub end_time: i64,
    pub pages: i64,
    pub duration: i64,
}

/// Filters and pagination for the event list endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventQuery {
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub ip: Option<String>,
    pub url: Option<String>,
    pub device: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub event_type: Option<String>,
    pub is_bot: Option<bool>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub page_size: i64,
}

impl EventQuery {
    /// Normalized pagination: page >= 1, page_size in 1..=100 (default 20).
    pub fn page_bounds(&self) -> (i64, i64) {
        clamp_pagination(self.page, self.page_size, 20)
    }
}

/// page >= 1; page_size defaults to `default_size` and is capped at 100.
pub fn clamp_pagination(page: i64, page_size: i64, default_size: i64) -> (i64, i64) {
    let page = if page < 1 { 1 } else { page };
    let page_size = match page_size {
        n if n < 1 => default_size,
        n if n > 100 => 100,
        n => n,
    };
    (page, page_size)
}

/// Parse a calendar date; accepts `2026-08-08`, `2026/08/08` and
/// `20260808`, ignoring any time suffix.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let raw = if raw.len() > 10 {
        raw.get(..10).unwrap_or(raw)
    } else {
        raw
    };
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%Y%m%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }
    None
}

/// Epoch milliseconds at UTC midnight of `date`.
pub fn day_start_millis(date: NaiveDate) -> i64 {
    date.and_time(NaiveTime::MIN).and_utc().timestamp_millis()
}

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        // Options apply per pool connection; WAL keeps readers from
        // blocking the ingestion writers.
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", config.url))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePool::connect_with(options).await?;
        Ok(Self { pool })
    }

    pub(crate) fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        for statement in [
            schema::CREATE_SITES_TABLE,
            schema::CREATE_EVENTS_TABLE,
            schema::CREATE_SESSIONS_TABLE,
            schema::CREATE_DAILY_STATS_TABLE,
            schema::CREATE_UNIQ_SESSIONS,
            schema::CREATE_UNIQ_DAILY_STATS,
            schema::CREATE_INDEX_EVENTS_SITE_TYPE_CREATED,
            schema::CREATE_INDEX_EVENTS_SITE_CREATED,
            schema::CREATE_INDEX_EVENTS_SESSION,
            schema::CREATE_INDEX_SESSIONS_SITE_START,
            schema::CREATE_INDEX_DAILY_STATS_SITE_CAT_DATE,
        ] {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Filtered, paginated event list for one site, newest first.
    pub async fn list_events(
        &self,
        site_id: i64,
        query: &EventQuery,
    ) -> Result<(Vec<Event>, i64), sqlx::Error> {
        let (page, page_size) = query.page_bounds();

        let mut count_builder = QueryBuilder::new("SELECT COUNT(*) FROM events");
        push_event_filters(&mut count_builder, site_id, query);
        let (total,): (i64,) = count_builder
            .build_query_as()
            .fetch_one(&self.pool)
            .await?;

        let mut list_builder = QueryBuilder::new("SELECT * FROM events");
        push_event_filters(&mut list_builder, site_id, query);
        list_builder
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(page_size)
            .push(" OFFSET ")
            .push_bind((page - 1) * page_size);
        let events: Vec<Event> = list_builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await?;

        Ok((events, total))
    }
}

fn push_event_filters<'a>(
    builder: &mut QueryBuilder<'a, Sqlite>,
    site_id: i64,
    query: &'a EventQuery,
) {
    builder.push(" WHERE site_id = ").push_bind(site_id);

    if let Some(session_id) = &query.session_id {
        builder.push(" AND session_id = ").push_bind(session_id);
    }
    if let Some(user_id) = &query.user_id {
        builder.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(ip) = &query.ip {
        builder.push(" AND ip = ").push_bind(ip);
    }
    if let Some(url) = &query.url {
        builder.push(" AND url LIKE ").push_bind(format!("%{url}%"));
    }
    if let Some(device) = &query.device {
        builder.push(" AND device = ").push_bind(device);
    }
    if let Some(browser) = &query.browser {
        builder.push(" AND browser = ").push_bind(browser);
    }
    if let Some(os) = &query.os {
        builder.push(" AND os = ").push_bind(os);
    }
    if let Some(event_type) = &query.event_type {
        builder.push(" AND event_type = ").push_bind(event_type);
    }
    if let Some(is_bot) = query.is_bot {
        builder.push(" AND is_bot = ").push_bind(is_bot);
    }
    // Unparseable dates skip the filter rather than failing the query
    if let Some(start) = query.start_date.as_deref().and_then(parse_date) {
        builder
            .push(" AND created_at >= ")
            .push_bind(day_start_millis(start));
    }
    if let Some(end) = query.end_date.as_deref().and_then(parse_date) {
        builder
            .push(" AND created_at < ")
            .push_bind(day_start_millis(end) + MILLIS_PER_DAY);
    }
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::Database;
    use crate::config::DatabaseConfig;
    use tempfile::TempDir;

    /// Fresh migrated database backed by a scratch file. The TempDir must
    /// outlive the Database.
    pub async fn test_db() -> (TempDir, Database) {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("test.db");
        let config = DatabaseConfig {
            url: path.to_string_lossy().into_owned(),
        };
        let db = Database::new(&config).await.expect("open database");
        db.run_migrations().await.expect("run migrations");
        (dir, db)
    }
}

#[cfg(test)]
mod tests {
    use super::test_util::test_db;
    use super::*;

    #[test]
    fn page_bounds_clamped() {
        let query = EventQuery {
            page: 0,
            page_size: 500,
            ..Default::default()
        };
        assert_eq!(query.page_bounds(), (1, 100));

        let query = EventQuery {
            page: -3,
            page_size: 0,
            ..Default::default()
        };
        assert_eq!(query.page_bounds(), (1, 20));

        let query = EventQuery {
            page: 4,
            page_size: 50,
            ..Default::default()
        };
        assert_eq!(query.page_bounds(), (4, 50));
    }

    #[test]
    fn parse_date_accepts_common_formats() {
        let expected = NaiveDate::from_ymd_opt(2026, 8, 8).unwrap();
        assert_eq!(parse_date("2026-08-08"), Some(expected));
        assert_eq!(parse_date("2026/08/08"), Some(expected));
        assert_eq!(parse_date("20260808"), Some(expected));
        assert_eq!(parse_date("2026-08-08 13:45:00"), Some(expected));
        assert_eq!(parse_date("yesterday"), None);
        assert_eq!(parse_date(""), None);
    }

    #[tokio::test]
    async fn list_events_filters_and_paginates() {
        let (_dir, db) = test_db().await;

        for i in 0..5 {
            let event = NewEvent {
                site_id: 1,
                session_id: format!("s{i}"),
                url: if i % 2 == 0 { "/pricing" } else { "/about" }.to_string(),
                device: "Desktop".to_string(),
                event_type: "page_view".to_string(),
                ..Default::default()
            };
            db.ingest_event(&event).await.unwrap();
        }
        // Different site must never be visible through site 1's listing
        let other = NewEvent {
            site_id: 2,
            session_id: "other".to_string(),
            url: "/pricing".to_string(),
            event_type: "page_view".to_string(),
            ..Default::default()
        };
        db.ingest_event(&other).await.unwrap();

        let (events, total) = db.list_events(1, &EventQuery::default()).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(events.len(), 5);

        let query = EventQuery {
            url: Some("pric".to_string()),
            ..Default::default()
        };
        let (events, total) = db.list_events(1, &query).await.unwrap();
        assert_eq!(total, 3);
        assert!(events.iter().all(|e| e.url == "/pricing"));

        let query = EventQuery {
            page: 2,
            page_size: 2,
            ..Default::default()
        };
        let (events, total) = db.list_events(1, &query).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(events.len(), 2);
    }
}
