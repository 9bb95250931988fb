//! Database schema definitions
//!
//! Timestamps are Unix epoch milliseconds; `daily_stats.date` is a plain
//! `YYYY-MM-DD` calendar day (UTC). All statements are idempotent.

pub const CREATE_SITES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    domain TEXT NOT NULL,
    api_key TEXT NOT NULL UNIQUE,
    created_at BIGINT NOT NULL
)
"#;

pub const CREATE_EVENTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id BIGINT NOT NULL,
    session_id TEXT NOT NULL,
    user_id TEXT NOT NULL DEFAULT '',
    ip TEXT NOT NULL DEFAULT '',
    url TEXT NOT NULL,
    referrer TEXT NOT NULL DEFAULT '',
    user_agent TEXT NOT NULL DEFAULT '',
    device TEXT NOT NULL DEFAULT '',
    browser TEXT NOT NULL DEFAULT '',
    os TEXT NOT NULL DEFAULT '',
    screen TEXT NOT NULL DEFAULT '',
    is_bot INTEGER NOT NULL DEFAULT 0,
    country TEXT NOT NULL DEFAULT '',
    subdivision TEXT NOT NULL DEFAULT '',
    city TEXT NOT NULL DEFAULT '',
    isp TEXT NOT NULL DEFAULT '',
    event_type TEXT NOT NULL,
    event_value TEXT NOT NULL DEFAULT '',
    created_at BIGINT NOT NULL
)
"#;

pub const CREATE_SESSIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id BIGINT NOT NULL,
    session_id TEXT NOT NULL,
    user_id TEXT NOT NULL DEFAULT '',
    ip TEXT NOT NULL DEFAULT '',
    start_time BIGINT NOT NULL,
    end_time BIGINT NOT NULL,
    pages BIGINT NOT NULL DEFAULT 1,
    duration BIGINT NOT NULL DEFAULT 0
)
"#;

pub const CREATE_DAILY_STATS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS daily_stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id BIGINT NOT NULL,
    date TEXT NOT NULL,
    category TEXT NOT NULL,
    item TEXT NOT NULL,
    pv BIGINT NOT NULL DEFAULT 0
)
"#;

// === UNIQUE KEYS (back the conflict-resolving upserts) ===

pub const CREATE_UNIQ_SESSIONS: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS uniq_sessions_site_session ON sessions(site_id, session_id)";

pub const CREATE_UNIQ_DAILY_STATS: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS uniq_daily_stats ON daily_stats(site_id, date, category, item)";

// === COVERING INDEXES (optimized for report queries) ===

// For summary aggregation (PV/UV over a date range, per event type)
pub const CREATE_INDEX_EVENTS_SITE_TYPE_CREATED: &str =
    "CREATE INDEX IF NOT EXISTS idx_events_site_type_created ON events(site_id, event_type, created_at)";

// For the filtered event list
pub const CREATE_INDEX_EVENTS_SITE_CREATED: &str =
    "CREATE INDEX IF NOT EXISTS idx_events_site_created ON events(site_id, created_at)";

// For session drill-down
pub const CREATE_INDEX_EVENTS_SESSION: &str =
    "CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id)";

// For bounce-rate/duration aggregation over session start times
pub const CREATE_INDEX_SESSIONS_SITE_START: &str =
    "CREATE INDEX IF NOT EXISTS idx_sessions_site_start ON sessions(site_id, start_time)";

// For rank queries over the rollup table
pub const CREATE_INDEX_DAILY_STATS_SITE_CAT_DATE: &str =
    "CREATE INDEX IF NOT EXISTS idx_daily_stats_site_cat_date ON daily_stats(site_id, category, date)";
