//! Transactional event ingestion
//!
//! One beacon produces three writes inside a single transaction: the event
//! row, a batch of daily counter upserts, and a session touch. Any failure
//! rolls all of them back; no partial state is ever observable.

use chrono::Utc;
use sqlx::{Sqlite, Transaction};

use super::{Database, Event, NewEvent};
use crate::enrich::referrer::normalize_referrer;

/// Session inactivity window. A touch pushes `end_time` this far into the
/// future. Fixed by design, not configuration.
pub const SESSION_WINDOW_MS: i64 = 15 * 60 * 1000;

/// One daily counter increment: (category, item) gains `delta` page views
/// on the event's calendar day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollupDelta {
    pub category: &'static str,
    pub item: String,
    pub delta: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl Database {
    /// Ingest one enriched beacon: insert the event row, bump its daily
    /// rollups, and stitch the session - all or nothing.
    pub async fn ingest_event(&self, new: &NewEvent) -> Result<Event, IngestError> {
        if new.site_id <= 0 {
            return Err(IngestError::MissingField("site_id"));
        }
        if new.session_id.is_empty() {
            return Err(IngestError::MissingField("session_id"));
        }
        if new.url.is_empty() {
            return Err(IngestError::MissingField("url"));
        }
        if new.event_type.is_empty() {
            return Err(IngestError::MissingField("event_type"));
        }

        let now = Utc::now();
        let now_ms = now.timestamp_millis();
        let date = now.date_naive().to_string();

        let mut tx = self.pool().begin().await?;

        let event_id = insert_event(&mut tx, new, now_ms).await?;
        upsert_daily_stats(&mut tx, new.site_id, &date, &rollup_deltas(new)).await?;
        touch_session(&mut tx, new, now_ms).await?;

        tx.commit().await?;

        Ok(Event {
            id: event_id,
            site_id: new.site_id,
            session_id: new.session_id.clone(),
            user_id: new.user_id.clone(),
            ip: new.ip.clone(),
            url: new.url.clone(),
            referrer: new.referrer.clone(),
            user_agent: new.user_agent.clone(),
            device: new.device.clone(),
            browser: new.browser.clone(),
            os: new.os.clone(),
            screen: new.screen.clone(),
            is_bot: new.is_bot,
            country: new.country.clone(),
            subdivision: new.subdivision.clone(),
            city: new.city.clone(),
            isp: new.isp.clone(),
            event_type: new.event_type.clone(),
            event_value: new.event_value.clone(),
            created_at: now_ms,
        })
    }
}

/// Derive the per-category counter increments for one event. A request is
/// counted under exactly one of browser/bot (keyed by browser name either
/// way); events carrying a value get an extra event_type tuple.
pub fn rollup_deltas(event: &NewEvent) -> Vec<RollupDelta> {
    let mut deltas = vec![
        RollupDelta {
            category: "url",
            item: event.url.clone(),
            delta: 1,
        },
        RollupDelta {
            category: "referrer",
            item: normalize_referrer(&event.referrer),
            delta: 1,
        },
        RollupDelta {
            category: "os",
            item: event.os.clone(),
            delta: 1,
        },
        RollupDelta {
            category: "device",
            item: event.device.clone(),
            delta: 1,
        },
        RollupDelta {
            category: "country",
            item: country_item(&event.country, &event.subdivision),
            delta: 1,
        },
        RollupDelta {
            category: "isp",
            item: event.isp.clone(),
            delta: 1,
        },
        RollupDelta {
            category: "screen",
            item: event.screen.clone(),
            delta: 1,
        },
        RollupDelta {
            category: if event.is_bot { "bot" } else { "browser" },
            item: event.browser.clone(),
            delta: 1,
        },
    ];
    if !event.event_value.is_empty() {
        deltas.push(RollupDelta {
            category: "event_type",
            item: event.event_value.clone(),
            delta: 1,
        });
    }
    deltas
}

// Explicit separator; bare "CA" and "C"+"A" must not collide.
fn country_item(country: &str, subdivision: &str) -> String {
    if subdivision.is_empty() {
        country.to_string()
    } else {
        format!("{country}-{subdivision}")
    }
}

async fn insert_event(
    tx: &mut Transaction<'_, Sqlite>,
    new: &NewEvent,
    now_ms: i64,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO events (
            site_id, session_id, user_id, ip, url, referrer, user_agent,
            device, browser, os, screen, is_bot,
            country, subdivision, city, isp,
            event_type, event_value, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(new.site_id)
    .bind(&new.session_id)
    .bind(&new.user_id)
    .bind(&new.ip)
    .bind(&new.url)
    .bind(&new.referrer)
    .bind(&new.user_agent)
    .bind(&new.device)
    .bind(&new.browser)
    .bind(&new.os)
    .bind(&new.screen)
    .bind(new.is_bot)
    .bind(&new.country)
    .bind(&new.subdivision)
    .bind(&new.city)
    .bind(&new.isp)
    .bind(&new.event_type)
    .bind(&new.event_value)
    .bind(now_ms)
    .execute(&mut **tx)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Apply a batch of counter increments. Each tuple is a single
/// conflict-resolving statement - never read-then-write - so concurrent
/// ingests of the same (site, date, category, item) cannot lose updates.
pub(crate) async fn upsert_daily_stats(
    tx: &mut Transaction<'_, Sqlite>,
    site_id: i64,
    date: &str,
    deltas: &[RollupDelta],
) -> Result<(), sqlx::Error> {
    for delta in deltas {
        sqlx::query(
            r#"
            INSERT INTO daily_stats (site_id, date, category, item, pv)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (site_id, date, category, item)
            DO UPDATE SET pv = pv + excluded.pv
            "#,
        )
        .bind(site_id)
        .bind(date)
        .bind(delta.category)
        .bind(&delta.item)
        .bind(delta.delta)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

/// Create or extend the session row in one atomic statement. Lookup is by
/// (site_id, session_id) only: an event arriving after the window still
/// extends the same row - clients mint a new session id after inactivity.
async fn touch_session(
    tx: &mut Transaction<'_, Sqlite>,
    new: &NewEvent,
    now_ms: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO sessions (site_id, session_id, user_id, ip, start_time, end_time, pages, duration)
        VALUES (?, ?, ?, ?, ?, ?, 1, 0)
        ON CONFLICT (site_id, session_id) DO UPDATE SET
            pages = sessions.pages + 1,
            end_time = excluded.end_time,
            duration = (excluded.start_time - sessions.start_time) / 1000,
            ip = excluded.ip
        "#,
    )
    .bind(new.site_id)
    .bind(&new.session_id)
    .bind(&new.user_id)
    .bind(&new.ip)
    .bind(now_ms)
    .bind(now_ms + SESSION_WINDOW_MS)
    .execute(&mut **tx)
    .await?;
    Ok(())
}
