//! Read-side aggregate queries for dashboards
//!
//! Summary metrics come from raw events/sessions; rank breakdowns read the
//! pre-aggregated daily_stats counters so dashboards never scan the event
//! table per dimension.

use serde::Serialize;

use super::Database;

/// Traffic totals for one site over a date range.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryStats {
    pub site_id: i64,
    pub start_date: String,
    pub end_date: String,
    /// Page views
    pub pv: i64,
    /// Distinct sessions
    pub uv: i64,
    /// Distinct (anonymized) IPs
    pub ip_count: i64,
    /// Custom events
    pub event_count: i64,
    /// Percentage of sessions with exactly one page view
    pub bounce_rate: f64,
    /// Mean session span in seconds
    pub avg_duration: f64,
    pub hourly: Vec<HourlyStat>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HourlyStat {
    pub hour: i64,
    pub count: i64,
}

/// One row of a top-N breakdown.
#[derive(Debug, Clone, Serialize)]
pub struct RankStat {
    pub item: String,
    pub pv: i64,
}

/// Dimensions servable from the rollup table.
pub const RANK_CATEGORIES: &[&str] = &[
    "url",
    "referrer",
    "os",
    "device",
    "country",
    "isp",
    "screen",
    "browser",
    "bot",
    "event_type",
];

impl Database {
    /// PV/UV/IP-count/bounce-rate/avg-duration plus an hourly histogram for
    /// `[start_ms, end_ms)`.
    pub async fn get_summary(
        &self,
        site_id: i64,
        start_date: &str,
        end_date: &str,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<SummaryStats, sqlx::Error> {
        let (pv, uv, ip_count): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(DISTINCT session_id),
                COUNT(DISTINCT ip)
            FROM events
            WHERE site_id = ? AND event_type = 'page_view'
              AND created_at >= ? AND created_at < ?
            "#,
        )
        .bind(site_id)
        .bind(start_ms)
        .bind(end_ms)
        .fetch_one(self.pool())
        .await?;

        let (event_count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM events
            WHERE site_id = ? AND event_type = 'custom'
              AND created_at >= ? AND created_at < ?
            "#,
        )
        .bind(site_id)
        .bind(start_ms)
        .bind(end_ms)
        .fetch_one(self.pool())
        .await?;

        let (session_count, bounce_count, total_duration): (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN pages = 1 THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(duration), 0)
            FROM sessions
            WHERE site_id = ? AND start_time >= ? AND start_time < ?
            "#,
        )
        .bind(site_id)
        .bind(start_ms)
        .bind(end_ms)
        .fetch_one(self.pool())
        .await?;

        let bounce_rate = if session_count > 0 {
            bounce_count as f64 / session_count as f64 * 100.0
        } else {
            0.0
        };
        let avg_duration = if session_count > 0 {
            total_duration as f64 / session_count as f64
        } else {
            0.0
        };

        let rows: Vec<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT CAST(strftime('%H', created_at / 1000, 'unixepoch') AS INTEGER) AS hour,
                   COUNT(*)
            FROM events
            WHERE site_id = ? AND event_type = 'page_view'
              AND created_at >= ? AND created_at < ?
            GROUP BY hour
            ORDER BY hour
            "#,
        )
        .bind(site_id)
        .bind(start_ms)
        .bind(end_ms)
        .fetch_all(self.pool())
        .await?;
        let hourly = rows
            .into_iter()
            .map(|(hour, count)| HourlyStat { hour, count })
            .collect();

        Ok(SummaryStats {
            site_id,
            start_date: start_date.to_string(),
            end_date: end_date.to_string(),
            pv,
            uv,
            ip_count,
            event_count,
            bounce_rate,
            avg_duration,
            hourly,
        })
    }

    /// Top items for one rollup category over an inclusive date range,
    /// ordered by summed page views. Returns the page plus the number of
    /// distinct items.
    pub async fn get_rank(
        &self,
        site_id: i64,
        category: &str,
        start_date: &str,
        end_date: &str,
        page: i64,
        page_size: i64,
    ) -> Result<(Vec<RankStat>, i64), sqlx::Error> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT item, SUM(pv) AS pv
            FROM daily_stats
            WHERE site_id = ? AND category = ? AND date >= ? AND date <= ?
            GROUP BY item
            ORDER BY pv DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(site_id)
        .bind(category)
        .bind(start_date)
        .bind(end_date)
        .bind(page_size)
        .bind((page - 1) * page_size)
        .fetch_all(self.pool())
        .await?;

        let (total,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(DISTINCT item)
            FROM daily_stats
            WHERE site_id = ? AND category = ? AND date >= ? AND date <= ?
            "#,
        )
        .bind(site_id)
        .bind(category)
        .bind(start_date)
        .bind(end_date)
        .fetch_one(self.pool())
        .await?;

        let stats = rows
            .into_iter()
            .map(|(item, pv)| RankStat { item, pv })
            .collect();
        Ok((stats, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_util::test_db;
    use crate::db::{day_start_millis, NewEvent, MILLIS_PER_DAY};
    use chrono::Utc;

    fn pageview(session_id: &str, url: &str) -> NewEvent {
        NewEvent {
            site_id: 1,
            session_id: session_id.to_string(),
            url: url.to_string(),
            event_type: "page_view".to_string(),
            ip: "203.0.113.0".to_string(),
            ..Default::default()
        }
    }

    fn today_range() -> (String, i64, i64) {
        let today = Utc::now().date_naive();
        let start = day_start_millis(today);
        (today.to_string(), start, start + MILLIS_PER_DAY)
    }

    #[tokio::test]
    async fn summary_counts_pv_uv_and_events() {
        let (_dir, db) = test_db().await;

        db.ingest_event(&pageview("s1", "/")).await.unwrap();
        db.ingest_event(&pageview("s1", "/pricing")).await.unwrap();
        db.ingest_event(&pageview("s2", "/")).await.unwrap();
        let mut custom = pageview("s2", "/");
        custom.event_type = "custom".to_string();
        custom.event_value = "signup".to_string();
        db.ingest_event(&custom).await.unwrap();

        let (date, start_ms, end_ms) = today_range();
        let summary = db
            .get_summary(1, &date, &date, start_ms, end_ms)
            .await
            .unwrap();

        assert_eq!(summary.pv, 3);
        assert_eq!(summary.uv, 2);
        assert_eq!(summary.ip_count, 1);
        assert_eq!(summary.event_count, 1);
        assert_eq!(summary.hourly.iter().map(|h| h.count).sum::<i64>(), 3);
    }

    #[tokio::test]
    async fn bounce_rate_is_share_of_single_page_sessions() {
        let (_dir, db) = test_db().await;
        let now = Utc::now().timestamp_millis();

        // 10 sessions, 3 of them bounced (pages = 1)
        for i in 0..10 {
            let pages = if i < 3 { 1 } else { 2 };
            sqlx::query(
                "INSERT INTO sessions (site_id, session_id, start_time, end_time, pages, duration)
                 VALUES (1, ?, ?, ?, ?, 30)",
            )
            .bind(format!("s{i}"))
            .bind(now)
            .bind(now)
            .bind(pages)
            .execute(db.pool())
            .await
            .unwrap();
        }

        let (date, start_ms, end_ms) = today_range();
        let summary = db
            .get_summary(1, &date, &date, start_ms, end_ms)
            .await
            .unwrap();

        assert_eq!(summary.bounce_rate, 30.0);
        assert_eq!(summary.avg_duration, 30.0);
    }

    #[tokio::test]
    async fn empty_site_summary_is_all_zeroes() {
        let (_dir, db) = test_db().await;

        let (date, start_ms, end_ms) = today_range();
        let summary = db
            .get_summary(7, &date, &date, start_ms, end_ms)
            .await
            .unwrap();

        assert_eq!(summary.pv, 0);
        assert_eq!(summary.bounce_rate, 0.0);
        assert_eq!(summary.avg_duration, 0.0);
        assert!(summary.hourly.is_empty());
    }

    #[tokio::test]
    async fn rank_orders_by_rollup_count() {
        let (_dir, db) = test_db().await;

        for _ in 0..3 {
            db.ingest_event(&pageview("s1", "/pricing")).await.unwrap();
        }
        db.ingest_event(&pageview("s1", "/about")).await.unwrap();

        let (date, _, _) = today_range();
        let (stats, total) = db.get_rank(1, "url", &date, &date, 1, 10).await.unwrap();

        assert_eq!(total, 2);
        assert_eq!(stats[0].item, "/pricing");
        assert_eq!(stats[0].pv, 3);
        assert_eq!(stats[1].item, "/about");
        assert_eq!(stats[1].pv, 1);
    }

    #[tokio::test]
    async fn rank_pagination() {
        let (_dir, db) = test_db().await;

        for i in 0..5 {
            db.ingest_event(&pageview("s1", &format!("/page-{i}")))
                .await
                .unwrap();
        }

        let (date, _, _) = today_range();
        let (stats, total) = db.get_rank(1, "url", &date, &date, 2, 2).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(stats.len(), 2);
    }
}
