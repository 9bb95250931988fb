//! Site management and per-site stats clearing

use chrono::Utc;
use uuid::Uuid;

use super::{Database, Site};

impl Database {
    /// Create a site and mint its API key.
    pub async fn create_site(&self, name: &str, domain: &str) -> Result<Site, sqlx::Error> {
        let api_key = Uuid::new_v4().to_string();
        let created_at = Utc::now().timestamp_millis();

        let result =
            sqlx::query("INSERT INTO sites (name, domain, api_key, created_at) VALUES (?, ?, ?, ?)")
                .bind(name)
                .bind(domain)
                .bind(&api_key)
                .bind(created_at)
                .execute(&self.pool)
                .await?;

        Ok(Site {
            id: result.last_insert_rowid(),
            name: name.to_string(),
            domain: domain.to_string(),
            api_key,
            created_at,
        })
    }

    pub async fn get_site(&self, id: i64) -> Result<Option<Site>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM sites WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// Paginated site list, optionally filtered by a name/domain substring.
    pub async fn list_sites(
        &self,
        page: i64,
        page_size: i64,
        name: Option<&str>,
    ) -> Result<(Vec<Site>, i64), sqlx::Error> {
        let pattern = name.map(|n| format!("%{n}%"));

        let (total,): (i64,) = match &pattern {
            Some(pattern) => {
                sqlx::query_as("SELECT COUNT(*) FROM sites WHERE name LIKE ? OR domain LIKE ?")
                    .bind(pattern)
                    .bind(pattern)
                    .fetch_one(&self.pool)
                    .await?
            }
            None => {
                sqlx::query_as("SELECT COUNT(*) FROM sites")
                    .fetch_one(&self.pool)
                    .await?
            }
        };

        let offset = (page - 1) * page_size;
        let sites: Vec<Site> = match &pattern {
            Some(pattern) => {
                sqlx::query_as(
                    "SELECT * FROM sites WHERE name LIKE ? OR domain LIKE ?
                     ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(pattern)
                .bind(pattern)
                .bind(page_size)
                .bind(offset)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as("SELECT * FROM sites ORDER BY created_at DESC LIMIT ? OFFSET ?")
                    .bind(page_size)
                    .bind(offset)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok((sites, total))
    }

    /// Hard-delete all events, sessions and daily rollups for one site in a
    /// single transaction. The site row itself is untouched.
    pub async fn clear_site_stats(&self, site_id: i64) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM events WHERE site_id = ?")
            .bind(site_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM sessions WHERE site_id = ?")
            .bind(site_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM daily_stats WHERE site_id = ?")
            .bind(site_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Delete a site together with everything it owns.
    pub async fn delete_site(&self, site_id: i64) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM events WHERE site_id = ?")
            .bind(site_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM sessions WHERE site_id = ?")
            .bind(site_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM daily_stats WHERE site_id = ?")
            .bind(site_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM sites WHERE id = ?")
            .bind(site_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_util::test_db;
    use crate::db::NewEvent;

    async fn count(db: &Database, table: &str, site_id: i64) -> i64 {
        let (n,): (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM {table} WHERE site_id = ?"))
                .bind(site_id)
                .fetch_one(db.pool())
                .await
                .unwrap();
        n
    }

    fn pageview(site_id: i64) -> NewEvent {
        NewEvent {
            site_id,
            session_id: "s1".to_string(),
            url: "/".to_string(),
            event_type: "page_view".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_and_get_site() {
        let (_dir, db) = test_db().await;

        let site = db.create_site("Blog", "blog.example.com").await.unwrap();
        assert!(!site.api_key.is_empty());

        let fetched = db.get_site(site.id).await.unwrap().unwrap();
        assert_eq!(fetched.domain, "blog.example.com");
        assert_eq!(fetched.api_key, site.api_key);

        assert!(db.get_site(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_sites_filters_by_name() {
        let (_dir, db) = test_db().await;

        db.create_site("Blog", "blog.example.com").await.unwrap();
        db.create_site("Shop", "shop.example.com").await.unwrap();

        let (all, total) = db.list_sites(1, 20, None).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(all.len(), 2);

        let (filtered, total) = db.list_sites(1, 20, Some("blog")).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(filtered[0].name, "Blog");
    }

    #[tokio::test]
    async fn clear_stats_removes_data_but_keeps_site() {
        let (_dir, db) = test_db().await;

        let site = db.create_site("Blog", "blog.example.com").await.unwrap();
        db.ingest_event(&pageview(site.id)).await.unwrap();
        db.ingest_event(&pageview(site.id)).await.unwrap();
        // Another site's data must survive the clear
        db.ingest_event(&pageview(site.id + 1)).await.unwrap();

        db.clear_site_stats(site.id).await.unwrap();

        assert_eq!(count(&db, "events", site.id).await, 0);
        assert_eq!(count(&db, "sessions", site.id).await, 0);
        assert_eq!(count(&db, "daily_stats", site.id).await, 0);
        assert!(db.get_site(site.id).await.unwrap().is_some());

        assert_eq!(count(&db, "events", site.id + 1).await, 1);
    }

    #[tokio::test]
    async fn delete_site_removes_everything() {
        let (_dir, db) = test_db().await;

        let site = db.create_site("Blog", "blog.example.com").await.unwrap();
        db.ingest_event(&pageview(site.id)).await.unwrap();

        db.delete_site(site.id).await.unwrap();

        assert!(db.get_site(site.id).await.unwrap().is_none());
        assert_eq!(count(&db, "events", site.id).await, 0);
    }
}
