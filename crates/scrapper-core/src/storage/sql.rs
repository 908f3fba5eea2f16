//! Raw-SQL `LinkStorage`: string literals with `$1`, `$2`, ... positional
//! placeholders executed over a shared `deadpool_postgres` pool.
//!
//! Grounded on the original service's `sql_service.go`: same upsert-then-lookup
//! shape for `AddLink`, same transaction boundary, same join shape for
//! `GetTags`/`GetFilters`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use tracing::error;

use crate::error::StorageError;
use crate::models::{LinkResponse, LinkRow};

use super::LinkStorage;

pub struct SqlLinkStorage {
    pool: Pool,
}

impl SqlLinkStorage {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LinkStorage for SqlLinkStorage {
    async fn create_chat(&self, user_tg_id: i64) -> Result<(), StorageError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO users (telegram_id) VALUES ($1) ON CONFLICT (telegram_id) DO NOTHING",
                &[&user_tg_id],
            )
            .await
            .map_err(|e| StorageError::CreateChat(e.to_string()))?;
        Ok(())
    }

    async fn delete_chat(&self, user_tg_id: i64) -> Result<(), StorageError> {
        let client = self.pool.get().await?;
        client
            .execute("DELETE FROM users WHERE telegram_id = $1", &[&user_tg_id])
            .await
            .map_err(|e| StorageError::DeleteChat(e.to_string()))?;
        Ok(())
    }

    async fn chat_exists(&self, user_tg_id: i64) -> Result<bool, StorageError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT id FROM users WHERE telegram_id = $1",
                &[&user_tg_id],
            )
            .await?;
        Ok(row.is_some())
    }

    async fn add_link(
        &self,
        user_tg_id: i64,
        url: &str,
        tags: &[String],
        filters: &[String],
    ) -> Result<(), StorageError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let user_row = tx
            .query_opt(
                "SELECT id FROM users WHERE telegram_id = $1",
                &[&user_tg_id],
            )
            .await?;
        let Some(user_row) = user_row else {
            return Err(StorageError::ChatNotFound);
        };
        let user_id: i64 = user_row.get(0);

        tx.execute(
            "INSERT INTO links (url, changed_at) VALUES ($1, now()) ON CONFLICT (url) DO NOTHING",
            &[&url],
        )
        .await?;
        let link_row = tx
            .query_one("SELECT id FROM links WHERE url = $1", &[&url])
            .await?;
        let link_id: i64 = link_row.get(0);

        let inserted = tx
            .execute(
                "INSERT INTO link_users (user_id, link_id) VALUES ($1, $2) ON CONFLICT (user_id, link_id) DO NOTHING",
                &[&user_id, &link_id],
            )
            .await?;
        if inserted == 0 {
            return Err(StorageError::LinkAlreadyExists);
        }

        for tag in tags {
            tx.execute(
                "INSERT INTO tags (name) VALUES ($1) ON CONFLICT (name) DO NOTHING",
                &[tag],
            )
            .await?;
            let tag_row = tx.query_one("SELECT id FROM tags WHERE name = $1", &[tag]).await?;
            let tag_id: i64 = tag_row.get(0);
            tx.execute(
                "INSERT INTO link_tags (link_id, tag_id, user_id) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
                &[&link_id, &tag_id, &user_id],
            )
            .await?;
        }

        for filter in filters {
            tx.execute(
                "INSERT INTO filters (name) VALUES ($1) ON CONFLICT (name) DO NOTHING",
                &[filter],
            )
            .await?;
            let filter_row = tx
                .query_one("SELECT id FROM filters WHERE name = $1", &[filter])
                .await?;
            let filter_id: i64 = filter_row.get(0);
            tx.execute(
                "INSERT INTO link_filters (link_id, filter_id, user_id) VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
                &[&link_id, &filter_id, &user_id],
            )
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn remove_link(&self, user_tg_id: i64, url: &str) -> Result<(), StorageError> {
        let client = self.pool.get().await?;
        let affected = client
            .execute(
                "DELETE FROM link_users \
                 WHERE user_id = (SELECT id FROM users WHERE telegram_id = $1) \
                 AND link_id = (SELECT id FROM links WHERE url = $2)",
                &[&user_tg_id, &url],
            )
            .await
            .map_err(|e| StorageError::RemoveLink(e.to_string()))?;

        if affected == 0 {
            return Err(StorageError::LinkNotFound);
        }

        // Garbage-collect the link if it has no remaining subscribers. The
        // monitor tolerates either outcome (spec §9).
        if let Err(e) = client
            .execute(
                "DELETE FROM links WHERE url = $1 AND id NOT IN (SELECT link_id FROM link_users)",
                &[&url],
            )
            .await
        {
            error!("link gc for {url}: {e}");
        }

        Ok(())
    }

    async fn get_links(&self, user_tg_id: i64) -> Result<Vec<LinkResponse>, StorageError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT l.id, l.url, l.changed_at \
                 FROM links l \
                 JOIN link_users lu ON l.id = lu.link_id \
                 JOIN users u ON u.id = lu.user_id \
                 WHERE u.telegram_id = $1 \
                 ORDER BY l.id",
                &[&user_tg_id],
            )
            .await?;

        let mut links: Vec<LinkResponse> = rows
            .iter()
            .map(|row| LinkResponse {
                id: row.get(0),
                url: row.get(1),
                tags: Vec::new(),
                filters: Vec::new(),
                last_checked: row.get(2),
                last_version: String::new(),
            })
            .collect();

        let tag_rows = client
            .query(
                "SELECT lt.link_id, t.name \
                 FROM tags t \
                 JOIN link_tags lt ON lt.tag_id = t.id \
                 JOIN link_users lu ON lt.link_id = lu.link_id \
                 JOIN users u ON u.id = lu.user_id \
                 WHERE u.telegram_id = $1 AND lt.user_id = u.id",
                &[&user_tg_id],
            )
            .await?;
        let filter_rows = client
            .query(
                "SELECT lf.link_id, f.name \
                 FROM filters f \
                 JOIN link_filters lf ON lf.filter_id = f.id \
                 JOIN link_users lu ON lf.link_id = lu.link_id \
                 JOIN users u ON u.id = lu.user_id \
                 WHERE u.telegram_id = $1 AND lf.user_id = u.id",
                &[&user_tg_id],
            )
            .await?;

        for link in &mut links {
            link.tags = tag_rows
                .iter()
                .filter(|r| r.get::<_, i64>(0) == link.id)
                .map(|r| r.get(1))
                .collect();
            link.filters = filter_rows
                .iter()
                .filter(|r| r.get::<_, i64>(0) == link.id)
                .map(|r| r.get(1))
                .collect();
        }

        Ok(links)
    }

    async fn delete_tag(&self, user_tg_id: i64, tag: &str) -> Result<(), StorageError> {
        let client = self.pool.get().await?;
        let affected = client
            .execute(
                "DELETE FROM link_tags \
                 WHERE user_id = (SELECT id FROM users WHERE telegram_id = $1) \
                 AND tag_id = (SELECT id FROM tags WHERE name = $2)",
                &[&user_tg_id, &tag],
            )
            .await?;
        if affected == 0 {
            return Err(StorageError::TagNotFound);
        }
        Ok(())
    }

    async fn is_url_in_added(&self, user_tg_id: i64, url: &str) -> Result<bool, StorageError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                "SELECT EXISTS ( \
                   SELECT 1 FROM link_users lu \
                   JOIN users u ON u.id = lu.user_id \
                   JOIN links l ON l.id = lu.link_id \
                   WHERE u.telegram_id = $1 AND l.url = $2 \
                 )",
                &[&user_tg_id, &url],
            )
            .await?;
        Ok(row.get(0))
    }

    async fn get_batch_of_links(
        &self,
        batch_size: i64,
        after_id: i64,
    ) -> Result<(Vec<LinkRow>, i64), StorageError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT id, url, changed_at FROM links WHERE id > $1 ORDER BY id LIMIT $2",
                &[&after_id, &batch_size],
            )
            .await?;

        let mut new_after_id = after_id;
        let links: Vec<LinkRow> = rows
            .iter()
            .map(|row| {
                let link = LinkRow {
                    id: row.get(0),
                    url: row.get(1),
                    changed_at: row.get(2),
                };
                new_after_id = link.id;
                link
            })
            .collect();

        Ok((links, new_after_id))
    }

    async fn get_previous_update(&self, link_id: i64) -> Result<DateTime<Utc>, StorageError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one("SELECT changed_at FROM links WHERE id = $1", &[&link_id])
            .await?;
        Ok(row.get(0))
    }

    async fn save_last_update(&self, link_id: i64, ts: DateTime<Utc>) -> Result<(), StorageError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "UPDATE links SET changed_at = $1 WHERE id = $2",
                &[&ts, &link_id],
            )
            .await?;
        Ok(())
    }

    async fn get_tg_chat_ids_for_link(&self, url: &str) -> Result<Vec<i64>, StorageError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT u.telegram_id \
                 FROM users u \
                 JOIN link_users lu ON u.id = lu.user_id \
                 JOIN links l ON l.id = lu.link_id \
                 WHERE l.url = $1",
                &[&url],
            )
            .await?;
        Ok(rows.iter().map(|r| r.get(0)).collect())
    }
}
