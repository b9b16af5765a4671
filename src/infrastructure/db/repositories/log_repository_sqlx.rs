use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use super::association_repository_sqlx::replace_in_tx;
use crate::application::ports::log_repository::LogRepository;
use crate::domain::logs::log::{Log, LogPatch, NewLog};
use crate::domain::tags::tag::ContentKind;
use crate::infrastructure::db::PgPool;

const LOG_COLUMNS: &str = "l.id, l.user_id, l.title, l.content_md, l.is_public, l.created_at, l.updated_at";

fn log_from_row(r: &PgRow) -> Log {
    Log {
        id: r.get("id"),
        user_id: r.get("user_id"),
        title: r.get("title"),
        content_md: r.get("content_md"),
        is_public: r.get("is_public"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

pub struct SqlxLogRepository {
    pub pool: PgPool,
}

impl SqlxLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LogRepository for SqlxLogRepository {
    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<Log>> {
        let row = sqlx::query(&format!("SELECT {LOG_COLUMNS} FROM logs l WHERE l.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(log_from_row))
    }

    async fn create_with_tags(&self, log: &NewLog, tag_ids: &[Uuid]) -> anyhow::Result<Log> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!(
            r#"INSERT INTO logs AS l (id, user_id, title, content_md, is_public)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING {LOG_COLUMNS}"#
        ))
        .bind(log.id)
        .bind(log.user_id)
        .bind(&log.title)
        .bind(&log.content_md)
        .bind(log.is_public)
        .fetch_one(&mut *tx)
        .await?;
        replace_in_tx(&mut tx, ContentKind::Log, log.id, tag_ids).await?;
        tx.commit().await?;
        Ok(log_from_row(&row))
    }

    async fn update_with_tags(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: &LogPatch,
        tag_ids: Option<&[Uuid]>,
    ) -> anyhow::Result<Option<Log>> {
        let mut tx = self.pool.begin().await?;
        let (set_title, title) = match &patch.title {
            Some(t) => (true, t.clone()),
            None => (false, None),
        };
        let row = sqlx::query(&format!(
            r#"UPDATE logs AS l SET
                    title = CASE WHEN $3 THEN $4 ELSE l.title END,
                    content_md = COALESCE($5, l.content_md),
                    is_public = COALESCE($6, l.is_public),
                    updated_at = now()
               WHERE l.id = $1 AND l.user_id = $2
               RETURNING {LOG_COLUMNS}"#
        ))
        .bind(id)
        .bind(user_id)
        .bind(set_title)
        .bind(title)
        .bind(&patch.content_md)
        .bind(patch.is_public)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        if let Some(ids) = tag_ids {
            replace_in_tx(&mut tx, ContentKind::Log, id, ids).await?;
        }
        tx.commit().await?;
        Ok(Some(log_from_row(&row)))
    }

    async fn delete_owned(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        let mut tx = self.pool.begin().await?;
        let owned = sqlx::query("SELECT 1 FROM logs WHERE id = $1 AND user_id = $2 FOR UPDATE")
            .bind(id)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if owned.is_none() {
            return Ok(false);
        }
        // Release usage counts before the cascade removes the rows.
        replace_in_tx(&mut tx, ContentKind::Log, id, &[]).await?;
        sqlx::query("DELETE FROM logs WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    async fn list_public_by_tag(&self, tag_id: Uuid, limit: i64) -> anyhow::Result<Vec<Log>> {
        let rows = sqlx::query(&format!(
            r#"SELECT {LOG_COLUMNS}
               FROM log_tag_associations a
               JOIN logs l ON l.id = a.log_id
               WHERE a.tag_id = $1 AND l.is_public
               ORDER BY l.created_at DESC
               LIMIT $2"#
        ))
        .bind(tag_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(log_from_row).collect())
    }
}
