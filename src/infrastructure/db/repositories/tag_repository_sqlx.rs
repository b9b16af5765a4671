use async_trait::async_trait;
use sqlx::Row;
use sqlx::postgres::PgRow;
use uuid::Uuid;

use super::association_repository_sqlx::replace_in_tx;
use crate::application::ports::tag_repository::{TagRepository, TagWriteError};
use crate::domain::tags::tag::{ContentKind, NewTag, Tag, TagPatch, name_key};
use crate::infrastructure::db::PgPool;

/// Tag columns, selected through the alias `t`.
pub(crate) const TAG_COLUMNS: &str = "t.id, t.name, t.description, t.metadata, t.created_by, \
     t.created_at, t.updated_at, t.usage_count";

pub(crate) fn tag_from_row(r: &PgRow) -> Tag {
    Tag {
        id: r.get("id"),
        name: r.get("name"),
        description: r.get("description"),
        metadata: r.get("metadata"),
        created_by: r.get("created_by"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
        usage_count: r.get("usage_count"),
    }
}

fn write_error(e: sqlx::Error) -> TagWriteError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return TagWriteError::NameConflict;
        }
    }
    TagWriteError::Storage(e.into())
}

pub struct SqlxTagRepository {
    pub pool: PgPool,
}

impl SqlxTagRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TagRepository for SqlxTagRepository {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Tag>> {
        let row = sqlx::query(&format!("SELECT {TAG_COLUMNS} FROM tags t WHERE t.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(tag_from_row))
    }

    async fn find_by_name(&self, name: &str) -> anyhow::Result<Option<Tag>> {
        let row = sqlx::query(&format!(
            "SELECT {TAG_COLUMNS} FROM tags t WHERE lower(t.name) = $1"
        ))
        .bind(name_key(name))
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(tag_from_row))
    }

    async fn find_by_names(&self, keys: &[String]) -> anyhow::Result<Vec<Tag>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(&format!(
            "SELECT {TAG_COLUMNS} FROM tags t WHERE lower(t.name) = ANY($1)"
        ))
        .bind(keys)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(tag_from_row).collect())
    }

    async fn insert_batch(&self, tags: &[NewTag]) -> Result<Vec<Tag>, TagWriteError> {
        if tags.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = tags.iter().map(|t| t.id).collect();
        let names: Vec<String> = tags.iter().map(|t| t.name.clone()).collect();
        let descriptions: Vec<Option<String>> =
            tags.iter().map(|t| t.description.clone()).collect();
        let metadata: Vec<serde_json::Value> = tags.iter().map(|t| t.metadata.clone()).collect();
        let owners: Vec<Uuid> = tags.iter().map(|t| t.created_by).collect();

        // Names taken by a concurrent writer are skipped; the caller re-reads them.
        let rows = sqlx::query(&format!(
            r#"INSERT INTO tags AS t (id, name, description, metadata, created_by)
               SELECT * FROM UNNEST($1::uuid[], $2::text[], $3::text[], $4::jsonb[], $5::uuid[])
               ON CONFLICT ((lower(name))) DO NOTHING
               RETURNING {TAG_COLUMNS}"#
        ))
        .bind(&ids)
        .bind(&names)
        .bind(&descriptions)
        .bind(&metadata)
        .bind(&owners)
        .fetch_all(&self.pool)
        .await
        .map_err(write_error)?;
        Ok(rows.iter().map(tag_from_row).collect())
    }

    async fn create_with_tags(
        &self,
        tag: &NewTag,
        tag_ids: &[Uuid],
    ) -> Result<Tag, TagWriteError> {
        let mut tx = self.pool.begin().await.map_err(write_error)?;
        let row = sqlx::query(&format!(
            r#"INSERT INTO tags AS t (id, name, description, metadata, created_by)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT ((lower(name))) DO NOTHING
               RETURNING {TAG_COLUMNS}"#
        ))
        .bind(tag.id)
        .bind(&tag.name)
        .bind(&tag.description)
        .bind(&tag.metadata)
        .bind(tag.created_by)
        .fetch_optional(&mut *tx)
        .await
        .map_err(write_error)?;
        let Some(row) = row else {
            return Err(TagWriteError::NameConflict);
        };
        replace_in_tx(&mut tx, ContentKind::Tag, tag.id, tag_ids).await?;
        tx.commit().await.map_err(write_error)?;
        Ok(tag_from_row(&row))
    }

    async fn update_with_tags(
        &self,
        id: Uuid,
        patch: &TagPatch,
        tag_ids: Option<&[Uuid]>,
    ) -> Result<Option<Tag>, TagWriteError> {
        let mut tx = self.pool.begin().await.map_err(write_error)?;
        let (set_description, description) = match &patch.description {
            Some(d) => (true, d.clone()),
            None => (false, None),
        };
        let row = sqlx::query(&format!(
            r#"UPDATE tags AS t SET
                    name = COALESCE($2, t.name),
                    description = CASE WHEN $3 THEN $4 ELSE t.description END,
                    metadata = COALESCE($5, t.metadata),
                    updated_at = now()
               WHERE t.id = $1
               RETURNING {TAG_COLUMNS}"#
        ))
        .bind(id)
        .bind(&patch.name)
        .bind(set_description)
        .bind(description)
        .bind(&patch.metadata)
        .fetch_optional(&mut *tx)
        .await
        .map_err(write_error)?;
        let Some(row) = row else {
            return Ok(None);
        };
        if let Some(ids) = tag_ids {
            replace_in_tx(&mut tx, ContentKind::Tag, id, ids).await?;
        }
        tx.commit().await.map_err(write_error)?;
        Ok(Some(tag_from_row(&row)))
    }

    async fn search(&self, query: Option<&str>, limit: i64) -> anyhow::Result<Vec<Tag>> {
        let like = query.map(|q| format!("%{}%", q.trim()));
        let rows = sqlx::query(&format!(
            r#"SELECT {TAG_COLUMNS} FROM tags t
               WHERE ($1::text IS NULL OR t.name ILIKE $1)
               ORDER BY t.usage_count DESC, t.name ASC
               LIMIT $2"#
        ))
        .bind(like)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(tag_from_row).collect())
    }
}
