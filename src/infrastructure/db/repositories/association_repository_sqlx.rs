use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Row};
use uuid::Uuid;

use super::tag_repository_sqlx::{TAG_COLUMNS, tag_from_row};
use crate::application::ports::association_repository::AssociationRepository;
use crate::domain::tags::tag::{AssociationSort, ContentKind, Tag};
use crate::infrastructure::db::PgPool;

struct LinkTable {
    /// Table of the content rows the links hang off.
    parent: &'static str,
    table: &'static str,
    content_col: &'static str,
    tag_col: &'static str,
}

fn link_table(kind: ContentKind) -> LinkTable {
    match kind {
        ContentKind::Log => LinkTable {
            parent: "logs",
            table: "log_tag_associations",
            content_col: "log_id",
            tag_col: "tag_id",
        },
        ContentKind::Tag => LinkTable {
            parent: "tags",
            table: "tag_tag_associations",
            content_col: "tag_id",
            tag_col: "associated_tag_id",
        },
    }
}

// Serializes replaces of one content, including the first one when no link
// rows exist yet to lock. NO KEY keeps FK checks from other writers unblocked.
fn lock_parent_sql(t: &LinkTable) -> String {
    format!(
        "SELECT id FROM {parent} WHERE id = $1 FOR NO KEY UPDATE",
        parent = t.parent
    )
}

/// Replaces the association set of `content_id` inside the caller's
/// transaction. Statement count is fixed: lock the content row, read prior
/// rows, delete, one UNNEST insert, one UNNEST usage update. Tags kept across
/// the replace keep their original created_at.
pub(crate) async fn replace_in_tx(
    conn: &mut PgConnection,
    kind: ContentKind,
    content_id: Uuid,
    tag_ids: &[Uuid],
) -> anyhow::Result<()> {
    let t = link_table(kind);

    let parent = sqlx::query(&lock_parent_sql(&t))
        .bind(content_id)
        .fetch_optional(&mut *conn)
        .await?;
    if parent.is_none() {
        anyhow::bail!("{} {content_id} does not exist", kind.as_str());
    }

    let prior_rows = sqlx::query(&format!(
        "SELECT {tag} AS tag_id, created_at FROM {table} WHERE {content} = $1",
        tag = t.tag_col,
        table = t.table,
        content = t.content_col,
    ))
    .bind(content_id)
    .fetch_all(&mut *conn)
    .await?;
    let prior: HashMap<Uuid, DateTime<Utc>> = prior_rows
        .iter()
        .map(|r| (r.get("tag_id"), r.get("created_at")))
        .collect();

    sqlx::query(&format!(
        "DELETE FROM {table} WHERE {content} = $1",
        table = t.table,
        content = t.content_col,
    ))
    .bind(content_id)
    .execute(&mut *conn)
    .await?;

    if !tag_ids.is_empty() {
        let orders: Vec<i32> = (0..tag_ids.len() as i32).collect();
        let since: Vec<Option<DateTime<Utc>>> =
            tag_ids.iter().map(|id| prior.get(id).copied()).collect();
        sqlx::query(&format!(
            r#"INSERT INTO {table} ({content}, {tag}, sort_order, created_at)
               SELECT $1, l.tag_id, l.sort_order, COALESCE(l.created_at, now())
               FROM UNNEST($2::uuid[], $3::int[], $4::timestamptz[])
                    AS l(tag_id, sort_order, created_at)"#,
            table = t.table,
            content = t.content_col,
            tag = t.tag_col,
        ))
        .bind(content_id)
        .bind(tag_ids)
        .bind(&orders)
        .bind(&since)
        .execute(&mut *conn)
        .await?;
    }

    let mut deltas: HashMap<Uuid, i64> = HashMap::new();
    for id in prior.keys() {
        *deltas.entry(*id).or_default() -= 1;
    }
    for id in tag_ids {
        *deltas.entry(*id).or_default() += 1;
    }
    deltas.retain(|_, d| *d != 0);
    if !deltas.is_empty() {
        let (ids, amounts): (Vec<Uuid>, Vec<i64>) = deltas.into_iter().unzip();
        sqlx::query(
            r#"UPDATE tags SET usage_count = tags.usage_count + d.delta
               FROM UNNEST($1::uuid[], $2::bigint[]) AS d(id, delta)
               WHERE tags.id = d.id"#,
        )
        .bind(&ids)
        .bind(&amounts)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

pub struct SqlxAssociationRepository {
    pub pool: PgPool,
}

impl SqlxAssociationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssociationRepository for SqlxAssociationRepository {
    async fn replace(
        &self,
        kind: ContentKind,
        content_id: Uuid,
        tag_ids: &[Uuid],
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        replace_in_tx(&mut tx, kind, content_id, tag_ids).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_by_content(
        &self,
        kind: ContentKind,
        content_id: Uuid,
        sort: AssociationSort,
        limit: Option<i64>,
    ) -> anyhow::Result<Vec<Tag>> {
        let l = link_table(kind);
        let order_by = match sort {
            AssociationSort::Order => "a.sort_order ASC",
            AssociationSort::Recent => "a.created_at DESC, a.sort_order ASC",
        };
        let rows = sqlx::query(&format!(
            r#"SELECT {TAG_COLUMNS}
               FROM {table} a
               JOIN tags t ON t.id = a.{tag}
               WHERE a.{content} = $1
               ORDER BY {order_by}
               LIMIT $2"#,
            table = l.table,
            tag = l.tag_col,
            content = l.content_col,
        ))
        .bind(content_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(tag_from_row).collect())
    }

    async fn list_referrers(&self, tag_id: Uuid, limit: i64) -> anyhow::Result<Vec<Tag>> {
        let rows = sqlx::query(&format!(
            r#"SELECT {TAG_COLUMNS}
               FROM tag_tag_associations a
               JOIN tags t ON t.id = a.tag_id
               WHERE a.associated_tag_id = $1
               ORDER BY a.created_at DESC, t.name ASC
               LIMIT $2"#
        ))
        .bind(tag_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(tag_from_row).collect())
    }
}
