use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::tags::tag::{AssociationSort, ContentKind, Tag};

#[async_trait]
pub trait AssociationRepository: Send + Sync {
    /// Drops every association of `content_id` and inserts `tag_ids` with their
    /// positions as order, adjusting usage counts by the net change. Runs as one
    /// transaction with a fixed number of statements.
    async fn replace(
        &self,
        kind: ContentKind,
        content_id: Uuid,
        tag_ids: &[Uuid],
    ) -> anyhow::Result<()>;

    async fn list_by_content(
        &self,
        kind: ContentKind,
        content_id: Uuid,
        sort: AssociationSort,
        limit: Option<i64>,
    ) -> anyhow::Result<Vec<Tag>>;

    /// Tags whose description references `tag_id`, newest association first.
    async fn list_referrers(&self, tag_id: Uuid, limit: i64) -> anyhow::Result<Vec<Tag>>;
}
