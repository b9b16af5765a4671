use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::logs::log::{Log, LogPatch, NewLog};

#[async_trait]
pub trait LogRepository: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<Log>>;

    /// Inserts the log and its associations in a single transaction.
    async fn create_with_tags(&self, log: &NewLog, tag_ids: &[Uuid]) -> anyhow::Result<Log>;

    // Returns None when the log does not exist or is not owned by user_id.
    // tag_ids: None => associations untouched; Some(ids) => replaced in the same transaction
    async fn update_with_tags(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: &LogPatch,
        tag_ids: Option<&[Uuid]>,
    ) -> anyhow::Result<Option<Log>>;

    // Returns false if not found/unauthorized
    async fn delete_owned(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool>;

    async fn list_public_by_tag(&self, tag_id: Uuid, limit: i64) -> anyhow::Result<Vec<Log>>;
}
