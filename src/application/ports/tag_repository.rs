use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::tags::tag::{NewTag, Tag, TagPatch};

#[derive(thiserror::Error, Debug)]
pub enum TagWriteError {
    #[error("tag name already in use")]
    NameConflict,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

#[async_trait]
pub trait TagRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Tag>>;

    /// Case-insensitive lookup of a single name.
    async fn find_by_name(&self, name: &str) -> anyhow::Result<Option<Tag>>;

    /// One query for every tag whose lowercased name is in `keys`.
    async fn find_by_names(&self, keys: &[String]) -> anyhow::Result<Vec<Tag>>;

    /// One batch insert. Rows whose name already exists are skipped and do not
    /// appear in the result; adapters that cannot skip report `NameConflict`
    /// and insert nothing.
    async fn insert_batch(&self, tags: &[NewTag]) -> Result<Vec<Tag>, TagWriteError>;

    /// Inserts one tag and its tag->tag associations in a single transaction.
    async fn create_with_tags(&self, tag: &NewTag, tag_ids: &[Uuid])
    -> Result<Tag, TagWriteError>;

    // tag_ids: None => associations untouched; Some(ids) => replaced in the same transaction
    async fn update_with_tags(
        &self,
        id: Uuid,
        patch: &TagPatch,
        tag_ids: Option<&[Uuid]>,
    ) -> Result<Option<Tag>, TagWriteError>;

    async fn search(&self, query: Option<&str>, limit: i64) -> anyhow::Result<Vec<Tag>>;
}
