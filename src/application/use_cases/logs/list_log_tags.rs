use uuid::Uuid;

use super::get_log::visible_log;
use crate::application::ports::association_repository::AssociationRepository;
use crate::application::ports::log_repository::LogRepository;
use crate::domain::tags::tag::{AssociationSort, ContentKind, Tag};

pub struct ListLogTags<'a, L, A>
where
    L: LogRepository + ?Sized,
    A: AssociationRepository + ?Sized,
{
    pub logs: &'a L,
    pub associations: &'a A,
}

impl<'a, L, A> ListLogTags<'a, L, A>
where
    L: LogRepository + ?Sized,
    A: AssociationRepository + ?Sized,
{
    pub async fn execute(
        &self,
        id: Uuid,
        viewer: Option<Uuid>,
        sort: AssociationSort,
        limit: Option<i64>,
    ) -> anyhow::Result<Option<Vec<Tag>>> {
        if visible_log(self.logs, id, viewer).await?.is_none() {
            return Ok(None);
        }
        let tags = self
            .associations
            .list_by_content(ContentKind::Log, id, sort, limit)
            .await?;
        Ok(Some(tags))
    }
}
