use uuid::Uuid;

use crate::application::dto::logs::LogDetailDto;
use crate::application::ports::association_repository::AssociationRepository;
use crate::application::ports::log_repository::LogRepository;
use crate::domain::logs::log::Log;
use crate::domain::tags::tag::{AssociationSort, ContentKind};

/// Public logs are readable by anyone, private ones only by their owner.
pub(crate) async fn visible_log<L: LogRepository + ?Sized>(
    logs: &L,
    id: Uuid,
    viewer: Option<Uuid>,
) -> anyhow::Result<Option<Log>> {
    Ok(logs
        .get_by_id(id)
        .await?
        .filter(|l| l.is_public || viewer == Some(l.user_id)))
}

pub struct GetLog<'a, L, A>
where
    L: LogRepository + ?Sized,
    A: AssociationRepository + ?Sized,
{
    pub logs: &'a L,
    pub associations: &'a A,
}

impl<'a, L, A> GetLog<'a, L, A>
where
    L: LogRepository + ?Sized,
    A: AssociationRepository + ?Sized,
{
    pub async fn execute(
        &self,
        id: Uuid,
        viewer: Option<Uuid>,
    ) -> anyhow::Result<Option<LogDetailDto>> {
        let Some(log) = visible_log(self.logs, id, viewer).await? else {
            return Ok(None);
        };
        let associated_tags = self
            .associations
            .list_by_content(ContentKind::Log, id, AssociationSort::Order, None)
            .await?;
        Ok(Some(LogDetailDto {
            log,
            associated_tags,
        }))
    }
}
