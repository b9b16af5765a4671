use uuid::Uuid;

use crate::application::dto::logs::{LogDetailDto, UpdateLogInput};
use crate::application::ports::association_repository::AssociationRepository;
use crate::application::ports::log_repository::LogRepository;
use crate::application::ports::tag_repository::TagRepository;
use crate::application::services::tagging::{
    AssociationService, Content, TaggingError, TaggingPolicy,
};
use crate::domain::logs::log::LogPatch;
use crate::domain::tags::tag::ContentKind;

pub struct UpdateLog<'a, L, T, A>
where
    L: LogRepository + ?Sized,
    T: TagRepository + ?Sized,
    A: AssociationRepository + ?Sized,
{
    pub logs: &'a L,
    pub tags: &'a T,
    pub associations: &'a A,
    pub policy: TaggingPolicy,
}

impl<'a, L, T, A> UpdateLog<'a, L, T, A>
where
    L: LogRepository + ?Sized,
    T: TagRepository + ?Sized,
    A: AssociationRepository + ?Sized,
{
    /// Returns None when the log does not exist or belongs to someone else.
    ///
    /// A new body or tag list recomputes the associations from scratch: the
    /// explicit list given now plus the hashtags of the resulting body.
    pub async fn execute(
        &self,
        id: Uuid,
        user_id: Uuid,
        input: UpdateLogInput,
    ) -> Result<Option<LogDetailDto>, TaggingError> {
        let Some(current) = self.logs.get_by_id(id).await? else {
            return Ok(None);
        };
        if current.user_id != user_id {
            return Ok(None);
        }

        let service = AssociationService::new(self.tags, self.associations, self.policy);
        let relinks = input.relinks();
        let patch = LogPatch {
            title: input.title,
            content_md: input.content_md,
            is_public: input.is_public,
        };

        if !relinks {
            let Some(log) = self.logs.update_with_tags(id, user_id, &patch, None).await? else {
                return Ok(None);
            };
            let associated_tags = service.get_ordered(ContentKind::Log, id).await?;
            return Ok(Some(LogDetailDto {
                log,
                associated_tags,
            }));
        }

        let explicit = input.tags.unwrap_or_default();
        let text = patch.content_md.as_deref().unwrap_or(&current.content_md);
        let tags = service
            .prepare(Content::Log(id), &explicit, text, user_id)
            .await?;
        let ids: Vec<Uuid> = tags.iter().map(|t| t.id).collect();
        let Some(log) = self
            .logs
            .update_with_tags(id, user_id, &patch, Some(&ids))
            .await?
        else {
            return Ok(None);
        };
        tracing::info!(log_id = %id, tag_count = ids.len(), "log_relinked");
        Ok(Some(LogDetailDto {
            log,
            associated_tags: tags,
        }))
    }
}
