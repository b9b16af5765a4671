use uuid::Uuid;

use crate::application::dto::tags::SavedTagDto;
use crate::application::ports::association_repository::AssociationRepository;
use crate::application::ports::tag_repository::TagRepository;
use crate::application::services::tagging::{
    AssociationService, Content, TagStore, TaggingError, TaggingPolicy,
};
use crate::domain::tags::tag::{ContentKind, TagPatch};

pub struct UpdateTag<'a, T, A>
where
    T: TagRepository + ?Sized,
    A: AssociationRepository + ?Sized,
{
    pub tags: &'a T,
    pub associations: &'a A,
    pub policy: TaggingPolicy,
}

impl<'a, T, A> UpdateTag<'a, T, A>
where
    T: TagRepository + ?Sized,
    A: AssociationRepository + ?Sized,
{
    /// Returns None when the tag does not exist or was created by someone else.
    /// Name or description edits re-link the description in the same write.
    pub async fn execute(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: TagPatch,
    ) -> Result<Option<SavedTagDto>, TaggingError> {
        let Some(current) = self.tags.find_by_id(id).await? else {
            return Ok(None);
        };
        if current.created_by != user_id {
            return Ok(None);
        }

        let patch = TagStore::new(self.tags, self.policy).validated_patch(&patch)?;
        let service = AssociationService::new(self.tags, self.associations, self.policy);

        if !patch.touches_references() {
            let Some(tag) = self.tags.update_with_tags(id, &patch, None).await? else {
                return Ok(None);
            };
            let associated_tags = service.get_ordered(ContentKind::Tag, id).await?;
            return Ok(Some(SavedTagDto {
                tag,
                associated_tags,
                created: false,
            }));
        }

        let name = patch.name.as_deref().unwrap_or(&current.name);
        let description = match &patch.description {
            Some(d) => d.as_deref(),
            None => current.description.as_deref(),
        };
        let referenced = service
            .prepare(
                Content::Tag { id, name },
                &[],
                description.unwrap_or_default(),
                user_id,
            )
            .await?;
        let ids: Vec<Uuid> = referenced.iter().map(|t| t.id).collect();
        let Some(tag) = self.tags.update_with_tags(id, &patch, Some(&ids)).await? else {
            return Ok(None);
        };
        tracing::info!(tag_id = %id, tag_count = ids.len(), "tag_relinked");
        Ok(Some(SavedTagDto {
            tag,
            associated_tags: referenced,
            created: false,
        }))
    }
}
