use uuid::Uuid;

use crate::application::dto::tags::TagDetailDto;
use crate::application::ports::association_repository::AssociationRepository;
use crate::application::ports::tag_repository::TagRepository;
use crate::domain::tags::tag::{AssociationSort, ContentKind};

pub struct GetTag<'a, T, A>
where
    T: TagRepository + ?Sized,
    A: AssociationRepository + ?Sized,
{
    pub tags: &'a T,
    pub associations: &'a A,
}

impl<'a, T, A> GetTag<'a, T, A>
where
    T: TagRepository + ?Sized,
    A: AssociationRepository + ?Sized,
{
    pub async fn execute(
        &self,
        id: Uuid,
        referrer_limit: i64,
    ) -> anyhow::Result<Option<TagDetailDto>> {
        let Some(tag) = self.tags.find_by_id(id).await? else {
            return Ok(None);
        };
        let associated_tags = self
            .associations
            .list_by_content(ContentKind::Tag, id, AssociationSort::Order, None)
            .await?;
        let referrers = self.associations.list_referrers(id, referrer_limit).await?;
        Ok(Some(TagDetailDto {
            tag,
            associated_tags,
            referrers,
        }))
    }
}
