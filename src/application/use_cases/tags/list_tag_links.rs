use uuid::Uuid;

use crate::application::ports::association_repository::AssociationRepository;
use crate::application::ports::tag_repository::TagRepository;
use crate::domain::tags::tag::{AssociationSort, ContentKind, Tag};

/// Tags referenced by a tag's description.
pub struct ListTagTags<'a, T, A>
where
    T: TagRepository + ?Sized,
    A: AssociationRepository + ?Sized,
{
    pub tags: &'a T,
    pub associations: &'a A,
}

impl<'a, T, A> ListTagTags<'a, T, A>
where
    T: TagRepository + ?Sized,
    A: AssociationRepository + ?Sized,
{
    pub async fn execute(
        &self,
        id: Uuid,
        sort: AssociationSort,
        limit: Option<i64>,
    ) -> anyhow::Result<Option<Vec<Tag>>> {
        if self.tags.find_by_id(id).await?.is_none() {
            return Ok(None);
        }
        let tags = self
            .associations
            .list_by_content(ContentKind::Tag, id, sort, limit)
            .await?;
        Ok(Some(tags))
    }
}

/// Tags whose description references a tag, newest reference first.
pub struct ListReferrers<'a, T, A>
where
    T: TagRepository + ?Sized,
    A: AssociationRepository + ?Sized,
{
    pub tags: &'a T,
    pub associations: &'a A,
}

impl<'a, T, A> ListReferrers<'a, T, A>
where
    T: TagRepository + ?Sized,
    A: AssociationRepository + ?Sized,
{
    pub async fn execute(&self, id: Uuid, limit: i64) -> anyhow::Result<Option<Vec<Tag>>> {
        if self.tags.find_by_id(id).await?.is_none() {
            return Ok(None);
        }
        let tags = self
            .associations
            .list_referrers(id, limit.clamp(1, 100))
            .await?;
        Ok(Some(tags))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::tagging::{AssociationService, Content, TaggingPolicy};
    use crate::infrastructure::memory::MemoryStore;

    async fn tag_with_links(store: &MemoryStore, name: &str, text: &str) -> Tag {
        let owner = Uuid::new_v4();
        let service = AssociationService::new(store, store, TaggingPolicy::default());
        let tag = service
            .prepare(Content::Log(Uuid::new_v4()), &[name.to_string()], "", owner)
            .await
            .unwrap()
            .remove(0);
        service
            .associate(
                Content::Tag {
                    id: tag.id,
                    name: &tag.name,
                },
                &[],
                text,
                owner,
            )
            .await
            .unwrap();
        tag
    }

    fn names(tags: &[Tag]) -> Vec<&str> {
        tags.iter().map(|t| t.name.as_str()).collect()
    }

    #[tokio::test]
    async fn lists_links_in_requested_order() {
        let store = MemoryStore::new();
        let tag = tag_with_links(&store, "JRPG", "#Persona #Yakuza").await;
        let uc = ListTagTags {
            tags: &store,
            associations: &store,
        };
        let ordered = uc
            .execute(tag.id, AssociationSort::Order, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(names(&ordered), vec!["Persona", "Yakuza"]);
        let limited = uc
            .execute(tag.id, AssociationSort::Order, Some(1))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(names(&limited), vec!["Persona"]);
        assert!(
            uc.execute(Uuid::new_v4(), AssociationSort::Order, None)
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn referrer_limit_is_clamped() {
        let store = MemoryStore::new();
        let first = tag_with_links(&store, "Speedrun", "#Mario").await;
        tag_with_links(&store, "Platformer", "#Mario").await;
        let mario = store.tag_by_name("mario").await.unwrap();
        let uc = ListReferrers {
            tags: &store,
            associations: &store,
        };

        let refs = uc.execute(mario.id, 0).await.unwrap().unwrap();
        assert_eq!(names(&refs), vec!["Platformer"]);
        let refs = uc.execute(mario.id, 500).await.unwrap().unwrap();
        assert_eq!(refs.len(), 2);
        assert!(uc.execute(Uuid::new_v4(), 10).await.unwrap().is_none());
        assert!(uc.execute(first.id, 10).await.unwrap().unwrap().is_empty());
    }
}
