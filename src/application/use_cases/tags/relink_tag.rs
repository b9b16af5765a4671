use uuid::Uuid;

use crate::application::ports::association_repository::AssociationRepository;
use crate::application::ports::tag_repository::TagRepository;
use crate::application::services::tagging::{
    AssociationService, Content, TaggingError, TaggingPolicy,
};
use crate::domain::tags::tag::Tag;

/// Re-derives a tag's associations from its stored description.
pub struct RelinkTag<'a, T, A>
where
    T: TagRepository + ?Sized,
    A: AssociationRepository + ?Sized,
{
    pub tags: &'a T,
    pub associations: &'a A,
    pub policy: TaggingPolicy,
}

impl<'a, T, A> RelinkTag<'a, T, A>
where
    T: TagRepository + ?Sized,
    A: AssociationRepository + ?Sized,
{
    pub async fn execute(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Vec<Tag>>, TaggingError> {
        let Some(tag) = self.tags.find_by_id(id).await? else {
            return Ok(None);
        };
        if tag.created_by != user_id {
            return Ok(None);
        }
        let service = AssociationService::new(self.tags, self.associations, self.policy);
        let linked = service
            .associate(
                Content::Tag { id, name: &tag.name },
                &[],
                tag.description.as_deref().unwrap_or_default(),
                user_id,
            )
            .await?;
        Ok(Some(linked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::association_repository::AssociationRepository;
    use crate::domain::tags::tag::{AssociationSort, ContentKind, NewTag};
    use crate::infrastructure::memory::MemoryStore;

    async fn seed(store: &MemoryStore, owner: Uuid, name: &str, description: &str) -> Tag {
        let mut new = NewTag::named(name, owner);
        new.description = Some(description.to_string());
        // stored without links, as if written before extraction ran
        store.create_with_tags(&new, &[]).await.unwrap()
    }

    fn relink(store: &MemoryStore) -> RelinkTag<'_, MemoryStore, MemoryStore> {
        RelinkTag {
            tags: store,
            associations: store,
            policy: TaggingPolicy::default(),
        }
    }

    #[tokio::test]
    async fn links_stored_description() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let tag = seed(&store, owner, "Metroidvania", "like #Castlevania and #Metroid").await;

        let linked = relink(&store).execute(tag.id, owner).await.unwrap().unwrap();
        let names: Vec<&str> = linked.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Castlevania", "Metroid"]);

        let stored = store
            .list_by_content(ContentKind::Tag, tag.id, AssociationSort::Order, None)
            .await
            .unwrap();
        let stored_ids: Vec<Uuid> = stored.iter().map(|t| t.id).collect();
        let linked_ids: Vec<Uuid> = linked.iter().map(|t| t.id).collect();
        assert_eq!(stored_ids, linked_ids);
        assert!(stored.iter().all(|t| t.usage_count == 1));
    }

    #[tokio::test]
    async fn other_users_and_unknown_tags_get_none() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let tag = seed(&store, owner, "Roguelike", "#Hades").await;
        assert!(relink(&store).execute(tag.id, Uuid::new_v4()).await.unwrap().is_none());
        assert!(relink(&store).execute(Uuid::new_v4(), owner).await.unwrap().is_none());
        assert!(store.tag_by_name("hades").await.is_none());
    }

    #[tokio::test]
    async fn self_referencing_description_is_rejected() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let tag = seed(&store, owner, "Tetris", "#tetris forever").await;
        let err = relink(&store).execute(tag.id, owner).await.unwrap_err();
        assert!(matches!(err, TaggingError::SelfReference { tag_id } if tag_id == tag.id));
        assert_eq!(store.calls().replace, 1);
    }
}
