use uuid::Uuid;

use crate::application::dto::tags::{CreateTagInput, SavedTagDto};
use crate::application::ports::association_repository::AssociationRepository;
use crate::application::ports::tag_repository::{TagRepository, TagWriteError};
use crate::application::services::tagging::{
    AssociationService, Content, TaggingError, TaggingPolicy,
};
use crate::domain::tags::tag::{ContentKind, NewTag, Tag};

pub struct CreateTag<'a, T, A>
where
    T: TagRepository + ?Sized,
    A: AssociationRepository + ?Sized,
{
    pub tags: &'a T,
    pub associations: &'a A,
    pub policy: TaggingPolicy,
}

impl<'a, T, A> CreateTag<'a, T, A>
where
    T: TagRepository + ?Sized,
    A: AssociationRepository + ?Sized,
{
    /// Creates the tag and links its description, or returns the tag that
    /// already holds the name (compared case-insensitively) untouched.
    pub async fn execute(
        &self,
        user_id: Uuid,
        input: CreateTagInput,
    ) -> Result<SavedTagDto, TaggingError> {
        let name = self.policy.validate_name(&input.name)?.to_string();
        if let Some(existing) = self.tags.find_by_name(&name).await? {
            return self.existing(existing).await;
        }

        let new = NewTag {
            id: Uuid::new_v4(),
            name,
            description: input.description,
            metadata: input
                .metadata
                .unwrap_or_else(|| serde_json::Value::Object(Default::default())),
            created_by: user_id,
        };
        let service = AssociationService::new(self.tags, self.associations, self.policy);
        let referenced = service
            .prepare(
                Content::Tag {
                    id: new.id,
                    name: &new.name,
                },
                &[],
                new.description.as_deref().unwrap_or_default(),
                user_id,
            )
            .await?;
        let ids: Vec<Uuid> = referenced.iter().map(|t| t.id).collect();

        match self.tags.create_with_tags(&new, &ids).await {
            Ok(tag) => {
                tracing::info!(tag_id = %tag.id, tag_count = ids.len(), "tag_created");
                Ok(SavedTagDto {
                    tag,
                    associated_tags: referenced,
                    created: true,
                })
            }
            Err(TagWriteError::NameConflict) => {
                tracing::debug!(name = %new.name, "tag_create_conflict_reread");
                let existing = self.tags.find_by_name(&new.name).await?.ok_or_else(|| {
                    TaggingError::Storage(anyhow::anyhow!(
                        "tag '{}' conflicted but could not be read back",
                        new.name
                    ))
                })?;
                self.existing(existing).await
            }
            Err(TagWriteError::Storage(e)) => Err(TaggingError::Storage(e)),
        }
    }

    async fn existing(&self, tag: Tag) -> Result<SavedTagDto, TaggingError> {
        let service = AssociationService::new(self.tags, self.associations, self.policy);
        let associated_tags = service.get_ordered(ContentKind::Tag, tag.id).await?;
        Ok(SavedTagDto {
            tag,
            associated_tags,
            created: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::tagging::TagResolver;
    use crate::infrastructure::memory::MemoryStore;

    fn create_tag(store: &MemoryStore) -> CreateTag<'_, MemoryStore, MemoryStore> {
        CreateTag {
            tags: store,
            associations: store,
            policy: TaggingPolicy::default(),
        }
    }

    fn input(name: &str, description: Option<&str>) -> CreateTagInput {
        CreateTagInput {
            name: name.into(),
            description: description.map(str::to_string),
            metadata: None,
        }
    }

    #[tokio::test]
    async fn links_description_on_creation() {
        let store = MemoryStore::new();
        let out = create_tag(&store)
            .execute(Uuid::new_v4(), input("Elden Ring", Some("A #Souls like #RPG")))
            .await
            .unwrap();
        assert!(out.created);
        let names: Vec<&str> = out.associated_tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Souls", "RPG"]);
        assert_eq!(out.tag.metadata, serde_json::json!({}));
    }

    #[tokio::test]
    async fn colliding_name_returns_existing_tag() {
        let store = MemoryStore::new();
        let first = create_tag(&store)
            .execute(Uuid::new_v4(), input("Chess", Some("#BoardGame")))
            .await
            .unwrap();
        let again = create_tag(&store)
            .execute(Uuid::new_v4(), input("  CHESS ", Some("ignored #Other")))
            .await
            .unwrap();
        assert!(!again.created);
        assert_eq!(again.tag.id, first.tag.id);
        assert_eq!(again.tag.name, "Chess");
        assert_eq!(again.associated_tags.len(), 1);
        assert!(store.tag_by_name("other").await.is_none());
    }

    #[tokio::test]
    async fn losing_a_creation_race_returns_the_winner() {
        let store = MemoryStore::new();
        let rival = Uuid::new_v4();
        store.inject_concurrent_insert("Go", rival).await;
        let out = create_tag(&store)
            .execute(Uuid::new_v4(), input("go", None))
            .await
            .unwrap();
        assert!(!out.created);
        assert_eq!(out.tag.created_by, rival);
        assert_eq!(store.tag_count().await, 1);
    }

    #[tokio::test]
    async fn description_naming_the_new_tag_is_rejected() {
        let store = MemoryStore::new();
        let err = create_tag(&store)
            .execute(Uuid::new_v4(), input("Loop", Some("see #loop")))
            .await
            .unwrap_err();
        assert!(matches!(err, TaggingError::SelfReference { .. }));
        assert_eq!(store.tag_count().await, 0);
    }

    #[tokio::test]
    async fn created_tag_is_found_by_later_resolution() {
        let store = MemoryStore::new();
        let created = create_tag(&store)
            .execute(Uuid::new_v4(), input("Odd Name", None))
            .await
            .unwrap();
        let resolved = TagResolver::new(&store, TaggingPolicy::default())
            .resolve(&[], "about #{odd name}", Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(resolved[0].id, created.tag.id);
    }
}
