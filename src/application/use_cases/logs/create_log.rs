use uuid::Uuid;

use crate::application::dto::logs::{CreateLogInput, LogDetailDto};
use crate::application::ports::association_repository::AssociationRepository;
use crate::application::ports::log_repository::LogRepository;
use crate::application::ports::tag_repository::TagRepository;
use crate::application::services::tagging::{
    AssociationService, Content, TaggingError, TaggingPolicy,
};
use crate::domain::logs::log::NewLog;

pub struct CreateLog<'a, L, T, A>
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

impl<'a, L, T, A> CreateLog<'a, L, T, A>
where
    L: LogRepository + ?Sized,
    T: TagRepository + ?Sized,
    A: AssociationRepository + ?Sized,
{
    pub async fn execute(
        &self,
        user_id: Uuid,
        input: CreateLogInput,
    ) -> Result<LogDetailDto, TaggingError> {
        let new = NewLog {
            id: Uuid::new_v4(),
            user_id,
            title: input.title,
            content_md: input.content_md,
            is_public: input.is_public,
        };
        let service = AssociationService::new(self.tags, self.associations, self.policy);
        let tags = service
            .prepare(Content::Log(new.id), &input.tags, &new.content_md, user_id)
            .await?;
        let ids: Vec<Uuid> = tags.iter().map(|t| t.id).collect();
        let log = self.logs.create_with_tags(&new, &ids).await?;
        tracing::info!(log_id = %log.id, tag_count = ids.len(), "log_created");
        Ok(LogDetailDto {
            log,
            associated_tags: tags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::use_cases::tags::search_tags::SearchTags;
    use crate::infrastructure::memory::MemoryStore;

    fn create_log(store: &MemoryStore) -> CreateLog<'_, MemoryStore, MemoryStore, MemoryStore> {
        CreateLog {
            logs: store,
            tags: store,
            associations: store,
            policy: TaggingPolicy::default(),
        }
    }

    fn input(content: &str, tags: &[&str]) -> CreateLogInput {
        CreateLogInput {
            title: Some("today".into()),
            content_md: content.into(),
            is_public: true,
            tags: tags.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[tokio::test]
    async fn sequential_logs_share_one_new_tag() {
        let store = MemoryStore::new();
        let uc = create_log(&store);
        let first = uc
            .execute(Uuid::new_v4(), input("watched #attack-on-titan", &[]))
            .await
            .unwrap();
        let second = uc
            .execute(Uuid::new_v4(), input("rewatching #attack-on-titan", &[]))
            .await
            .unwrap();
        assert_eq!(
            first.associated_tags[0].id,
            second.associated_tags[0].id
        );

        let hits = SearchTags { repo: &store }
            .execute(Some("attack-on-titan".into()), 10)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "attack-on-titan");
        assert_eq!(hits[0].usage_count, 2);
    }

    #[tokio::test]
    async fn explicit_tags_come_first() {
        let store = MemoryStore::new();
        let out = create_log(&store)
            .execute(Uuid::new_v4(), input("#Mario kart night #{Game Night}", &["Switch"]))
            .await
            .unwrap();
        let names: Vec<&str> = out.associated_tags.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Switch", "Mario", "Game Night"]);
    }

    #[tokio::test]
    async fn failed_association_write_saves_no_log() {
        let store = MemoryStore::new();
        store.fail_next_replace().await;
        let err = create_log(&store)
            .execute(Uuid::new_v4(), input("#doomed", &[]))
            .await
            .unwrap_err();
        assert!(matches!(err, TaggingError::Storage(_)));
        let hits = store.search(None, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].usage_count, 0);
        assert!(store.list_public_by_tag(hits[0].id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_explicit_tag_rejects_before_any_write() {
        let store = MemoryStore::new();
        let err = create_log(&store)
            .execute(Uuid::new_v4(), input("#fine", &["  "]))
            .await
            .unwrap_err();
        assert!(matches!(err, TaggingError::Validation(_)));
        assert_eq!(store.tag_count().await, 0);
        assert_eq!(store.calls().replace, 0);
    }
}
