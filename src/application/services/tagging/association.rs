use uuid::Uuid;

use super::error::TaggingError;
use super::resolver::TagResolver;
use super::tag_store::TaggingPolicy;
use crate::application::ports::association_repository::AssociationRepository;
use crate::application::ports::tag_repository::TagRepository;
use crate::domain::tags::tag::{AssociationSort, ContentKind, Tag, name_key};

/// The entity whose text references tags.
#[derive(Debug, Clone, Copy)]
pub enum Content<'n> {
    Log(Uuid),
    /// A tag's description; `name` is the tag's (possibly new) name.
    Tag { id: Uuid, name: &'n str },
}

impl Content<'_> {
    pub fn id(&self) -> Uuid {
        match self {
            Content::Log(id) => *id,
            Content::Tag { id, .. } => *id,
        }
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            Content::Log(_) => ContentKind::Log,
            Content::Tag { .. } => ContentKind::Tag,
        }
    }
}

pub struct AssociationService<'a, T, A>
where
    T: TagRepository + ?Sized,
    A: AssociationRepository + ?Sized,
{
    pub tags: &'a T,
    pub associations: &'a A,
    pub policy: TaggingPolicy,
}

impl<'a, T, A> AssociationService<'a, T, A>
where
    T: TagRepository + ?Sized,
    A: AssociationRepository + ?Sized,
{
    pub fn new(tags: &'a T, associations: &'a A, policy: TaggingPolicy) -> Self {
        Self {
            tags,
            associations,
            policy,
        }
    }

    /// Resolves the tags `content` should be linked to, creating missing tags,
    /// without writing any association. A tag that would reference itself
    /// fails with `SelfReference` before any tag is created; when the match is
    /// by name it fails before any store access.
    pub async fn prepare(
        &self,
        content: Content<'_>,
        explicit: &[String],
        text: &str,
        owner_id: Uuid,
    ) -> Result<Vec<Tag>, TaggingError> {
        let resolver = TagResolver::new(self.tags, self.policy);
        let planned = resolver.plan(explicit, text)?;

        if let Content::Tag { id, name } = content {
            let own = name_key(name.trim());
            if planned.iter().any(|n| name_key(n) == own) {
                return Err(TaggingError::SelfReference { tag_id: id });
            }
        }

        let referrer = match content {
            Content::Tag { id, .. } => Some(id),
            Content::Log(_) => None,
        };
        let tags = resolver
            .resolve_planned_for(&planned, owner_id, referrer)
            .await?;
        // a concurrent rename can still hand back the referrer from the re-read
        if let Content::Tag { id, .. } = content {
            if tags.iter().any(|t| t.id == id) {
                return Err(TaggingError::SelfReference { tag_id: id });
            }
        }
        Ok(tags)
    }

    /// Re-links `content` to the tags referenced by `explicit` and `text`,
    /// replacing every previous association. Returns the tags in stored order.
    pub async fn associate(
        &self,
        content: Content<'_>,
        explicit: &[String],
        text: &str,
        owner_id: Uuid,
    ) -> Result<Vec<Tag>, TaggingError> {
        let tags = self.prepare(content, explicit, text, owner_id).await?;
        let ids: Vec<Uuid> = tags.iter().map(|t| t.id).collect();
        self.associations
            .replace(content.kind(), content.id(), &ids)
            .await?;
        tracing::debug!(
            content_kind = content.kind().as_str(),
            content_id = %content.id(),
            count = ids.len(),
            "associations_replaced"
        );
        Ok(tags)
    }

    pub async fn get_ordered(
        &self,
        kind: ContentKind,
        content_id: Uuid,
    ) -> Result<Vec<Tag>, TaggingError> {
        Ok(self
            .associations
            .list_by_content(kind, content_id, AssociationSort::Order, None)
            .await?)
    }

    pub async fn get_recent(
        &self,
        kind: ContentKind,
        content_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<Tag>, TaggingError> {
        Ok(self
            .associations
            .list_by_content(kind, content_id, AssociationSort::Recent, limit)
            .await?)
    }

    pub async fn get_referrers(&self, tag_id: Uuid, limit: i64) -> Result<Vec<Tag>, TaggingError> {
        Ok(self.associations.list_referrers(tag_id, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::log_repository::LogRepository;
    use crate::domain::logs::log::NewLog;
    use crate::infrastructure::memory::MemoryStore;

    async fn new_log(store: &MemoryStore, owner: Uuid) -> Content<'static> {
        let new = NewLog {
            id: Uuid::new_v4(),
            user_id: owner,
            title: None,
            content_md: String::new(),
            is_public: true,
        };
        let log = LogRepository::create_with_tags(store, &new, &[])
            .await
            .unwrap();
        Content::Log(log.id)
    }

    fn tag_names(tags: &[Tag]) -> Vec<&str> {
        tags.iter().map(|t| t.name.as_str()).collect()
    }

    async fn tag_named(store: &MemoryStore, name: &str, owner: Uuid) -> Tag {
        let service = AssociationService::new(store, store, TaggingPolicy::default());
        service
            .prepare(Content::Log(Uuid::new_v4()), &[name.to_string()], "", owner)
            .await
            .unwrap()
            .remove(0)
    }

    #[tokio::test]
    async fn resave_replaces_order_without_stale_rows() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let game = tag_named(&store, "Game", owner).await;
        let service = AssociationService::new(&store, &store, TaggingPolicy::default());
        let content = Content::Tag {
            id: game.id,
            name: &game.name,
        };

        service
            .associate(content, &[], "#RPG #Strategy", owner)
            .await
            .unwrap();
        service
            .associate(content, &[], "#Strategy #RPG #Action", owner)
            .await
            .unwrap();

        let ordered = service.get_ordered(ContentKind::Tag, game.id).await.unwrap();
        assert_eq!(tag_names(&ordered), vec!["Strategy", "RPG", "Action"]);
        let rows = store.associations_of(ContentKind::Tag, game.id).await;
        assert_eq!(rows.len(), 3);
        let orders: Vec<i32> = rows.iter().map(|a| a.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);

        let rpg = store.tag_by_name("rpg").await.unwrap();
        let action = store.tag_by_name("action").await.unwrap();
        assert_eq!(rpg.usage_count, 1);
        assert_eq!(action.usage_count, 1);
    }

    #[tokio::test]
    async fn self_reference_by_name_leaves_links_untouched() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let tag = tag_named(&store, "Dark Souls", owner).await;
        let service = AssociationService::new(&store, &store, TaggingPolicy::default());
        let content = Content::Tag {
            id: tag.id,
            name: &tag.name,
        };
        service
            .associate(content, &[], "#Souls", owner)
            .await
            .unwrap();
        store.reset_calls();

        let err = service
            .associate(content, &[], "#Souls #{dark souls}", owner)
            .await
            .unwrap_err();
        assert!(matches!(err, TaggingError::SelfReference { tag_id } if tag_id == tag.id));
        assert_eq!(store.calls().replace, 0);
        let ordered = service.get_ordered(ContentKind::Tag, tag.id).await.unwrap();
        assert_eq!(tag_names(&ordered), vec!["Souls"]);
    }

    #[tokio::test]
    async fn self_reference_by_id_after_rename_is_rejected() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let tag = tag_named(&store, "Old", owner).await;
        let service = AssociationService::new(&store, &store, TaggingPolicy::default());
        // the tag is about to be renamed; its old name still resolves to itself
        let err = service
            .associate(Content::Tag { id: tag.id, name: "New" }, &[], "#old", owner)
            .await
            .unwrap_err();
        assert!(matches!(err, TaggingError::SelfReference { .. }));
        assert_eq!(store.calls().replace, 0);
    }

    #[tokio::test]
    async fn self_reference_by_id_creates_no_tags() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let tag = tag_named(&store, "Old", owner).await;
        let service = AssociationService::new(&store, &store, TaggingPolicy::default());
        store.reset_calls();

        let err = service
            .associate(
                Content::Tag { id: tag.id, name: "New" },
                &[],
                "#old #brandnew",
                owner,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TaggingError::SelfReference { tag_id } if tag_id == tag.id));
        assert_eq!(store.tag_count().await, 1);
        assert!(store.tag_by_name("brandnew").await.is_none());
        assert_eq!(store.calls().insert_batch, 0);
    }

    #[tokio::test]
    async fn batching_is_independent_of_tag_count() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let service = AssociationService::new(&store, &store, TaggingPolicy::default());
        let text: String = (0..100).map(|i| format!("#tag{i} ")).collect();

        let log = new_log(&store, owner).await;
        store.reset_calls();

        let tags = service
            .associate(log, &[], &text, owner)
            .await
            .unwrap();
        assert_eq!(tags.len(), 100);

        let calls = store.calls();
        assert_eq!(calls.find_by_names, 1);
        assert_eq!(calls.insert_batch, 1);
        assert_eq!(calls.find_by_name, 0);
        assert_eq!(calls.replace, 1);
    }

    #[tokio::test]
    async fn recent_view_orders_by_association_time() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let log = new_log(&store, owner).await;
        let service = AssociationService::new(&store, &store, TaggingPolicy::default());

        service.associate(log, &[], "#first", owner).await.unwrap();
        service
            .associate(log, &[], "#first #second", owner)
            .await
            .unwrap();
        service
            .associate(log, &[], "#first #second #third", owner)
            .await
            .unwrap();

        let ordered = service.get_ordered(ContentKind::Log, log.id()).await.unwrap();
        assert_eq!(tag_names(&ordered), vec!["first", "second", "third"]);
        let recent = service
            .get_recent(ContentKind::Log, log.id(), None)
            .await
            .unwrap();
        assert_eq!(tag_names(&recent), vec!["third", "second", "first"]);

        let rows = store.associations_of(ContentKind::Log, log.id()).await;
        assert!(rows[0].created_at < rows[1].created_at);
        assert!(rows[1].created_at < rows[2].created_at);

        let limited = service
            .get_recent(ContentKind::Log, log.id(), Some(1))
            .await
            .unwrap();
        assert_eq!(tag_names(&limited), vec!["third"]);
    }

    #[tokio::test]
    async fn referrers_are_newest_first() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let service = AssociationService::new(&store, &store, TaggingPolicy::default());
        let a = tag_named(&store, "A", owner).await;
        let b = tag_named(&store, "B", owner).await;
        let c = tag_named(&store, "C", owner).await;

        for t in [&a, &b, &c] {
            service
                .associate(Content::Tag { id: t.id, name: &t.name }, &[], "#Target", owner)
                .await
                .unwrap();
        }
        let target = store.tag_by_name("target").await.unwrap();
        assert_eq!(target.usage_count, 3);

        let refs = service.get_referrers(target.id, 10).await.unwrap();
        assert_eq!(tag_names(&refs), vec!["C", "B", "A"]);
        let refs = service.get_referrers(target.id, 2).await.unwrap();
        assert_eq!(tag_names(&refs), vec!["C", "B"]);
    }

    #[tokio::test]
    async fn empty_text_clears_associations() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let log = new_log(&store, owner).await;
        let service = AssociationService::new(&store, &store, TaggingPolicy::default());
        service.associate(log, &[], "#gone", owner).await.unwrap();
        let tags = service.associate(log, &[], "nothing", owner).await.unwrap();
        assert!(tags.is_empty());
        assert!(service.get_ordered(ContentKind::Log, log.id()).await.unwrap().is_empty());
        assert_eq!(store.tag_by_name("gone").await.unwrap().usage_count, 0);
    }
}
