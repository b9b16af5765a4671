use std::collections::HashSet;

use uuid::Uuid;

use super::error::TaggingError;
use super::extractor::extract_hashtags;
use super::tag_store::{TagStore, TaggingPolicy};
use crate::application::ports::tag_repository::TagRepository;
use crate::domain::tags::tag::{Tag, name_key};

/// Turns explicit tag names plus the hashtags of a text into persisted tags.
pub struct TagResolver<'a, R: TagRepository + ?Sized> {
    store: TagStore<'a, R>,
}

impl<'a, R: TagRepository + ?Sized> TagResolver<'a, R> {
    pub fn new(repo: &'a R, policy: TaggingPolicy) -> Self {
        Self {
            store: TagStore::new(repo, policy),
        }
    }

    /// Names to resolve, in association order: explicit names first, then
    /// hashtags from `text`, deduplicated case-insensitively with the first
    /// spelling winning. Every name is validated here, before any store access.
    pub fn plan(&self, explicit: &[String], text: &str) -> Result<Vec<String>, TaggingError> {
        let hashtags = extract_hashtags(text);
        let mut seen: HashSet<String> = HashSet::new();
        let mut planned: Vec<String> = Vec::with_capacity(explicit.len() + hashtags.len());
        for raw in explicit.iter().chain(hashtags.iter()) {
            let name = self.store.policy.validate_name(raw)?;
            if seen.insert(name_key(name)) {
                planned.push(name.to_string());
            }
        }
        Ok(planned)
    }

    pub async fn resolve(
        &self,
        explicit: &[String],
        text: &str,
        owner_id: Uuid,
    ) -> Result<Vec<Tag>, TaggingError> {
        let planned = self.plan(explicit, text)?;
        self.resolve_planned(&planned, owner_id).await
    }

    /// Resolves names already produced by [`plan`](Self::plan), keeping their order.
    pub async fn resolve_planned(
        &self,
        planned: &[String],
        owner_id: Uuid,
    ) -> Result<Vec<Tag>, TaggingError> {
        self.resolve_planned_for(planned, owner_id, None).await
    }

    /// Like [`resolve_planned`](Self::resolve_planned), but fails with
    /// `SelfReference` before creating anything when an existing tag among
    /// `planned` is `referrer` itself.
    pub async fn resolve_planned_for(
        &self,
        planned: &[String],
        owner_id: Uuid,
        referrer: Option<Uuid>,
    ) -> Result<Vec<Tag>, TaggingError> {
        if planned.is_empty() {
            return Ok(Vec::new());
        }
        let lookup = self.store.lookup_batch(planned).await?;
        if let Some(tag_id) = referrer {
            if lookup.found().any(|t| t.id == tag_id) {
                return Err(TaggingError::SelfReference { tag_id });
            }
        }
        let mut by_key = self.store.create_missing(lookup, owner_id).await?;
        planned
            .iter()
            .map(|name| {
                by_key.remove(&name_key(name)).ok_or_else(|| {
                    TaggingError::Storage(anyhow::anyhow!("tag '{name}' was not resolved"))
                })
            })
            .collect()
    }
}
