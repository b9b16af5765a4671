use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use super::error::TaggingError;
use crate::application::ports::tag_repository::{TagRepository, TagWriteError};
use crate::domain::tags::tag::{NewTag, Tag, TagPatch, name_key};

pub const DEFAULT_MAX_TAG_NAME_CHARS: usize = 64;

// A lost race costs one re-read; a store that aborts the whole batch on conflict
// needs one more insert for the rows that were rolled back with it.
const MAX_INSERT_ATTEMPTS: usize = 2;

#[derive(Debug, Clone, Copy)]
pub struct TaggingPolicy {
    pub max_name_chars: usize,
}

impl Default for TaggingPolicy {
    fn default() -> Self {
        Self {
            max_name_chars: DEFAULT_MAX_TAG_NAME_CHARS,
        }
    }
}

impl TaggingPolicy {
    /// Trimmed name, or a validation error for blank or over-long names.
    pub fn validate_name<'n>(&self, name: &'n str) -> Result<&'n str, TaggingError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(TaggingError::Validation(
                "tag name must not be empty".into(),
            ));
        }
        let len = trimmed.chars().count();
        if len > self.max_name_chars {
            return Err(TaggingError::Validation(format!(
                "tag name is {len} characters long, the limit is {}",
                self.max_name_chars
            )));
        }
        Ok(trimmed)
    }
}

/// Existing tags found for a batch of names, plus what is still missing.
#[derive(Debug, Default)]
pub struct BatchLookup {
    wanted: Vec<(String, String)>,
    found: HashMap<String, Tag>,
}

impl BatchLookup {
    pub fn found(&self) -> impl Iterator<Item = &Tag> {
        self.found.values()
    }
}

/// Tag lookups and creation with case-insensitive, case-preserving names.
pub struct TagStore<'a, R: TagRepository + ?Sized> {
    pub repo: &'a R,
    pub policy: TaggingPolicy,
}

impl<'a, R: TagRepository + ?Sized> TagStore<'a, R> {
    pub fn new(repo: &'a R, policy: TaggingPolicy) -> Self {
        Self { repo, policy }
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<Tag>, TaggingError> {
        let name = self.policy.validate_name(name)?;
        Ok(self.repo.find_by_name(name).await?)
    }

    /// Resolves every name to a tag, creating the missing ones.
    ///
    /// The result is keyed by [`name_key`]. One lookup query fetches the
    /// existing tags and one batch insert creates the rest. A name that another
    /// writer created in between is re-read instead of reported as a conflict,
    /// so callers never see "already exists" from here. Newly created tags keep
    /// the spelling of the first occurrence in `names`.
    pub async fn find_or_create_batch(
        &self,
        names: &[String],
        owner_id: Uuid,
    ) -> Result<HashMap<String, Tag>, TaggingError> {
        let lookup = self.lookup_batch(names).await?;
        self.create_missing(lookup, owner_id).await
    }

    /// First half of [`find_or_create_batch`](Self::find_or_create_batch):
    /// validates `names` and fetches the tags that already exist, writing nothing.
    pub async fn lookup_batch(&self, names: &[String]) -> Result<BatchLookup, TaggingError> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut wanted: Vec<(String, String)> = Vec::new();
        for raw in names {
            let name = self.policy.validate_name(raw)?;
            let key = name_key(name);
            if seen.insert(key.clone()) {
                wanted.push((key, name.to_string()));
            }
        }
        if wanted.is_empty() {
            return Ok(BatchLookup::default());
        }

        let keys: Vec<String> = wanted.iter().map(|(k, _)| k.clone()).collect();
        let found: HashMap<String, Tag> = self
            .repo
            .find_by_names(&keys)
            .await?
            .into_iter()
            .map(|t| (t.name_key(), t))
            .collect();
        Ok(BatchLookup { wanted, found })
    }

    /// Second half: inserts the names `lookup` did not find.
    pub async fn create_missing(
        &self,
        lookup: BatchLookup,
        owner_id: Uuid,
    ) -> Result<HashMap<String, Tag>, TaggingError> {
        let BatchLookup {
            wanted,
            found: mut resolved,
        } = lookup;

        let mut attempts = 0;
        loop {
            let missing: Vec<NewTag> = wanted
                .iter()
                .filter(|(k, _)| !resolved.contains_key(k))
                .map(|(_, name)| NewTag::named(name.clone(), owner_id))
                .collect();
            if missing.is_empty() {
                break;
            }
            if attempts == MAX_INSERT_ATTEMPTS {
                return Err(TaggingError::Storage(anyhow::anyhow!(
                    "{} tag(s) could neither be created nor found",
                    missing.len()
                )));
            }
            attempts += 1;

            match self.repo.insert_batch(&missing).await {
                Ok(inserted) => {
                    tracing::debug!(
                        requested = missing.len(),
                        inserted = inserted.len(),
                        "tags_created"
                    );
                    for tag in inserted {
                        resolved.insert(tag.name_key(), tag);
                    }
                }
                Err(TagWriteError::NameConflict) => {
                    tracing::debug!(requested = missing.len(), "tag_batch_insert_conflict");
                }
                Err(TagWriteError::Storage(e)) => return Err(TaggingError::Storage(e)),
            }

            let lost: Vec<String> = missing
                .iter()
                .map(|t| name_key(&t.name))
                .filter(|k| !resolved.contains_key(k))
                .collect();
            if lost.is_empty() {
                break;
            }
            tracing::debug!(count = lost.len(), "tag_insert_conflict_reread");
            for tag in self.repo.find_by_names(&lost).await? {
                resolved.insert(tag.name_key(), tag);
            }
        }

        Ok(resolved)
    }

    /// Edits name, description or metadata. Associations are left alone.
    pub async fn update(&self, id: Uuid, patch: &TagPatch) -> Result<Option<Tag>, TaggingError> {
        let patch = self.validated_patch(patch)?;
        Ok(self.repo.update_with_tags(id, &patch, None).await?)
    }

    pub fn validated_patch(&self, patch: &TagPatch) -> Result<TagPatch, TaggingError> {
        let name = match &patch.name {
            Some(n) => Some(self.policy.validate_name(n)?.to_string()),
            None => None,
        };
        Ok(TagPatch {
            name,
            description: patch.description.clone(),
            metadata: patch.metadata.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory::{InsertConflictMode, MemoryStore};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn rejects_blank_and_long_names() {
        let policy = TaggingPolicy { max_name_chars: 5 };
        assert!(matches!(
            policy.validate_name("   "),
            Err(TaggingError::Validation(_))
        ));
        assert!(matches!(
            policy.validate_name("toolong"),
            Err(TaggingError::Validation(_))
        ));
        assert_eq!(policy.validate_name("  ゲーム  ").unwrap(), "ゲーム");
    }

    #[tokio::test]
    async fn creates_missing_and_reuses_existing_case_insensitively() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let tags = TagStore::new(&store, TaggingPolicy::default());

        let first = tags
            .find_or_create_batch(&names(&["RPG"]), owner)
            .await
            .unwrap();
        let rpg_id = first["rpg"].id;

        let second = tags
            .find_or_create_batch(&names(&["rpg", "Strategy", "STRATEGY"]), owner)
            .await
            .unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second["rpg"].id, rpg_id);
        assert_eq!(second["rpg"].name, "RPG");
        assert_eq!(second["strategy"].name, "Strategy");
        assert_eq!(store.tag_count().await, 2);
    }

    #[tokio::test]
    async fn validation_happens_before_store_access() {
        let store = MemoryStore::new();
        let tags = TagStore::new(&store, TaggingPolicy::default());
        let err = tags
            .find_or_create_batch(&names(&["ok", " "]), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, TaggingError::Validation(_)));
        assert_eq!(store.calls().find_by_names, 0);
        assert_eq!(store.calls().insert_batch, 0);
    }

    #[tokio::test]
    async fn lost_race_is_reread_not_reported() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let rival = Uuid::new_v4();
        store.inject_concurrent_insert("Attack-On-Titan", rival).await;

        let tags = TagStore::new(&store, TaggingPolicy::default());
        let out = tags
            .find_or_create_batch(&names(&["attack-on-titan", "fresh"]), owner)
            .await
            .unwrap();

        let winner = &out["attack-on-titan"];
        assert_eq!(winner.name, "Attack-On-Titan");
        assert_eq!(winner.created_by, rival);
        assert_eq!(out["fresh"].created_by, owner);
        assert_eq!(store.tag_count().await, 2);
        let calls = store.calls();
        assert_eq!(calls.find_by_names, 2);
        assert_eq!(calls.insert_batch, 1);
    }

    #[tokio::test]
    async fn aborted_batch_is_retried_after_reread() {
        let store = MemoryStore::new();
        store.set_insert_conflict_mode(InsertConflictMode::AbortBatch).await;
        store.inject_concurrent_insert("taken", Uuid::new_v4()).await;

        let tags = TagStore::new(&store, TaggingPolicy::default());
        let out = tags
            .find_or_create_batch(&names(&["taken", "free"]), Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(store.tag_count().await, 2);
        assert_eq!(store.calls().insert_batch, 2);
    }

    #[tokio::test]
    async fn lookup_alone_creates_nothing() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let tags = TagStore::new(&store, TaggingPolicy::default());
        tags.find_or_create_batch(&names(&["Known"]), owner)
            .await
            .unwrap();

        let lookup = tags
            .lookup_batch(&names(&["known", "unknown"]))
            .await
            .unwrap();
        let found: Vec<&str> = lookup.found().map(|t| t.name.as_str()).collect();
        assert_eq!(found, vec!["Known"]);
        assert_eq!(store.tag_count().await, 1);

        let out = tags.create_missing(lookup, owner).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(store.tag_count().await, 2);
    }

    #[tokio::test]
    async fn final_sigma_names_are_found_again() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let tags = TagStore::new(&store, TaggingPolicy::default());
        let first = tags
            .find_or_create_batch(&names(&["ΟΔΟΣ"]), owner)
            .await
            .unwrap();
        let second = tags
            .find_or_create_batch(&names(&["οδοσ"]), owner)
            .await
            .unwrap();
        assert_eq!(second["οδοσ"].id, first["οδοσ"].id);
        assert_eq!(store.tag_count().await, 1);
        assert_eq!(store.calls().insert_batch, 1);
    }

    #[tokio::test]
    async fn rename_onto_existing_name_is_a_validation_error() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let tags = TagStore::new(&store, TaggingPolicy::default());
        let created = tags
            .find_or_create_batch(&names(&["alpha", "beta"]), owner)
            .await
            .unwrap();

        let patch = TagPatch {
            name: Some("ALPHA".into()),
            ..Default::default()
        };
        let err = tags.update(created["beta"].id, &patch).await.unwrap_err();
        assert!(matches!(err, TaggingError::Validation(_)));

        let patch = TagPatch {
            name: Some("Beta Max".into()),
            description: Some(Some("renamed".into())),
            ..Default::default()
        };
        let updated = tags
            .update(created["beta"].id, &patch)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Beta Max");
        assert_eq!(updated.description.as_deref(), Some("renamed"));
        assert!(tags.find_by_name("beta max").await.unwrap().is_some());
    }
}
