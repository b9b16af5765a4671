//! Process-local implementation of every storage port.
//!
//! All state sits behind one lock, so each port call is atomic the same way a
//! single database transaction is. Besides serving `DB_BACKEND=memory`, the
//! store counts calls to its batch primitives and can simulate a concurrent
//! writer creating a tag between our lookup and our insert.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::application::ports::association_repository::AssociationRepository;
use crate::application::ports::log_repository::LogRepository;
use crate::application::ports::tag_repository::{TagRepository, TagWriteError};
use crate::domain::logs::log::{Log, LogPatch, NewLog};
use crate::domain::tags::tag::{
    Association, AssociationSort, ContentKind, NewTag, Tag, TagPatch, name_key,
};

/// How `insert_batch` treats a row whose name already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InsertConflictMode {
    /// Skip the row, insert the rest (`ON CONFLICT DO NOTHING`).
    #[default]
    SkipRow,
    /// Fail the whole statement with `NameConflict`.
    AbortBatch,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub find_by_name: usize,
    pub find_by_names: usize,
    pub insert_batch: usize,
    pub replace: usize,
}

#[derive(Default)]
struct Counters {
    find_by_name: AtomicUsize,
    find_by_names: AtomicUsize,
    insert_batch: AtomicUsize,
    replace: AtomicUsize,
}

#[derive(Default)]
struct State {
    tags: HashMap<Uuid, Tag>,
    logs: HashMap<Uuid, Log>,
    log_links: HashMap<Uuid, Vec<Association>>,
    tag_links: HashMap<Uuid, Vec<Association>>,
    last_tick: Option<DateTime<Utc>>,
    rival_inserts: Vec<NewTag>,
    conflict_mode: InsertConflictMode,
    fail_next_replace: bool,
}

impl State {
    // Strictly increasing so ordering by time is never ambiguous.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = match self.last_tick {
            Some(last) if now <= last => last + Duration::microseconds(1),
            _ => now,
        };
        self.last_tick = Some(next);
        next
    }

    fn tag_id_by_key(&self, key: &str) -> Option<Uuid> {
        self.tags
            .values()
            .find(|t| t.name_key() == key)
            .map(|t| t.id)
    }

    fn insert_tag(&mut self, new: &NewTag) -> Tag {
        let now = self.tick();
        let tag = Tag {
            id: new.id,
            name: new.name.clone(),
            description: new.description.clone(),
            metadata: new.metadata.clone(),
            created_by: new.created_by,
            created_at: now,
            updated_at: now,
            usage_count: 0,
        };
        self.tags.insert(tag.id, tag.clone());
        tag
    }

    fn apply_rival_inserts(&mut self) {
        for rival in std::mem::take(&mut self.rival_inserts) {
            if self.tag_id_by_key(&name_key(&rival.name)).is_none() {
                self.insert_tag(&rival);
            }
        }
    }

    fn links(&self, kind: ContentKind) -> &HashMap<Uuid, Vec<Association>> {
        match kind {
            ContentKind::Log => &self.log_links,
            ContentKind::Tag => &self.tag_links,
        }
    }

    fn links_mut(&mut self, kind: ContentKind) -> &mut HashMap<Uuid, Vec<Association>> {
        match kind {
            ContentKind::Log => &mut self.log_links,
            ContentKind::Tag => &mut self.tag_links,
        }
    }

    /// The constraints the relational schema enforces on an association set.
    /// `content_pending` skips the content existence check for rows inserted in
    /// the same unit of work.
    fn check_replace(
        &mut self,
        kind: ContentKind,
        content_id: Uuid,
        tag_ids: &[Uuid],
        content_pending: bool,
    ) -> anyhow::Result<()> {
        if std::mem::take(&mut self.fail_next_replace) {
            anyhow::bail!("association write failed");
        }
        let content_exists = match kind {
            ContentKind::Log => self.logs.contains_key(&content_id),
            ContentKind::Tag => self.tags.contains_key(&content_id),
        };
        if !content_pending && !content_exists {
            anyhow::bail!("{} {content_id} does not exist", kind.as_str());
        }
        let mut seen: HashSet<Uuid> = HashSet::new();
        for id in tag_ids {
            if !seen.insert(*id) {
                anyhow::bail!("duplicate tag {id} in association set");
            }
            if !self.tags.contains_key(id) {
                anyhow::bail!("tag {id} does not exist");
            }
            if kind == ContentKind::Tag && *id == content_id {
                anyhow::bail!("tag {id} cannot reference itself");
            }
        }
        Ok(())
    }

    fn apply_replace(&mut self, kind: ContentKind, content_id: Uuid, tag_ids: &[Uuid]) {
        let now = self.tick();
        let prior = self.links_mut(kind).remove(&content_id).unwrap_or_default();
        let since: HashMap<Uuid, DateTime<Utc>> =
            prior.iter().map(|a| (a.tag_id, a.created_at)).collect();

        let rows: Vec<Association> = tag_ids
            .iter()
            .enumerate()
            .map(|(i, id)| Association {
                content_id,
                tag_id: *id,
                order: i as i32,
                created_at: since.get(id).copied().unwrap_or(now),
            })
            .collect();

        let mut deltas: HashMap<Uuid, i64> = HashMap::new();
        for a in &prior {
            *deltas.entry(a.tag_id).or_default() -= 1;
        }
        for id in tag_ids {
            *deltas.entry(*id).or_default() += 1;
        }
        for (id, delta) in deltas {
            if delta == 0 {
                continue;
            }
            if let Some(tag) = self.tags.get_mut(&id) {
                tag.usage_count += delta;
            }
        }

        if !rows.is_empty() {
            self.links_mut(kind).insert(content_id, rows);
        }
    }

    fn tags_for(&self, rows: impl Iterator<Item = Uuid>) -> Vec<Tag> {
        rows.filter_map(|id| self.tags.get(&id).cloned()).collect()
    }
}

pub struct MemoryStore {
    state: Mutex<State>,
    counters: Counters,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            counters: Counters::default(),
        }
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            find_by_name: self.counters.find_by_name.load(Ordering::SeqCst),
            find_by_names: self.counters.find_by_names.load(Ordering::SeqCst),
            insert_batch: self.counters.insert_batch.load(Ordering::SeqCst),
            replace: self.counters.replace.load(Ordering::SeqCst),
        }
    }

    pub fn reset_calls(&self) {
        self.counters.find_by_name.store(0, Ordering::SeqCst);
        self.counters.find_by_names.store(0, Ordering::SeqCst);
        self.counters.insert_batch.store(0, Ordering::SeqCst);
        self.counters.replace.store(0, Ordering::SeqCst);
    }

    /// Another writer creates `name` right before the next batch insert runs.
    pub async fn inject_concurrent_insert(&self, name: &str, created_by: Uuid) {
        self.state
            .lock()
            .await
            .rival_inserts
            .push(NewTag::named(name, created_by));
    }

    pub async fn set_insert_conflict_mode(&self, mode: InsertConflictMode) {
        self.state.lock().await.conflict_mode = mode;
    }

    /// The next association replace (standalone or inside a content write) fails.
    pub async fn fail_next_replace(&self) {
        self.state.lock().await.fail_next_replace = true;
    }

    pub async fn tag_count(&self) -> usize {
        self.state.lock().await.tags.len()
    }

    pub async fn tag_by_name(&self, name: &str) -> Option<Tag> {
        let st = self.state.lock().await;
        let id = st.tag_id_by_key(&name_key(name))?;
        st.tags.get(&id).cloned()
    }

    /// Raw association rows in stored order.
    pub async fn associations_of(&self, kind: ContentKind, content_id: Uuid) -> Vec<Association> {
        let st = self.state.lock().await;
        let mut rows = st.links(kind).get(&content_id).cloned().unwrap_or_default();
        rows.sort_by_key(|a| a.order);
        rows
    }
}

#[async_trait]
impl TagRepository for MemoryStore {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<Tag>> {
        Ok(self.state.lock().await.tags.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> anyhow::Result<Option<Tag>> {
        self.counters.find_by_name.fetch_add(1, Ordering::SeqCst);
        let st = self.state.lock().await;
        let key = name_key(name);
        Ok(st.tags.values().find(|t| t.name_key() == key).cloned())
    }

    async fn find_by_names(&self, keys: &[String]) -> anyhow::Result<Vec<Tag>> {
        self.counters.find_by_names.fetch_add(1, Ordering::SeqCst);
        let st = self.state.lock().await;
        let wanted: HashSet<&str> = keys.iter().map(String::as_str).collect();
        Ok(st
            .tags
            .values()
            .filter(|t| wanted.contains(t.name_key().as_str()))
            .cloned()
            .collect())
    }

    async fn insert_batch(&self, tags: &[NewTag]) -> Result<Vec<Tag>, TagWriteError> {
        self.counters.insert_batch.fetch_add(1, Ordering::SeqCst);
        let mut st = self.state.lock().await;
        st.apply_rival_inserts();

        let mut batch_keys: HashSet<String> = HashSet::new();
        let mut accepted: Vec<&NewTag> = Vec::new();
        for new in tags {
            let key = name_key(&new.name);
            let taken = st.tag_id_by_key(&key).is_some() || !batch_keys.insert(key);
            if taken {
                if st.conflict_mode == InsertConflictMode::AbortBatch {
                    return Err(TagWriteError::NameConflict);
                }
                continue;
            }
            accepted.push(new);
        }
        Ok(accepted.into_iter().map(|new| st.insert_tag(new)).collect())
    }

    async fn create_with_tags(
        &self,
        tag: &NewTag,
        tag_ids: &[Uuid],
    ) -> Result<Tag, TagWriteError> {
        let mut st = self.state.lock().await;
        st.apply_rival_inserts();
        if st.tag_id_by_key(&name_key(&tag.name)).is_some() {
            return Err(TagWriteError::NameConflict);
        }
        self.counters.replace.fetch_add(1, Ordering::SeqCst);
        st.check_replace(ContentKind::Tag, tag.id, tag_ids, true)?;
        let created = st.insert_tag(tag);
        st.apply_replace(ContentKind::Tag, created.id, tag_ids);
        Ok(created)
    }

    async fn update_with_tags(
        &self,
        id: Uuid,
        patch: &TagPatch,
        tag_ids: Option<&[Uuid]>,
    ) -> Result<Option<Tag>, TagWriteError> {
        let mut st = self.state.lock().await;
        if !st.tags.contains_key(&id) {
            return Ok(None);
        }
        if let Some(name) = &patch.name {
            if let Some(holder) = st.tag_id_by_key(&name_key(name)) {
                if holder != id {
                    return Err(TagWriteError::NameConflict);
                }
            }
        }
        if let Some(ids) = tag_ids {
            self.counters.replace.fetch_add(1, Ordering::SeqCst);
            st.check_replace(ContentKind::Tag, id, ids, false)?;
        }

        let now = st.tick();
        let Some(tag) = st.tags.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = &patch.name {
            tag.name = name.clone();
        }
        if let Some(description) = &patch.description {
            tag.description = description.clone();
        }
        if let Some(metadata) = &patch.metadata {
            tag.metadata = metadata.clone();
        }
        tag.updated_at = now;

        if let Some(ids) = tag_ids {
            st.apply_replace(ContentKind::Tag, id, ids);
        }
        Ok(st.tags.get(&id).cloned())
    }

    async fn search(&self, query: Option<&str>, limit: i64) -> anyhow::Result<Vec<Tag>> {
        let st = self.state.lock().await;
        let needle = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(name_key);
        let mut hits: Vec<Tag> = st
            .tags
            .values()
            .filter(|t| match &needle {
                Some(n) => t.name_key().contains(n.as_str()),
                None => true,
            })
            .cloned()
            .collect();
        hits.sort_by(|a, b| {
            b.usage_count
                .cmp(&a.usage_count)
                .then_with(|| a.name.cmp(&b.name))
        });
        hits.truncate(limit.max(0) as usize);
        Ok(hits)
    }
}

#[async_trait]
impl AssociationRepository for MemoryStore {
    async fn replace(
        &self,
        kind: ContentKind,
        content_id: Uuid,
        tag_ids: &[Uuid],
    ) -> anyhow::Result<()> {
        self.counters.replace.fetch_add(1, Ordering::SeqCst);
        let mut st = self.state.lock().await;
        st.check_replace(kind, content_id, tag_ids, false)?;
        st.apply_replace(kind, content_id, tag_ids);
        Ok(())
    }

    async fn list_by_content(
        &self,
        kind: ContentKind,
        content_id: Uuid,
        sort: AssociationSort,
        limit: Option<i64>,
    ) -> anyhow::Result<Vec<Tag>> {
        let st = self.state.lock().await;
        let mut rows = st.links(kind).get(&content_id).cloned().unwrap_or_default();
        match sort {
            AssociationSort::Order => rows.sort_by_key(|a| a.order),
            AssociationSort::Recent => rows.sort_by(|a, b| {
                b.created_at
                    .cmp(&a.created_at)
                    .then_with(|| a.order.cmp(&b.order))
            }),
        }
        if let Some(limit) = limit {
            rows.truncate(limit.max(0) as usize);
        }
        Ok(st.tags_for(rows.into_iter().map(|a| a.tag_id)))
    }

    async fn list_referrers(&self, tag_id: Uuid, limit: i64) -> anyhow::Result<Vec<Tag>> {
        let st = self.state.lock().await;
        let mut rows: Vec<&Association> = st
            .tag_links
            .values()
            .flatten()
            .filter(|a| a.tag_id == tag_id)
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit.max(0) as usize);
        Ok(st.tags_for(rows.into_iter().map(|a| a.content_id)))
    }
}

#[async_trait]
impl LogRepository for MemoryStore {
    async fn get_by_id(&self, id: Uuid) -> anyhow::Result<Option<Log>> {
        Ok(self.state.lock().await.logs.get(&id).cloned())
    }

    async fn create_with_tags(&self, log: &NewLog, tag_ids: &[Uuid]) -> anyhow::Result<Log> {
        let mut st = self.state.lock().await;
        if st.logs.contains_key(&log.id) {
            anyhow::bail!("log {} already exists", log.id);
        }
        self.counters.replace.fetch_add(1, Ordering::SeqCst);
        st.check_replace(ContentKind::Log, log.id, tag_ids, true)?;
        let now = st.tick();
        let created = Log {
            id: log.id,
            user_id: log.user_id,
            title: log.title.clone(),
            content_md: log.content_md.clone(),
            is_public: log.is_public,
            created_at: now,
            updated_at: now,
        };
        st.logs.insert(created.id, created.clone());
        st.apply_replace(ContentKind::Log, created.id, tag_ids);
        Ok(created)
    }

    async fn update_with_tags(
        &self,
        id: Uuid,
        user_id: Uuid,
        patch: &LogPatch,
        tag_ids: Option<&[Uuid]>,
    ) -> anyhow::Result<Option<Log>> {
        let mut st = self.state.lock().await;
        match st.logs.get(&id) {
            Some(log) if log.user_id == user_id => {}
            _ => return Ok(None),
        }
        if let Some(ids) = tag_ids {
            self.counters.replace.fetch_add(1, Ordering::SeqCst);
            st.check_replace(ContentKind::Log, id, ids, false)?;
        }
        let now = st.tick();
        let Some(log) = st.logs.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = &patch.title {
            log.title = title.clone();
        }
        if let Some(content) = &patch.content_md {
            log.content_md = content.clone();
        }
        if let Some(is_public) = patch.is_public {
            log.is_public = is_public;
        }
        log.updated_at = now;
        if let Some(ids) = tag_ids {
            st.apply_replace(ContentKind::Log, id, ids);
        }
        Ok(st.logs.get(&id).cloned())
    }

    async fn delete_owned(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        let mut st = self.state.lock().await;
        match st.logs.get(&id) {
            Some(log) if log.user_id == user_id => {}
            _ => return Ok(false),
        }
        st.apply_replace(ContentKind::Log, id, &[]);
        st.logs.remove(&id);
        Ok(true)
    }

    async fn list_public_by_tag(&self, tag_id: Uuid, limit: i64) -> anyhow::Result<Vec<Log>> {
        let st = self.state.lock().await;
        let mut logs: Vec<Log> = st
            .log_links
            .iter()
            .filter(|(_, rows)| rows.iter().any(|a| a.tag_id == tag_id))
            .filter_map(|(log_id, _)| st.logs.get(log_id))
            .filter(|l| l.is_public)
            .cloned()
            .collect();
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        logs.truncate(limit.max(0) as usize);
        Ok(logs)
    }
}
