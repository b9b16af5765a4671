use crate::application::ports::tag_repository::TagRepository;
use crate::domain::tags::tag::Tag;

pub struct SearchTags<'a, R: TagRepository + ?Sized> {
    pub repo: &'a R,
}

impl<'a, R: TagRepository + ?Sized> SearchTags<'a, R> {
    pub async fn execute(&self, query: Option<String>, limit: i64) -> anyhow::Result<Vec<Tag>> {
        let query = query.filter(|s| !s.trim().is_empty());
        self.repo.search(query.as_deref(), limit.clamp(1, 100)).await
    }
}
