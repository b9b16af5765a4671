use crate::domain::logs::log::Log;
use crate::domain::tags::tag::Tag;

#[derive(Debug, Clone)]
pub struct LogDetailDto {
    pub log: Log,
    /// In stored association order.
    pub associated_tags: Vec<Tag>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateLogInput {
    pub title: Option<String>,
    pub content_md: String,
    pub is_public: bool,
    /// Explicit tags; they precede hashtags found in `content_md`.
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateLogInput {
    // None => not provided; Some(None) => clear; Some(Some(t)) => set
    pub title: Option<Option<String>>,
    pub content_md: Option<String>,
    pub is_public: Option<bool>,
    pub tags: Option<Vec<String>>,
}

impl UpdateLogInput {
    /// Content or an explicit tag list means associations are recomputed.
    pub fn relinks(&self) -> bool {
        self.content_md.is_some() || self.tags.is_some()
    }
}
