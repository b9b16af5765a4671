use crate::domain::tags::tag::Tag;

#[derive(Debug, Clone, Default)]
pub struct CreateTagInput {
    pub name: String,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct SavedTagDto {
    pub tag: Tag,
    pub associated_tags: Vec<Tag>,
    /// False when the name already belonged to an existing tag.
    pub created: bool,
}

#[derive(Debug, Clone)]
pub struct TagDetailDto {
    pub tag: Tag,
    pub associated_tags: Vec<Tag>,
    pub referrers: Vec<Tag>,
}
