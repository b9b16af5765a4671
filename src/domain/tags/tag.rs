use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// Opaque key/value map; stored and returned as-is.
    pub metadata: serde_json::Value,
    pub created_by: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub usage_count: i64,
}

impl Tag {
    pub fn name_key(&self) -> String {
        name_key(&self.name)
    }
}

/// Case-insensitive identity of a tag name.
///
/// Lowercases one character at a time, like Postgres `lower()`, so keys
/// computed here match the `lower(name)` index (no final-sigma rule).
pub fn name_key(name: &str) -> String {
    name.chars().flat_map(char::to_lowercase).collect()
}

#[derive(Debug, Clone)]
pub struct NewTag {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
    pub created_by: Uuid,
}

impl NewTag {
    pub fn named(name: impl Into<String>, created_by: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            metadata: serde_json::Value::Object(Default::default()),
            created_by,
        }
    }
}

// description: None => not provided; Some(None) => clear; Some(Some(text)) => set
#[derive(Debug, Clone, Default)]
pub struct TagPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub metadata: Option<serde_json::Value>,
}

impl TagPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.metadata.is_none()
    }

    /// Name or description edits change what the tag references.
    pub fn touches_references(&self) -> bool {
        self.name.is_some() || self.description.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Log,
    Tag,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Log => "log",
            ContentKind::Tag => "tag",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssociationSort {
    /// Stored position ascending.
    #[default]
    Order,
    /// Association created_at descending, ties by position ascending.
    Recent,
}

impl AssociationSort {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "order" => Some(AssociationSort::Order),
            "recent" => Some(AssociationSort::Recent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Association {
    pub content_id: Uuid,
    pub tag_id: Uuid,
    pub order: i32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_key_lowercases_per_character() {
        assert_eq!(name_key("Dark Souls"), "dark souls");
        assert_eq!(name_key("ΟΔΟΣ"), "οδοσ");
        assert_eq!(name_key("ΟΔΟΣ"), name_key("οδοσ"));
        assert_ne!(name_key("ΟΔΟΣ"), "ΟΔΟΣ".to_lowercase());
    }
}
