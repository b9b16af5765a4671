use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct Log {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: Option<String>,
    pub content_md: String,
    pub is_public: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct NewLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: Option<String>,
    pub content_md: String,
    pub is_public: bool,
}

// title: None => not provided; Some(None) => clear; Some(Some(t)) => set
#[derive(Debug, Clone, Default)]
pub struct LogPatch {
    pub title: Option<Option<String>>,
    pub content_md: Option<String>,
    pub is_public: Option<bool>,
}
