use uuid::Uuid;

use crate::application::ports::tag_repository::TagWriteError;

#[derive(thiserror::Error, Debug)]
pub enum TaggingError {
    #[error("{0}")]
    Validation(String),
    #[error("tag {tag_id} cannot reference itself")]
    SelfReference { tag_id: Uuid },
    #[error("tag storage failed")]
    Storage(#[source] anyhow::Error),
}

impl From<anyhow::Error> for TaggingError {
    fn from(e: anyhow::Error) -> Self {
        TaggingError::Storage(e)
    }
}

impl From<TagWriteError> for TaggingError {
    fn from(e: TagWriteError) -> Self {
        match e {
            TagWriteError::NameConflict => {
                TaggingError::Validation("tag name already in use".into())
            }
            TagWriteError::Storage(e) => TaggingError::Storage(e),
        }
    }
}
