//! Hashtag extraction, tag resolution and content->tag association.
//!
//! Data flows text -> [`extract_hashtags`] -> [`TagResolver`] (one lookup, one
//! batch insert) -> [`AssociationService`] (one replace per content).

mod association;
mod error;
mod extractor;
mod resolver;
mod tag_store;

pub use association::{AssociationService, Content};
pub use error::TaggingError;
pub use extractor::extract_hashtags;
pub use resolver::TagResolver;
pub use tag_store::{BatchLookup, DEFAULT_MAX_TAG_NAME_CHARS, TagStore, TaggingPolicy};
