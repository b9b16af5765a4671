pub mod create_tag;
pub mod get_tag;
pub mod list_tag_links;
pub mod relink_tag;
pub mod search_tags;
pub mod update_tag;
