pub mod create_log;
pub mod delete_log;
pub mod get_log;
pub mod list_log_tags;
pub mod list_logs_by_tag;
pub mod update_log;
