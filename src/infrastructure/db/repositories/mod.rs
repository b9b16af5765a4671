pub mod association_repository_sqlx;
pub mod log_repository_sqlx;
pub mod tag_repository_sqlx;
