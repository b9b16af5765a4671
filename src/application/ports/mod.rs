pub mod association_repository;
pub mod log_repository;
pub mod tag_repository;
