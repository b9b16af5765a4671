use std::sync::Arc;

use crate::application::ports::association_repository::AssociationRepository;
use crate::application::ports::log_repository::LogRepository;
use crate::application::ports::tag_repository::TagRepository;
use crate::application::services::tagging::TaggingPolicy;
use crate::bootstrap::config::Config;
use crate::infrastructure::db::PgPool;
use crate::infrastructure::db::repositories::association_repository_sqlx::SqlxAssociationRepository;
use crate::infrastructure::db::repositories::log_repository_sqlx::SqlxLogRepository;
use crate::infrastructure::db::repositories::tag_repository_sqlx::SqlxTagRepository;
use crate::infrastructure::memory::MemoryStore;

#[derive(Clone)]
pub struct AppContext {
    pub cfg: Config,
    services: Arc<AppServices>,
}

#[derive(Clone)]
pub struct AppServices {
    tag_repo: Arc<dyn TagRepository>,
    association_repo: Arc<dyn AssociationRepository>,
    log_repo: Arc<dyn LogRepository>,
    pool: Option<PgPool>,
}

impl AppServices {
    pub fn new(
        tag_repo: Arc<dyn TagRepository>,
        association_repo: Arc<dyn AssociationRepository>,
        log_repo: Arc<dyn LogRepository>,
        pool: Option<PgPool>,
    ) -> Self {
        Self {
            tag_repo,
            association_repo,
            log_repo,
            pool,
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self::new(
            Arc::new(SqlxTagRepository::new(pool.clone())),
            Arc::new(SqlxAssociationRepository::new(pool.clone())),
            Arc::new(SqlxLogRepository::new(pool.clone())),
            Some(pool),
        )
    }

    /// All three ports backed by one process-local store.
    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::new(store.clone(), store.clone(), store, None)
    }
}

impl AppContext {
    pub fn new(cfg: Config, services: AppServices) -> Self {
        Self {
            cfg,
            services: Arc::new(services),
        }
    }

    pub fn tag_repo(&self) -> Arc<dyn TagRepository> {
        self.services.tag_repo.clone()
    }

    pub fn association_repo(&self) -> Arc<dyn AssociationRepository> {
        self.services.association_repo.clone()
    }

    pub fn log_repo(&self) -> Arc<dyn LogRepository> {
        self.services.log_repo.clone()
    }

    pub fn pool(&self) -> Option<PgPool> {
        self.services.pool.clone()
    }

    pub fn policy(&self) -> TaggingPolicy {
        self.cfg.tagging_policy()
    }
}
