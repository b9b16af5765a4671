use uuid::Uuid;

use crate::application::ports::log_repository::LogRepository;
use crate::domain::logs::log::Log;

pub struct ListLogsByTag<'a, L: LogRepository + ?Sized> {
    pub logs: &'a L,
}

impl<'a, L: LogRepository + ?Sized> ListLogsByTag<'a, L> {
    pub async fn execute(&self, tag_id: Uuid, limit: i64) -> anyhow::Result<Vec<Log>> {
        self.logs.list_public_by_tag(tag_id, limit.clamp(1, 100)).await
    }
}
