use uuid::Uuid;

use crate::application::ports::log_repository::LogRepository;

pub struct DeleteLog<'a, L: LogRepository + ?Sized> {
    pub logs: &'a L,
}

impl<'a, L: LogRepository + ?Sized> DeleteLog<'a, L> {
    pub async fn execute(&self, id: Uuid, user_id: Uuid) -> anyhow::Result<bool> {
        let deleted = self.logs.delete_owned(id, user_id).await?;
        if deleted {
            tracing::info!(log_id = %id, "log_deleted");
        }
        Ok(deleted)
    }
}
