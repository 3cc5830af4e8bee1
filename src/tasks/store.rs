use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{Task, TaskPatch};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("owner not found")]
    OwnerNotFound,
    #[error("task {0} not found")]
    TaskNotFound(String),
    #[error("description must not be empty")]
    EmptyDescription,
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Durable per-owner task collections.
///
/// Every call is scoped to an owner and fails with `OwnerNotFound` when the
/// owner does not exist. Calls on the same owner are not serialized against
/// each other beyond what the backend guarantees for a single call.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn create(&self, owner: Uuid, description: &str, now: OffsetDateTime)
        -> StoreResult<Task>;

    /// Full collection, insertion order.
    async fn read(&self, owner: Uuid) -> StoreResult<Vec<Task>>;

    async fn update(
        &self,
        owner: Uuid,
        id: &str,
        patch: TaskPatch,
        now: OffsetDateTime,
    ) -> StoreResult<Task>;

    /// Returns the removed task.
    async fn delete(&self, owner: Uuid, id: &str) -> StoreResult<Task>;

    /// Returns what is left.
    async fn clear_completed(&self, owner: Uuid) -> StoreResult<Vec<Task>>;

    async fn delete_all(&self, owner: Uuid) -> StoreResult<Vec<Task>>;
}

pub(crate) fn check_patch(patch: &TaskPatch) -> StoreResult<()> {
    match patch.description.as_deref() {
        Some(d) if super::model::is_blank(d) => Err(StoreError::EmptyDescription),
        _ => Ok(()),
    }
}
