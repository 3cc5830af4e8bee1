use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use super::intent::Intent;
use super::model::TaskPatch;
use super::store::{StoreError, TaskStore};
use crate::error::AppError;

/// Minimal acknowledgement for a mutation. `applied` is false when the
/// target task was already gone, which callers treat as success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub ok: bool,
    pub applied: bool,
}

impl Ack {
    fn applied() -> Self {
        Self { ok: true, applied: true }
    }

    fn already_gone() -> Self {
        Self { ok: true, applied: false }
    }
}

/// Routes each intent to exactly one store call.
pub struct Dispatcher<'a> {
    store: &'a dyn TaskStore,
}

impl<'a> Dispatcher<'a> {
    pub fn new(store: &'a dyn TaskStore) -> Self {
        Self { store }
    }

    #[instrument(skip(self, intent), fields(intent = intent.name()))]
    pub async fn dispatch(
        &self,
        owner: Uuid,
        intent: Intent,
        now: OffsetDateTime,
    ) -> Result<Ack, AppError> {
        let outcome = match intent {
            Intent::CreateTask { description } => {
                let task = self.store.create(owner, &description, now).await?;
                info!(user_id = %owner, task_id = %task.id, "task created");
                Ok(())
            }
            Intent::ToggleCompletion { id, is_completed } => {
                // The echoed prior value is trusted as-is.
                let patch = TaskPatch {
                    is_completed: Some(!is_completed),
                    completed_at: if is_completed { None } else { Some(now) },
                    ..Default::default()
                };
                self.store.update(owner, &id, patch, now).await.map(drop)
            }
            Intent::EditTask { id } => {
                let patch = TaskPatch {
                    is_editing: Some(true),
                    ..Default::default()
                };
                self.store.update(owner, &id, patch, now).await.map(drop)
            }
            Intent::SaveTask { id, description } => {
                let patch = TaskPatch {
                    description: Some(description),
                    is_editing: Some(false),
                    ..Default::default()
                };
                self.store.update(owner, &id, patch, now).await.map(drop)
            }
            Intent::DeleteTask { id } => self.store.delete(owner, &id).await.map(drop),
            Intent::ClearCompleted => self.store.clear_completed(owner).await.map(drop),
            Intent::DeleteAll => self.store.delete_all(owner).await.map(drop),
        };

        match outcome {
            Ok(()) => Ok(Ack::applied()),
            Err(StoreError::TaskNotFound(id)) => {
                debug!(user_id = %owner, task_id = %id, "task already gone; treating as done");
                Ok(Ack::already_gone())
            }
            Err(e) => Err(e.into()),
        }
    }
}
