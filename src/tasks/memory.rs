use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::model::{is_blank, Task, TaskPatch};
use super::store::{check_patch, StoreError, StoreResult, TaskStore};

/// Process-local store; dropping it drops every collection.
///
/// A store from [`InMemoryTaskStore::new`] only knows owners passed to
/// [`register_owner`](Self::register_owner). One from
/// [`InMemoryTaskStore::open`] backs the binary when `TASK_STORE=memory`: the
/// session layer has already authenticated the owner, so a collection is
/// created on first write and an unknown owner reads as empty.
#[derive(Default)]
pub struct InMemoryTaskStore {
    owners: RwLock<HashMap<Uuid, Vec<Task>>>,
    open: bool,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open() -> Self {
        Self {
            open: true,
            ..Self::default()
        }
    }

    fn collection<'a>(
        &self,
        owners: &'a mut HashMap<Uuid, Vec<Task>>,
        owner: Uuid,
    ) -> StoreResult<&'a mut Vec<Task>> {
        if self.open {
            Ok(owners.entry(owner).or_default())
        } else {
            owners.get_mut(&owner).ok_or(StoreError::OwnerNotFound)
        }
    }

    pub async fn register_owner(&self, owner: Uuid) {
        self.owners.write().await.entry(owner).or_default();
    }

    /// Drops the owner together with its tasks.
    pub async fn remove_owner(&self, owner: Uuid) -> bool {
        self.owners.write().await.remove(&owner).is_some()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn create(
        &self,
        owner: Uuid,
        description: &str,
        now: OffsetDateTime,
    ) -> StoreResult<Task> {
        if is_blank(description) {
            return Err(StoreError::EmptyDescription);
        }
        let mut owners = self.owners.write().await;
        let tasks = self.collection(&mut owners, owner)?;
        let task = Task::new(description.to_string(), now);
        tasks.push(task.clone());
        debug!(%owner, task_id = %task.id, "task created");
        Ok(task)
    }

    async fn read(&self, owner: Uuid) -> StoreResult<Vec<Task>> {
        let owners = self.owners.read().await;
        match owners.get(&owner) {
            Some(tasks) => Ok(tasks.clone()),
            None if self.open => Ok(Vec::new()),
            None => Err(StoreError::OwnerNotFound),
        }
    }

    async fn update(
        &self,
        owner: Uuid,
        id: &str,
        patch: TaskPatch,
        now: OffsetDateTime,
    ) -> StoreResult<Task> {
        check_patch(&patch)?;
        let mut owners = self.owners.write().await;
        let tasks = self.collection(&mut owners, owner)?;
        let task = tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::TaskNotFound(id.to_string()))?;
        task.apply(patch, now);
        Ok(task.clone())
    }

    async fn delete(&self, owner: Uuid, id: &str) -> StoreResult<Task> {
        let mut owners = self.owners.write().await;
        let tasks = self.collection(&mut owners, owner)?;
        let idx = tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| StoreError::TaskNotFound(id.to_string()))?;
        Ok(tasks.remove(idx))
    }

    async fn clear_completed(&self, owner: Uuid) -> StoreResult<Vec<Task>> {
        let mut owners = self.owners.write().await;
        let tasks = self.collection(&mut owners, owner)?;
        tasks.retain(|t| !t.is_completed);
        Ok(tasks.clone())
    }

    async fn delete_all(&self, owner: Uuid) -> StoreResult<Vec<Task>> {
        let mut owners = self.owners.write().await;
        let tasks = self.collection(&mut owners, owner)?;
        tasks.clear();
        Ok(Vec::new())
    }
}
