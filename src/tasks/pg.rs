use anyhow::Context;
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::model::{is_blank, new_task_id, Task, TaskPatch};
use super::store::{check_patch, StoreError, StoreResult, TaskStore};

/// Row in `tasks`. `seq` only drives ordering and is not selected.
#[derive(Debug, FromRow)]
struct TaskRow {
    id: String,
    description: String,
    is_completed: bool,
    is_editing: bool,
    created_at: OffsetDateTime,
    completed_at: Option<OffsetDateTime>,
}

impl From<TaskRow> for Task {
    fn from(r: TaskRow) -> Self {
        Self {
            id: r.id,
            description: r.description,
            is_completed: r.is_completed,
            created_at: r.created_at,
            completed_at: r.completed_at,
            is_editing: Some(r.is_editing),
        }
    }
}

const TASK_COLUMNS: &str = "id, description, is_completed, is_editing, created_at, completed_at";

/// PostgreSQL-backed store. Each operation is a single statement, or an
/// owner check followed by one; `update` is read-modify-write and is not
/// fenced against a concurrent `delete` of the same task.
#[derive(Clone)]
pub struct PgTaskStore {
    db: PgPool,
}

impl PgTaskStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    async fn ensure_owner(&self, owner: Uuid) -> StoreResult<()> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(owner)
            .fetch_one(&self.db)
            .await
            .context("check owner")?;
        if exists {
            Ok(())
        } else {
            Err(StoreError::OwnerNotFound)
        }
    }

    async fn list(&self, owner: Uuid) -> StoreResult<Vec<Task>> {
        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = $1 ORDER BY seq ASC"
        ))
        .bind(owner)
        .fetch_all(&self.db)
        .await
        .context("list tasks")?;
        Ok(rows.into_iter().map(Task::from).collect())
    }
}

#[async_trait]
impl TaskStore for PgTaskStore {
    #[instrument(skip(self, description))]
    async fn create(
        &self,
        owner: Uuid,
        description: &str,
        now: OffsetDateTime,
    ) -> StoreResult<Task> {
        if is_blank(description) {
            return Err(StoreError::EmptyDescription);
        }
        // Insert only if the owner exists, in one statement.
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            r#"
            INSERT INTO tasks (id, user_id, description, is_completed, is_editing, created_at)
            SELECT $1, u.id, $3, false, false, $4
              FROM users u
             WHERE u.id = $2
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(new_task_id())
        .bind(owner)
        .bind(description)
        .bind(now)
        .fetch_optional(&self.db)
        .await
        .context("insert task")?;

        let task = Task::from(row.ok_or(StoreError::OwnerNotFound)?);
        debug!(%owner, task_id = %task.id, "task created");
        Ok(task)
    }

    #[instrument(skip(self))]
    async fn read(&self, owner: Uuid) -> StoreResult<Vec<Task>> {
        self.ensure_owner(owner).await?;
        self.list(owner).await
    }

    #[instrument(skip(self, patch))]
    async fn update(
        &self,
        owner: Uuid,
        id: &str,
        patch: TaskPatch,
        now: OffsetDateTime,
    ) -> StoreResult<Task> {
        check_patch(&patch)?;
        self.ensure_owner(owner).await?;

        let current = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = $1 AND id = $2"
        ))
        .bind(owner)
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("load task")?
        .ok_or_else(|| StoreError::TaskNotFound(id.to_string()))?;

        let mut task = Task::from(current);
        task.apply(patch, now);

        // The row may have been deleted since it was loaded.
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            r#"
            UPDATE tasks
               SET description = $3, is_completed = $4, is_editing = $5, completed_at = $6
             WHERE user_id = $1 AND id = $2
            RETURNING {TASK_COLUMNS}
            "#
        ))
        .bind(owner)
        .bind(id)
        .bind(&task.description)
        .bind(task.is_completed)
        .bind(task.is_editing())
        .bind(task.completed_at)
        .fetch_optional(&self.db)
        .await
        .context("update task")?
        .ok_or_else(|| StoreError::TaskNotFound(id.to_string()))?;

        Ok(row.into())
    }

    #[instrument(skip(self))]
    async fn delete(&self, owner: Uuid, id: &str) -> StoreResult<Task> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "DELETE FROM tasks WHERE user_id = $1 AND id = $2 RETURNING {TASK_COLUMNS}"
        ))
        .bind(owner)
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("delete task")?;

        match row {
            Some(r) => Ok(r.into()),
            None => {
                self.ensure_owner(owner).await?;
                Err(StoreError::TaskNotFound(id.to_string()))
            }
        }
    }

    #[instrument(skip(self))]
    async fn clear_completed(&self, owner: Uuid) -> StoreResult<Vec<Task>> {
        self.ensure_owner(owner).await?;
        let removed = sqlx::query("DELETE FROM tasks WHERE user_id = $1 AND is_completed")
            .bind(owner)
            .execute(&self.db)
            .await
            .context("clear completed tasks")?
            .rows_affected();
        debug!(%owner, removed, "completed tasks cleared");
        self.list(owner).await
    }

    #[instrument(skip(self))]
    async fn delete_all(&self, owner: Uuid) -> StoreResult<Vec<Task>> {
        self.ensure_owner(owner).await?;
        let removed = sqlx::query("DELETE FROM tasks WHERE user_id = $1")
            .bind(owner)
            .execute(&self.db)
            .await
            .context("delete all tasks")?
            .rows_affected();
        debug!(%owner, removed, "all tasks deleted");
        Ok(Vec::new())
    }
}
