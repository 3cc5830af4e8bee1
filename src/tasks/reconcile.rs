//! Optimistic rendering of a task list while mutations are in flight.
//!
//! Input is an immutable authoritative snapshot plus the intents that have
//! been submitted but not yet confirmed. The output is what should be shown
//! right now; once an intent is confirmed and dropped from the pending list,
//! the result collapses back to the authoritative state.

use serde::Serialize;
use time::OffsetDateTime;

use super::intent::Intent;
use super::model::{Task, View};
use super::view::{matches_view, ListSummary};

/// Which per-item controls are usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemControls {
    pub can_toggle: bool,
    pub can_edit: bool,
    pub can_save: bool,
    pub can_delete: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedTask {
    #[serde(flatten)]
    pub task: Task,
    /// Some pending intent targets this task.
    pub pending: bool,
    /// Dimmed with every control disabled, because a bulk action in flight
    /// may remove it.
    pub suppressed: bool,
    pub controls: ItemControls,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reconciled {
    pub tasks: Vec<RenderedTask>,
    pub clear_completed_disabled: bool,
    pub delete_all_disabled: bool,
    pub is_adding: bool,
}

impl Reconciled {
    /// The view filter applied to the optimistic collection.
    pub fn filtered(&self, view: View) -> Vec<RenderedTask> {
        self.tasks
            .iter()
            .filter(|r| matches_view(&r.task, view))
            .cloned()
            .collect()
    }

    pub fn plain_tasks(&self) -> Vec<Task> {
        self.tasks.iter().map(|r| r.task.clone()).collect()
    }

    pub fn summary(&self) -> ListSummary {
        ListSummary::of(&self.plain_tasks())
    }
}

pub fn reconcile(authoritative: &[Task], pending: &[Intent], now: OffsetDateTime) -> Reconciled {
    let deleting_all = pending.iter().any(|i| matches!(i, Intent::DeleteAll));
    let clearing = pending.iter().any(|i| matches!(i, Intent::ClearCompleted));
    let is_adding = pending.iter().any(|i| matches!(i, Intent::CreateTask { .. }));

    let mut tasks = Vec::with_capacity(authoritative.len());
    if !deleting_all {
        for task in authoritative {
            // Bulk clear removes what the server currently holds as completed.
            if clearing && task.is_completed {
                continue;
            }
            if let Some(rendered) = apply_item_intents(task, pending, clearing, now) {
                tasks.push(rendered);
            }
        }
    }

    let any_completed = tasks.iter().any(|r| r.task.is_completed);
    Reconciled {
        clear_completed_disabled: deleting_all || clearing || !any_completed,
        delete_all_disabled: deleting_all || tasks.is_empty(),
        is_adding,
        tasks,
    }
}

fn apply_item_intents(
    task: &Task,
    pending: &[Intent],
    clearing: bool,
    now: OffsetDateTime,
) -> Option<RenderedTask> {
    let mut shown = task.clone();
    let mut is_pending = false;

    for intent in pending.iter().filter(|i| i.task_id() == Some(task.id.as_str())) {
        is_pending = true;
        match intent {
            Intent::DeleteTask { .. } => return None,
            Intent::ToggleCompletion { is_completed: prior, .. } => {
                let target = !*prior;
                // Already confirmed: keep the authoritative timestamp.
                if shown.is_completed != target {
                    shown.is_completed = target;
                    shown.completed_at = target.then_some(now);
                }
            }
            Intent::SaveTask { description, .. } => {
                shown.description = description.clone();
                shown.is_editing = Some(false);
            }
            Intent::EditTask { .. } => shown.is_editing = Some(true),
            _ => {}
        }
    }

    let suppressed = clearing && shown.is_completed;
    let editing = shown.is_editing();
    let controls = ItemControls {
        can_toggle: !suppressed && !editing,
        can_edit: !suppressed && !editing && !shown.is_completed,
        can_save: !suppressed && editing,
        can_delete: !suppressed && !editing && !shown.is_completed,
    };

    Some(RenderedTask {
        task: shown,
        pending: is_pending,
        suppressed,
        controls,
    })
}
