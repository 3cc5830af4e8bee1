use serde::Serialize;

use super::model::{Task, View};

/// Subset of `tasks` shown under `view`, insertion order preserved.
pub fn filter_view(tasks: &[Task], view: View) -> Vec<Task> {
    tasks.iter().filter(|t| matches_view(t, view)).cloned().collect()
}

pub fn matches_view(task: &Task, view: View) -> bool {
    match view {
        View::All => true,
        View::Active => !task.is_completed,
        View::Completed => task.is_completed,
    }
}

pub fn empty_message(view: View) -> &'static str {
    match view {
        View::All => "No tasks available",
        View::Active => "No active tasks",
        View::Completed => "No completed tasks",
    }
}

/// Footer state for a collection: count label and bulk control availability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSummary {
    pub items_left: String,
    pub can_clear_completed: bool,
    pub can_delete_all: bool,
}

impl ListSummary {
    pub fn of(tasks: &[Task]) -> Self {
        let n = tasks.len();
        Self {
            items_left: format!("{} {} left", n, if n == 1 { "item" } else { "items" }),
            can_clear_completed: tasks.iter().any(|t| t.is_completed),
            can_delete_all: n > 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::tasks::model::TaskPatch;
    use time::macros::datetime;

    fn sample() -> Vec<Task> {
        let now = datetime!(2024-03-01 09:00 UTC);
        let mut done = Task::new("A".into(), now);
        done.apply(
            TaskPatch {
                is_completed: Some(true),
                ..Default::default()
            },
            now,
        );
        vec![
            done,
            Task::new("B".into(), now),
            Task::new("C".into(), now),
        ]
    }

    #[test]
    fn all_is_identity() {
        let tasks = sample();
        assert_eq!(filter_view(&tasks, View::All), tasks);
    }

    #[test]
    fn active_and_completed_partition_all() {
        let tasks = sample();
        let ids = |v: Vec<Task>| v.into_iter().map(|t| t.id).collect::<HashSet<_>>();
        let all = ids(filter_view(&tasks, View::All));
        let active = ids(filter_view(&tasks, View::Active));
        let completed = ids(filter_view(&tasks, View::Completed));

        assert!(active.is_disjoint(&completed));
        assert_eq!(&active | &completed, all);
        assert_eq!(active.len(), 2);
        assert_eq!(completed.len(), 1);
    }

    #[test]
    fn filter_preserves_order() {
        let tasks = sample();
        let active = filter_view(&tasks, View::Active);
        assert_eq!(active[0].description, "B");
        assert_eq!(active[1].description, "C");
    }

    #[test]
    fn empty_completed_view_message() {
        let only_active = vec![sample().remove(1)];
        assert!(filter_view(&only_active, View::Completed).is_empty());
        assert_eq!(empty_message(View::Completed), "No completed tasks");
        assert_eq!(empty_message(View::Active), "No active tasks");
        assert_eq!(empty_message(View::All), "No tasks available");
    }

    #[test]
    fn summary_counts_and_controls() {
        let s = ListSummary::of(&sample());
        assert_eq!(s.items_left, "3 items left");
        assert!(s.can_clear_completed);
        assert!(s.can_delete_all);

        let one = ListSummary::of(&sample()[1..2]);
        assert_eq!(one.items_left, "1 item left");
        assert!(!one.can_clear_completed);

        let none = ListSummary::of(&[]);
        assert!(!none.can_delete_all);
    }
}
