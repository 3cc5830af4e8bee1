use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::model::{Task, View};
use super::reconcile::RenderedTask;
use super::view::ListSummary;

/// `?view=all|active|completed`; anything else reads as `all`.
#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    pub view: Option<String>,
}

impl ViewQuery {
    pub fn view(&self) -> View {
        View::parse_lenient(self.view.as_deref())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListResponse {
    pub view: View,
    pub tasks: Vec<Task>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<&'static str>,
    pub summary: ListSummary,
}

/// Intents submitted but not yet confirmed, in submission order.
#[derive(Debug, Deserialize)]
pub struct OptimisticRequest {
    #[serde(default)]
    pub pending: Vec<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimisticResponse {
    pub view: View,
    pub tasks: Vec<RenderedTask>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_message: Option<&'static str>,
    pub summary: ListSummary,
    pub clear_completed_disabled: bool,
    pub delete_all_disabled: bool,
    pub is_adding: bool,
}
