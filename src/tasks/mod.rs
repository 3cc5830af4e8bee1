mod dto;
pub mod dispatch;
pub mod handlers;
pub mod intent;
pub mod memory;
pub mod model;
pub mod pg;
pub mod reconcile;
pub mod store;
pub mod view;

pub use dispatch::{Ack, Dispatcher};
pub use intent::Intent;
pub use memory::InMemoryTaskStore;
pub use model::{Task, TaskPatch, View};
pub use pg::PgTaskStore;
pub use reconcile::{reconcile, Reconciled, RenderedTask};
pub use store::{StoreError, TaskStore};
pub use view::{empty_message, filter_view, ListSummary};

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::task_routes()
}
