use axum::{
    extract::{rejection::JsonRejection, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use tracing::{info, instrument};

use super::{
    dispatch::{Ack, Dispatcher},
    dto::{OptimisticRequest, OptimisticResponse, TaskListResponse, ViewQuery},
    intent::Intent,
    reconcile::reconcile,
    view::{empty_message, filter_view, ListSummary},
};
use crate::{auth::AuthUser, error::AppError, state::AppState};

pub fn task_routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks).post(submit_intent))
        .route("/tasks/optimistic", post(optimistic_view))
}

#[instrument(skip(state))]
pub async fn list_tasks(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<ViewQuery>,
) -> Result<Json<TaskListResponse>, AppError> {
    let view = q.view();
    let all = state.tasks.read(user_id).await?;
    let tasks = filter_view(&all, view);
    Ok(Json(TaskListResponse {
        view,
        empty_message: tasks.is_empty().then(|| empty_message(view)),
        summary: ListSummary::of(&all),
        tasks,
    }))
}

/// POST /tasks `{ "intent": "...", ... }`
#[instrument(skip(state, payload))]
pub async fn submit_intent(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<Map<String, Value>>, JsonRejection>,
) -> Result<Json<Ack>, AppError> {
    let Json(payload) = payload?;
    let intent = Intent::from_payload(payload)?;
    let name = intent.name();

    let ack = Dispatcher::new(state.tasks.as_ref())
        .dispatch(user_id, intent, OffsetDateTime::now_utc())
        .await?;
    info!(%user_id, intent = name, applied = ack.applied, "intent handled");
    Ok(Json(ack))
}

/// Render the list as it should look while `pending` intents are in flight.
#[instrument(skip(state, body))]
pub async fn optimistic_view(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<ViewQuery>,
    body: Result<Json<OptimisticRequest>, JsonRejection>,
) -> Result<Json<OptimisticResponse>, AppError> {
    let Json(body) = body?;
    let pending = body
        .pending
        .into_iter()
        .map(Intent::from_payload)
        .collect::<Result<Vec<_>, _>>()?;

    let view = q.view();
    let authoritative = state.tasks.read(user_id).await?;
    let reconciled = reconcile(&authoritative, &pending, OffsetDateTime::now_utc());
    let tasks = reconciled.filtered(view);

    Ok(Json(OptimisticResponse {
        view,
        empty_message: tasks.is_empty().then(|| empty_message(view)),
        summary: reconciled.summary(),
        clear_completed_disabled: reconciled.clear_completed_disabled,
        delete_all_disabled: reconciled.delete_all_disabled,
        is_adding: reconciled.is_adding,
        tasks,
    }))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        extract::FromRef,
        http::{header, Method, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::{
        auth::jwt::JwtKeys,
        state::AppState,
        tasks::{InMemoryTaskStore, TaskStore},
    };
    use std::sync::Arc;

    struct Harness {
        app: Router,
        store: Arc<InMemoryTaskStore>,
        owner: Uuid,
        token: String,
    }

    async fn harness() -> Harness {
        let (state, store) = AppState::fake();
        let owner = Uuid::new_v4();
        store.register_owner(owner).await;
        let token = JwtKeys::from_ref(&state).sign_access(owner).unwrap();
        Harness {
            app: super::task_routes().with_state(state),
            store,
            owner,
            token,
        }
    }

    impl Harness {
        async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            let mut req = Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", self.token));
            let body = match body {
                Some(v) => {
                    req = req.header(header::CONTENT_TYPE, "application/json");
                    Body::from(v.to_string())
                }
                None => Body::empty(),
            };
            let res = self.app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
            let status = res.status();
            let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
            let json = if bytes.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&bytes).unwrap_or(Value::Null)
            };
            (status, json)
        }

        async fn submit(&self, body: Value) -> (StatusCode, Value) {
            self.call(Method::POST, "/tasks", Some(body)).await
        }
    }

    #[tokio::test]
    async fn create_list_toggle_clear() {
        let h = harness().await;

        let (status, ack) = h.submit(json!({"intent": "create task", "description": "Buy milk"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack, json!({"ok": true, "applied": true}));
        h.submit(json!({"intent": "create task", "description": "Walk dog"})).await;

        let (_, list) = h.call(Method::GET, "/tasks", None).await;
        assert_eq!(list["view"], "all");
        assert_eq!(list["tasks"].as_array().unwrap().len(), 2);
        assert_eq!(list["summary"]["itemsLeft"], "2 items left");
        let first_id = list["tasks"][0]["id"].as_str().unwrap().to_string();

        h.submit(json!({"intent": "toggle completion", "id": first_id, "isCompleted": "false"}))
            .await;
        let (_, completed) = h.call(Method::GET, "/tasks?view=completed", None).await;
        assert_eq!(completed["tasks"][0]["description"], "Buy milk");
        assert!(completed["tasks"][0]["completedAt"].is_string());

        h.submit(json!({"intent": "clear completed"})).await;
        let (_, after) = h.call(Method::GET, "/tasks?view=completed", None).await;
        assert_eq!(after["tasks"], json!([]));
        assert_eq!(after["emptyMessage"], "No completed tasks");
        assert_eq!(h.store.read(h.owner).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_intent_is_400_and_mutates_nothing() {
        let h = harness().await;
        h.submit(json!({"intent": "create task", "description": "Keep"})).await;
        let before = h.store.read(h.owner).await.unwrap();

        let (status, body) = h.submit(json!({"intent": "foo"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
        assert_eq!(h.store.read(h.owner).await.unwrap(), before);
    }

    #[tokio::test]
    async fn blank_description_is_422() {
        let h = harness().await;
        let (status, body) = h.submit(json!({"intent": "create task", "description": ""})).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["fields"][0]["field"], "description");
    }

    #[tokio::test]
    async fn deleting_missing_task_still_acknowledges() {
        let h = harness().await;
        let (status, ack) = h.submit(json!({"intent": "delete task", "id": "missing"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["applied"], false);
    }

    #[tokio::test]
    async fn optimistic_view_applies_pending() {
        let h = harness().await;
        h.submit(json!({"intent": "create task", "description": "A"})).await;
        h.submit(json!({"intent": "create task", "description": "B"})).await;
        let (_, list) = h.call(Method::GET, "/tasks", None).await;
        let a = list["tasks"][0]["id"].as_str().unwrap().to_string();

        let (status, view) = h
            .call(
                Method::POST,
                "/tasks/optimistic?view=active",
                Some(json!({"pending": [
                    {"intent": "toggle completion", "id": a, "isCompleted": false}
                ]})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let tasks = view["tasks"].as_array().unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0]["description"], "B");
        assert_eq!(view["clearCompletedDisabled"], false);

        let (_, wiped) = h
            .call(
                Method::POST,
                "/tasks/optimistic",
                Some(json!({"pending": [{"intent": "delete all"}]})),
            )
            .await;
        assert_eq!(wiped["tasks"], json!([]));
        assert_eq!(wiped["emptyMessage"], "No tasks available");
        assert_eq!(wiped["deleteAllDisabled"], true);
        // Nothing was written.
        assert_eq!(h.store.read(h.owner).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn requests_without_credentials_are_401() {
        let h = harness().await;
        let res = h
            .app
            .clone()
            .oneshot(Request::builder().uri("/tasks").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn stale_owner_is_404() {
        let h = harness().await;
        h.store.remove_owner(h.owner).await;
        let (status, body) = h.call(Method::GET, "/tasks", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }
}
