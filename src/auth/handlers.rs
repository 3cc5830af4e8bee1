use axum::{
    extract::{rejection::JsonRejection, FromRef, State},
    http::{header::SET_COOKIE, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{
            AuthResponse, ForgotPasswordRequest, MessageResponse, PublicUser, RefreshRequest,
            ResetPasswordRequest, SigninRequest, SignupRequest,
        },
        extractors::{clear_session_cookie, session_cookie, AuthUser},
        jwt::JwtKeys,
        repo_types::User,
        services,
    },
    error::AppError,
    state::AppState,
    tasks::StoreError,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/signin", post(signin))
        .route("/auth/refresh", post(refresh))
        .route("/auth/signout", post(signout))
        .route("/auth/forgot-password", post(forgot_password))
        .route("/auth/reset-password", post(reset_password))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/me", get(get_me).delete(delete_me))
}

fn with_session(state: &AppState, keys: &JwtKeys, body: AuthResponse) -> impl IntoResponse {
    let cookie = session_cookie(
        &body.access_token,
        keys.access_ttl.as_secs(),
        state.config.session_cookie_secure,
    );
    ([(SET_COOKIE, cookie)], Json(body))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let user =
        services::signup(&state.db, &payload.name, &payload.email, &payload.password).await?;
    let keys = JwtKeys::from_ref(&state);
    let body = services::issue_tokens(&keys, user)?;
    Ok((StatusCode::CREATED, with_session(&state, &keys, body)))
}

#[instrument(skip(state, payload))]
pub async fn signin(
    State(state): State<AppState>,
    payload: Result<Json<SigninRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let user = services::authenticate(&state.db, &payload.email, &payload.password).await?;
    let keys = JwtKeys::from_ref(&state);
    let body = services::issue_tokens(&keys, user)?;
    Ok(with_session(&state, &keys, body))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    payload: Result<Json<RefreshRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = payload?;
    let keys = JwtKeys::from_ref(&state);
    let claims = keys
        .verify_refresh(&payload.refresh_token)
        .map_err(|_| AppError::Auth("Invalid or expired token".into()))?;

    let user = User::find_by_id(&state.db, claims.sub)
        .await?
        .ok_or_else(|| AppError::Auth("User not found".into()))?;

    let body = services::issue_tokens(&keys, user)?;
    Ok(with_session(&state, &keys, body))
}

pub async fn signout() -> impl IntoResponse {
    ([(SET_COOKIE, clear_session_cookie())], StatusCode::NO_CONTENT)
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(payload) = payload?;
    let reset = &state.config.reset;
    let token = services::initiate_password_reset(
        &state.db,
        &payload.email,
        reset.token_ttl_minutes,
        OffsetDateTime::now_utc(),
    )
    .await?;

    Ok(Json(MessageResponse {
        message: services::RESET_REQUESTED.into(),
        reset_token: token.filter(|_| reset.token_in_response),
    }))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(payload) = payload?;
    services::reset_password(
        &state.db,
        &payload.token,
        &payload.password,
        OffsetDateTime::now_utc(),
    )
    .await?;
    Ok(Json(MessageResponse {
        message: "Password updated.".into(),
        reset_token: None,
    }))
}

#[instrument(skip(state))]
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::Auth("User not found".into()))?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn delete_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<impl IntoResponse, AppError> {
    // The Postgres store cascades inside `delete_account`; other stores are
    // emptied here first.
    match state.tasks.delete_all(user_id).await {
        Ok(_) | Err(StoreError::OwnerNotFound) => {}
        Err(e) => return Err(e.into()),
    }
    services::delete_account(&state.db, user_id).await?;
    info!(%user_id, "session closed after account deletion");
    Ok(([(SET_COOKIE, clear_session_cookie())], StatusCode::NO_CONTENT))
}
