use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, RegisterRequest},
        extractors::AuthUser,
        services,
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn user_routes() -> Router<AppState> {
    Router::new().route("/user/profile", get(profile))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let Json(payload) = payload?;
    let res = services::register(state.users.as_ref(), &state.keys, payload).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let Json(payload) = payload?;
    let res = services::login(state.users.as_ref(), &state.keys, payload).await?;
    Ok(Json(res))
}

#[instrument(skip_all)]
pub async fn profile(AuthUser(user): AuthUser) -> Json<PublicUser> {
    Json(PublicUser::from(user))
}
