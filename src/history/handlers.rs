use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use crate::{
    auth::extractors::AuthUser,
    history::{repo_types::HistoryEntry, services},
    state::AppState,
};

pub fn history_routes() -> Router<AppState> {
    Router::new().route("/history", get(my_history))
}

#[instrument(skip_all)]
pub async fn my_history(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Json<Vec<HistoryEntry>> {
    Json(services::list_for(state.users.as_ref(), state.history.as_ref(), &user.email).await)
}
