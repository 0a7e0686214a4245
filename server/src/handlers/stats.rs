use axum::{extract::State, response::Response};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::services::stats;
use crate::state::AppState;
use crate::utils::error::AppResult;
use crate::utils::extract::Path;
use crate::utils::response::success;

pub async fn event_stats(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<Uuid>,
) -> AppResult<Response> {
    let stats = stats::event_stats(&state, user, event_id).await?;
    Ok(success(stats, "Event stats retrieved"))
}

pub async fn event_buyers(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<Uuid>,
) -> AppResult<Response> {
    let buyers = stats::event_buyers(&state, user, event_id).await?;
    Ok(success(buyers, "Buyers retrieved"))
}
