use axum::{extract::State, response::Response};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::models::ticket_group::{CreateTicketGroupRequest, IssueInvitationsRequest};
use crate::services::issuance;
use crate::services::organizers::caller_profile;
use crate::state::AppState;
use crate::utils::error::AppResult;
use crate::utils::extract::{Json, Path};
use crate::utils::response::{created, success};

pub async fn create_ticket_group(
    State(state): State<AppState>,
    Json(request): Json<CreateTicketGroupRequest>,
) -> AppResult<Response> {
    let purchase = issuance::purchase(&state, request, Utc::now()).await?;
    Ok(created(purchase, "Ticket group created"))
}

/// Looked up by the buyer after checkout; the group id acts as the secret.
pub async fn get_ticket_group(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let group = state.store.get_ticket_group(id).await?;
    Ok(success(group, "Ticket group retrieved"))
}

pub async fn issue_invitations(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<Uuid>,
    Json(request): Json<IssueInvitationsRequest>,
) -> AppResult<Response> {
    let organizer = caller_profile(&state, user).await?;
    let group =
        issuance::issue_invitations(&state, organizer, event_id, request, Utc::now()).await?;
    Ok(created(group, "Invitations issued"))
}
