use axum::{extract::State, response::Response};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::models::organizer::{AssignChiefRequest, CreateOrganizerRequest};
use crate::services::organizers;
use crate::state::AppState;
use crate::utils::error::AppResult;
use crate::utils::extract::{Json, Path};
use crate::utils::response::{created, success};

pub async fn list_organizers(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Response> {
    let organizers = organizers::list_organizers(&state, user).await?;
    Ok(success(organizers, "Organizers retrieved"))
}

pub async fn create_organizer(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateOrganizerRequest>,
) -> AppResult<Response> {
    user.require_admin()?;
    let organizer = organizers::create_organizer(&state, request).await?;
    Ok(created(organizer, "Organizer created"))
}

pub async fn assign_chief(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignChiefRequest>,
) -> AppResult<Response> {
    user.require_admin()?;
    let organizer = organizers::assign_chief(&state, id, request.chief_organizer_id).await?;
    Ok(success(organizer, "Chief organizer updated"))
}

/// Public: the purchase form checks a code before submitting.
pub async fn validate_invitation_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> AppResult<Response> {
    let info = organizers::validate_code(&state, &code).await?;
    Ok(success(info, "Invitation code is valid"))
}
