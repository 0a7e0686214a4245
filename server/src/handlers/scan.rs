use axum::{extract::State, response::Response};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::services::scan::{self, ScanRequest};
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};
use crate::utils::extract::{Json, Path};
use crate::utils::response::success;

pub async fn scan_ticket(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<Uuid>,
    Json(request): Json<ScanRequest>,
) -> AppResult<Response> {
    if !user.role.can_scan() {
        return Err(AppError::Forbidden(
            "Only ticketing staff can scan tickets".to_string(),
        ));
    }
    let result = scan::scan_ticket(&state, user, event_id, request.ticket_id, Utc::now()).await?;
    let message = if result.duplicate {
        "Ticket already accepted"
    } else {
        "Ticket accepted"
    };
    Ok(success(result, message))
}

pub async fn unscan_ticket(
    State(state): State<AppState>,
    user: AuthUser,
    Path(ticket_id): Path<Uuid>,
) -> AppResult<Response> {
    user.require_admin()?;
    let ticket = scan::unscan_ticket(&state, ticket_id).await?;
    Ok(success(ticket, "Scan cleared"))
}
