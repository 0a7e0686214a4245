use axum::{extract::State, response::Response};

use crate::services::payments::{self, PaymentNotification};
use crate::state::AppState;
use crate::utils::error::AppResult;
use crate::utils::extract::Json;
use crate::utils::response::success;

/// Provider callback. The payment is always re-fetched from the provider,
/// so the notification body itself is not trusted.
pub async fn payment_webhook(
    State(state): State<AppState>,
    Json(notification): Json<PaymentNotification>,
) -> AppResult<Response> {
    let outcome = payments::handle_notification(&state, notification).await?;
    Ok(success(outcome, "Notification processed"))
}
