//! Payment provider notifications.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::models::{Payment, TicketGroupStatus};
use crate::payments::PaymentStatus;
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationData {
    pub id: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentNotification {
    #[serde(rename = "type")]
    pub topic: Option<String>,
    pub action: Option<String>,
    pub data: Option<NotificationData>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookOutcome {
    Ignored {
        reason: String,
    },
    Recorded {
        payment_id: String,
        ticket_group_id: Uuid,
        payment_status: String,
        group_status: TicketGroupStatus,
    },
}

fn notification_payment_id(notification: &PaymentNotification) -> Option<String> {
    match notification.data.as_ref().map(|d| &d.id) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

pub async fn handle_notification(
    state: &AppState,
    notification: PaymentNotification,
) -> AppResult<WebhookOutcome> {
    if notification.topic.as_deref() != Some("payment") {
        return Ok(WebhookOutcome::Ignored {
            reason: format!("unsupported topic {:?}", notification.topic),
        });
    }
    let payment_id = notification_payment_id(&notification).ok_or_else(|| {
        AppError::ValidationError("Payment notification without data.id".to_string())
    })?;

    tracing::info!(%payment_id, action = ?notification.action, "Payment notification received");

    let payment = state.payments.fetch_payment(&payment_id).await?;
    let group_id = payment
        .external_reference
        .as_deref()
        .and_then(|r| Uuid::parse_str(r.trim()).ok())
        .ok_or_else(|| {
            AppError::ValidationError(format!(
                "Payment {} has no valid ticket group reference",
                payment.id
            ))
        })?;

    let group = state.store.get_ticket_group(group_id).await?.group;
    let covers_total = payment.amount >= group.total_price;
    if payment.status == PaymentStatus::Approved && !covers_total {
        tracing::warn!(
            payment_id = %payment.id,
            ticket_group_id = %group_id,
            amount = %payment.amount,
            expected = %group.total_price,
            "Approved payment does not cover the group total"
        );
    }
    let mark_paid = payment.status == PaymentStatus::Approved && covers_total;

    let now = Utc::now();
    let recorded = state
        .store
        .record_payment(
            Payment {
                id: payment.id.clone(),
                ticket_group_id: group_id,
                status: payment.status.as_str().to_string(),
                amount: payment.amount,
                created_at: now,
                updated_at: now,
            },
            mark_paid,
        )
        .await?;

    if recorded.settled {
        tracing::info!(ticket_group_id = %group_id, payment_id = %payment.id, "Ticket group paid");
    }

    Ok(WebhookOutcome::Recorded {
        payment_id: payment.id,
        ticket_group_id: group_id,
        payment_status: payment.status.as_str().to_string(),
        group_status: recorded.group.status,
    })
}
