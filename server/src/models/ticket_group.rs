use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::ticket::{BuyerData, EmittedTicket};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_group_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketGroupStatus {
    Unpaid,
    Paid,
    Free,
}

impl TicketGroupStatus {
    /// Tickets in a settled group count as sold and may be scanned.
    pub fn is_settled(self) -> bool {
        matches!(self, TicketGroupStatus::Paid | TicketGroupStatus::Free)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketGroup {
    pub id: Uuid,
    pub event_id: Uuid,
    pub status: TicketGroupStatus,
    pub amount_tickets: i32,
    pub total_price: Decimal,
    pub invitation_code: Option<String>,
    pub organizer_id: Option<Uuid>,
    pub payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TicketGroup {
    /// Whether this group's tickets still count against capacity.
    pub fn holds_stock(&self, hold_cutoff: DateTime<Utc>) -> bool {
        self.status.is_settled() || self.created_at > hold_cutoff
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TicketGroupItem {
    pub ticket_type_id: Uuid,
    pub buyers: Vec<BuyerData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTicketGroupRequest {
    pub event_id: Uuid,
    pub invitation_code: Option<String>,
    pub items: Vec<TicketGroupItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueInvitationsRequest {
    pub items: Vec<TicketGroupItem>,
}

/// A group with its tickets, written in one transaction.
#[derive(Debug, Clone, Serialize)]
pub struct TicketGroupWithTickets {
    #[serde(flatten)]
    pub group: TicketGroup,
    pub tickets: Vec<EmittedTicket>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseResponse {
    #[serde(flatten)]
    pub group: TicketGroupWithTickets,
    pub checkout_url: Option<String>,
}
