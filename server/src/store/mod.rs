use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::ticket_group::TicketGroupWithTickets;
use crate::models::{
    EmittedTicket, Event, Organizer, Payment, Role, TicketGroup, TicketGroupStatus, TicketType,
    User,
};
use crate::utils::error::{AppError, AppResult};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// A ticket group and its tickets, fully built and ready to be persisted.
#[derive(Debug, Clone)]
pub struct NewTicketGroup {
    pub group: TicketGroup,
    pub tickets: Vec<EmittedTicket>,
}

impl NewTicketGroup {
    /// Number of tickets requested per ticket type.
    pub fn requested_by_type(&self) -> HashMap<Uuid, i64> {
        let mut requested = HashMap::new();
        for ticket in &self.tickets {
            *requested.entry(ticket.ticket_type_id).or_insert(0) += 1;
        }
        requested
    }
}

/// Result of an attempt to mark a ticket as scanned.
#[derive(Debug, Clone)]
pub enum ScanMark {
    Marked(EmittedTicket),
    AlreadyScanned(EmittedTicket),
}

/// Group state after a payment notification was stored.
#[derive(Debug, Clone)]
pub struct RecordedPayment {
    pub group: TicketGroup,
    /// True only for the call that moved the group from unpaid to paid.
    pub settled: bool,
}

/// Result of inserting an organizer profile.
#[derive(Debug, Clone)]
pub enum NewOrganizer {
    Created(Organizer),
    /// Another organizer already holds the invitation code; nothing was written.
    CodeTaken,
}

/// An emitted ticket in a settled group, joined with its sale attribution.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SoldTicket {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub ticket: EmittedTicket,
    pub ticket_type_name: String,
    pub group_status: TicketGroupStatus,
    pub organizer_id: Option<Uuid>,
}

/// Storage interface shared by the Postgres and in-memory backends.
///
/// Operations that guard an invariant (capacity on group creation, single
/// scan per ticket, idempotent payment settlement) must be atomic.
#[async_trait]
pub trait TicketingStore: Send + Sync + 'static {
    async fn create_user(&self, user: User) -> AppResult<User>;
    async fn get_user(&self, id: Uuid) -> AppResult<User>;
    async fn list_users(&self) -> AppResult<Vec<User>>;

    /// Changes a user's role. Leaving the organizer roles drops the organizer
    /// profile; leaving chief organizer detaches the organizers under them.
    async fn set_user_role(&self, id: Uuid, role: Role) -> AppResult<User>;

    /// Creates an organizer profile and sets the user's role in one step.
    async fn create_organizer(
        &self,
        user_id: Uuid,
        role: Role,
        code: &str,
        chief_organizer_id: Option<Uuid>,
    ) -> AppResult<NewOrganizer>;
    async fn get_organizer(&self, user_id: Uuid) -> AppResult<Organizer>;
    async fn find_organizer_by_code(&self, code: &str) -> AppResult<Option<Organizer>>;
    async fn list_organizers(&self) -> AppResult<Vec<Organizer>>;
    async fn set_chief_organizer(
        &self,
        user_id: Uuid,
        chief_organizer_id: Option<Uuid>,
    ) -> AppResult<Organizer>;

    async fn create_event(&self, event: Event) -> AppResult<Event>;
    async fn get_event(&self, id: Uuid) -> AppResult<Event>;
    async fn list_events(&self, only_active: bool) -> AppResult<Vec<Event>>;
    async fn update_event(&self, event: Event) -> AppResult<Event>;

    /// Deletes an event and its ticket types; refused once tickets exist.
    async fn delete_event(&self, id: Uuid) -> AppResult<()>;

    async fn create_ticket_type(&self, ticket_type: TicketType) -> AppResult<TicketType>;
    async fn get_ticket_type(&self, id: Uuid) -> AppResult<TicketType>;
    async fn list_ticket_types(&self, event_id: Uuid) -> AppResult<Vec<TicketType>>;

    /// Updates a ticket type unless its new capacity is below the stock held.
    async fn update_ticket_type(
        &self,
        ticket_type: TicketType,
        hold_cutoff: DateTime<Utc>,
    ) -> AppResult<TicketType>;
    async fn delete_ticket_type(&self, id: Uuid) -> AppResult<()>;

    /// Tickets per ticket type that currently count against capacity.
    async fn held_counts(
        &self,
        event_id: Uuid,
        hold_cutoff: DateTime<Utc>,
    ) -> AppResult<HashMap<Uuid, i64>>;

    /// Persists a group and its tickets after checking capacity of every
    /// ticket type involved, all under one lock or transaction.
    async fn create_ticket_group(
        &self,
        order: NewTicketGroup,
        hold_cutoff: DateTime<Utc>,
    ) -> AppResult<TicketGroupWithTickets>;
    async fn get_ticket_group(&self, id: Uuid) -> AppResult<TicketGroupWithTickets>;

    /// Upserts a payment notification. With `mark_paid`, an unpaid group
    /// becomes paid; settled groups are left untouched.
    async fn record_payment(&self, payment: Payment, mark_paid: bool)
        -> AppResult<RecordedPayment>;

    async fn get_ticket(&self, id: Uuid) -> AppResult<EmittedTicket>;

    /// Sets the scan markers only if the ticket hasn't been scanned yet.
    async fn mark_scanned(
        &self,
        id: Uuid,
        scanned_by: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<ScanMark>;
    async fn clear_scan(&self, id: Uuid) -> AppResult<EmittedTicket>;

    /// Tickets of the event whose group is paid or free.
    async fn event_sales(&self, event_id: Uuid) -> AppResult<Vec<SoldTicket>>;
}

/// Rejects a request that would push a ticket type over its capacity.
pub fn check_capacity(ticket_type: &TicketType, held: i64, requested: i64) -> AppResult<()> {
    let remaining = remaining_stock(ticket_type, held);
    if requested > remaining {
        return Err(AppError::Conflict(format!(
            "Not enough tickets left for '{}': requested {}, remaining {}",
            ticket_type.name, requested, remaining
        )));
    }
    Ok(())
}

pub fn remaining_stock(ticket_type: &TicketType, held: i64) -> i64 {
    (i64::from(ticket_type.max_available) - held).max(0)
}
