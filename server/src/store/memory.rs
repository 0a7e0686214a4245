use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
    check_capacity, NewOrganizer, NewTicketGroup, RecordedPayment, ScanMark, SoldTicket,
    TicketingStore,
};
use crate::models::ticket_group::TicketGroupWithTickets;
use crate::models::{
    EmittedTicket, Event, Organizer, Payment, Role, TicketGroup, TicketGroupStatus, TicketType,
    User,
};
use crate::utils::error::{AppError, AppResult};

#[derive(Debug, Clone)]
struct OrganizerRecord {
    code: String,
    chief_organizer_id: Option<Uuid>,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    organizers: HashMap<Uuid, OrganizerRecord>,
    events: HashMap<Uuid, Event>,
    ticket_types: HashMap<Uuid, TicketType>,
    groups: HashMap<Uuid, TicketGroup>,
    // Insertion order is kept so a group's tickets come back as written.
    tickets: Vec<EmittedTicket>,
    payments: HashMap<String, Payment>,
}

impl Inner {
    fn organizer_view(&self, user_id: Uuid) -> Option<Organizer> {
        let record = self.organizers.get(&user_id)?;
        let user = self.users.get(&user_id)?;
        Some(Organizer {
            user_id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            code: record.code.clone(),
            chief_organizer_id: record.chief_organizer_id,
            created_at: record.created_at,
        })
    }

    fn detach_subordinates(&mut self, chief_id: Uuid) {
        for record in self.organizers.values_mut() {
            if record.chief_organizer_id == Some(chief_id) {
                record.chief_organizer_id = None;
            }
        }
    }

    fn held_for_type(&self, ticket_type_id: Uuid, hold_cutoff: DateTime<Utc>) -> i64 {
        self.tickets
            .iter()
            .filter(|t| t.ticket_type_id == ticket_type_id)
            .filter(|t| {
                self.groups
                    .get(&t.ticket_group_id)
                    .map_or(false, |g| g.holds_stock(hold_cutoff))
            })
            .count() as i64
    }

    fn ticket_mut(&mut self, id: Uuid) -> AppResult<&mut EmittedTicket> {
        self.tickets
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Ticket {} not found", id)))
    }
}

/// In-memory implementation of TicketingStore for tests and local runs
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> AppResult<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| AppError::InternalServerError("memory store lock poisoned".into()))
    }

    fn write(&self) -> AppResult<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| AppError::InternalServerError("memory store lock poisoned".into()))
    }
}

#[async_trait]
impl TicketingStore for MemoryStore {
    async fn create_user(&self, user: User) -> AppResult<User> {
        let mut inner = self.write()?;
        if inner
            .users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&user.email))
        {
            return Err(AppError::Conflict(format!(
                "A user with email {} already exists",
                user.email
            )));
        }
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: Uuid) -> AppResult<User> {
        self.read()?
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let mut users: Vec<User> = self.read()?.users.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn set_user_role(&self, id: Uuid, role: Role) -> AppResult<User> {
        let mut inner = self.write()?;
        let previous = inner
            .users
            .get(&id)
            .map(|u| u.role)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

        if previous == Role::ChiefOrganizer && role != Role::ChiefOrganizer {
            inner.detach_subordinates(id);
        }
        if !role.is_organizer() {
            inner.organizers.remove(&id);
        } else if role == Role::ChiefOrganizer {
            if let Some(record) = inner.organizers.get_mut(&id) {
                record.chief_organizer_id = None;
            }
        }

        let user = inner
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;
        user.role = role;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn create_organizer(
        &self,
        user_id: Uuid,
        role: Role,
        code: &str,
        chief_organizer_id: Option<Uuid>,
    ) -> AppResult<NewOrganizer> {
        let mut inner = self.write()?;
        if !inner.users.contains_key(&user_id) {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }
        if inner.organizers.contains_key(&user_id) {
            return Err(AppError::Conflict(format!(
                "User {} is already an organizer",
                user_id
            )));
        }
        if inner.organizers.values().any(|o| o.code == code) {
            return Ok(NewOrganizer::CodeTaken);
        }

        let now = Utc::now();
        inner.organizers.insert(
            user_id,
            OrganizerRecord {
                code: code.to_string(),
                chief_organizer_id,
                created_at: now,
            },
        );
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.role = role;
            user.updated_at = now;
        }
        inner
            .organizer_view(user_id)
            .map(NewOrganizer::Created)
            .ok_or_else(|| AppError::InternalServerError("organizer vanished".into()))
    }

    async fn get_organizer(&self, user_id: Uuid) -> AppResult<Organizer> {
        self.read()?
            .organizer_view(user_id)
            .ok_or_else(|| AppError::NotFound(format!("Organizer {} not found", user_id)))
    }

    async fn find_organizer_by_code(&self, code: &str) -> AppResult<Option<Organizer>> {
        let inner = self.read()?;
        Ok(inner
            .organizers
            .iter()
            .find(|(_, record)| record.code == code)
            .and_then(|(user_id, _)| inner.organizer_view(*user_id)))
    }

    async fn list_organizers(&self) -> AppResult<Vec<Organizer>> {
        let inner = self.read()?;
        let mut organizers: Vec<Organizer> = inner
            .organizers
            .keys()
            .filter_map(|id| inner.organizer_view(*id))
            .collect();
        organizers.sort_by_key(|o| o.created_at);
        Ok(organizers)
    }

    async fn set_chief_organizer(
        &self,
        user_id: Uuid,
        chief_organizer_id: Option<Uuid>,
    ) -> AppResult<Organizer> {
        let mut inner = self.write()?;
        let record = inner
            .organizers
            .get_mut(&user_id)
            .ok_or_else(|| AppError::NotFound(format!("Organizer {} not found", user_id)))?;
        record.chief_organizer_id = chief_organizer_id;
        inner
            .organizer_view(user_id)
            .ok_or_else(|| AppError::NotFound(format!("Organizer {} not found", user_id)))
    }

    async fn create_event(&self, event: Event) -> AppResult<Event> {
        self.write()?.events.insert(event.id, event.clone());
        Ok(event)
    }

    async fn get_event(&self, id: Uuid) -> AppResult<Event> {
        self.read()?
            .events
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Event {} not found", id)))
    }

    async fn list_events(&self, only_active: bool) -> AppResult<Vec<Event>> {
        let mut events: Vec<Event> = self
            .read()?
            .events
            .values()
            .filter(|e| !only_active || e.active)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.starts_at);
        Ok(events)
    }

    async fn update_event(&self, event: Event) -> AppResult<Event> {
        let mut inner = self.write()?;
        match inner.events.get_mut(&event.id) {
            Some(existing) => {
                *existing = event.clone();
                Ok(event)
            }
            None => Err(AppError::NotFound(format!("Event {} not found", event.id))),
        }
    }

    async fn delete_event(&self, id: Uuid) -> AppResult<()> {
        let mut inner = self.write()?;
        if !inner.events.contains_key(&id) {
            return Err(AppError::NotFound(format!("Event {} not found", id)));
        }
        if inner.groups.values().any(|g| g.event_id == id) {
            return Err(AppError::Conflict(
                "Event has emitted tickets and cannot be deleted".to_string(),
            ));
        }
        inner.ticket_types.retain(|_, tt| tt.event_id != id);
        inner.events.remove(&id);
        Ok(())
    }

    async fn create_ticket_type(&self, ticket_type: TicketType) -> AppResult<TicketType> {
        let mut inner = self.write()?;
        if !inner.events.contains_key(&ticket_type.event_id) {
            return Err(AppError::NotFound(format!(
                "Event {} not found",
                ticket_type.event_id
            )));
        }
        inner.ticket_types.insert(ticket_type.id, ticket_type.clone());
        Ok(ticket_type)
    }

    async fn get_ticket_type(&self, id: Uuid) -> AppResult<TicketType> {
        self.read()?
            .ticket_types
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Ticket type {} not found", id)))
    }

    async fn list_ticket_types(&self, event_id: Uuid) -> AppResult<Vec<TicketType>> {
        let mut types: Vec<TicketType> = self
            .read()?
            .ticket_types
            .values()
            .filter(|tt| tt.event_id == event_id)
            .cloned()
            .collect();
        types.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        Ok(types)
    }

    async fn update_ticket_type(
        &self,
        ticket_type: TicketType,
        hold_cutoff: DateTime<Utc>,
    ) -> AppResult<TicketType> {
        let mut inner = self.write()?;
        if !inner.ticket_types.contains_key(&ticket_type.id) {
            return Err(AppError::NotFound(format!(
                "Ticket type {} not found",
                ticket_type.id
            )));
        }
        let held = inner.held_for_type(ticket_type.id, hold_cutoff);
        if i64::from(ticket_type.max_available) < held {
            return Err(AppError::Conflict(format!(
                "Capacity can't go below the {} tickets already issued",
                held
            )));
        }
        inner.ticket_types.insert(ticket_type.id, ticket_type.clone());
        Ok(ticket_type)
    }

    async fn delete_ticket_type(&self, id: Uuid) -> AppResult<()> {
        let mut inner = self.write()?;
        if !inner.ticket_types.contains_key(&id) {
            return Err(AppError::NotFound(format!("Ticket type {} not found", id)));
        }
        if inner.tickets.iter().any(|t| t.ticket_type_id == id) {
            return Err(AppError::Conflict(
                "Ticket type has emitted tickets and cannot be deleted".to_string(),
            ));
        }
        inner.ticket_types.remove(&id);
        Ok(())
    }

    async fn held_counts(
        &self,
        event_id: Uuid,
        hold_cutoff: DateTime<Utc>,
    ) -> AppResult<HashMap<Uuid, i64>> {
        let inner = self.read()?;
        let mut counts = HashMap::new();
        for ticket in inner.tickets.iter().filter(|t| t.event_id == event_id) {
            let holds = inner
                .groups
                .get(&ticket.ticket_group_id)
                .map_or(false, |g| g.holds_stock(hold_cutoff));
            if holds {
                *counts.entry(ticket.ticket_type_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    async fn create_ticket_group(
        &self,
        order: NewTicketGroup,
        hold_cutoff: DateTime<Utc>,
    ) -> AppResult<TicketGroupWithTickets> {
        let mut inner = self.write()?;
        for (type_id, requested) in order.requested_by_type() {
            let ticket_type = inner
                .ticket_types
                .get(&type_id)
                .ok_or_else(|| AppError::NotFound(format!("Ticket type {} not found", type_id)))?;
            if ticket_type.event_id != order.group.event_id {
                return Err(AppError::ValidationError(format!(
                    "Ticket type {} does not belong to event {}",
                    type_id, order.group.event_id
                )));
            }
            let held = inner.held_for_type(type_id, hold_cutoff);
            check_capacity(ticket_type, held, requested)?;
        }

        inner.groups.insert(order.group.id, order.group.clone());
        inner.tickets.extend(order.tickets.iter().cloned());
        Ok(TicketGroupWithTickets {
            group: order.group,
            tickets: order.tickets,
        })
    }

    async fn get_ticket_group(&self, id: Uuid) -> AppResult<TicketGroupWithTickets> {
        let inner = self.read()?;
        let group = inner
            .groups
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Ticket group {} not found", id)))?;
        let tickets = inner
            .tickets
            .iter()
            .filter(|t| t.ticket_group_id == id)
            .cloned()
            .collect();
        Ok(TicketGroupWithTickets { group, tickets })
    }

    async fn record_payment(
        &self,
        payment: Payment,
        mark_paid: bool,
    ) -> AppResult<RecordedPayment> {
        let mut inner = self.write()?;
        if !inner.groups.contains_key(&payment.ticket_group_id) {
            return Err(AppError::NotFound(format!(
                "Ticket group {} not found",
                payment.ticket_group_id
            )));
        }

        let now = Utc::now();
        let payment_id = payment.id.clone();
        let group_id = payment.ticket_group_id;
        match inner.payments.get_mut(&payment.id) {
            Some(existing) => {
                existing.status = payment.status;
                existing.amount = payment.amount;
                existing.updated_at = now;
            }
            None => {
                inner.payments.insert(payment.id.clone(), payment);
            }
        }

        let group = inner
            .groups
            .get_mut(&group_id)
            .ok_or_else(|| AppError::NotFound(format!("Ticket group {} not found", group_id)))?;
        let settled = mark_paid && group.status == TicketGroupStatus::Unpaid;
        if settled {
            group.status = TicketGroupStatus::Paid;
            group.payment_id = Some(payment_id);
            group.updated_at = now;
        }
        Ok(RecordedPayment {
            group: group.clone(),
            settled,
        })
    }

    async fn get_ticket(&self, id: Uuid) -> AppResult<EmittedTicket> {
        self.read()?
            .tickets
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Ticket {} not found", id)))
    }

    async fn mark_scanned(
        &self,
        id: Uuid,
        scanned_by: Uuid,
        at: DateTime<Utc>,
    ) -> AppResult<ScanMark> {
        let mut inner = self.write()?;
        let ticket = inner.ticket_mut(id)?;
        if ticket.scanned_at.is_some() {
            return Ok(ScanMark::AlreadyScanned(ticket.clone()));
        }
        ticket.scanned_at = Some(at);
        ticket.scanned_by = Some(scanned_by);
        Ok(ScanMark::Marked(ticket.clone()))
    }

    async fn clear_scan(&self, id: Uuid) -> AppResult<EmittedTicket> {
        let mut inner = self.write()?;
        let ticket = inner.ticket_mut(id)?;
        ticket.scanned_at = None;
        ticket.scanned_by = None;
        Ok(ticket.clone())
    }

    async fn event_sales(&self, event_id: Uuid) -> AppResult<Vec<SoldTicket>> {
        let inner = self.read()?;
        let sales = inner
            .tickets
            .iter()
            .filter(|t| t.event_id == event_id)
            .filter_map(|ticket| {
                let group = inner.groups.get(&ticket.ticket_group_id)?;
                if !group.status.is_settled() {
                    return None;
                }
                let ticket_type = inner.ticket_types.get(&ticket.ticket_type_id)?;
                Some(SoldTicket {
                    ticket: ticket.clone(),
                    ticket_type_name: ticket_type.name.clone(),
                    group_status: group.status,
                    organizer_id: group.organizer_id,
                })
            })
            .collect();
        Ok(sales)
    }
}
