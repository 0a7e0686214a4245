//! Ticket group creation for web purchases and organizer invitations.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::models::ticket_group::{
    CreateTicketGroupRequest, IssueInvitationsRequest, PurchaseResponse, TicketGroupItem,
    TicketGroupWithTickets,
};
use crate::models::{
    EmittedTicket, Event, Organizer, TicketCategory, TicketGroup, TicketGroupStatus, TicketType,
};
use crate::payments::{CheckoutLine, CheckoutRequest};
use crate::services::codes::normalize_code;
use crate::state::AppState;
use crate::store::NewTicketGroup;
use crate::utils::error::{AppError, AppResult};

/// Where a ticket group originates.
#[derive(Debug, Clone)]
pub enum Channel {
    /// Public purchase, optionally attributed through an invitation code.
    Web { organizer: Option<Organizer> },
    /// Free tickets handed out directly by an organizer.
    Invitation { organizer: Organizer },
}

impl Channel {
    fn organizer(&self) -> Option<&Organizer> {
        match self {
            Channel::Web { organizer } => organizer.as_ref(),
            Channel::Invitation { organizer } => Some(organizer),
        }
    }
}

/// Validates a request against the event and its ticket types and builds the
/// group with its tickets. Capacity is checked later, atomically, by the store.
pub fn prepare_order(
    event: &Event,
    ticket_types: &[TicketType],
    items: Vec<TicketGroupItem>,
    channel: &Channel,
    now: DateTime<Utc>,
) -> AppResult<NewTicketGroup> {
    if !event.active {
        return Err(AppError::ValidationError(format!(
            "Event '{}' is not on sale",
            event.name
        )));
    }
    if event.has_finished(now) {
        return Err(AppError::ValidationError(format!(
            "Event '{}' has already finished",
            event.name
        )));
    }
    if items.is_empty() {
        return Err(AppError::ValidationError(
            "At least one ticket is required".to_string(),
        ));
    }

    let types_by_id: HashMap<Uuid, &TicketType> =
        ticket_types.iter().map(|tt| (tt.id, tt)).collect();
    let today = now.date_naive();
    let mut seen = HashSet::new();

    for item in &items {
        if !seen.insert(item.ticket_type_id) {
            return Err(AppError::ValidationError(format!(
                "Ticket type {} appears more than once",
                item.ticket_type_id
            )));
        }
        let ticket_type = types_by_id.get(&item.ticket_type_id).ok_or_else(|| {
            AppError::ValidationError(format!(
                "Ticket type {} does not belong to event {}",
                item.ticket_type_id, event.id
            ))
        })?;
        check_item(ticket_type, item, channel, now)?;
        for buyer in &item.buyers {
            buyer.validate(today)?;
        }
    }

    let group_id = Uuid::new_v4();
    let organizer = channel.organizer();
    let mut total_price = Decimal::ZERO;
    let mut tickets = Vec::new();

    for item in items {
        let ticket_type = types_by_id[&item.ticket_type_id];
        total_price += ticket_type.price * Decimal::from(item.buyers.len() as u64);
        tickets.extend(
            item.buyers
                .into_iter()
                .map(|buyer| EmittedTicket::new(group_id, ticket_type, buyer, now)),
        );
    }

    let status = match channel {
        Channel::Invitation { .. } => TicketGroupStatus::Free,
        Channel::Web { .. } if total_price.is_zero() => TicketGroupStatus::Free,
        Channel::Web { .. } => TicketGroupStatus::Unpaid,
    };

    let group = TicketGroup {
        id: group_id,
        event_id: event.id,
        status,
        amount_tickets: tickets.len() as i32,
        total_price,
        invitation_code: organizer.map(|o| o.code.clone()),
        organizer_id: organizer.map(|o| o.user_id),
        payment_id: None,
        created_at: now,
        updated_at: now,
    };

    Ok(NewTicketGroup { group, tickets })
}

fn check_item(
    ticket_type: &TicketType,
    item: &TicketGroupItem,
    channel: &Channel,
    now: DateTime<Utc>,
) -> AppResult<()> {
    if item.buyers.is_empty() {
        return Err(AppError::ValidationError(format!(
            "No buyers given for '{}'",
            ticket_type.name
        )));
    }

    match channel {
        Channel::Web { organizer } => {
            if !ticket_type.visible_in_web {
                return Err(AppError::ValidationError(format!(
                    "'{}' is not sold online",
                    ticket_type.name
                )));
            }
            if !ticket_type.on_sale(now) {
                return Err(AppError::ValidationError(format!(
                    "'{}' is not on sale right now",
                    ticket_type.name
                )));
            }
            if ticket_type.category == TicketCategory::Free && organizer.is_none() {
                return Err(AppError::ValidationError(format!(
                    "'{}' requires an invitation code",
                    ticket_type.name
                )));
            }
        }
        Channel::Invitation { .. } => {
            if ticket_type.category != TicketCategory::Free {
                return Err(AppError::ValidationError(format!(
                    "Only free ticket types can be issued as invitations, '{}' is {:?}",
                    ticket_type.name, ticket_type.category
                )));
            }
        }
    }

    if item.buyers.len() > ticket_type.max_per_purchase as usize {
        return Err(AppError::ValidationError(format!(
            "At most {} tickets of '{}' per purchase",
            ticket_type.max_per_purchase, ticket_type.name
        )));
    }
    Ok(())
}

fn checkout_lines(order: &TicketGroupWithTickets, ticket_types: &[TicketType]) -> Vec<CheckoutLine> {
    ticket_types
        .iter()
        .filter_map(|tt| {
            let quantity = order
                .tickets
                .iter()
                .filter(|t| t.ticket_type_id == tt.id)
                .count();
            (quantity > 0).then(|| CheckoutLine {
                title: tt.name.clone(),
                quantity: quantity as i32,
                unit_price: tt.price,
            })
        })
        .collect()
}

/// Public purchase: validates, reserves stock and opens a checkout when the
/// group has something to pay.
pub async fn purchase(
    state: &AppState,
    request: CreateTicketGroupRequest,
    now: DateTime<Utc>,
) -> AppResult<PurchaseResponse> {
    let event = state.store.get_event(request.event_id).await?;
    let ticket_types = state.store.list_ticket_types(event.id).await?;

    let organizer = match request.invitation_code.as_deref() {
        Some(raw) if !raw.trim().is_empty() => {
            let code = normalize_code(raw)?;
            let organizer = state
                .store
                .find_organizer_by_code(&code)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Invitation code {} not found", code)))?;
            Some(organizer)
        }
        _ => None,
    };

    let channel = Channel::Web { organizer };
    let order = prepare_order(&event, &ticket_types, request.items, &channel, now)?;
    let hold_cutoff = now - state.config.unpaid_hold;
    let created = state.store.create_ticket_group(order, hold_cutoff).await?;

    tracing::info!(
        ticket_group_id = %created.group.id,
        event_id = %event.id,
        tickets = created.group.amount_tickets,
        total = %created.group.total_price,
        organizer_id = ?created.group.organizer_id,
        "Ticket group created"
    );

    let checkout_url = if created.group.status == TicketGroupStatus::Unpaid {
        let base = &state.config.public_base_url;
        let checkout = state
            .payments
            .create_checkout(CheckoutRequest {
                ticket_group_id: created.group.id,
                lines: checkout_lines(&created, &ticket_types),
                payer_email: created.tickets.first().map(|t| t.mail.clone()),
                notification_url: format!("{}/payments/webhook", base),
                return_url: format!("{}/ticket-groups/{}", base, created.group.id),
            })
            .await?;
        Some(checkout.checkout_url)
    } else {
        None
    };

    Ok(PurchaseResponse {
        group: created,
        checkout_url,
    })
}

/// Free invitations issued directly by an organizer.
pub async fn issue_invitations(
    state: &AppState,
    organizer: Organizer,
    event_id: Uuid,
    request: IssueInvitationsRequest,
    now: DateTime<Utc>,
) -> AppResult<TicketGroupWithTickets> {
    let event = state.store.get_event(event_id).await?;
    let ticket_types = state.store.list_ticket_types(event.id).await?;

    let channel = Channel::Invitation { organizer };
    let order = prepare_order(&event, &ticket_types, request.items, &channel, now)?;
    let hold_cutoff = now - state.config.unpaid_hold;
    let created = state.store.create_ticket_group(order, hold_cutoff).await?;

    tracing::info!(
        ticket_group_id = %created.group.id,
        event_id = %event.id,
        organizer_id = ?created.group.organizer_id,
        tickets = created.group.amount_tickets,
        "Invitations issued"
    );
    Ok(created)
}
