//! Sales and check-in figures per event, scoped by the caller's role.

use std::collections::{BTreeMap, HashMap, HashSet};

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::models::{Gender, Organizer, Role, TicketGroupStatus, TicketType};
use crate::state::AppState;
use crate::store::{remaining_stock, SoldTicket};
use crate::utils::error::{AppError, AppResult};

/// Which sales a caller may see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SalesScope {
    All,
    Organizers(HashSet<Uuid>),
}

impl SalesScope {
    pub fn includes(&self, sale: &SoldTicket) -> bool {
        match self {
            SalesScope::All => true,
            SalesScope::Organizers(ids) => sale.organizer_id.map_or(false, |id| ids.contains(&id)),
        }
    }
}

pub async fn resolve_scope(state: &AppState, user: AuthUser) -> AppResult<SalesScope> {
    match user.role {
        Role::Admin => Ok(SalesScope::All),
        Role::ChiefOrganizer => {
            let mut ids: HashSet<Uuid> = state
                .store
                .list_organizers()
                .await?
                .into_iter()
                .filter(|o| o.chief_organizer_id == Some(user.id))
                .map(|o| o.user_id)
                .collect();
            ids.insert(user.id);
            Ok(SalesScope::Organizers(ids))
        }
        Role::Organizer => Ok(SalesScope::Organizers(HashSet::from([user.id]))),
        Role::Ticketing | Role::User => Err(AppError::Forbidden(
            "Only admins and organizers can see sales".to_string(),
        )),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketTypeStats {
    pub ticket_type_id: Uuid,
    pub name: String,
    pub sold: i64,
    pub scanned: i64,
    pub revenue: Decimal,
    pub remaining: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganizerStats {
    pub organizer_id: Option<Uuid>,
    pub name: Option<String>,
    pub code: Option<String>,
    pub sold: i64,
    pub scanned: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GenderStats {
    pub male: i64,
    pub female: i64,
    pub other: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventStats {
    pub event_id: Uuid,
    pub total_sold: i64,
    pub total_scanned: i64,
    pub revenue: Decimal,
    pub by_ticket_type: Vec<TicketTypeStats>,
    pub by_organizer: Vec<OrganizerStats>,
    pub by_gender: GenderStats,
}

fn revenue_of(sale: &SoldTicket) -> Decimal {
    if sale.group_status == TicketGroupStatus::Paid {
        sale.ticket.price
    } else {
        Decimal::ZERO
    }
}

pub fn compute_stats(
    event_id: Uuid,
    ticket_types: &[TicketType],
    held: &HashMap<Uuid, i64>,
    sales: &[SoldTicket],
    organizers: &[Organizer],
    scope: &SalesScope,
) -> EventStats {
    let visible: Vec<&SoldTicket> = sales.iter().filter(|s| scope.includes(s)).collect();

    let mut gender = GenderStats::default();
    let mut total_scanned = 0;
    let mut revenue = Decimal::ZERO;
    for sale in &visible {
        match sale.ticket.gender {
            Gender::Male => gender.male += 1,
            Gender::Female => gender.female += 1,
            Gender::Other => gender.other += 1,
        }
        if sale.ticket.scanned_at.is_some() {
            total_scanned += 1;
        }
        revenue += revenue_of(sale);
    }

    let by_ticket_type = ticket_types
        .iter()
        .map(|tt| {
            let of_type = visible.iter().filter(|s| s.ticket.ticket_type_id == tt.id);
            let mut stats = TicketTypeStats {
                ticket_type_id: tt.id,
                name: tt.name.clone(),
                sold: 0,
                scanned: 0,
                revenue: Decimal::ZERO,
                remaining: remaining_stock(tt, held.get(&tt.id).copied().unwrap_or(0)),
            };
            for sale in of_type {
                stats.sold += 1;
                if sale.ticket.scanned_at.is_some() {
                    stats.scanned += 1;
                }
                stats.revenue += revenue_of(sale);
            }
            stats
        })
        .collect();

    let organizers_by_id: HashMap<Uuid, &Organizer> =
        organizers.iter().map(|o| (o.user_id, o)).collect();
    // BTreeMap keeps the output order stable; unattributed sales sort first.
    let mut per_organizer: BTreeMap<Option<Uuid>, OrganizerStats> = BTreeMap::new();
    for sale in &visible {
        let entry = per_organizer.entry(sale.organizer_id).or_insert_with(|| {
            let organizer = sale.organizer_id.and_then(|id| organizers_by_id.get(&id));
            OrganizerStats {
                organizer_id: sale.organizer_id,
                name: organizer.map(|o| o.name.clone()),
                code: organizer.map(|o| o.code.clone()),
                sold: 0,
                scanned: 0,
                revenue: Decimal::ZERO,
            }
        });
        entry.sold += 1;
        if sale.ticket.scanned_at.is_some() {
            entry.scanned += 1;
        }
        entry.revenue += revenue_of(sale);
    }
    let mut by_organizer: Vec<OrganizerStats> = per_organizer.into_values().collect();
    by_organizer.sort_by(|a, b| b.sold.cmp(&a.sold));

    EventStats {
        event_id,
        total_sold: visible.len() as i64,
        total_scanned,
        revenue,
        by_ticket_type,
        by_organizer,
        by_gender: gender,
    }
}

pub async fn event_stats(state: &AppState, user: AuthUser, event_id: Uuid) -> AppResult<EventStats> {
    let scope = resolve_scope(state, user).await?;
    let event = state.store.get_event(event_id).await?;
    let ticket_types = state.store.list_ticket_types(event.id).await?;
    let hold_cutoff = chrono::Utc::now() - state.config.unpaid_hold;
    let held = state.store.held_counts(event.id, hold_cutoff).await?;
    let sales = state.store.event_sales(event.id).await?;
    let organizers = state.store.list_organizers().await?;

    Ok(compute_stats(
        event.id,
        &ticket_types,
        &held,
        &sales,
        &organizers,
        &scope,
    ))
}

pub async fn event_buyers(
    state: &AppState,
    user: AuthUser,
    event_id: Uuid,
) -> AppResult<Vec<SoldTicket>> {
    let scope = resolve_scope(state, user).await?;
    let event = state.store.get_event(event_id).await?;
    let sales = state.store.event_sales(event.id).await?;
    Ok(sales.into_iter().filter(|s| scope.includes(s)).collect())
}
