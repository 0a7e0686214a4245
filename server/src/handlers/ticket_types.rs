use axum::{extract::State, response::Response};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::{AuthUser, MaybeAuthUser};
use crate::handlers::events::visible_event;
use crate::models::ticket::{CreateTicketTypeRequest, TicketTypeView, UpdateTicketTypeRequest};
use crate::models::TicketType;
use crate::state::AppState;
use crate::store::remaining_stock;
use crate::utils::error::AppResult;
use crate::utils::extract::{Json, Path};
use crate::utils::response::{created, empty_success, success};

/// Buyers only see ticket types sold online and inside their sale window.
pub async fn list_ticket_types(
    State(state): State<AppState>,
    caller: MaybeAuthUser,
    Path(event_id): Path<Uuid>,
) -> AppResult<Response> {
    let event = visible_event(&state, &caller, event_id).await?;
    let now = Utc::now();
    let ticket_types = state.store.list_ticket_types(event.id).await?;
    let held = state
        .store
        .held_counts(event.id, now - state.config.unpaid_hold)
        .await?;

    let staff = caller.is_staff();
    let views: Vec<TicketTypeView> = ticket_types
        .into_iter()
        .filter(|tt| staff || (tt.visible_in_web && tt.on_sale(now)))
        .map(|tt| {
            let remaining = remaining_stock(&tt, held.get(&tt.id).copied().unwrap_or(0));
            TicketTypeView {
                ticket_type: tt,
                remaining,
            }
        })
        .collect();

    Ok(success(views, "Ticket types retrieved"))
}

pub async fn create_ticket_type(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<Uuid>,
    Json(request): Json<CreateTicketTypeRequest>,
) -> AppResult<Response> {
    user.require_admin()?;
    let event = state.store.get_event(event_id).await?;

    let now = Utc::now();
    let ticket_type = TicketType {
        id: Uuid::new_v4(),
        event_id: event.id,
        name: request.name.trim().to_string(),
        description: request.description,
        category: request.category,
        price: request.price,
        max_available: request.max_available,
        max_per_purchase: request.max_per_purchase,
        visible_in_web: request.visible_in_web,
        sale_starts_at: request.sale_starts_at,
        sale_ends_at: request.sale_ends_at,
        scan_limit: request.scan_limit,
        created_at: now,
        updated_at: now,
    };
    ticket_type.validate()?;

    let ticket_type = state.store.create_ticket_type(ticket_type).await?;
    tracing::info!(
        ticket_type_id = %ticket_type.id,
        event_id = %event.id,
        category = ?ticket_type.category,
        "Ticket type created"
    );
    Ok(created(ticket_type, "Ticket type created"))
}

fn apply_update(ticket_type: &mut TicketType, request: UpdateTicketTypeRequest) {
    if let Some(name) = request.name {
        ticket_type.name = name.trim().to_string();
    }
    if let Some(description) = request.description {
        ticket_type.description = Some(description);
    }
    if let Some(category) = request.category {
        ticket_type.category = category;
    }
    if let Some(price) = request.price {
        ticket_type.price = price;
    }
    if let Some(max_available) = request.max_available {
        ticket_type.max_available = max_available;
    }
    if let Some(max_per_purchase) = request.max_per_purchase {
        ticket_type.max_per_purchase = max_per_purchase;
    }
    if let Some(visible) = request.visible_in_web {
        ticket_type.visible_in_web = visible;
    }
    if let Some(start) = request.sale_starts_at {
        ticket_type.sale_starts_at = Some(start);
    }
    if let Some(end) = request.sale_ends_at {
        ticket_type.sale_ends_at = Some(end);
    }
    if let Some(limit) = request.scan_limit {
        ticket_type.scan_limit = Some(limit);
    }
}

pub async fn update_ticket_type(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateTicketTypeRequest>,
) -> AppResult<Response> {
    user.require_admin()?;

    let now = Utc::now();
    let mut ticket_type = state.store.get_ticket_type(id).await?;
    apply_update(&mut ticket_type, request);
    ticket_type.updated_at = now;
    ticket_type.validate()?;

    let ticket_type = state
        .store
        .update_ticket_type(ticket_type, now - state.config.unpaid_hold)
        .await?;
    Ok(success(ticket_type, "Ticket type updated"))
}

pub async fn delete_ticket_type(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    user.require_admin()?;
    state.store.delete_ticket_type(id).await?;
    tracing::info!(ticket_type_id = %id, "Ticket type deleted");
    Ok(empty_success("Ticket type deleted"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TicketCategory;
    use rust_decimal::Decimal;

    #[test]
    fn test_apply_update_keeps_missing_fields() {
        let now = Utc::now();
        let mut tt = TicketType {
            id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            name: "General".to_string(),
            description: Some("Entrada".to_string()),
            category: TicketCategory::Paid,
            price: Decimal::new(5000, 0),
            max_available: 100,
            max_per_purchase: 4,
            visible_in_web: true,
            sale_starts_at: None,
            sale_ends_at: None,
            scan_limit: None,
            created_at: now,
            updated_at: now,
        };

        apply_update(
            &mut tt,
            UpdateTicketTypeRequest {
                price: Some(Decimal::new(6000, 0)),
                visible_in_web: Some(false),
                ..Default::default()
            },
        );

        assert_eq!(tt.price, Decimal::new(6000, 0));
        assert!(!tt.visible_in_web);
        assert_eq!(tt.name, "General");
        assert_eq!(tt.max_available, 100);
        assert_eq!(tt.description.as_deref(), Some("Entrada"));
    }
}
