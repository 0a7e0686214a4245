use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{
    events, health_check, organizers, payments, scan, stats, ticket_groups, ticket_types, users,
};
use crate::state::AppState;
use crate::utils::error::AppError;

async fn not_found() -> AppError {
    AppError::NotFound("Route not found".to_string())
}

pub fn create_routes(state: AppState) -> Router {
    let cors = create_cors_layer(&state.config.cors_allowed_origins);
    let security_headers = create_security_headers_layer(state.config.production);

    Router::new()
        .route("/health", get(health_check))
        .route("/events", get(events::list_events).post(events::create_event))
        .route(
            "/events/:id",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route("/events/:id/active", patch(events::set_event_active))
        .route(
            "/events/:id/ticket-types",
            get(ticket_types::list_ticket_types).post(ticket_types::create_ticket_type),
        )
        .route(
            "/ticket-types/:id",
            put(ticket_types::update_ticket_type).delete(ticket_types::delete_ticket_type),
        )
        .route("/ticket-groups", post(ticket_groups::create_ticket_group))
        .route("/ticket-groups/:id", get(ticket_groups::get_ticket_group))
        .route(
            "/events/:id/invitations",
            post(ticket_groups::issue_invitations),
        )
        .route("/events/:id/scan", post(scan::scan_ticket))
        .route("/tickets/:id/scan", delete(scan::unscan_ticket))
        .route("/events/:id/stats", get(stats::event_stats))
        .route("/events/:id/buyers", get(stats::event_buyers))
        .route(
            "/organizers",
            get(organizers::list_organizers).post(organizers::create_organizer),
        )
        .route("/organizers/:id/chief", patch(organizers::assign_chief))
        .route(
            "/invitation-codes/:code",
            get(organizers::validate_invitation_code),
        )
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/:id/role", patch(users::set_user_role))
        .route("/payments/webhook", post(payments::payment_webhook))
        .fallback(not_found)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(security_headers)
        .layer(cors)
}
