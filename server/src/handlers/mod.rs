use axum::response::Response;
use serde::Serialize;

use crate::utils::response::success;

pub mod events;
pub mod organizers;
pub mod payments;
pub mod scan;
pub mod stats;
pub mod ticket_groups;
pub mod ticket_types;
pub mod users;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "ticketing-api",
    };

    success(payload, "Health check successful")
}
