use axum::{extract::State, response::Response};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::{AuthUser, MaybeAuthUser};
use crate::models::event::{CreateEventRequest, SetActiveRequest, UpdateEventRequest};
use crate::models::Event;
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};
use crate::utils::extract::{Json, Path};
use crate::utils::response::{created, empty_success, success};

fn validate_event(event: &Event) -> AppResult<()> {
    if event.name.trim().is_empty() {
        return Err(AppError::ValidationError("Event name is required".to_string()));
    }
    if event.location.trim().is_empty() {
        return Err(AppError::ValidationError(
            "Event location is required".to_string(),
        ));
    }
    if event.ends_at <= event.starts_at {
        return Err(AppError::ValidationError(
            "Event must end after it starts".to_string(),
        ));
    }
    Ok(())
}

/// Loads an event, hiding inactive ones from non-staff callers.
pub(crate) async fn visible_event(
    state: &AppState,
    caller: &MaybeAuthUser,
    id: Uuid,
) -> AppResult<Event> {
    let event = state.store.get_event(id).await?;
    if !event.active && !caller.is_staff() {
        return Err(AppError::NotFound(format!("Event {} not found", id)));
    }
    Ok(event)
}

pub async fn list_events(
    State(state): State<AppState>,
    caller: MaybeAuthUser,
) -> AppResult<Response> {
    let events = state.store.list_events(!caller.is_staff()).await?;
    Ok(success(events, "Events retrieved"))
}

pub async fn get_event(
    State(state): State<AppState>,
    caller: MaybeAuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    let event = visible_event(&state, &caller, id).await?;
    Ok(success(event, "Event retrieved"))
}

pub async fn create_event(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateEventRequest>,
) -> AppResult<Response> {
    user.require_admin()?;

    let now = Utc::now();
    let event = Event {
        id: Uuid::new_v4(),
        name: request.name.trim().to_string(),
        description: request.description,
        location: request.location.trim().to_string(),
        starts_at: request.starts_at,
        ends_at: request.ends_at,
        image_url: request.image_url,
        active: request.active,
        created_at: now,
        updated_at: now,
    };
    validate_event(&event)?;

    let event = state.store.create_event(event).await?;
    tracing::info!(event_id = %event.id, name = %event.name, "Event created");
    Ok(created(event, "Event created"))
}

pub async fn update_event(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateEventRequest>,
) -> AppResult<Response> {
    user.require_admin()?;

    let mut event = state.store.get_event(id).await?;
    if let Some(name) = request.name {
        event.name = name.trim().to_string();
    }
    if let Some(description) = request.description {
        event.description = Some(description);
    }
    if let Some(location) = request.location {
        event.location = location.trim().to_string();
    }
    if let Some(starts_at) = request.starts_at {
        event.starts_at = starts_at;
    }
    if let Some(ends_at) = request.ends_at {
        event.ends_at = ends_at;
    }
    if let Some(image_url) = request.image_url {
        event.image_url = Some(image_url);
    }
    event.updated_at = Utc::now();
    validate_event(&event)?;

    let event = state.store.update_event(event).await?;
    Ok(success(event, "Event updated"))
}

pub async fn set_event_active(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<SetActiveRequest>,
) -> AppResult<Response> {
    user.require_admin()?;

    let mut event = state.store.get_event(id).await?;
    event.active = request.active;
    event.updated_at = Utc::now();
    let event = state.store.update_event(event).await?;
    tracing::info!(event_id = %event.id, active = event.active, "Event visibility changed");
    Ok(success(event, "Event updated"))
}

pub async fn delete_event(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Response> {
    user.require_admin()?;
    state.store.delete_event(id).await?;
    tracing::info!(event_id = %id, "Event deleted");
    Ok(empty_success("Event deleted"))
}
