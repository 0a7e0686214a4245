use uuid::Uuid;

use crate::auth::AuthUser;
use crate::models::organizer::{CreateOrganizerRequest, InvitationCodeInfo};
use crate::models::{Organizer, Role};
use crate::services::codes::{generate_code, normalize_code};
use crate::state::AppState;
use crate::store::NewOrganizer;
use crate::utils::error::{AppError, AppResult};

const MAX_CODE_ATTEMPTS: usize = 8;

async fn ensure_chief(state: &AppState, chief_id: Uuid, organizer_id: Uuid) -> AppResult<()> {
    if chief_id == organizer_id {
        return Err(AppError::ValidationError(
            "An organizer can't be their own chief".to_string(),
        ));
    }
    let chief = state.store.get_organizer(chief_id).await.map_err(|e| match e {
        AppError::NotFound(_) => {
            AppError::ValidationError(format!("Chief organizer {} not found", chief_id))
        }
        other => other,
    })?;
    if chief.role != Role::ChiefOrganizer {
        return Err(AppError::ValidationError(format!(
            "User {} is not a chief organizer",
            chief_id
        )));
    }
    Ok(())
}

pub async fn create_organizer(
    state: &AppState,
    request: CreateOrganizerRequest,
) -> AppResult<Organizer> {
    let role = if request.chief {
        Role::ChiefOrganizer
    } else {
        Role::Organizer
    };
    if let Some(chief_id) = request.chief_organizer_id {
        if request.chief {
            return Err(AppError::ValidationError(
                "A chief organizer can't report to another chief".to_string(),
            ));
        }
        ensure_chief(state, chief_id, request.user_id).await?;
    }

    // Codes are random; retry on the rare collision.
    for attempt in 1..=MAX_CODE_ATTEMPTS {
        let code = generate_code();
        if state.store.find_organizer_by_code(&code).await?.is_some() {
            tracing::debug!(attempt, "Invitation code collision, retrying");
            continue;
        }
        match state
            .store
            .create_organizer(request.user_id, role, &code, request.chief_organizer_id)
            .await?
        {
            NewOrganizer::Created(organizer) => {
                tracing::info!(
                    organizer_id = %organizer.user_id,
                    code = %organizer.code,
                    role = ?organizer.role,
                    "Organizer created"
                );
                return Ok(organizer);
            }
            NewOrganizer::CodeTaken => {
                tracing::debug!(attempt, "Invitation code taken at insert, retrying");
            }
        }
    }
    Err(AppError::InternalServerError(
        "could not allocate a unique invitation code".to_string(),
    ))
}

pub async fn assign_chief(
    state: &AppState,
    organizer_id: Uuid,
    chief_organizer_id: Option<Uuid>,
) -> AppResult<Organizer> {
    let organizer = state.store.get_organizer(organizer_id).await?;
    if let Some(chief_id) = chief_organizer_id {
        if organizer.role == Role::ChiefOrganizer {
            return Err(AppError::ValidationError(
                "A chief organizer can't report to another chief".to_string(),
            ));
        }
        ensure_chief(state, chief_id, organizer_id).await?;
    }
    state
        .store
        .set_chief_organizer(organizer_id, chief_organizer_id)
        .await
}

pub async fn list_organizers(state: &AppState, user: AuthUser) -> AppResult<Vec<Organizer>> {
    let organizers = state.store.list_organizers().await?;
    match user.role {
        Role::Admin => Ok(organizers),
        Role::ChiefOrganizer => Ok(organizers
            .into_iter()
            .filter(|o| o.user_id == user.id || o.chief_organizer_id == Some(user.id))
            .collect()),
        Role::Organizer => Ok(organizers
            .into_iter()
            .filter(|o| o.user_id == user.id)
            .collect()),
        Role::Ticketing | Role::User => Err(AppError::Forbidden(
            "Only admins and organizers can list organizers".to_string(),
        )),
    }
}

pub async fn validate_code(state: &AppState, raw: &str) -> AppResult<InvitationCodeInfo> {
    let code = normalize_code(raw)?;
    let organizer = state
        .store
        .find_organizer_by_code(&code)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Invitation code {} not found", code)))?;
    Ok(InvitationCodeInfo {
        code: organizer.code,
        organizer_id: organizer.user_id,
        organizer_name: organizer.name,
    })
}

/// Organizer profile of the caller, required to issue invitations.
pub async fn caller_profile(state: &AppState, user: AuthUser) -> AppResult<Organizer> {
    state.store.get_organizer(user.id).await.map_err(|e| match e {
        AppError::NotFound(_) => {
            AppError::Forbidden("Caller has no organizer profile".to_string())
        }
        other => other,
    })
}
