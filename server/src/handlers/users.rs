use axum::{extract::State, response::Response};
use chrono::Utc;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::models::user::{CreateUserRequest, SetRoleRequest};
use crate::models::User;
use crate::state::AppState;
use crate::utils::error::{AppError, AppResult};
use crate::utils::extract::{Json, Path};
use crate::utils::response::{created, success};

fn normalize_email(raw: &str) -> AppResult<String> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(AppError::ValidationError(format!(
            "Invalid email address '{}'",
            raw.trim()
        ))),
    }
}

pub async fn list_users(State(state): State<AppState>, user: AuthUser) -> AppResult<Response> {
    user.require_admin()?;
    let users = state.store.list_users().await?;
    Ok(success(users, "Users retrieved"))
}

pub async fn create_user(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateUserRequest>,
) -> AppResult<Response> {
    user.require_admin()?;

    if request.name.trim().is_empty() {
        return Err(AppError::ValidationError("User name is required".to_string()));
    }
    // Organizer roles come with a profile and a code, see POST /organizers.
    if request.role.is_organizer() {
        return Err(AppError::ValidationError(
            "Organizers are created through the organizers endpoint".to_string(),
        ));
    }

    let now = Utc::now();
    let new_user = User {
        id: Uuid::new_v4(),
        name: request.name.trim().to_string(),
        email: normalize_email(&request.email)?,
        role: request.role,
        created_at: now,
        updated_at: now,
    };
    let new_user = state.store.create_user(new_user).await?;
    tracing::info!(user_id = %new_user.id, role = ?new_user.role, "User created");
    Ok(created(new_user, "User created"))
}

pub async fn set_user_role(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<SetRoleRequest>,
) -> AppResult<Response> {
    user.require_admin()?;

    let target = state.store.get_user(id).await?;
    if request.role.is_organizer() && !target.role.is_organizer() {
        return Err(AppError::ValidationError(
            "Organizers are created through the organizers endpoint".to_string(),
        ));
    }

    let updated = state.store.set_user_role(id, request.role).await?;
    tracing::info!(
        user_id = %updated.id,
        from = ?target.role,
        to = ?updated.role,
        "User role changed"
    );
    Ok(success(updated, "Role updated"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email(" Ana@Example.COM ").unwrap(),
            "ana@example.com"
        );
        assert!(normalize_email("no-at-sign").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("ana@").is_err());
    }
}
