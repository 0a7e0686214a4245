use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::user::Role;

/// Organizer profile attached to an organizer or chief-organizer user.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Organizer {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub code: String,
    pub chief_organizer_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrganizerRequest {
    pub user_id: Uuid,
    #[serde(default)]
    pub chief: bool,
    pub chief_organizer_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignChiefRequest {
    pub chief_organizer_id: Option<Uuid>,
}

/// Public view returned when a buyer checks an invitation code.
#[derive(Debug, Clone, Serialize)]
pub struct InvitationCodeInfo {
    pub code: String,
    pub organizer_id: Uuid,
    pub organizer_name: String,
}
