use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    ChiefOrganizer,
    Organizer,
    Ticketing,
    User,
}

impl Role {
    /// Staff roles see inactive events and every ticket type.
    pub fn is_staff(self) -> bool {
        !matches!(self, Role::User)
    }

    /// Roles that carry an organizer profile with an invitation code.
    pub fn is_organizer(self) -> bool {
        matches!(self, Role::Organizer | Role::ChiefOrganizer)
    }

    pub fn can_scan(self) -> bool {
        matches!(self, Role::Ticketing | Role::Admin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::User
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}
