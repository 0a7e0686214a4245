use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "ticket_category", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TicketCategory {
    Free,
    Paid,
    Table,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketType {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category: TicketCategory,
    pub price: Decimal,
    pub max_available: i32,
    pub max_per_purchase: i32,
    pub visible_in_web: bool,
    pub sale_starts_at: Option<DateTime<Utc>>,
    pub sale_ends_at: Option<DateTime<Utc>>,
    pub scan_limit: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TicketType {
    pub fn on_sale(&self, now: DateTime<Utc>) -> bool {
        self.sale_starts_at.map_or(true, |start| now >= start)
            && self.sale_ends_at.map_or(true, |end| now < end)
    }

    /// Checks the category/price and sale-window invariants.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Ticket type name is required".to_string(),
            ));
        }
        match self.category {
            TicketCategory::Free if !self.price.is_zero() => {
                return Err(AppError::ValidationError(
                    "Free ticket types must have a price of 0".to_string(),
                ));
            }
            TicketCategory::Paid | TicketCategory::Table if self.price <= Decimal::ZERO => {
                return Err(AppError::ValidationError(
                    "Paid and table ticket types must have a positive price".to_string(),
                ));
            }
            _ => {}
        }
        if self.max_available <= 0 {
            return Err(AppError::ValidationError(
                "max_available must be greater than 0".to_string(),
            ));
        }
        if self.max_per_purchase <= 0 {
            return Err(AppError::ValidationError(
                "max_per_purchase must be greater than 0".to_string(),
            ));
        }
        if let (Some(start), Some(end)) = (self.sale_starts_at, self.sale_ends_at) {
            if start >= end {
                return Err(AppError::ValidationError(
                    "Sale start must be before sale end".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Ticket type with the stock left for new purchases.
#[derive(Debug, Clone, Serialize)]
pub struct TicketTypeView {
    #[serde(flatten)]
    pub ticket_type: TicketType,
    pub remaining: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTicketTypeRequest {
    pub name: String,
    pub description: Option<String>,
    pub category: TicketCategory,
    pub price: Decimal,
    pub max_available: i32,
    pub max_per_purchase: i32,
    #[serde(default = "default_visible")]
    pub visible_in_web: bool,
    pub sale_starts_at: Option<DateTime<Utc>>,
    pub sale_ends_at: Option<DateTime<Utc>>,
    pub scan_limit: Option<DateTime<Utc>>,
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTicketTypeRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<TicketCategory>,
    pub price: Option<Decimal>,
    pub max_available: Option<i32>,
    pub max_per_purchase: Option<i32>,
    pub visible_in_web: Option<bool>,
    pub sale_starts_at: Option<DateTime<Utc>>,
    pub sale_ends_at: Option<DateTime<Utc>>,
    pub scan_limit: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "gender", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// Buyer data captured for every emitted ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyerData {
    pub full_name: String,
    pub dni: String,
    pub mail: String,
    pub gender: Gender,
    pub phone: String,
    pub birth_date: NaiveDate,
    pub instagram: Option<String>,
}

impl BuyerData {
    pub fn validate(&self, today: NaiveDate) -> Result<(), AppError> {
        if self.full_name.trim().is_empty() {
            return Err(AppError::ValidationError("Buyer name is required".to_string()));
        }
        let dni = self.dni.trim();
        if !(6..=12).contains(&dni.len()) || !dni.chars().all(|c| c.is_ascii_digit()) {
            return Err(AppError::ValidationError(format!(
                "Invalid DNI '{}': expected 6 to 12 digits",
                self.dni
            )));
        }
        let mail = self.mail.trim();
        match mail.split_once('@') {
            Some((user, domain)) if !user.is_empty() && domain.contains('.') => {}
            _ => {
                return Err(AppError::ValidationError(format!(
                    "Invalid email '{}'",
                    self.mail
                )))
            }
        }
        if self.birth_date >= today {
            return Err(AppError::ValidationError(
                "Birth date must be in the past".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EmittedTicket {
    pub id: Uuid,
    pub ticket_group_id: Uuid,
    pub ticket_type_id: Uuid,
    pub event_id: Uuid,
    /// Unit price charged when the ticket was issued.
    pub price: Decimal,
    pub full_name: String,
    pub dni: String,
    pub mail: String,
    pub gender: Gender,
    pub phone: String,
    pub birth_date: NaiveDate,
    pub instagram: Option<String>,
    pub scanned_at: Option<DateTime<Utc>>,
    pub scanned_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl EmittedTicket {
    pub fn new(
        ticket_group_id: Uuid,
        ticket_type: &TicketType,
        buyer: BuyerData,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticket_group_id,
            ticket_type_id: ticket_type.id,
            event_id: ticket_type.event_id,
            price: ticket_type.price,
            full_name: buyer.full_name.trim().to_string(),
            dni: buyer.dni.trim().to_string(),
            mail: buyer.mail.trim().to_lowercase(),
            gender: buyer.gender,
            phone: buyer.phone.trim().to_string(),
            birth_date: buyer.birth_date,
            instagram: buyer.instagram,
            scanned_at: None,
            scanned_by: None,
            created_at: now,
        }
    }
}
