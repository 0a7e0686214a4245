//! Payment provider integration.
//!
//! Checkout creation and payment lookups go through [`PaymentProvider`]; the
//! production implementation talks to MercadoPago, the mock one keeps
//! everything in memory.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::error::AppResult;

pub mod mercadopago;
pub mod mock;

pub use mercadopago::MercadoPagoClient;
pub use mock::MockPaymentProvider;

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutLine {
    pub title: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub ticket_group_id: Uuid,
    pub lines: Vec<CheckoutLine>,
    pub payer_email: Option<String>,
    pub notification_url: String,
    pub return_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Checkout {
    pub preference_id: String,
    pub checkout_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Approved,
    Pending,
    InProcess,
    Authorized,
    Rejected,
    Cancelled,
    Refunded,
    ChargedBack,
    #[serde(other)]
    Unknown,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Approved => "approved",
            PaymentStatus::Pending => "pending",
            PaymentStatus::InProcess => "in_process",
            PaymentStatus::Authorized => "authorized",
            PaymentStatus::Rejected => "rejected",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::ChargedBack => "charged_back",
            PaymentStatus::Unknown => "unknown",
        }
    }
}

/// A payment as reported by the provider.
#[derive(Debug, Clone)]
pub struct ProviderPayment {
    pub id: String,
    pub status: PaymentStatus,
    pub amount: Decimal,
    pub external_reference: Option<String>,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync + 'static {
    async fn create_checkout(&self, request: CheckoutRequest) -> AppResult<Checkout>;

    async fn fetch_payment(&self, payment_id: &str) -> AppResult<ProviderPayment>;
}
