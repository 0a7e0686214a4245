use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::{Checkout, CheckoutRequest, PaymentProvider, ProviderPayment};
use crate::utils::error::{AppError, AppResult};

/// Offline payment provider used when no MercadoPago token is configured.
pub struct MockPaymentProvider {
    base_url: String,
    checkouts: Mutex<Vec<CheckoutRequest>>,
    payments: Mutex<HashMap<String, ProviderPayment>>,
}

impl MockPaymentProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            checkouts: Mutex::new(Vec::new()),
            payments: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a payment the provider will report on lookup.
    pub fn set_payment(&self, payment: ProviderPayment) {
        if let Ok(mut payments) = self.payments.lock() {
            payments.insert(payment.id.clone(), payment);
        }
    }

    pub fn checkouts(&self) -> Vec<CheckoutRequest> {
        self.checkouts
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_checkout(&self, request: CheckoutRequest) -> AppResult<Checkout> {
        let preference_id = format!("mock-{}", Uuid::new_v4());
        let checkout_url = format!(
            "{}/checkout/mock/{}",
            self.base_url, request.ticket_group_id
        );
        tracing::info!(
            ticket_group_id = %request.ticket_group_id,
            %preference_id,
            "Created mock checkout"
        );
        self.checkouts
            .lock()
            .map_err(|_| AppError::InternalServerError("mock provider lock poisoned".into()))?
            .push(request);
        Ok(Checkout {
            preference_id,
            checkout_url,
        })
    }

    async fn fetch_payment(&self, payment_id: &str) -> AppResult<ProviderPayment> {
        self.payments
            .lock()
            .map_err(|_| AppError::InternalServerError("mock provider lock poisoned".into()))?
            .get(payment_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Payment {} not found", payment_id)))
    }
}
