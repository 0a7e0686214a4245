use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Checkout, CheckoutRequest, PaymentProvider, PaymentStatus, ProviderPayment};
use crate::config::MercadoPagoConfig;
use crate::utils::error::{AppError, AppResult};

const CURRENCY_ID: &str = "ARS";
const REQUEST_TIMEOUT_SECS: u64 = 15;

#[derive(Serialize)]
struct PreferenceItem<'a> {
    title: &'a str,
    quantity: i32,
    unit_price: f64,
    currency_id: &'static str,
}

#[derive(Serialize)]
struct BackUrls<'a> {
    success: &'a str,
    failure: &'a str,
    pending: &'a str,
}

#[derive(Serialize)]
struct Payer<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct PreferenceRequest<'a> {
    items: Vec<PreferenceItem<'a>>,
    external_reference: String,
    notification_url: &'a str,
    back_urls: BackUrls<'a>,
    auto_return: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    payer: Option<Payer<'a>>,
}

#[derive(Deserialize)]
struct PreferenceResponse {
    id: String,
    init_point: String,
}

#[derive(Deserialize)]
struct PaymentResponse {
    id: Value,
    status: PaymentStatus,
    #[serde(default)]
    transaction_amount: Option<Decimal>,
    #[serde(default)]
    external_reference: Option<String>,
}

/// MercadoPago REST client (checkout preferences and payment lookups).
pub struct MercadoPagoClient {
    http: reqwest::Client,
    api_url: String,
    access_token: String,
}

impl MercadoPagoClient {
    pub fn new(config: &MercadoPagoConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::InternalServerError(format!("http client: {e}")))?;
        Ok(Self {
            http,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    async fn check(response: reqwest::Response, operation: &str) -> AppResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("{operation}: not found at provider")));
        }
        Err(AppError::ExternalServiceError(format!(
            "MercadoPago {operation} failed with {status}: {body}"
        )))
    }
}

fn provider_error(operation: &str, err: reqwest::Error) -> AppError {
    AppError::ExternalServiceError(format!("MercadoPago {operation}: {err}"))
}

fn payment_id_to_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl PaymentProvider for MercadoPagoClient {
    async fn create_checkout(&self, request: CheckoutRequest) -> AppResult<Checkout> {
        let items = request
            .lines
            .iter()
            .map(|line| {
                let unit_price = line.unit_price.to_f64().ok_or_else(|| {
                    AppError::ValidationError(format!("Price {} out of range", line.unit_price))
                })?;
                Ok(PreferenceItem {
                    title: &line.title,
                    quantity: line.quantity,
                    unit_price,
                    currency_id: CURRENCY_ID,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        let body = PreferenceRequest {
            items,
            external_reference: request.ticket_group_id.to_string(),
            notification_url: &request.notification_url,
            back_urls: BackUrls {
                success: &request.return_url,
                failure: &request.return_url,
                pending: &request.return_url,
            },
            auto_return: "approved",
            payer: request.payer_email.as_deref().map(|email| Payer { email }),
        };

        let response = self
            .http
            .post(format!("{}/checkout/preferences", self.api_url))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| provider_error("create preference", e))?;
        let preference: PreferenceResponse = Self::check(response, "create preference")
            .await?
            .json()
            .await
            .map_err(|e| provider_error("decode preference", e))?;

        tracing::info!(
            ticket_group_id = %request.ticket_group_id,
            preference_id = %preference.id,
            "Created MercadoPago preference"
        );

        Ok(Checkout {
            preference_id: preference.id,
            checkout_url: preference.init_point,
        })
    }

    async fn fetch_payment(&self, payment_id: &str) -> AppResult<ProviderPayment> {
        let response = self
            .http
            .get(format!("{}/v1/payments/{}", self.api_url, payment_id))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| provider_error("fetch payment", e))?;
        let payment: PaymentResponse = Self::check(response, "fetch payment")
            .await?
            .json()
            .await
            .map_err(|e| provider_error("decode payment", e))?;

        Ok(ProviderPayment {
            id: payment_id_to_string(&payment.id),
            status: payment.status,
            amount: payment.transaction_amount.unwrap_or(Decimal::ZERO),
            external_reference: payment.external_reference,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payment_response_parses_numeric_id() {
        let payment: PaymentResponse = serde_json::from_value(json!({
            "id": 1234567890u64,
            "status": "approved",
            "transaction_amount": 1500.5,
            "external_reference": "1b4e28ba-2fa1-11d2-883f-0016d3cca427"
        }))
        .unwrap();
        assert_eq!(payment_id_to_string(&payment.id), "1234567890");
        assert_eq!(payment.status, PaymentStatus::Approved);
        assert_eq!(payment.transaction_amount, Some(Decimal::new(15005, 1)));
    }

    #[test]
    fn test_preference_request_shape() {
        let body = PreferenceRequest {
            items: vec![PreferenceItem {
                title: "General",
                quantity: 2,
                unit_price: 1500.0,
                currency_id: CURRENCY_ID,
            }],
            external_reference: "group".to_string(),
            notification_url: "https://api.example.com/payments/webhook",
            back_urls: BackUrls {
                success: "https://example.com/done",
                failure: "https://example.com/done",
                pending: "https://example.com/done",
            },
            auto_return: "approved",
            payer: None,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["items"][0]["unit_price"], 1500.0);
        assert!(value.get("payer").is_none());
    }
}
