//! Payments API client (Square-style v2).
//!
//! Checkout creates an order for the sale's lines, then charges the card
//! token the browser tokenized against that order. Both calls carry
//! idempotency keys derived from the sale's `checkout_key`, so repeating a
//! call for the same sale (such as a charge retried after a timeout) is
//! answered with the original result instead of a second charge.

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use larder_core::Cents;
use larder_db::models::SaleLine;

use crate::config::PaymentsConfig;

/// Payments API version pinned on every request.
const API_VERSION: &str = "2025-01-23";

/// Request timeout for payments calls.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(20);

/// Payment statuses that mean the money moved (or will, once captured).
const SUCCESS_STATUSES: &[&str] = &["COMPLETED", "APPROVED"];

/// Errors from the payments API.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The API refused the order or the card.
    #[error("payment declined: {0}")]
    Declined(String),

    /// Transport failure or a 5xx from the API.
    #[error("payments unavailable: {0}")]
    Unavailable(String),

    /// The API answered with something we could not read.
    #[error("invalid payments response: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for PaymentError {
    fn from(err: reqwest::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

#[derive(Debug, Serialize)]
struct Money<'a> {
    amount: i64,
    currency: &'a str,
}

#[derive(Debug, Serialize)]
struct OrderLineItem<'a> {
    name: &'a str,
    /// Quantities are decimal strings on the wire.
    quantity: String,
    base_price_money: Money<'a>,
}

#[derive(Debug, Serialize)]
struct OrderBody<'a> {
    location_id: &'a str,
    line_items: Vec<OrderLineItem<'a>>,
}

#[derive(Debug, Serialize)]
struct CreateOrderRequest<'a> {
    idempotency_key: &'a str,
    order: OrderBody<'a>,
}

#[derive(Debug, Serialize)]
struct CreatePaymentRequest<'a> {
    idempotency_key: &'a str,
    source_id: &'a str,
    amount_money: Money<'a>,
    order_id: &'a str,
    location_id: &'a str,
    autocomplete: bool,
}

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    order: OrderRef,
}

#[derive(Debug, Deserialize)]
struct OrderRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CreatePaymentResponse {
    payment: Payment,
}

/// A payment as reported by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct Payment {
    pub id: String,
    pub status: String,
}

impl Payment {
    /// Whether the payment status counts as paid.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        SUCCESS_STATUSES.contains(&self.status.as_str())
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    code: Option<String>,
    detail: Option<String>,
}

/// Turn a non-success response into the matching error.
fn classify_failure(status: StatusCode, body: &str) -> PaymentError {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .errors
        .first()
        .and_then(|e| e.detail.clone().or_else(|| e.code.clone()))
        .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

    if status.is_client_error() {
        PaymentError::Declined(message)
    } else {
        PaymentError::Unavailable(message)
    }
}

/// Client for the payments API.
#[derive(Clone)]
pub struct PaymentsClient {
    client: reqwest::Client,
    base_url: Url,
    location_id: String,
    currency: String,
}

impl PaymentsClient {
    /// Create a new payments client.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Parse` if the access token is not a valid header.
    pub fn new(config: &PaymentsConfig) -> Result<Self, PaymentError> {
        let mut headers = HeaderMap::new();
        let auth_value = format!("Bearer {}", config.access_token.expose_secret());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_value)
                .map_err(|e| PaymentError::Parse(format!("Invalid access token format: {e}")))?,
        );
        headers.insert("Square-Version", HeaderValue::from_static(API_VERSION));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            location_id: config.location_id.clone(),
            currency: config.currency.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, PaymentError> {
        self.base_url
            .join(path)
            .map_err(|e| PaymentError::Parse(format!("Invalid payments URL: {e}")))
    }

    /// Create an order for the given sale lines and return its id.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Declined` on a 4xx, `PaymentError::Unavailable`
    /// on transport failure or a 5xx.
    #[tracing::instrument(skip(self, lines), fields(lines = lines.len()))]
    pub async fn create_order(
        &self,
        idempotency_key: &str,
        lines: &[SaleLine],
    ) -> Result<String, PaymentError> {
        let body = CreateOrderRequest {
            idempotency_key,
            order: OrderBody {
                location_id: &self.location_id,
                line_items: lines
                    .iter()
                    .map(|line| OrderLineItem {
                        name: &line.product_name,
                        quantity: line.quantity.to_string(),
                        base_price_money: Money {
                            amount: line.unit_price_cents.as_i64(),
                            currency: &self.currency,
                        },
                    })
                    .collect(),
            },
        };

        let response = self
            .client
            .post(self.endpoint("/v2/orders")?)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &text));
        }

        let parsed: CreateOrderResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))?;
        Ok(parsed.order.id)
    }

    /// Charge a tokenized card source against an order.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Declined` on a 4xx or a payment status other
    /// than `COMPLETED`/`APPROVED`, `PaymentError::Unavailable` on transport
    /// failure or a 5xx.
    #[tracing::instrument(skip(self, source_id), fields(amount = %amount))]
    pub async fn charge(
        &self,
        idempotency_key: &str,
        source_id: &str,
        amount: Cents,
        order_id: &str,
    ) -> Result<Payment, PaymentError> {
        let body = CreatePaymentRequest {
            idempotency_key,
            source_id,
            amount_money: Money {
                amount: amount.as_i64(),
                currency: &self.currency,
            },
            order_id,
            location_id: &self.location_id,
            autocomplete: true,
        };

        let response = self
            .client
            .post(self.endpoint("/v2/payments")?)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &text));
        }

        let parsed: CreatePaymentResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))?;

        if !parsed.payment.succeeded() {
            return Err(PaymentError::Declined(format!(
                "payment status {}",
                parsed.payment.status
            )));
        }
        Ok(parsed.payment)
    }
}
