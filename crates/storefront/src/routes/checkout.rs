//! Checkout.
//!
//! 1. Resolve the buying customer (session, or upsert by email for guests)
//! 2. `begin_checkout` turns the cart into a pending sale and takes the stock
//! 3. Create the payment order, then charge the card token
//! 4. `mark_paid` once the charge completes
//!
//! When nothing was charged (order refused, card declined) the sale is
//! failed and its units go straight back into the shopper's cart. A charge
//! that times out or 5xxs is retried once with the same idempotency key;
//! if the outcome is still unknown the sale stays `pending` for an operator
//! to reconcile, since the card may have been charged.

use std::time::Duration;

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use larder_core::{CustomerId, Email};
use larder_db::models::SaleWithLines;
use larder_db::{CustomerRepository, SaleRepository};

use crate::error::{ApiJson, AppError, Result, set_sentry_user};
use crate::middleware::CartIdentity;
use crate::services::PaymentError;
use crate::services::payments::Payment;
use crate::state::AppState;

/// Checkout request body.
#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    /// Card token from the payments web SDK.
    pub source_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl CheckoutRequest {
    fn validate(&self) -> Result<()> {
        if self.source_id.trim().is_empty() {
            return Err(AppError::BadRequest("source_id is required".to_string()));
        }
        Ok(())
    }

    /// The guest's email, required when nobody is logged in.
    fn guest_email(&self) -> Result<Email> {
        let raw = self
            .email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| AppError::BadRequest("email is required".to_string()))?;
        Email::parse(raw).map_err(|e| AppError::BadRequest(format!("Invalid email: {e}")))
    }
}

/// Check out the current cart.
///
/// # Route
///
/// `POST /api/checkout`
#[tracing::instrument(skip(state, identity, body))]
pub async fn checkout(
    State(state): State<AppState>,
    identity: CartIdentity,
    ApiJson(body): ApiJson<CheckoutRequest>,
) -> Result<(StatusCode, Json<SaleWithLines>)> {
    body.validate()?;
    let owner = identity
        .owner()
        .ok_or_else(|| AppError::BadRequest("cart is empty".to_string()))?;

    let customer_id: CustomerId = match &identity.customer {
        Some(customer) => customer.id,
        None => {
            let email = body.guest_email()?;
            let customer = CustomerRepository::new(state.pool())
                .upsert_by_email(&email, body.name.as_deref().unwrap_or_default())
                .await?;
            set_sentry_user(&customer.id, Some(customer.email.as_str()));
            customer.id
        }
    };

    let sales = SaleRepository::new(state.pool());
    let pending = sales.begin_checkout(owner, customer_id).await?;
    let sale_id = pending.sale.id;
    tracing::info!(sale_id = %sale_id, total = %pending.sale.total_cents, "checkout started");

    match collect_payment(&state, &sales, &pending, &body.source_id).await {
        PaymentOutcome::Paid { order_id, payment } => {
            let sale = match sales.mark_paid(sale_id, &order_id, &payment.id).await {
                Ok(sale) => sale,
                Err(e) => {
                    tracing::error!(
                        sale_id = %sale_id,
                        order_id = %order_id,
                        payment_id = %payment.id,
                        error = %e,
                        "card charged but sale could not be marked paid"
                    );
                    return Err(e.into());
                }
            };
            tracing::info!(sale_id = %sale_id, payment_id = %payment.id, "sale paid");
            Ok((
                StatusCode::CREATED,
                Json(SaleWithLines {
                    sale,
                    lines: pending.lines,
                }),
            ))
        }
        PaymentOutcome::NotCharged(err) => {
            tracing::warn!(sale_id = %sale_id, error = %err, "payment failed, returning items to cart");
            if let Err(restore_err) = sales
                .mark_failed(sale_id, owner, state.config().reservation_ttl)
                .await
            {
                tracing::error!(
                    sale_id = %sale_id,
                    error = %restore_err,
                    "failed to return items for unpaid sale"
                );
            }
            Err(err.into())
        }
        PaymentOutcome::Unknown { order_id, error } => {
            tracing::error!(
                sale_id = %sale_id,
                order_id = %order_id,
                error = %error,
                "payment outcome unknown, sale left pending"
            );
            Err(error.into())
        }
    }
}

/// Delay before the single charge retry.
const CHARGE_RETRY_DELAY: Duration = Duration::from_millis(250);

/// How a payment attempt ended.
#[derive(Debug)]
enum PaymentOutcome {
    Paid { order_id: String, payment: Payment },
    /// No money moved.
    NotCharged(PaymentError),
    /// The card may or may not have been charged.
    Unknown {
        order_id: String,
        error: PaymentError,
    },
}

/// Create the payment order and charge the source.
async fn collect_payment(
    state: &AppState,
    sales: &SaleRepository<'_>,
    pending: &SaleWithLines,
    source_id: &str,
) -> PaymentOutcome {
    let payments = state.payments();
    let sale = &pending.sale;

    let order_id = match payments
        .create_order(&sale.order_idempotency_key(), &pending.lines)
        .await
    {
        Ok(order_id) => order_id,
        Err(e) => return PaymentOutcome::NotCharged(e),
    };

    if let Err(e) = sales.record_payment_order(sale.id, &order_id).await {
        tracing::warn!(sale_id = %sale.id, error = %e, "could not record payment order id");
    }

    let key = sale.payment_idempotency_key();
    let source_id = source_id.trim();
    let mut result = payments
        .charge(&key, source_id, sale.total_cents, &order_id)
        .await;

    if let Err(PaymentError::Unavailable(reason)) = &result {
        tracing::warn!(sale_id = %sale.id, reason = %reason, "charge unavailable, retrying");
        tokio::time::sleep(CHARGE_RETRY_DELAY).await;
        result = payments
            .charge(&key, source_id, sale.total_cents, &order_id)
            .await;
    }

    match result {
        Ok(payment) => PaymentOutcome::Paid { order_id, payment },
        Err(e @ PaymentError::Declined(_)) => PaymentOutcome::NotCharged(e),
        Err(error) => PaymentOutcome::Unknown { order_id, error },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn request(email: Option<&str>) -> CheckoutRequest {
        CheckoutRequest {
            source_id: "cnon:card-nonce-ok".to_owned(),
            email: email.map(str::to_owned),
            name: None,
        }
    }

    #[test]
    fn test_source_id_required() {
        let mut req = request(None);
        req.source_id = "   ".to_owned();
        assert!(matches!(req.validate(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_guest_email_required_and_normalized() {
        assert!(matches!(request(None).guest_email(), Err(AppError::BadRequest(_))));
        assert!(matches!(request(Some(" ")).guest_email(), Err(AppError::BadRequest(_))));
        assert!(matches!(request(Some("nope")).guest_email(), Err(AppError::BadRequest(_))));
        assert_eq!(
            request(Some("Buyer@Example.com")).guest_email().unwrap().as_str(),
            "buyer@example.com"
        );
    }

    #[test]
    fn test_body_accepts_missing_optionals() {
        let req: CheckoutRequest = serde_json::from_str(r#"{"source_id":"cnon:1"}"#).unwrap();
        assert!(req.email.is_none());
        assert!(req.name.is_none());
    }

    // ========================================================================
    // Payment sequence against a local payments server
    // ========================================================================

    use std::sync::{Arc, Mutex};

    use axum::Router;
    use axum::body::Body;
    use axum::http::{Method, Request, header};
    use axum::routing::post;
    use http_body_util::BodyExt;
    use secrecy::SecretString;
    use serde_json::{Value, json};
    use sqlx::PgPool;
    use tower::ServiceExt;
    use url::Url;

    use larder_core::{CartOwner, CartSessionId, Cents, InventoryError, ProductId, SaleStatus};
    use larder_db::models::NewProduct;
    use larder_db::{ProductRepository, RepositoryError, ReservationRepository};

    use crate::config::tests::test_config;
    use crate::middleware::cart::CART_COOKIE_NAME;
    use crate::middleware::session_store;

    const TTL: Duration = Duration::from_secs(600);

    #[derive(Debug, Clone, Copy)]
    enum ChargeMode {
        Complete,
        Decline,
        Down,
    }

    /// Records every request body it receives, by path.
    #[derive(Clone)]
    struct PaymentsStub {
        mode: ChargeMode,
        calls: Arc<Mutex<Vec<(String, Value)>>>,
    }

    impl PaymentsStub {
        fn record(&self, path: &str, body: Value) {
            self.calls.lock().unwrap().push((path.to_owned(), body));
        }

        fn calls_to(&self, path: &str) -> Vec<Value> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(p, _)| p == path)
                .map(|(_, body)| body.clone())
                .collect()
        }
    }

    async fn stub_order(State(stub): State<PaymentsStub>, Json(body): Json<Value>) -> Json<Value> {
        stub.record("/v2/orders", body);
        Json(json!({ "order": { "id": "ORDER-1" } }))
    }

    async fn stub_payment(
        State(stub): State<PaymentsStub>,
        Json(body): Json<Value>,
    ) -> (StatusCode, Json<Value>) {
        stub.record("/v2/payments", body);
        match stub.mode {
            ChargeMode::Complete => (
                StatusCode::OK,
                Json(json!({ "payment": { "id": "PAY-1", "status": "COMPLETED" } })),
            ),
            ChargeMode::Decline => (
                StatusCode::PAYMENT_REQUIRED,
                Json(json!({ "errors": [{ "code": "CARD_DECLINED", "detail": "Card declined." }] })),
            ),
            ChargeMode::Down => (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "errors": [] }))),
        }
    }

    async fn spawn_payments(mode: ChargeMode) -> (Url, PaymentsStub) {
        let stub = PaymentsStub {
            mode,
            calls: Arc::new(Mutex::new(Vec::new())),
        };
        let router = Router::new()
            .route("/v2/orders", post(stub_order))
            .route("/v2/payments", post(stub_payment))
            .with_state(stub.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

        (Url::parse(&format!("http://{addr}")).unwrap(), stub)
    }

    async fn checkout_app(mode: ChargeMode) -> (Router, PgPool, PaymentsStub) {
        let url = std::env::var("TEST_DATABASE_URL").unwrap();
        let pool = larder_db::create_pool(&SecretString::from(url)).await.unwrap();
        larder_db::migrate(&pool).await.unwrap();

        let (base_url, stub) = spawn_payments(mode).await;
        let mut config = test_config();
        config.payments.base_url = base_url;

        let state = AppState::new(config, pool.clone()).unwrap();
        (crate::app(state, session_store(&pool)), pool, stub)
    }

    /// A guest cart holding `quantity` units of a fresh product at $4.50.
    async fn stocked_cart(pool: &PgPool, inventory: i32, quantity: i32) -> (ProductId, CartSessionId) {
        let session = CartSessionId::generate();
        let product = ProductRepository::new(pool)
            .create(&NewProduct {
                name: format!("Checkout item {session}"),
                price_cents: Cents::new(450),
                description: String::new(),
                story: None,
                image_url: None,
                category_name: None,
                inventory,
            })
            .await
            .unwrap();
        ReservationRepository::new(pool)
            .reserve(CartOwner::Session(session), product.id, i64::from(quantity), TTL)
            .await
            .unwrap();
        (product.id, session)
    }

    fn checkout_request(session: CartSessionId) -> (Request<Body>, Email) {
        let email = Email::parse(&format!("buyer-{session}@larder.test")).unwrap();
        let body = json!({ "source_id": "cnon:card-nonce-ok", "email": email.as_str() });
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/checkout")
            .header("x-forwarded-for", "203.0.113.10")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::COOKIE, format!("{CART_COOKIE_NAME}={session}"))
            .body(Body::from(body.to_string()))
            .unwrap();
        (request, email)
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn only_sale_status(pool: &PgPool, email: &Email) -> SaleStatus {
        let customer = CustomerRepository::new(pool)
            .get_by_email(email)
            .await
            .unwrap()
            .unwrap();
        let sales = SaleRepository::new(pool)
            .list_for_customer(customer.id)
            .await
            .unwrap();
        assert_eq!(sales.len(), 1);
        sales[0].sale.status
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
    async fn test_checkout_charges_order_then_marks_paid() {
        let (app, pool, stub) = checkout_app(ChargeMode::Complete).await;
        let (_, session) = stocked_cart(&pool, 5, 2).await;
        let (request, email) = checkout_request(session);

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let sale = json_body(response).await;
        assert_eq!(sale["status"], "paid");
        assert_eq!(sale["payment_id"], "PAY-1");

        let orders = stub.calls_to("/v2/orders");
        let payments = stub.calls_to("/v2/payments");
        assert_eq!(orders.len(), 1);
        assert_eq!(payments.len(), 1);

        let order_key = orders[0]["idempotency_key"].as_str().unwrap();
        let payment_key = payments[0]["idempotency_key"].as_str().unwrap();
        let checkout_key = order_key.strip_suffix(":order").unwrap();
        assert_eq!(payment_key, format!("{checkout_key}:payment"));
        assert_eq!(payments[0]["order_id"], "ORDER-1");
        assert_eq!(payments[0]["amount_money"]["amount"], 900);

        assert_eq!(only_sale_status(&pool, &email).await, SaleStatus::Paid);
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
    async fn test_declined_card_returns_items_to_cart() {
        let (app, pool, stub) = checkout_app(ChargeMode::Decline).await;
        let (product, session) = stocked_cart(&pool, 2, 2).await;
        let (request, email) = checkout_request(session);

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "Payment declined: Card declined.");
        assert_eq!(stub.calls_to("/v2/payments").len(), 1);
        assert_eq!(only_sale_status(&pool, &email).await, SaleStatus::Failed);

        let reservations = ReservationRepository::new(&pool);
        let cart = reservations.cart(CartOwner::Session(session)).await.unwrap();
        assert_eq!(cart.item_count, 2);

        let level = ProductRepository::new(&pool).get(product).await.unwrap().unwrap();
        assert_eq!(level.product.inventory, 2);
        assert_eq!(level.available, 0);

        let other = reservations
            .reserve(CartOwner::Session(CartSessionId::generate()), product, 1, TTL)
            .await;
        assert!(matches!(
            other,
            Err(RepositoryError::Inventory(InventoryError::Insufficient { .. }))
        ));
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL (TEST_DATABASE_URL)"]
    async fn test_unreachable_charge_retries_once_and_leaves_sale_pending() {
        let (app, pool, stub) = checkout_app(ChargeMode::Down).await;
        let (product, session) = stocked_cart(&pool, 3, 2).await;
        let (request, email) = checkout_request(session);

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let payments = stub.calls_to("/v2/payments");
        assert_eq!(payments.len(), 2);
        assert_eq!(payments[0]["idempotency_key"], payments[1]["idempotency_key"]);

        // The card may have been charged, so the units stay sold.
        assert_eq!(only_sale_status(&pool, &email).await, SaleStatus::Pending);
        let level = ProductRepository::new(&pool).get(product).await.unwrap().unwrap();
        assert_eq!(level.product.inventory, 1);
        assert!(
            ReservationRepository::new(&pool)
                .cart(CartOwner::Session(session))
                .await
                .unwrap()
                .is_empty()
        );
    }
}
