mod common;

use std::sync::{Arc, Mutex};

use assert_matches::assert_matches;
use async_trait::async_trait;
use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use storefront_api::{
    auth::{AuthUser, UserId},
    entities::order::{OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress},
    errors::ServiceError,
    gateways::{
        PaymentGateway, PaymentGateways, PaymentProof, ProviderOrder, VerificationOutcome,
    },
    services::{PlaceOrderInput, VerifyPaymentInput},
};
use uuid::Uuid;

/// Scripted in-process gateway standing in for an external provider.
struct FakeGateway {
    outcome: Mutex<VerificationOutcome>,
    initiations: Mutex<Vec<Decimal>>,
}

impl FakeGateway {
    fn verifying() -> Self {
        Self {
            outcome: Mutex::new(VerificationOutcome::Verified {
                payment_id: "pay_fake_1".to_string(),
                provider_order_id: Some("order_fake_1".to_string()),
            }),
            initiations: Mutex::new(Vec::new()),
        }
    }

    fn refusing(hard_decline: bool) -> Self {
        Self {
            outcome: Mutex::new(VerificationOutcome::Failed {
                reason: "scripted refusal".to_string(),
                hard_decline,
            }),
            initiations: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn name(&self) -> &'static str {
        "Fake"
    }

    async fn initiate(
        &self,
        _order_id: Uuid,
        amount: Decimal,
    ) -> Result<ProviderOrder, ServiceError> {
        self.initiations.lock().unwrap().push(amount);
        Ok(ProviderOrder {
            provider_order_id: "order_fake_1".to_string(),
            amount_minor: 0,
            currency: "INR",
            client_secret: None,
        })
    }

    async fn verify(&self, _proof: &PaymentProof) -> Result<VerificationOutcome, ServiceError> {
        Ok(self.outcome.lock().unwrap().clone())
    }
}

fn shipping_address() -> ShippingAddress {
    ShippingAddress {
        first_name: "Asha".into(),
        last_name: "Patel".into(),
        street: "12 MG Road".into(),
        city: "Pune".into(),
        postal_code: "411001".into(),
        country: "IN".into(),
        phone: None,
    }
}

fn shopper(user_id: UserId) -> AuthUser {
    AuthUser {
        id: user_id,
        email: None,
        roles: vec![],
    }
}

fn proof_for(order_id: Uuid) -> VerifyPaymentInput {
    VerifyPaymentInput {
        order_id,
        payment_id: "pay_fake_1".to_string(),
        provider_order_id: Some("order_fake_1".to_string()),
        signature: Some("sig".to_string()),
    }
}

/// Places an order worth 900 for a fresh user and returns (user, order id).
async fn placed_order(app: &TestApp) -> (UserId, Uuid) {
    let user_id = UserId::new();
    let product = app.seed_product("Mixer Grinder", dec!(450), 100).await;
    app.state
        .services
        .cart
        .add_item(user_id, product.id, 2)
        .await
        .expect("add");
    let placed = app
        .state
        .services
        .checkout
        .place_order(
            user_id,
            PlaceOrderInput {
                shipping_address: shipping_address(),
                payment_method: PaymentMethod::Razorpay,
            },
        )
        .await
        .expect("place order");
    (user_id, placed.order.id)
}

#[tokio::test]
async fn initiate_fails_when_provider_not_configured() {
    let app = TestApp::new().await;
    let (user_id, order_id) = placed_order(&app).await;

    let err = app
        .state
        .services
        .checkout
        .initiate_payment(&shopper(user_id), PaymentMethod::Razorpay, order_id, dec!(900))
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::GatewayUnavailable("Razorpay"));
}

#[tokio::test]
async fn initiate_charges_the_persisted_order_total() {
    let fake = Arc::new(FakeGateway::verifying());
    let app = TestApp::with_gateways(PaymentGateways::new(Some(fake.clone()), None)).await;
    let (user_id, order_id) = placed_order(&app).await;

    // Client-supplied amount must match the order total.
    let err = app
        .state
        .services
        .checkout
        .initiate_payment(&shopper(user_id), PaymentMethod::Razorpay, order_id, dec!(1))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Validation(_));

    let handle = app
        .state
        .services
        .checkout
        .initiate_payment(&shopper(user_id), PaymentMethod::Razorpay, order_id, dec!(900))
        .await
        .expect("initiate");
    assert_eq!(handle.provider_order_id, "order_fake_1");
    assert_eq!(*fake.initiations.lock().unwrap(), vec![dec!(900)]);

    // The provider handle is recorded on the order.
    let order = app
        .state
        .services
        .orders
        .get_order(order_id, &shopper(user_id))
        .await
        .expect("order");
    assert_eq!(
        order.order.provider_order_id.as_deref(),
        Some("order_fake_1")
    );
}

#[tokio::test]
async fn initiate_rejects_strangers_and_finished_orders() {
    let fake = Arc::new(FakeGateway::verifying());
    let app = TestApp::with_gateways(PaymentGateways::new(Some(fake), None)).await;
    let (user_id, order_id) = placed_order(&app).await;

    assert_matches!(
        app.state
            .services
            .checkout
            .initiate_payment(
                &shopper(UserId::new()),
                PaymentMethod::Razorpay,
                order_id,
                dec!(900)
            )
            .await
            .unwrap_err(),
        ServiceError::Forbidden
    );

    app.state
        .services
        .orders
        .cancel_order(order_id, &shopper(user_id))
        .await
        .expect("cancel");

    assert_matches!(
        app.state
            .services
            .checkout
            .initiate_payment(&shopper(user_id), PaymentMethod::Razorpay, order_id, dec!(900))
            .await
            .unwrap_err(),
        ServiceError::InvalidTransition(_)
    );
}

#[tokio::test]
async fn verified_payment_confirms_the_order() {
    let app =
        TestApp::with_gateways(PaymentGateways::new(Some(Arc::new(FakeGateway::verifying())), None))
            .await;
    let (user_id, order_id) = placed_order(&app).await;
    let caller = shopper(user_id);

    let order = app
        .state
        .services
        .checkout
        .verify_payment(&caller, PaymentMethod::Razorpay, proof_for(order_id))
        .await
        .expect("verify");

    assert_eq!(order.payment_status, PaymentStatus::Completed);
    assert_eq!(order.order_status, OrderStatus::Confirmed);
    assert_eq!(order.payment_id.as_deref(), Some("pay_fake_1"));
    assert_eq!(order.provider_order_id.as_deref(), Some("order_fake_1"));

    // A retried verification of an already-completed order is a no-op success.
    let again = app
        .state
        .services
        .checkout
        .verify_payment(&caller, PaymentMethod::Razorpay, proof_for(order_id))
        .await
        .expect("re-verify");
    assert_eq!(again.payment_status, PaymentStatus::Completed);
}

#[tokio::test]
async fn failed_verification_never_confirms() {
    let app = TestApp::with_gateways(PaymentGateways::new(
        Some(Arc::new(FakeGateway::refusing(false))),
        None,
    ))
    .await;
    let (user_id, order_id) = placed_order(&app).await;
    let caller = shopper(user_id);

    let err = app
        .state
        .services
        .checkout
        .verify_payment(&caller, PaymentMethod::Razorpay, proof_for(order_id))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::VerificationFailed(_));

    // A soft failure leaves the payment pending so the buyer can retry.
    let order = app
        .state
        .services
        .orders
        .get_order(order_id, &caller)
        .await
        .expect("order");
    assert_eq!(order.order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.order.order_status, OrderStatus::Pending);
}

#[tokio::test]
async fn hard_decline_marks_payment_failed() {
    let app = TestApp::with_gateways(PaymentGateways::new(
        Some(Arc::new(FakeGateway::refusing(true))),
        None,
    ))
    .await;
    let (user_id, order_id) = placed_order(&app).await;
    let caller = shopper(user_id);

    assert_matches!(
        app.state
            .services
            .checkout
            .verify_payment(&caller, PaymentMethod::Razorpay, proof_for(order_id))
            .await
            .unwrap_err(),
        ServiceError::VerificationFailed(_)
    );

    let order = app
        .state
        .services
        .orders
        .get_order(order_id, &caller)
        .await
        .expect("order");
    assert_eq!(order.order.payment_status, PaymentStatus::Failed);
    // The order itself stays pending for a retry with another method.
    assert_eq!(order.order.order_status, OrderStatus::Pending);
}

#[tokio::test]
async fn verify_rejects_strangers_and_cancelled_orders() {
    let app =
        TestApp::with_gateways(PaymentGateways::new(Some(Arc::new(FakeGateway::verifying())), None))
            .await;
    let (user_id, order_id) = placed_order(&app).await;

    assert_matches!(
        app.state
            .services
            .checkout
            .verify_payment(
                &shopper(UserId::new()),
                PaymentMethod::Razorpay,
                proof_for(order_id)
            )
            .await
            .unwrap_err(),
        ServiceError::Forbidden
    );

    app.state
        .services
        .orders
        .cancel_order(order_id, &shopper(user_id))
        .await
        .expect("cancel");

    assert_matches!(
        app.state
            .services
            .checkout
            .verify_payment(
                &shopper(user_id),
                PaymentMethod::Razorpay,
                proof_for(order_id)
            )
            .await
            .unwrap_err(),
        ServiceError::InvalidTransition(_)
    );
}
