use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::order::PaymentMethod,
    errors::ServiceError,
    services::VerifyPaymentInput,
    ApiResponse, AppState,
};

/// Router for payment gateway endpoints.
pub fn payments_routes() -> Router<AppState> {
    Router::new()
        .route("/razorpay/create-order", post(create_razorpay_order))
        .route("/razorpay/verify-payment", post(verify_razorpay_payment))
        .route("/stripe/create-intent", post(create_stripe_intent))
        .route("/stripe/verify-payment", post(verify_stripe_payment))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
    /// Amount in major units; must equal the order total
    pub amount: Decimal,
    pub order_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRazorpayRequest {
    pub provider_order_id: String,
    pub payment_id: String,
    pub signature: String,
    pub order_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyStripeRequest {
    pub intent_id: String,
    pub order_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RazorpayOrderPayload {
    pub provider_order_id: String,
    /// Amount in paise, as registered with the provider
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StripeIntentPayload {
    pub client_secret: Option<String>,
    pub intent_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedPaymentPayload {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
}

/// Open a Razorpay order for an existing storefront order
#[utoipa::path(
    post,
    path = "/api/payments/razorpay/create-order",
    request_body = InitiatePaymentRequest,
    responses(
        (status = 200, description = "Provider order opened", body = RazorpayOrderPayload),
        (status = 400, description = "Gateway not configured or amount mismatch", body = crate::errors::ErrorResponse),
        (status = 504, description = "Provider timed out", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn create_razorpay_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<InitiatePaymentRequest>,
) -> Result<Json<ApiResponse<RazorpayOrderPayload>>, ServiceError> {
    let handle = state
        .services
        .checkout
        .initiate_payment(
            &user,
            PaymentMethod::Razorpay,
            payload.order_id,
            payload.amount,
        )
        .await?;

    Ok(Json(ApiResponse::success(RazorpayOrderPayload {
        provider_order_id: handle.provider_order_id,
        amount: handle.amount_minor,
        currency: handle.currency.to_string(),
    })))
}

/// Verify a completed Razorpay payment by signature
#[utoipa::path(
    post,
    path = "/api/payments/razorpay/verify-payment",
    request_body = VerifyRazorpayRequest,
    responses(
        (status = 200, description = "Payment verified, order confirmed", body = VerifiedPaymentPayload),
        (status = 400, description = "Signature mismatch", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn verify_razorpay_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<VerifyRazorpayRequest>,
) -> Result<Json<ApiResponse<VerifiedPaymentPayload>>, ServiceError> {
    let payment_id = payload.payment_id.clone();

    state
        .services
        .checkout
        .verify_payment(
            &user,
            PaymentMethod::Razorpay,
            VerifyPaymentInput {
                order_id: payload.order_id,
                payment_id: payload.payment_id,
                provider_order_id: Some(payload.provider_order_id),
                signature: Some(payload.signature),
            },
        )
        .await?;

    Ok(Json(ApiResponse::success(VerifiedPaymentPayload {
        message: "Payment verified successfully".to_string(),
        payment_id: Some(payment_id),
    })))
}

/// Open a Stripe payment intent for an existing storefront order
#[utoipa::path(
    post,
    path = "/api/payments/stripe/create-intent",
    request_body = InitiatePaymentRequest,
    responses(
        (status = 200, description = "Intent created", body = StripeIntentPayload),
        (status = 400, description = "Gateway not configured or amount mismatch", body = crate::errors::ErrorResponse),
        (status = 504, description = "Provider timed out", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn create_stripe_intent(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<InitiatePaymentRequest>,
) -> Result<Json<ApiResponse<StripeIntentPayload>>, ServiceError> {
    let handle = state
        .services
        .checkout
        .initiate_payment(
            &user,
            PaymentMethod::Stripe,
            payload.order_id,
            payload.amount,
        )
        .await?;

    Ok(Json(ApiResponse::success(StripeIntentPayload {
        client_secret: handle.client_secret,
        intent_id: handle.provider_order_id,
    })))
}

/// Verify a Stripe payment by retrieving the intent server-to-server
#[utoipa::path(
    post,
    path = "/api/payments/stripe/verify-payment",
    request_body = VerifyStripeRequest,
    responses(
        (status = 200, description = "Payment verified, order confirmed", body = VerifiedPaymentPayload),
        (status = 400, description = "Intent not succeeded or amount mismatch", body = crate::errors::ErrorResponse),
        (status = 504, description = "Provider timed out", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Payments"
)]
pub async fn verify_stripe_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<VerifyStripeRequest>,
) -> Result<Json<ApiResponse<VerifiedPaymentPayload>>, ServiceError> {
    state
        .services
        .checkout
        .verify_payment(
            &user,
            PaymentMethod::Stripe,
            VerifyPaymentInput {
                order_id: payload.order_id,
                payment_id: payload.intent_id,
                provider_order_id: None,
                signature: None,
            },
        )
        .await?;

    Ok(Json(ApiResponse::success(VerifiedPaymentPayload {
        message: "Payment verified successfully".to_string(),
        payment_id: None,
    })))
}
