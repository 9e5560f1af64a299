use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::handlers;

/// OpenAPI document for the storefront API, served at `/api/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Storefront API",
        description = "Carts, orders and payment gateway orchestration"
    ),
    paths(
        handlers::carts::get_cart,
        handlers::carts::add_to_cart,
        handlers::carts::update_cart_item,
        handlers::carts::remove_cart_item,
        handlers::carts::clear_cart,
        handlers::orders::create_order,
        handlers::orders::list_my_orders,
        handlers::orders::get_order,
        handlers::orders::update_order_status,
        handlers::orders::cancel_order,
        handlers::orders::list_all_orders,
        handlers::payments::create_razorpay_order,
        handlers::payments::verify_razorpay_payment,
        handlers::payments::create_stripe_intent,
        handlers::payments::verify_stripe_payment,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::entities::order::ShippingAddress,
        crate::entities::order::PaymentMethod,
        crate::entities::order::PaymentStatus,
        crate::entities::order::OrderStatus,
        handlers::carts::AddItemRequest,
        handlers::carts::UpdateItemRequest,
        handlers::carts::CartItemDto,
        handlers::carts::CartDto,
        handlers::carts::CartPayload,
        handlers::orders::CreateOrderRequest,
        handlers::orders::UpdateOrderStatusRequest,
        handlers::orders::OrderItemDto,
        handlers::orders::OrderDto,
        handlers::orders::OrderPayload,
        handlers::orders::OrdersPayload,
        handlers::orders::Pagination,
        handlers::orders::PagedOrdersPayload,
        handlers::payments::InitiatePaymentRequest,
        handlers::payments::VerifyRazorpayRequest,
        handlers::payments::VerifyStripeRequest,
        handlers::payments::RazorpayOrderPayload,
        handlers::payments::StripeIntentPayload,
        handlers::payments::VerifiedPaymentPayload,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Cart", description = "Per-user shopping cart"),
        (name = "Orders", description = "Order lifecycle"),
        (name = "Payments", description = "Payment gateway handshake"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

impl ApiDoc {
    /// Builds the document; wrapper so callers need no trait import.
    pub fn document() -> utoipa::openapi::OpenApi {
        <Self as OpenApi>::openapi()
    }
}
