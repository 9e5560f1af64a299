use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::order::{
        OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress,
    },
    errors::ServiceError,
    services::{AdminOrderUpdate, OrderFilter, OrderWithItems, PlaceOrderInput},
    ApiResponse, AppState,
};

const DEFAULT_PAGE_SIZE: u64 = 10;
const MAX_PAGE_SIZE: u64 = 100;

/// Router for order endpoints.
pub fn orders_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order))
        .route("/", get(list_all_orders))
        .route("/my-orders", get(list_my_orders))
        .route("/:id", get(get_order))
        .route("/:id/status", put(update_order_status))
        .route("/:id/cancel", post(cancel_order))
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub shipping_address: ShippingAddress,
    /// `razorpay`, `stripe` or `cash_on_delivery`
    pub payment_method: String,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderStatusRequest {
    pub order_status: Option<String>,
    pub payment_status: Option<String>,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersQuery {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemDto {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub price: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrderDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<OrderItemDto>,
    pub shipping_address: ShippingAddress,
    pub total_price: Decimal,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub order_status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracking_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_order_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderWithItems> for OrderDto {
    fn from(value: OrderWithItems) -> Self {
        Self {
            id: value.order.id,
            user_id: value.order.user_id,
            items: value
                .items
                .into_iter()
                .map(|item| OrderItemDto {
                    product_id: item.product_id,
                    product_name: item.product_name,
                    quantity: item.quantity,
                    price: item.unit_price,
                })
                .collect(),
            shipping_address: value.order.shipping_address,
            total_price: value.order.total_price,
            payment_method: value.order.payment_method,
            payment_status: value.order.payment_status,
            order_status: value.order.order_status,
            tracking_number: value.order.tracking_number,
            payment_id: value.order.payment_id,
            provider_order_id: value.order.provider_order_id,
            created_at: value.order.created_at,
            updated_at: value.order.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderPayload {
    pub order: OrderDto,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrdersPayload {
    pub orders: Vec<OrderDto>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub pages: u64,
    pub current_page: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PagedOrdersPayload {
    pub orders: Vec<OrderDto>,
    pub pagination: Pagination,
}

/// Place an order from the caller's cart
#[utoipa::path(
    post,
    path = "/api/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = OrderPayload),
        (status = 400, description = "Empty cart or invalid payment method", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderPayload>>), ServiceError> {
    let payment_method = PaymentMethod::parse(&payload.payment_method).ok_or_else(|| {
        ServiceError::Validation(format!(
            "Invalid payment method: {}",
            payload.payment_method
        ))
    })?;

    let order = state
        .services
        .checkout
        .place_order(
            user.id,
            PlaceOrderInput {
                shipping_address: payload.shipping_address,
                payment_method,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(OrderPayload {
            order: order.into(),
        })),
    ))
}

/// List the caller's orders, newest first
#[utoipa::path(
    get,
    path = "/api/orders/my-orders",
    responses(
        (status = 200, description = "The caller's orders", body = OrdersPayload)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_my_orders(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<OrdersPayload>>, ServiceError> {
    let orders = state.services.orders.list_user_orders(user.id).await?;

    Ok(Json(ApiResponse::success(OrdersPayload {
        orders: orders.into_iter().map(Into::into).collect(),
    })))
}

/// Get one order (owner or admin)
#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order details", body = OrderPayload),
        (status = 403, description = "Not the owner", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderPayload>>, ServiceError> {
    let order = state.services.orders.get_order(id, &user).await?;

    Ok(Json(ApiResponse::success(OrderPayload {
        order: order.into(),
    })))
}

/// Admin: write order status, payment status and/or tracking number
#[utoipa::path(
    put,
    path = "/api/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Updated order", body = OrderPayload),
        (status = 400, description = "Unknown status value", body = crate::errors::ErrorResponse),
        (status = 403, description = "Admin only", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<Json<ApiResponse<OrderPayload>>, ServiceError> {
    if !user.is_admin() {
        return Err(ServiceError::Forbidden);
    }

    let update = AdminOrderUpdate {
        order_status: parse_order_status(payload.order_status.as_deref())?,
        payment_status: parse_payment_status(payload.payment_status.as_deref())?,
        tracking_number: payload.tracking_number,
    };

    let order = state.services.orders.update_order(id, update).await?;

    Ok(Json(ApiResponse::success(OrderPayload {
        order: order.into(),
    })))
}

/// Cancel an order (owner or admin; pending/confirmed only)
#[utoipa::path(
    post,
    path = "/api/orders/{id}/cancel",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Cancelled order", body = OrderPayload),
        (status = 400, description = "Order cannot be cancelled", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not the owner", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderPayload>>, ServiceError> {
    let order = state.services.orders.cancel_order(id, &user).await?;

    Ok(Json(ApiResponse::success(OrderPayload {
        order: order.into(),
    })))
}

/// Admin: list all orders with filters and pagination
#[utoipa::path(
    get,
    path = "/api/orders",
    params(
        ("status" = Option<String>, Query, description = "Filter by order status"),
        ("paymentStatus" = Option<String>, Query, description = "Filter by payment status"),
        ("page" = Option<u64>, Query, description = "Page number (1-indexed)"),
        ("limit" = Option<u64>, Query, description = "Page size"),
    ),
    responses(
        (status = 200, description = "Orders page", body = PagedOrdersPayload),
        (status = 403, description = "Admin only", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Orders"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<ApiResponse<PagedOrdersPayload>>, ServiceError> {
    if !user.is_admin() {
        return Err(ServiceError::Forbidden);
    }

    let filter = OrderFilter {
        order_status: parse_order_status(query.status.as_deref())?,
        payment_status: parse_payment_status(query.payment_status.as_deref())?,
    };

    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let (orders, total) = state.services.orders.list_orders(filter, page, limit).await?;

    Ok(Json(ApiResponse::success(PagedOrdersPayload {
        orders: orders.into_iter().map(Into::into).collect(),
        pagination: Pagination {
            total,
            pages: total.div_ceil(limit),
            current_page: page,
        },
    })))
}

fn parse_order_status(value: Option<&str>) -> Result<Option<OrderStatus>, ServiceError> {
    match value {
        None => Ok(None),
        Some(raw) => OrderStatus::parse(raw)
            .map(Some)
            .ok_or_else(|| ServiceError::Validation(format!("Invalid order status: {}", raw))),
    }
}

fn parse_payment_status(value: Option<&str>) -> Result<Option<PaymentStatus>, ServiceError> {
    match value {
        None => Ok(None),
        Some(raw) => PaymentStatus::parse(raw)
            .map(Some)
            .ok_or_else(|| ServiceError::Validation(format!("Invalid payment status: {}", raw))),
    }
}
