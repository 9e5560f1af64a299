use axum::{
    extract::{Json, Path, State},
    routing::{delete, get, post, put},
    Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    services::CartWithItems,
    ApiResponse, AppState,
};

/// Router for cart endpoints. Every route operates on the caller's own cart.
pub fn carts_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart))
        .route("/items", post(add_to_cart))
        .route("/items", put(update_cart_item))
        .route("/items/:product_id", delete(remove_cart_item))
        .route("/clear", post(clear_cart))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartItemDto {
    pub product_id: Uuid,
    pub quantity: i32,
    pub price: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CartDto {
    pub id: Uuid,
    pub user_id: Uuid,
    pub items: Vec<CartItemDto>,
    pub total_price: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartPayload {
    pub cart: CartDto,
}

impl From<CartWithItems> for CartPayload {
    fn from(value: CartWithItems) -> Self {
        Self {
            cart: CartDto {
                id: value.cart.id,
                user_id: value.cart.user_id,
                items: value
                    .items
                    .into_iter()
                    .map(|item| CartItemDto {
                        product_id: item.product_id,
                        quantity: item.quantity,
                        price: item.unit_price,
                    })
                    .collect(),
                total_price: value.cart.total,
            },
        }
    }
}

/// Get (or lazily create) the caller's cart
#[utoipa::path(
    get,
    path = "/api/cart",
    responses(
        (status = 200, description = "The caller's cart", body = CartPayload),
        (status = 401, description = "Unauthenticated", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<CartPayload>>, ServiceError> {
    let cart = state.services.cart.get_or_create_cart(user.id).await?;
    Ok(Json(ApiResponse::success(cart.into())))
}

/// Add a product to the cart
#[utoipa::path(
    post,
    path = "/api/cart/items",
    request_body = AddItemRequest,
    responses(
        (status = 200, description = "Updated cart", body = CartPayload),
        (status = 400, description = "Invalid quantity or insufficient stock", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn add_to_cart(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddItemRequest>,
) -> Result<Json<ApiResponse<CartPayload>>, ServiceError> {
    payload.validate()?;

    let cart = state
        .services
        .cart
        .add_item(user.id, payload.product_id, payload.quantity)
        .await?;

    Ok(Json(ApiResponse::success(cart.into())))
}

/// Replace the quantity of a cart line
#[utoipa::path(
    put,
    path = "/api/cart/items",
    request_body = UpdateItemRequest,
    responses(
        (status = 200, description = "Updated cart", body = CartPayload),
        (status = 400, description = "Invalid quantity", body = crate::errors::ErrorResponse),
        (status = 404, description = "Item not in cart", body = crate::errors::ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn update_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<UpdateItemRequest>,
) -> Result<Json<ApiResponse<CartPayload>>, ServiceError> {
    payload.validate()?;

    let cart = state
        .services
        .cart
        .update_item_quantity(user.id, payload.product_id, payload.quantity)
        .await?;

    Ok(Json(ApiResponse::success(cart.into())))
}

/// Remove a product from the cart (no error if absent)
#[utoipa::path(
    delete,
    path = "/api/cart/items/{product_id}",
    params(("product_id" = Uuid, Path, description = "Product to remove")),
    responses(
        (status = 200, description = "Updated cart", body = CartPayload)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn remove_cart_item(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> Result<Json<ApiResponse<CartPayload>>, ServiceError> {
    let cart = state.services.cart.remove_item(user.id, product_id).await?;
    Ok(Json(ApiResponse::success(cart.into())))
}

/// Empty the cart
#[utoipa::path(
    post,
    path = "/api/cart/clear",
    responses(
        (status = 200, description = "Emptied cart", body = CartPayload)
    ),
    security(("bearer_auth" = [])),
    tag = "Cart"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<CartPayload>>, ServiceError> {
    let cart = state.services.cart.clear_cart(user.id).await?;
    Ok(Json(ApiResponse::success(cart.into())))
}
