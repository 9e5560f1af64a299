use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{AuthUser, UserId},
    entities::{
        cart, cart_item,
        order::{self, OrderStatus, PaymentMethod, PaymentStatus, ShippingAddress},
        order_item, Cart, CartItem, Product,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    gateways::{PaymentGateways, PaymentProof, ProviderOrder, VerificationOutcome},
    services::orders::{OrderService, OrderWithItems},
};

/// Checkout orchestrator: converts carts into orders, selects the payment
/// gateway, and reconciles provider confirmations back into order state.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    orders: Arc<OrderService>,
    gateways: PaymentGateways,
}

#[derive(Debug)]
pub struct PlaceOrderInput {
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

#[derive(Debug)]
pub struct VerifyPaymentInput {
    pub order_id: Uuid,
    pub payment_id: String,
    pub provider_order_id: Option<String>,
    pub signature: Option<String>,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        orders: Arc<OrderService>,
        gateways: PaymentGateways,
    ) -> Self {
        Self {
            db,
            event_sender,
            orders,
            gateways,
        }
    }

    /// Snapshots the user's cart into a new order and clears the cart, as a
    /// single transaction. The order is inserted before the cart is touched,
    /// so a created order can never silently disappear.
    #[instrument(skip(self, input))]
    pub async fn place_order(
        &self,
        user_id: UserId,
        input: PlaceOrderInput,
    ) -> Result<OrderWithItems, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = Cart::find()
            .filter(cart::Column::UserId.eq(user_id.as_uuid()))
            .one(&txn)
            .await?
            .ok_or(ServiceError::EmptyCart)?;

        let cart_items = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .all(&txn)
            .await?;

        if cart_items.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let order_id = Uuid::new_v4();
        let now = Utc::now();

        let order = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user_id.as_uuid()),
            shipping_address: Set(input.shipping_address),
            total_price: Set(cart.total),
            payment_method: Set(input.payment_method),
            payment_status: Set(PaymentStatus::Pending),
            order_status: Set(OrderStatus::Pending),
            tracking_number: Set(None),
            payment_id: Set(None),
            provider_order_id: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let order = order.insert(&txn).await?;

        let mut items = Vec::with_capacity(cart_items.len());
        for cart_item in &cart_items {
            // Freeze the product name alongside the captured price; later
            // product edits must not rewrite order history.
            let product = Product::find_by_id(cart_item.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| ServiceError::NotFound("Product".to_string()))?;

            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(cart_item.product_id),
                product_name: Set(product.name),
                quantity: Set(cart_item.quantity),
                unit_price: Set(cart_item.unit_price),
            };
            items.push(item.insert(&txn).await?);
        }

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;

        let cart_id = cart.id;
        let mut cart: cart::ActiveModel = cart.into();
        cart.total = Set(Decimal::ZERO);
        cart.updated_at = Set(now);
        cart.update(&txn).await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::OrderCreated(order_id))
            .await;
        self.event_sender
            .send_or_log(Event::CartCleared(cart_id))
            .await;

        info!(%order_id, %user_id, total = %order.total_price, "order placed");
        Ok(OrderWithItems { order, items })
    }

    /// Asks the provider for a payment handle the client-side widget needs
    /// to collect funds. The charge is always the persisted order total; a
    /// client-supplied amount that disagrees is rejected.
    #[instrument(skip(self, caller))]
    pub async fn initiate_payment(
        &self,
        caller: &AuthUser,
        method: PaymentMethod,
        order_id: Uuid,
        amount: Decimal,
    ) -> Result<ProviderOrder, ServiceError> {
        let gateway = self.gateways.for_method(method)?;

        let order = self.orders.load_order(&*self.db, order_id).await?;
        if !caller.can_access(UserId::from(order.user_id)) {
            return Err(ServiceError::Forbidden);
        }

        if order.order_status == OrderStatus::Cancelled {
            return Err(ServiceError::InvalidTransition(
                "Order is cancelled".to_string(),
            ));
        }
        if order.payment_status == PaymentStatus::Completed {
            return Err(ServiceError::InvalidTransition(
                "Order is already paid".to_string(),
            ));
        }

        if amount != order.total_price {
            return Err(ServiceError::Validation(
                "Amount does not match order total".to_string(),
            ));
        }

        let handle = gateway.initiate(order.id, order.total_price).await?;

        let mut active: order::ActiveModel = order.into();
        active.provider_order_id = Set(Some(handle.provider_order_id.clone()));
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;

        info!(%order_id, provider = gateway.name(), handle = %handle.provider_order_id, "payment initiated");
        Ok(handle)
    }

    /// Verifies a claimed payment with the provider and finalizes the order.
    /// Fail-closed: the order is confirmed only on an explicit positive
    /// verification result. Retrying a verified order is a no-op success.
    #[instrument(skip(self, caller, input), fields(order_id = %input.order_id))]
    pub async fn verify_payment(
        &self,
        caller: &AuthUser,
        method: PaymentMethod,
        input: VerifyPaymentInput,
    ) -> Result<order::Model, ServiceError> {
        let gateway = self.gateways.for_method(method)?;

        let order = self.orders.load_order(&*self.db, input.order_id).await?;
        if !caller.can_access(UserId::from(order.user_id)) {
            return Err(ServiceError::Forbidden);
        }

        if order.order_status == OrderStatus::Cancelled {
            return Err(ServiceError::InvalidTransition(
                "Order is cancelled".to_string(),
            ));
        }
        if order.payment_status == PaymentStatus::Completed {
            // A timed-out verify is safely retryable.
            return Ok(order);
        }

        let proof = PaymentProof {
            payment_id: input.payment_id,
            provider_order_id: input.provider_order_id,
            signature: input.signature,
            expected_amount: order.total_price,
        };

        match gateway.verify(&proof).await? {
            VerificationOutcome::Verified {
                payment_id,
                provider_order_id,
            } => {
                self.orders
                    .record_payment_success(order.id, payment_id, provider_order_id)
                    .await
            }
            VerificationOutcome::Failed {
                reason,
                hard_decline,
            } => {
                warn!(order_id = %order.id, provider = gateway.name(), %reason, "verification failed");
                if hard_decline {
                    self.orders.record_payment_failure(order.id, &reason).await?;
                } else {
                    self.event_sender
                        .send_or_log(Event::PaymentFailed {
                            order_id: order.id,
                            reason: reason.clone(),
                        })
                        .await;
                }
                Err(ServiceError::VerificationFailed(reason))
            }
        }
    }
}
