use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::UserId,
    entities::{cart, cart_item, Cart, CartItem, Product},
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Shopping cart service. Every user owns exactly one cart, created lazily
/// on first access; each mutation recomputes the derived total inside the
/// same transaction.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// Cart with its line items.
#[derive(Debug, Serialize)]
pub struct CartWithItems {
    pub cart: cart::Model,
    pub items: Vec<cart_item::Model>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Returns the user's cart, creating an empty one if absent.
    #[instrument(skip(self))]
    pub async fn get_or_create_cart(&self, user_id: UserId) -> Result<CartWithItems, ServiceError> {
        let cart = self.load_or_create(&*self.db, user_id).await?;
        self.with_items(&*self.db, cart).await
    }

    /// Adds a product to the cart, or increments the quantity of an existing
    /// line. The unit price is captured from the product at this instant.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartWithItems, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::Validation(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let product = Product::find_by_id(product_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product".to_string()))?;

        if product.stock < quantity {
            return Err(ServiceError::InsufficientStock(product.name));
        }

        let cart = self.load_or_create(&txn, user_id).await?;

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&txn)
            .await?;

        if let Some(item) = existing {
            let current = item.quantity;
            let mut item: cart_item::ActiveModel = item.into();
            item.quantity = Set(current + quantity);
            item.updated_at = Set(Utc::now());
            item.update(&txn).await?;
        } else {
            let item = cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart.id),
                product_id: Set(product_id),
                quantity: Set(quantity),
                unit_price: Set(product.price),
                created_at: Set(Utc::now()),
                updated_at: Set(Utc::now()),
            };
            item.insert(&txn).await?;
        }

        let cart = self.recompute_total(&txn, cart.id).await?;
        let result = self.with_items(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: result.cart.id,
                product_id,
            })
            .await;

        info!(cart_id = %result.cart.id, %product_id, quantity, "added item to cart");
        Ok(result)
    }

    /// Replaces the quantity of a line already in the cart.
    #[instrument(skip(self))]
    pub async fn update_item_quantity(
        &self,
        user_id: UserId,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartWithItems, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::Validation(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        let cart = self.load_or_create(&txn, user_id).await?;

        let item = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Item".to_string()))?;

        let mut item: cart_item::ActiveModel = item.into();
        item.quantity = Set(quantity);
        item.updated_at = Set(Utc::now());
        item.update(&txn).await?;

        let cart = self.recompute_total(&txn, cart.id).await?;
        let result = self.with_items(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartUpdated(result.cart.id))
            .await;

        Ok(result)
    }

    /// Removes a line if present. Removing an absent product is a no-op.
    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: UserId,
        product_id: Uuid,
    ) -> Result<CartWithItems, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = self.load_or_create(&txn, user_id).await?;

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .exec(&txn)
            .await?;

        let cart = self.recompute_total(&txn, cart.id).await?;
        let result = self.with_items(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartUpdated(result.cart.id))
            .await;

        Ok(result)
    }

    /// Empties the cart and resets the total to zero. The cart row survives.
    #[instrument(skip(self))]
    pub async fn clear_cart(&self, user_id: UserId) -> Result<CartWithItems, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = self.load_or_create(&txn, user_id).await?;

        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;

        let mut active: cart::ActiveModel = cart.into();
        active.total = Set(Decimal::ZERO);
        active.updated_at = Set(Utc::now());
        let cart = active.update(&txn).await?;

        let result = self.with_items(&txn, cart).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartCleared(result.cart.id))
            .await;

        info!(cart_id = %result.cart.id, "cleared cart");
        Ok(result)
    }

    async fn load_or_create(
        &self,
        conn: &impl ConnectionTrait,
        user_id: UserId,
    ) -> Result<cart::Model, ServiceError> {
        if let Some(cart) = Cart::find()
            .filter(cart::Column::UserId.eq(user_id.as_uuid()))
            .one(conn)
            .await?
        {
            return Ok(cart);
        }

        let cart = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id.as_uuid()),
            total: Set(Decimal::ZERO),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        };

        let cart = cart.insert(conn).await?;
        info!(cart_id = %cart.id, %user_id, "created cart");
        Ok(cart)
    }

    /// Total always equals Σ quantity × unit price over the current items.
    async fn recompute_total(
        &self,
        conn: &impl ConnectionTrait,
        cart_id: Uuid,
    ) -> Result<cart::Model, ServiceError> {
        let items = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .all(conn)
            .await?;

        let total: Decimal = items
            .iter()
            .map(|item| item.unit_price * Decimal::from(item.quantity))
            .sum();

        let mut cart: cart::ActiveModel = Cart::find_by_id(cart_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Cart".to_string()))?
            .into();

        cart.total = Set(total);
        cart.updated_at = Set(Utc::now());

        Ok(cart.update(conn).await?)
    }

    async fn with_items(
        &self,
        conn: &impl ConnectionTrait,
        cart: cart::Model,
    ) -> Result<CartWithItems, ServiceError> {
        let items = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .order_by_asc(cart_item::Column::CreatedAt)
            .all(conn)
            .await?;

        Ok(CartWithItems { cart, items })
    }
}
