use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, LoaderTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    auth::{AuthUser, UserId},
    entities::{
        order::{self, OrderStatus, PaymentStatus},
        order_item, Order, OrderItem,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Order queries and status transitions. Order line items and the total are
/// immutable after creation; only status fields, the tracking number and
/// provider references change here.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

/// Order with its frozen line items.
#[derive(Debug, Serialize)]
pub struct OrderWithItems {
    pub order: order::Model,
    pub items: Vec<order_item::Model>,
}

/// Allow-listed fields an administrator may write. Anything else in the
/// request payload is ignored at the DTO boundary.
#[derive(Debug, Default)]
pub struct AdminOrderUpdate {
    pub order_status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub tracking_number: Option<String>,
}

/// Admin listing filters.
#[derive(Debug, Default)]
pub struct OrderFilter {
    pub order_status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Fetches one order; the caller must own it or hold admin privilege.
    #[instrument(skip(self, caller))]
    pub async fn get_order(
        &self,
        order_id: Uuid,
        caller: &AuthUser,
    ) -> Result<OrderWithItems, ServiceError> {
        let order = self.load_order(&*self.db, order_id).await?;

        if !caller.can_access(UserId::from(order.user_id)) {
            return Err(ServiceError::Forbidden);
        }

        self.with_items(order).await
    }

    /// All orders placed by one user, newest first.
    #[instrument(skip(self))]
    pub async fn list_user_orders(
        &self,
        user_id: UserId,
    ) -> Result<Vec<OrderWithItems>, ServiceError> {
        let orders = Order::find()
            .filter(order::Column::UserId.eq(user_id.as_uuid()))
            .order_by_desc(order::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        self.zip_items(orders).await
    }

    /// Admin listing with status filters and pagination. Returns the page
    /// plus the total match count.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        filter: OrderFilter,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<OrderWithItems>, u64), ServiceError> {
        let mut query = Order::find().order_by_desc(order::Column::CreatedAt);

        if let Some(status) = filter.order_status {
            query = query.filter(order::Column::OrderStatus.eq(status));
        }
        if let Some(status) = filter.payment_status {
            query = query.filter(order::Column::PaymentStatus.eq(status));
        }

        let paginator = query.paginate(&*self.db, limit.max(1));
        let total = paginator.num_items().await?;
        let orders = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((self.zip_items(orders).await?, total))
    }

    /// Administrative field writes: order status, payment status, tracking
    /// number. Not gated by the payment state machine.
    #[instrument(skip(self))]
    pub async fn update_order(
        &self,
        order_id: Uuid,
        update: AdminOrderUpdate,
    ) -> Result<OrderWithItems, ServiceError> {
        let order = self.load_order(&*self.db, order_id).await?;
        let old_status = order.order_status;

        let mut active: order::ActiveModel = order.into();
        if let Some(status) = update.order_status {
            active.order_status = Set(status);
        }
        if let Some(status) = update.payment_status {
            active.payment_status = Set(status);
        }
        if let Some(tracking) = update.tracking_number {
            active.tracking_number = Set(Some(tracking));
        }
        active.updated_at = Set(Utc::now());

        let order = active.update(&*self.db).await?;

        if let Some(new_status) = update.order_status {
            if new_status != old_status {
                self.event_sender
                    .send_or_log(Event::OrderStatusChanged {
                        order_id,
                        old_status: format!("{:?}", old_status).to_lowercase(),
                        new_status: format!("{:?}", new_status).to_lowercase(),
                    })
                    .await;
            }
        }

        info!(%order_id, "order updated by admin");
        self.with_items(order).await
    }

    /// Cancels an order. Permitted only from `pending`/`confirmed`; terminal
    /// or shipped orders are left untouched.
    #[instrument(skip(self, caller))]
    pub async fn cancel_order(
        &self,
        order_id: Uuid,
        caller: &AuthUser,
    ) -> Result<OrderWithItems, ServiceError> {
        let order = self.load_order(&*self.db, order_id).await?;

        if !caller.can_access(UserId::from(order.user_id)) {
            return Err(ServiceError::Forbidden);
        }

        if !order.order_status.can_cancel() {
            return Err(ServiceError::InvalidTransition(
                "Order cannot be cancelled".to_string(),
            ));
        }

        let mut active: order::ActiveModel = order.into();
        active.order_status = Set(OrderStatus::Cancelled);
        active.updated_at = Set(Utc::now());
        let order = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::OrderCancelled(order_id))
            .await;

        info!(%order_id, "order cancelled");
        self.with_items(order).await
    }

    /// Marks an order paid after an explicit positive verification result.
    /// The only path to `payment_status = completed`.
    #[instrument(skip(self))]
    pub async fn record_payment_success(
        &self,
        order_id: Uuid,
        payment_id: String,
        provider_order_id: Option<String>,
    ) -> Result<order::Model, ServiceError> {
        let order = self.load_order(&*self.db, order_id).await?;

        if order.order_status == OrderStatus::Cancelled {
            return Err(ServiceError::InvalidTransition(
                "Cannot record payment for a cancelled order".to_string(),
            ));
        }

        let mut active: order::ActiveModel = order.into();
        active.payment_status = Set(PaymentStatus::Completed);
        active.order_status = Set(OrderStatus::Confirmed);
        active.payment_id = Set(Some(payment_id.clone()));
        if let Some(provider_id) = provider_order_id {
            active.provider_order_id = Set(Some(provider_id));
        }
        active.updated_at = Set(Utc::now());
        let order = active.update(&*self.db).await?;

        self.event_sender
            .send_or_log(Event::PaymentVerified {
                order_id,
                payment_id,
            })
            .await;

        info!(%order_id, "payment recorded, order confirmed");
        Ok(order)
    }

    /// Records a hard decline. The order itself stays `pending` so the buyer
    /// can retry with another method.
    #[instrument(skip(self))]
    pub async fn record_payment_failure(
        &self,
        order_id: Uuid,
        reason: &str,
    ) -> Result<order::Model, ServiceError> {
        let order = self.load_order(&*self.db, order_id).await?;

        let mut active: order::ActiveModel = order.into();
        active.payment_status = Set(PaymentStatus::Failed);
        active.updated_at = Set(Utc::now());
        let order = active.update(&*self.db).await?;

        warn!(%order_id, reason, "payment declined");
        self.event_sender
            .send_or_log(Event::PaymentFailed {
                order_id,
                reason: reason.to_string(),
            })
            .await;

        Ok(order)
    }

    pub(crate) async fn load_order(
        &self,
        conn: &impl ConnectionTrait,
        order_id: Uuid,
    ) -> Result<order::Model, ServiceError> {
        Order::find_by_id(order_id)
            .one(conn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order".to_string()))
    }

    pub(crate) async fn with_items(
        &self,
        order: order::Model,
    ) -> Result<OrderWithItems, ServiceError> {
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .all(&*self.db)
            .await?;

        Ok(OrderWithItems { order, items })
    }

    async fn zip_items(
        &self,
        orders: Vec<order::Model>,
    ) -> Result<Vec<OrderWithItems>, ServiceError> {
        let items = orders.load_many(OrderItem, &*self.db).await?;

        Ok(orders
            .into_iter()
            .zip(items)
            .map(|(order, items)| OrderWithItems { order, items })
            .collect())
    }
}
