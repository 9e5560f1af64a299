pub mod carts;
pub mod orders;
pub mod payments;

use std::sync::Arc;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::gateways::PaymentGateways;
use crate::services::{CartService, CheckoutService, OrderService};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer backing the HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub cart: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub checkout: Arc<CheckoutService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        gateways: PaymentGateways,
    ) -> Self {
        let cart = Arc::new(CartService::new(db.clone(), event_sender.clone()));
        let orders = Arc::new(OrderService::new(db.clone(), event_sender.clone()));
        let checkout = Arc::new(CheckoutService::new(
            db,
            event_sender,
            orders.clone(),
            gateways,
        ));

        Self {
            cart,
            orders,
            checkout,
        }
    }
}
