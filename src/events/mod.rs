use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by the cart/order/payment lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CartItemAdded {
        cart_id: Uuid,
        product_id: Uuid,
    },
    CartUpdated(Uuid),
    CartCleared(Uuid),

    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    OrderCancelled(Uuid),

    PaymentVerified {
        order_id: Uuid,
        payment_id: String,
    },
    PaymentFailed {
        order_id: Uuid,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Builds a sender/receiver pair with the given channel capacity.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging instead of failing when the channel is gone.
    /// Event delivery must never abort the request that produced it.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Dropped domain event: {}", e);
        }
    }
}

/// Drains the event channel, recording each event in the log. Downstream
/// consumers (notifications, analytics) hang off this loop.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCreated(order_id) => info!(%order_id, "order created"),
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => info!(%order_id, %old_status, %new_status, "order status changed"),
            Event::OrderCancelled(order_id) => info!(%order_id, "order cancelled"),
            Event::PaymentVerified {
                order_id,
                payment_id,
            } => info!(%order_id, %payment_id, "payment verified"),
            Event::PaymentFailed { order_id, reason } => {
                warn!(%order_id, %reason, "payment failed")
            }
            other => info!(event = ?other, "event"),
        }
    }
    info!("Event channel closed; processor exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_flow_through_channel() {
        let (sender, mut receiver) = EventSender::channel(8);
        let order_id = Uuid::new_v4();

        sender.send_or_log(Event::OrderCreated(order_id)).await;

        match receiver.recv().await {
            Some(Event::OrderCreated(id)) => assert_eq!(id, order_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_or_log_swallows_closed_channel() {
        let (sender, receiver) = EventSender::channel(1);
        drop(receiver);

        // Must not panic or return an error to the caller.
        sender.send_or_log(Event::CartUpdated(Uuid::new_v4())).await;
    }
}
