// marketplace/src/realtime.rs

//! Push notification of order row changes.
//!
//! Stores publish an [`OrderEvent`] after every successful insert or update;
//! the buyer's waiting screen, the admin dashboard and vendor dashboards each
//! hold a [`Subscription`] filtered to the rows they care about. Dropping the
//! subscription unsubscribes.

use crate::order::{Order, OrderId, OrderStatus, UserId};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
  Insert,
  Update,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderEvent {
  pub kind: ChangeKind,
  pub order: Order,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderFilter {
  All,
  Order(OrderId),
  Seller(UserId),
  Buyer(UserId),
  Status(OrderStatus),
}

impl OrderFilter {
  pub fn matches(&self, order: &Order) -> bool {
    match self {
      OrderFilter::All => true,
      OrderFilter::Order(id) => order.id == *id,
      OrderFilter::Seller(seller) => order.involves_seller(*seller),
      OrderFilter::Buyer(buyer) => order.buyer_id == Some(*buyer),
      OrderFilter::Status(status) => order.status == *status,
    }
  }
}

/// Fan-out of order events to every live subscription.
#[derive(Debug, Clone)]
pub struct Notifier {
  sender: broadcast::Sender<Arc<OrderEvent>>,
}

impl Notifier {
  pub fn new() -> Self {
    let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
    Notifier { sender }
  }

  /// Having no subscribers is not an error.
  pub fn publish(&self, event: OrderEvent) {
    let order_id = event.order.id;
    let kind = event.kind;
    match self.sender.send(Arc::new(event)) {
      Ok(receivers) => debug!(%order_id, ?kind, receivers, "Order event published"),
      Err(_) => debug!(%order_id, ?kind, "Order event published with no subscribers"),
    }
  }

  pub fn subscribe(&self, filter: OrderFilter) -> Subscription {
    Subscription {
      receiver: self.sender.subscribe(),
      filter,
    }
  }

  pub fn subscriber_count(&self) -> usize {
    self.sender.receiver_count()
  }
}

impl Default for Notifier {
  fn default() -> Self {
    Self::new()
  }
}

pub struct Subscription {
  receiver: broadcast::Receiver<Arc<OrderEvent>>,
  filter: OrderFilter,
}

impl Subscription {
  pub fn filter(&self) -> OrderFilter {
    self.filter
  }

  /// Waits for the next matching event. `None` once the notifier is gone.
  pub async fn next(&mut self) -> Option<OrderEvent> {
    loop {
      match self.receiver.recv().await {
        Ok(event) if self.filter.matches(&event.order) => return Some(event.as_ref().clone()),
        Ok(_) => continue,
        Err(broadcast::error::RecvError::Lagged(skipped)) => {
          warn!(skipped, filter = ?self.filter, "Order subscription lagged, events dropped");
        }
        Err(broadcast::error::RecvError::Closed) => return None,
      }
    }
  }

  /// Next matching event already buffered, without waiting.
  pub fn try_next(&mut self) -> Option<OrderEvent> {
    loop {
      match self.receiver.try_recv() {
        Ok(event) if self.filter.matches(&event.order) => return Some(event.as_ref().clone()),
        Ok(_) => continue,
        Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
          warn!(skipped, filter = ?self.filter, "Order subscription lagged, events dropped");
        }
        Err(_) => return None,
      }
    }
  }
}

impl std::fmt::Debug for Subscription {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription").field("filter", &self.filter).finish()
  }
}
