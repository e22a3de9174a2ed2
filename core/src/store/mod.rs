// marketplace/src/store/mod.rs

//! The persistent store seen from the order workflow: point reads and
//! single-row updates on `orders`, a plan lookup on `profiles`, a stock
//! decrement on `products`, and a change feed.
//!
//! There is no multi-row transaction. Each call is independent and the
//! workflow is written so that a failed call leaves nothing half-applied
//! from the caller's point of view.

pub mod memory;

use crate::error::{StoreError, StoreResult};
use crate::order::model::ProductId;
use crate::order::{
  CommissionRate, Order, OrderId, OrderItem, OrderStatus, PaymentMethod, PayoutStatus, SubscriptionPlan,
  TransactionId, UserId,
};
use crate::realtime::{OrderFilter, Subscription};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub use memory::InMemoryStore;

/// What the `products` table says about a product. Cart lines are checked
/// against it, so the client cannot choose the price, the seller whose plan
/// sets the commission, or whether stock is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
  pub seller_id: UserId,
  pub unit_price: i64,
  pub tracks_stock: bool,
}

/// Everything the store needs to insert an order. The store assigns `id`,
/// `order_number` and the initial `pending` statuses.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderRow {
  pub buyer_id: Option<UserId>,
  pub seller_id: Option<UserId>,
  pub items: Vec<OrderItem>,
  pub total_amount: i64,
  pub commission_rate: CommissionRate,
  pub commission_amount: i64,
  pub vendor_payout: i64,
  pub customer_name: Option<String>,
  pub phone: Option<String>,
  pub city: String,
  pub district: String,
  pub landmark: Option<String>,
  pub payment_method: PaymentMethod,
  pub transaction_id: Option<TransactionId>,
  pub created_at: DateTime<Utc>,
}

impl NewOrderRow {
  pub fn into_order(self, id: OrderId, order_number: i64) -> Order {
    Order {
      id,
      order_number,
      buyer_id: self.buyer_id,
      seller_id: self.seller_id,
      items: self.items,
      total_amount: self.total_amount,
      commission_rate: self.commission_rate,
      commission_amount: self.commission_amount,
      vendor_payout: self.vendor_payout,
      customer_name: self.customer_name,
      phone: self.phone,
      city: self.city,
      district: self.district,
      landmark: self.landmark,
      tracking_number: None,
      payment_method: self.payment_method,
      transaction_id: self.transaction_id,
      payout_status: PayoutStatus::Pending,
      status: OrderStatus::Pending,
      verified_by: None,
      logistician_id: None,
      created_at: self.created_at,
      delivered_at: None,
      reception_confirmed_at: None,
      updated_at: self.created_at,
    }
  }
}

/// A single-row update. The `expect_*` guards turn it into a
/// compare-and-set: the row is only written if it is still in the state the
/// caller validated against.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderPatch {
  pub expect_status: Option<OrderStatus>,
  pub expect_payout_status: Option<PayoutStatus>,
  pub status: Option<OrderStatus>,
  pub payout_status: Option<PayoutStatus>,
  pub tracking_number: Option<String>,
  pub verified_by: Option<String>,
  pub logistician_id: Option<UserId>,
  pub delivered_at: Option<DateTime<Utc>>,
  pub reception_confirmed_at: Option<DateTime<Utc>>,
  pub updated_at: DateTime<Utc>,
}

impl OrderPatch {
  pub fn at(now: DateTime<Utc>) -> Self {
    OrderPatch {
      expect_status: None,
      expect_payout_status: None,
      status: None,
      payout_status: None,
      tracking_number: None,
      verified_by: None,
      logistician_id: None,
      delivered_at: None,
      reception_confirmed_at: None,
      updated_at: now,
    }
  }

  pub fn expect_status(mut self, status: OrderStatus) -> Self {
    self.expect_status = Some(status);
    self
  }

  pub fn expect_payout_status(mut self, status: PayoutStatus) -> Self {
    self.expect_payout_status = Some(status);
    self
  }

  pub fn status(mut self, status: OrderStatus) -> Self {
    self.status = Some(status);
    self
  }

  pub fn payout_status(mut self, status: PayoutStatus) -> Self {
    self.payout_status = Some(status);
    self
  }

  pub fn tracking_number(mut self, tracking_number: impl Into<String>) -> Self {
    self.tracking_number = Some(tracking_number.into());
    self
  }

  pub fn verified_by(mut self, admin_ref: Option<String>) -> Self {
    self.verified_by = admin_ref;
    self
  }

  pub fn logistician(mut self, logistician_id: Option<UserId>) -> Self {
    self.logistician_id = logistician_id;
    self
  }

  pub fn delivered_at(mut self, at: DateTime<Utc>) -> Self {
    self.delivered_at = Some(at);
    self
  }

  pub fn reception_confirmed_at(mut self, at: DateTime<Utc>) -> Self {
    self.reception_confirmed_at = Some(at);
    self
  }

  /// Checks the guards against the current row.
  pub fn check(&self, order: &Order) -> StoreResult<()> {
    if let Some(expected) = self.expect_status {
      if order.status != expected {
        return Err(StoreError::Conflict {
          order_id: order.id,
          detail: format!("status is '{}', expected '{}'", order.status, expected),
        });
      }
    }
    if let Some(expected) = self.expect_payout_status {
      if order.payout_status != expected {
        return Err(StoreError::Conflict {
          order_id: order.id,
          detail: format!("payout status is '{}', expected '{}'", order.payout_status, expected),
        });
      }
    }
    Ok(())
  }

  /// Writes the set fields into `order`. `delivered_at` is only ever set once.
  pub fn apply(&self, order: &mut Order) {
    if let Some(status) = self.status {
      order.status = status;
    }
    if let Some(payout_status) = self.payout_status {
      order.payout_status = payout_status;
    }
    if let Some(tracking_number) = &self.tracking_number {
      order.tracking_number = Some(tracking_number.clone());
    }
    if let Some(verified_by) = &self.verified_by {
      order.verified_by = Some(verified_by.clone());
    }
    if let Some(logistician_id) = self.logistician_id {
      order.logistician_id = Some(logistician_id);
    }
    if order.delivered_at.is_none() {
      order.delivered_at = self.delivered_at;
    }
    if order.reception_confirmed_at.is_none() {
      order.reception_confirmed_at = self.reception_confirmed_at;
    }
    order.updated_at = self.updated_at;
  }
}

/// Row filter for listings. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderQuery {
  pub status: Option<OrderStatus>,
  pub payout_status: Option<PayoutStatus>,
  pub seller_id: Option<UserId>,
  pub buyer_id: Option<UserId>,
}

impl OrderQuery {
  pub fn with_status(status: OrderStatus) -> Self {
    OrderQuery {
      status: Some(status),
      ..Default::default()
    }
  }

  pub fn matches(&self, order: &Order) -> bool {
    self.status.map_or(true, |s| order.status == s)
      && self.payout_status.map_or(true, |p| order.payout_status == p)
      && self.seller_id.map_or(true, |s| order.involves_seller(s))
      && self.buyer_id.map_or(true, |b| order.buyer_id == Some(b))
  }
}

#[async_trait]
pub trait MarketStore: Send + Sync {
  async fn insert_order(&self, row: NewOrderRow) -> StoreResult<Order>;

  async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>>;

  /// Applies `patch` to one row. Fails with `NotFound` if the row does not
  /// exist and `Conflict` if a guard does not hold; nothing is written then.
  async fn update_order(&self, id: OrderId, patch: OrderPatch) -> StoreResult<Order>;

  /// Matching orders, oldest first.
  async fn list_orders(&self, query: OrderQuery) -> StoreResult<Vec<Order>>;

  async fn seller_plan(&self, seller_id: UserId) -> StoreResult<Option<SubscriptionPlan>>;

  /// `None` when no such product is listed.
  async fn catalog_entry(&self, product_id: ProductId) -> StoreResult<Option<CatalogEntry>>;

  /// Decrements `stock_quantity`, floored at zero. Returns the new quantity,
  /// or `None` when the product does not track stock.
  async fn decrement_stock(&self, product_id: ProductId, quantity: u32) -> StoreResult<Option<i64>>;

  fn subscribe(&self, filter: OrderFilter) -> Subscription;
}

pub type SharedStore = Arc<dyn MarketStore>;
