// marketplace/src/store/memory.rs

//! Process-local store used by tests and local development. It keeps the
//! same contract as the Postgres store: single-row guarded updates and a
//! change event after every successful write.

use super::{CatalogEntry, MarketStore, NewOrderRow, OrderPatch, OrderQuery};
use crate::error::{StoreError, StoreResult};
use crate::order::model::ProductId;
use crate::order::{Order, OrderId, SubscriptionPlan, UserId};
use crate::realtime::{ChangeKind, Notifier, OrderEvent, OrderFilter, Subscription};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
  orders: HashMap<OrderId, Order>,
  last_order_number: i64,
  products: HashMap<ProductId, ProductRow>,
  /// Raw `subscription_plan` text from seller profiles.
  plans: HashMap<UserId, String>,
}

struct ProductRow {
  seller_id: UserId,
  unit_price: i64,
  /// `None` when the product does not track stock.
  stock_quantity: Option<i64>,
}

/// Switches that make the next calls fail with a backend error.
#[derive(Default)]
struct Faults {
  insert: AtomicBool,
  update: AtomicBool,
  stock: AtomicBool,
  plan: AtomicBool,
}

#[derive(Default)]
pub struct InMemoryStore {
  tables: RwLock<Tables>,
  notifier: Notifier,
  faults: Faults,
}

impl InMemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn notifier(&self) -> &Notifier {
    &self.notifier
  }

  pub fn add_product(&self, product_id: ProductId, seller_id: UserId, unit_price: i64, stock_quantity: Option<i64>) {
    self.tables.write().products.insert(
      product_id,
      ProductRow {
        seller_id,
        unit_price,
        stock_quantity,
      },
    );
  }

  pub fn stock_of(&self, product_id: ProductId) -> Option<i64> {
    self.tables.read().products.get(&product_id).and_then(|p| p.stock_quantity)
  }

  pub fn set_subscription_plan(&self, seller_id: UserId, plan: &str) {
    self.tables.write().plans.insert(seller_id, plan.to_string());
  }

  pub fn order_count(&self) -> usize {
    self.tables.read().orders.len()
  }

  pub fn fail_inserts(&self, fail: bool) {
    self.faults.insert.store(fail, Ordering::SeqCst);
  }

  pub fn fail_updates(&self, fail: bool) {
    self.faults.update.store(fail, Ordering::SeqCst);
  }

  pub fn fail_stock_updates(&self, fail: bool) {
    self.faults.stock.store(fail, Ordering::SeqCst);
  }

  pub fn fail_plan_lookups(&self, fail: bool) {
    self.faults.plan.store(fail, Ordering::SeqCst);
  }

  fn check_fault(flag: &AtomicBool, op: &str) -> StoreResult<()> {
    if flag.load(Ordering::SeqCst) {
      Err(StoreError::Backend(format!("simulated {} failure", op)))
    } else {
      Ok(())
    }
  }
}

#[async_trait]
impl MarketStore for InMemoryStore {
  async fn insert_order(&self, row: NewOrderRow) -> StoreResult<Order> {
    Self::check_fault(&self.faults.insert, "insert")?;
    let order = {
      let mut tables = self.tables.write();
      tables.last_order_number += 1;
      let order = row.into_order(Uuid::new_v4(), tables.last_order_number);
      tables.orders.insert(order.id, order.clone());
      order
    };
    self.notifier.publish(OrderEvent {
      kind: ChangeKind::Insert,
      order: order.clone(),
    });
    Ok(order)
  }

  async fn get_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
    Ok(self.tables.read().orders.get(&id).cloned())
  }

  async fn update_order(&self, id: OrderId, patch: OrderPatch) -> StoreResult<Order> {
    Self::check_fault(&self.faults.update, "update")?;
    let order = {
      let mut tables = self.tables.write();
      let order = tables.orders.get_mut(&id).ok_or(StoreError::NotFound(id))?;
      patch.check(order)?;
      patch.apply(order);
      order.clone()
    };
    self.notifier.publish(OrderEvent {
      kind: ChangeKind::Update,
      order: order.clone(),
    });
    Ok(order)
  }

  async fn list_orders(&self, query: OrderQuery) -> StoreResult<Vec<Order>> {
    let mut orders: Vec<Order> = self
      .tables
      .read()
      .orders
      .values()
      .filter(|o| query.matches(o))
      .cloned()
      .collect();
    orders.sort_by_key(|o| o.order_number);
    Ok(orders)
  }

  async fn seller_plan(&self, seller_id: UserId) -> StoreResult<Option<SubscriptionPlan>> {
    Self::check_fault(&self.faults.plan, "profile lookup")?;
    Ok(
      self
        .tables
        .read()
        .plans
        .get(&seller_id)
        .map(|raw| SubscriptionPlan::from_profile(Some(raw))),
    )
  }

  async fn catalog_entry(&self, product_id: ProductId) -> StoreResult<Option<CatalogEntry>> {
    Ok(self.tables.read().products.get(&product_id).map(|p| CatalogEntry {
      seller_id: p.seller_id,
      unit_price: p.unit_price,
      tracks_stock: p.stock_quantity.is_some(),
    }))
  }

  async fn decrement_stock(&self, product_id: ProductId, quantity: u32) -> StoreResult<Option<i64>> {
    Self::check_fault(&self.faults.stock, "stock update")?;
    let mut tables = self.tables.write();
    match tables.products.get_mut(&product_id).and_then(|p| p.stock_quantity.as_mut()) {
      Some(stock) => {
        *stock = (*stock - i64::from(quantity)).max(0);
        Ok(Some(*stock))
      }
      None => Ok(None),
    }
  }

  fn subscribe(&self, filter: OrderFilter) -> Subscription {
    self.notifier.subscribe(filter)
  }
}
