// tests/common/mod.rs
#![allow(dead_code)] // Not every test file uses every fixture

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use marketplace::{
  InMemoryStore, ManualClock, MarketServices, MarketSettings, Order, OrderItem, OrderNotifications, PaymentMethod,
  PlaceOrder, Role, SessionContext, SharedStore, UserId,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::Level;
use uuid::Uuid;

pub const TXN_ID: &str = "123456789012345";

// --- Notifications that remember what was sent ---
#[derive(Default)]
pub struct RecordingNotifications {
  pub sent: Mutex<Vec<(&'static str, Uuid)>>,
  pub failing: AtomicBool,
}

impl RecordingNotifications {
  fn record(&self, what: &'static str, order: &Order) -> anyhow::Result<()> {
    if self.failing.load(Ordering::SeqCst) {
      anyhow::bail!("mail relay unreachable");
    }
    self.sent.lock().push((what, order.id));
    Ok(())
  }

  pub fn sent_for(&self, order_id: Uuid) -> Vec<&'static str> {
    self
      .sent
      .lock()
      .iter()
      .filter(|(_, id)| *id == order_id)
      .map(|(what, _)| *what)
      .collect()
  }
}

#[async_trait]
impl OrderNotifications for RecordingNotifications {
  async fn order_placed(&self, order: &Order) -> anyhow::Result<()> {
    self.record("order_placed", order)
  }

  async fn payment_confirmed(&self, order: &Order) -> anyhow::Result<()> {
    self.record("payment_confirmed", order)
  }

  async fn order_rejected(&self, order: &Order) -> anyhow::Result<()> {
    self.record("order_rejected", order)
  }

  async fn funds_released(&self, order: &Order) -> anyhow::Result<()> {
    self.record("funds_released", order)
  }
}

// --- Harness ---
pub struct Harness {
  pub store: Arc<InMemoryStore>,
  pub clock: Arc<ManualClock>,
  pub notifications: Arc<RecordingNotifications>,
  pub services: MarketServices,
}

pub fn start_time() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap()
}

pub fn harness() -> Harness {
  let store = Arc::new(InMemoryStore::new());
  let clock = Arc::new(ManualClock::new(start_time()));
  let notifications = Arc::new(RecordingNotifications::default());
  let shared: SharedStore = store.clone();
  let services = MarketServices::new(shared, clock.clone(), MarketSettings::default(), notifications.clone());
  Harness {
    store,
    clock,
    notifications,
    services,
  }
}

// --- Sessions ---
pub fn admin() -> SessionContext {
  SessionContext::as_user(Uuid::new_v4(), Role::Admin)
}

pub fn buyer(id: UserId) -> SessionContext {
  SessionContext::as_user(id, Role::Buyer)
}

pub fn seller(id: UserId) -> SessionContext {
  SessionContext::as_user(id, Role::Seller)
}

pub fn logistician() -> SessionContext {
  SessionContext::as_user(Uuid::new_v4(), Role::Logistician)
}

// --- Fixtures ---
pub fn item(seller_id: UserId, unit_price: i64, quantity: u32) -> OrderItem {
  OrderItem {
    product_id: Uuid::new_v4(),
    name: "Pagne wax 6 yards".to_string(),
    unit_price,
    quantity,
    image_ref: None,
    seller_id,
    selected_size: None,
    selected_color: Some("indigo".to_string()),
    has_stock: false,
  }
}

/// A cart line for a product listed in `store` without stock tracking.
pub fn listed_item(store: &InMemoryStore, seller_id: UserId, unit_price: i64, quantity: u32) -> OrderItem {
  let line = item(seller_id, unit_price, quantity);
  store.add_product(line.product_id, seller_id, unit_price, None);
  line
}

pub fn stocked_item(store: &InMemoryStore, seller_id: UserId, unit_price: i64, quantity: u32, stock: i64) -> OrderItem {
  let mut line = item(seller_id, unit_price, quantity);
  line.has_stock = true;
  store.add_product(line.product_id, seller_id, unit_price, Some(stock));
  line
}

pub fn transfer_request(items: Vec<OrderItem>) -> PlaceOrder {
  let total_amount = items.iter().map(|i| i.unit_price * i64::from(i.quantity)).sum();
  PlaceOrder {
    items,
    city: "Brazzaville".to_string(),
    district: "Bacongo".to_string(),
    payment_method: PaymentMethod::MobileMoney,
    total_amount,
    transaction_id: Some(TXN_ID.to_string()),
    customer_name: Some("Grace Mabiala".to_string()),
    phone: Some("+242 06 123 45 67".to_string()),
    landmark: None,
  }
}

pub fn cash_request(items: Vec<OrderItem>) -> PlaceOrder {
  PlaceOrder {
    payment_method: PaymentMethod::Cash,
    transaction_id: None,
    landmark: Some("Marché Total, rue Mbochis".to_string()),
    ..transfer_request(items)
  }
}

/// A pending transfer order for one seller's single line.
pub async fn place_pending(h: &Harness, buyer_id: UserId, seller_id: UserId, amount: i64) -> Order {
  h.services
    .repository
    .create_order(
      &buyer(buyer_id),
      transfer_request(vec![listed_item(&h.store, seller_id, amount, 1)]),
    )
    .await
    .expect("order should be created")
}

/// Walks an order through Lock 1 and fulfillment; `delivered_at` is the
/// clock's current time.
pub async fn deliver(h: &Harness, order: &Order) -> Order {
  let admin = admin();
  h.services
    .verification
    .confirm(&admin, order.id, None)
    .await
    .expect("confirm");
  h.services
    .fulfillment
    .mark_shipped(&admin, order.id, None)
    .await
    .expect("ship");
  h.services
    .fulfillment
    .mark_delivered(&admin, order.id)
    .await
    .expect("deliver")
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
