// marketplace/src/repository.rs

//! Order creation and reads.
//!
//! Placing an order runs the `place_order` pipeline:
//!
//! 1. `validate_order`: reject malformed input before touching the store.
//! 2. `resolve_catalog`: price, seller and stock tracking of each line come
//!    from the products table, not from the cart.
//! 3. `resolve_commission`: freeze the seller's plan rate into the order.
//! 4. `insert_order`: the one write that must succeed.
//! 5. `decrement_stock`: best-effort, failures are logged, never rolled back.
//! 6. `notify_order_placed`: best-effort.

use crate::clock::Clock;
use crate::error::{MarketError, MarketResult};
use crate::notifications::OrderNotifications;
use crate::order::model::ProductId;
use crate::order::{
  CommissionSplit, DeliveryLocation, Order, OrderId, OrderItem, OrderStatus, PaymentMethod, SubscriptionPlan,
  TransactionId, UserId,
};
use crate::pipeline::{ContextData, Pipeline, PipelineControl, PipelineResult};
use crate::realtime::{OrderFilter, Subscription};
use crate::session::{Role, SessionContext};
use crate::store::{NewOrderRow, OrderQuery, SharedStore};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Input of the order creation action.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlaceOrder {
  pub items: Vec<OrderItem>,
  pub city: String,
  pub district: String,
  pub payment_method: PaymentMethod,
  /// Total as computed by the client; must match the server's sum.
  pub total_amount: i64,
  #[serde(default)]
  pub transaction_id: Option<String>,
  #[serde(default)]
  pub customer_name: Option<String>,
  #[serde(default)]
  pub phone: Option<String>,
  #[serde(default)]
  pub landmark: Option<String>,
}

/// Output of `validate_order`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedOrder {
  pub items: Vec<OrderItem>,
  pub total_amount: i64,
  pub location: DeliveryLocation,
  pub payment_method: PaymentMethod,
  pub transaction_id: Option<TransactionId>,
  pub customer_name: Option<String>,
  pub phone: Option<String>,
  pub landmark: Option<String>,
}

fn non_blank(value: &Option<String>) -> Option<String> {
  value
    .as_deref()
    .map(str::trim)
    .filter(|v| !v.is_empty())
    .map(str::to_string)
}

/// Checks an order creation request without any I/O.
pub fn validate_placement(req: &PlaceOrder) -> MarketResult<ValidatedOrder> {
  if req.items.is_empty() {
    return Err(MarketError::validation("an order needs at least one item"));
  }

  let mut total: i64 = 0;
  for item in &req.items {
    if item.quantity == 0 {
      return Err(MarketError::validation(format!("'{}' has a zero quantity", item.name)));
    }
    if item.unit_price < 0 {
      return Err(MarketError::validation(format!("'{}' has a negative price", item.name)));
    }
    total = item
      .subtotal()
      .and_then(|sub| total.checked_add(sub))
      .ok_or_else(|| MarketError::validation("order total is out of range"))?;
  }
  if total != req.total_amount {
    return Err(MarketError::validation(format!(
      "total amount {} does not match the items ({})",
      req.total_amount, total
    )));
  }

  let location = DeliveryLocation::new(&req.city, &req.district)?;

  let transaction_id = if req.payment_method.requires_transaction_id() {
    let raw = req.transaction_id.as_deref().unwrap_or_default();
    if raw.trim().is_empty() {
      return Err(MarketError::validation(format!(
        "a transaction id is required for {} payments",
        req.payment_method
      )));
    }
    Some(TransactionId::parse(raw)?)
  } else {
    None
  };

  let customer_name = non_blank(&req.customer_name);
  let phone = non_blank(&req.phone);
  let landmark = non_blank(&req.landmark);
  if req.payment_method == PaymentMethod::Cash {
    let missing: Vec<&str> = [("name", &customer_name), ("phone", &phone), ("address", &landmark)]
      .into_iter()
      .filter(|(_, v)| v.is_none())
      .map(|(field, _)| field)
      .collect();
    if !missing.is_empty() {
      return Err(MarketError::validation(format!(
        "cash on delivery requires: {}",
        missing.join(", ")
      )));
    }
  }

  Ok(ValidatedOrder {
    items: req.items.clone(),
    total_amount: total,
    location,
    payment_method: req.payment_method,
    transaction_id,
    customer_name,
    phone,
    landmark,
  })
}

/// Data threaded through the `place_order` pipeline.
#[derive(Debug)]
pub struct PlacementCtx {
  pub request: PlaceOrder,
  pub buyer_id: Option<UserId>,
  pub validated: Option<ValidatedOrder>,
  pub seller_id: Option<UserId>,
  pub split: Option<CommissionSplit>,
  pub order: Option<Order>,
  pub stock_failures: Vec<ProductId>,
}

impl PlacementCtx {
  fn new(request: PlaceOrder, buyer_id: Option<UserId>) -> Self {
    PlacementCtx {
      request,
      buyer_id,
      validated: None,
      seller_id: None,
      split: None,
      order: None,
      stock_failures: Vec::new(),
    }
  }
}

fn missing_stage(stage: &str) -> MarketError {
  MarketError::Internal(format!("order placement reached a step before '{}' ran", stage))
}

/// Resolves the plan of the first item's seller. A lookup failure falls
/// back to the base plan.
async fn resolve_plan(store: &SharedStore, seller_id: UserId) -> SubscriptionPlan {
  match store.seller_plan(seller_id).await {
    Ok(Some(plan)) => plan,
    Ok(None) => SubscriptionPlan::Basic,
    Err(e) => {
      warn!(%seller_id, error = %e, "Seller plan lookup failed, using base commission rate.");
      SubscriptionPlan::Basic
    }
  }
}

async fn validate_order_step(ctx: ContextData<PlacementCtx>) -> MarketResult<PipelineControl> {
  let validated = validate_placement(&ctx.read().request)?;
  ctx.write().validated = Some(validated);
  Ok(PipelineControl::Continue)
}

async fn resolve_catalog_step(store: SharedStore, ctx: ContextData<PlacementCtx>) -> MarketResult<PipelineControl> {
  let mut items = {
    let guard = ctx.read();
    let validated = guard.validated.as_ref().ok_or_else(|| missing_stage("validate_order"))?;
    validated.items.clone()
  };
  for item in &mut items {
    let entry = store
      .catalog_entry(item.product_id)
      .await?
      .ok_or_else(|| MarketError::validation(format!("'{}' is not a listed product", item.name)))?;
    if entry.unit_price != item.unit_price {
      return Err(MarketError::validation(format!(
        "the price of '{}' is now {} FCFA",
        item.name, entry.unit_price
      )));
    }
    if entry.seller_id != item.seller_id {
      warn!(
        product_id = %item.product_id,
        claimed = %item.seller_id,
        seller_id = %entry.seller_id,
        "Cart line names the wrong seller, using the catalog's."
      );
    }
    item.seller_id = entry.seller_id;
    item.has_stock = entry.tracks_stock;
  }
  let mut guard = ctx.write();
  let validated = guard.validated.as_mut().ok_or_else(|| missing_stage("validate_order"))?;
  validated.items = items;
  Ok(PipelineControl::Continue)
}

async fn resolve_commission_step(store: SharedStore, ctx: ContextData<PlacementCtx>) -> MarketResult<PipelineControl> {
  let (total, sellers) = {
    let guard = ctx.read();
    let validated = guard.validated.as_ref().ok_or_else(|| missing_stage("validate_order"))?;
    let mut sellers: Vec<UserId> = Vec::new();
    for item in &validated.items {
      if !sellers.contains(&item.seller_id) {
        sellers.push(item.seller_id);
      }
    }
    (validated.total_amount, sellers)
  };
  let seller_id = sellers.first().copied().ok_or_else(|| missing_stage("validate_order"))?;
  if sellers.len() > 1 {
    warn!(
      %seller_id,
      sellers = sellers.len(),
      "Cart spans several sellers, commission follows the first item's seller."
    );
  }
  let plan = resolve_plan(&store, seller_id).await;
  let split = CommissionSplit::compute(total, plan.commission_rate());
  let mut guard = ctx.write();
  guard.seller_id = Some(seller_id);
  guard.split = Some(split);
  Ok(PipelineControl::Continue)
}

async fn insert_order_step(
  store: SharedStore,
  clock: Arc<dyn Clock>,
  ctx: ContextData<PlacementCtx>,
) -> MarketResult<PipelineControl> {
  let row = {
    let guard = ctx.read();
    let validated = guard.validated.clone().ok_or_else(|| missing_stage("validate_order"))?;
    let split = guard.split.ok_or_else(|| missing_stage("resolve_commission"))?;
    NewOrderRow {
      buyer_id: guard.buyer_id,
      seller_id: guard.seller_id,
      items: validated.items,
      total_amount: split.total_amount,
      commission_rate: split.commission_rate,
      commission_amount: split.commission_amount,
      vendor_payout: split.vendor_payout,
      customer_name: validated.customer_name,
      phone: validated.phone,
      city: validated.location.city,
      district: validated.location.district,
      landmark: validated.landmark,
      payment_method: validated.payment_method,
      transaction_id: validated.transaction_id,
      created_at: clock.now(),
    }
  };
  let order = store.insert_order(row).await?;
  info!(
    order_id = %order.id,
    order_number = order.order_number,
    total = order.total_amount,
    method = %order.payment_method,
    "Order created."
  );
  ctx.write().order = Some(order);
  Ok(PipelineControl::Continue)
}

async fn decrement_stock_step(store: SharedStore, ctx: ContextData<PlacementCtx>) -> MarketResult<PipelineControl> {
  let lines: Vec<(ProductId, u32)> = {
    let guard = ctx.read();
    let order = guard.order.as_ref().ok_or_else(|| missing_stage("insert_order"))?;
    order
      .items
      .iter()
      .filter(|i| i.has_stock)
      .map(|i| (i.product_id, i.quantity))
      .collect()
  };
  let mut failed = Vec::new();
  for (product_id, quantity) in lines {
    match store.decrement_stock(product_id, quantity).await {
      Ok(remaining) => debug!(%product_id, quantity, ?remaining, "Stock decremented."),
      Err(e) => {
        warn!(%product_id, quantity, error = %e, "Stock decrement failed, order kept.");
        failed.push(product_id);
      }
    }
  }
  if failed.is_empty() {
    return Ok(PipelineControl::Continue);
  }
  let count = failed.len();
  ctx.write().stock_failures = failed;
  Err(MarketError::Store(format!("{} stock update(s) failed", count)))
}

async fn notify_order_placed_step(
  notifications: Arc<dyn OrderNotifications>,
  ctx: ContextData<PlacementCtx>,
) -> MarketResult<PipelineControl> {
  let order = ctx.read().order.clone().ok_or_else(|| missing_stage("insert_order"))?;
  notifications
    .order_placed(&order)
    .await
    .map_err(|e| MarketError::Internal(format!("order placed notification: {:#}", e)))?;
  Ok(PipelineControl::Continue)
}

fn placement_pipeline(
  store: SharedStore,
  clock: Arc<dyn Clock>,
  notifications: Arc<dyn OrderNotifications>,
) -> Pipeline<PlacementCtx, MarketError> {
  let mut p = Pipeline::<PlacementCtx, MarketError>::new(
    "place_order",
    &[
      ("validate_order", false),
      ("resolve_catalog", false),
      ("resolve_commission", false),
      ("insert_order", false),
      ("decrement_stock", true),
      ("notify_order_placed", true),
    ],
  );

  p.on_step("validate_order", validate_order_step);

  let s = store.clone();
  p.on_step("resolve_catalog", move |ctx| resolve_catalog_step(s.clone(), ctx));

  let s = store.clone();
  p.on_step("resolve_commission", move |ctx| resolve_commission_step(s.clone(), ctx));

  let s = store.clone();
  p.on_step("insert_order", move |ctx| insert_order_step(s.clone(), clock.clone(), ctx));

  p.on_step("decrement_stock", move |ctx| decrement_stock_step(store.clone(), ctx));

  p.on_step("notify_order_placed", move |ctx| {
    notify_order_placed_step(notifications.clone(), ctx)
  });

  p
}

/// Creates orders and reads them back.
pub struct OrderRepository {
  store: SharedStore,
  placement: Pipeline<PlacementCtx, MarketError>,
}

impl OrderRepository {
  pub fn new(store: SharedStore, clock: Arc<dyn Clock>, notifications: Arc<dyn OrderNotifications>) -> Self {
    let placement = placement_pipeline(store.clone(), clock, notifications);
    OrderRepository { store, placement }
  }

  pub fn store(&self) -> &SharedStore {
    &self.store
  }

  /// The order creation action. The order is recorded as `pending`; on any
  /// error before the insert, nothing is persisted.
  #[instrument(name = "OrderRepository::create_order", skip_all, fields(method = %request.payment_method, items = request.items.len()))]
  pub async fn create_order(&self, session: &SessionContext, request: PlaceOrder) -> MarketResult<Order> {
    let buyer_id = session.current_user().map(|u| u.id);
    let ctx = ContextData::new(PlacementCtx::new(request, buyer_id));
    match self.placement.run(ctx.clone()).await? {
      PipelineResult::Completed => {}
      PipelineResult::Stopped => return Err(MarketError::Internal("order placement was halted".to_string())),
    }
    let placed = ctx.read().order.clone();
    placed.ok_or_else(|| MarketError::Internal("order placement finished without an order".to_string()))
  }

  pub async fn get_order(&self, id: OrderId) -> MarketResult<Order> {
    self.store.get_order(id).await?.ok_or(MarketError::NotFound(id))
  }

  pub async fn list_orders(&self, query: OrderQuery) -> MarketResult<Vec<Order>> {
    Ok(self.store.list_orders(query).await?)
  }

  pub async fn orders_for_buyer(&self, buyer_id: UserId) -> MarketResult<Vec<Order>> {
    self
      .list_orders(OrderQuery {
        buyer_id: Some(buyer_id),
        ..Default::default()
      })
      .await
  }

  pub async fn orders_for_seller(&self, seller_id: UserId) -> MarketResult<Vec<Order>> {
    self
      .list_orders(OrderQuery {
        seller_id: Some(seller_id),
        ..Default::default()
      })
      .await
  }

  /// Order history of the signed-in buyer.
  pub async fn buyer_orders(&self, session: &SessionContext) -> MarketResult<Vec<Order>> {
    let user = session.require_role(&[Role::Buyer])?;
    self.orders_for_buyer(user.id).await
  }

  /// Vendor dashboard: orders holding at least one of the seller's products.
  pub async fn seller_orders(&self, session: &SessionContext, status: Option<OrderStatus>) -> MarketResult<Vec<Order>> {
    let user = session.require_role(&[Role::Seller])?;
    self
      .list_orders(OrderQuery {
        seller_id: Some(user.id),
        status,
        ..Default::default()
      })
      .await
  }

  /// Admin and logistics dashboards. Unlike the verification queue, cash
  /// orders are included.
  pub async fn staff_orders(&self, session: &SessionContext, query: OrderQuery) -> MarketResult<Vec<Order>> {
    session.require_role(&[Role::Admin, Role::Logistician])?;
    self.list_orders(query).await
  }

  pub fn seller_feed(&self, session: &SessionContext) -> MarketResult<Subscription> {
    let user = session.require_role(&[Role::Seller])?;
    Ok(self.store.subscribe(OrderFilter::Seller(user.id)))
  }

  pub fn staff_feed(&self, session: &SessionContext, status: Option<OrderStatus>) -> MarketResult<Subscription> {
    session.require_role(&[Role::Admin, Role::Logistician])?;
    Ok(self.store.subscribe(status.map_or(OrderFilter::All, OrderFilter::Status)))
  }

  /// Live updates for one order row.
  pub fn watch(&self, id: OrderId) -> Subscription {
    self.store.subscribe(OrderFilter::Order(id))
  }

  /// Distinct sellers of an order, for display of the known multi-seller
  /// limitation.
  pub fn sellers_of(order: &Order) -> BTreeSet<UserId> {
    order.items.iter().map(|i| i.seller_id).collect()
  }
}
