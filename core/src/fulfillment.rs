// marketplace/src/fulfillment.rs

//! Shipping and delivery, driven by vendors and logisticians. Independent of
//! the payout flag: delivering only stamps `delivered_at`, which later
//! anchors the cooling-off period.

use crate::clock::Clock;
use crate::error::{MarketError, MarketResult};
use crate::order::{ensure_transition, Order, OrderId, OrderStatus, UserId};
use crate::session::{CurrentUser, Role, SessionContext};
use crate::store::{OrderPatch, SharedStore};
use std::sync::Arc;
use tracing::{info, instrument};

const FULFILLERS: &[Role] = &[Role::Seller, Role::Logistician, Role::Admin];

pub struct FulfillmentService {
  store: SharedStore,
  clock: Arc<dyn Clock>,
}

impl FulfillmentService {
  pub fn new(store: SharedStore, clock: Arc<dyn Clock>) -> Self {
    FulfillmentService { store, clock }
  }

  /// Loads the order and checks that `actor` may move it. Sellers only act
  /// on orders containing their products.
  async fn load_for(&self, actor: &CurrentUser, id: OrderId) -> MarketResult<Order> {
    let order = self.store.get_order(id).await?.ok_or(MarketError::NotFound(id))?;
    if actor.role == Role::Seller && !order.involves_seller(actor.id) {
      return Err(MarketError::Forbidden(format!(
        "order {} does not contain products of this seller",
        id
      )));
    }
    Ok(order)
  }

  /// `confirmed → shipped`, optionally associating a logistician. A
  /// logistician shipping without naming anyone is recorded as the handler.
  #[instrument(name = "FulfillmentService::mark_shipped", skip(self, session), fields(order_id = %id))]
  pub async fn mark_shipped(
    &self,
    session: &SessionContext,
    id: OrderId,
    logistician: Option<UserId>,
  ) -> MarketResult<Order> {
    let actor = session.require_role(FULFILLERS)?;
    let order = self.load_for(&actor, id).await?;
    ensure_transition(order.status, OrderStatus::Shipped)?;

    let logistician = logistician.or((actor.role == Role::Logistician).then_some(actor.id));
    let patch = OrderPatch::at(self.clock.now())
      .expect_status(order.status)
      .status(OrderStatus::Shipped)
      .logistician(logistician);
    let order = self.store.update_order(id, patch).await?;
    info!(logistician_id = ?order.logistician_id, "Order shipped.");
    Ok(order)
  }

  /// `shipped → delivered`, stamping `delivered_at` with the current time.
  #[instrument(name = "FulfillmentService::mark_delivered", skip(self, session), fields(order_id = %id))]
  pub async fn mark_delivered(&self, session: &SessionContext, id: OrderId) -> MarketResult<Order> {
    let actor = session.require_role(FULFILLERS)?;
    let order = self.load_for(&actor, id).await?;
    ensure_transition(order.status, OrderStatus::Delivered)?;

    let now = self.clock.now();
    let patch = OrderPatch::at(now)
      .expect_status(order.status)
      .status(OrderStatus::Delivered)
      .delivered_at(now);
    let order = self.store.update_order(id, patch).await?;
    info!(delivered_at = %now, "Order delivered.");
    Ok(order)
  }

  /// The vendor status surface. Only the forward fulfillment moves are
  /// accepted here; confirming and rejecting belong to the admin.
  pub async fn update_order_status(
    &self,
    session: &SessionContext,
    id: OrderId,
    new_status: OrderStatus,
  ) -> MarketResult<Order> {
    match new_status {
      OrderStatus::Shipped => self.mark_shipped(session, id, None).await,
      OrderStatus::Delivered => self.mark_delivered(session, id).await,
      other => Err(MarketError::validation(format!(
        "status '{}' cannot be set from the vendor surface",
        other
      ))),
    }
  }

  /// Buyer acknowledges receipt. Informational only: it neither moves the
  /// status nor affects when funds unlock. Repeating it keeps the first
  /// timestamp.
  #[instrument(name = "FulfillmentService::confirm_reception", skip(self, session), fields(order_id = %id))]
  pub async fn confirm_reception(&self, session: &SessionContext, id: OrderId) -> MarketResult<Order> {
    let buyer = session.require_role(&[Role::Buyer])?;
    let order = self.store.get_order(id).await?.ok_or(MarketError::NotFound(id))?;
    if order.buyer_id != Some(buyer.id) {
      return Err(MarketError::Forbidden(format!("order {} belongs to another buyer", id)));
    }
    if order.status != OrderStatus::Delivered {
      return Err(MarketError::NotDelivered { status: order.status });
    }
    if order.reception_confirmed_at.is_some() {
      return Ok(order);
    }

    let now = self.clock.now();
    let patch = OrderPatch::at(now).reception_confirmed_at(now);
    let order = self.store.update_order(id, patch).await?;
    info!("Reception confirmed by buyer.");
    Ok(order)
  }
}
