// marketplace/src/verification.rs

//! Lock 1: manual payment verification.
//!
//! There is no payment provider API. An admin reads the transaction id on
//! the SMS receipt, types it next to the id the buyer submitted, and decides.
//! The comparison is only an aid: confirming is never blocked by a mismatch.

use crate::clock::Clock;
use crate::error::{MarketError, MarketResult};
use crate::notifications::{self, OrderNotifications};
use crate::order::{ensure_transition, tracking, Order, OrderId, OrderStatus, TransactionId};
use crate::session::{Role, SessionContext};
use crate::settings::MarketSettings;
use crate::store::{OrderPatch, OrderQuery, SharedStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

/// A pending order awaiting the admin's dual entry.
#[derive(Debug, Clone, Serialize)]
pub struct PendingVerification {
  pub order: Order,
  pub submitted_id: TransactionId,
}

/// Visual diff between the buyer's id and the one typed from the SMS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdComparison {
  pub submitted: String,
  pub received: String,
  pub matches: bool,
  /// Zero-based positions where the two digit strings differ, including
  /// positions present in only one of them.
  pub mismatched_positions: Vec<usize>,
}

/// Compares after stripping non-digits from both sides.
pub fn compare_ids(submitted: &str, received: &str) -> IdComparison {
  let submitted = TransactionId::normalize(submitted);
  let received = TransactionId::normalize(received);
  let a = submitted.as_bytes();
  let b = received.as_bytes();
  let mismatched_positions: Vec<usize> = (0..a.len().max(b.len()))
    .filter(|&i| a.get(i) != b.get(i))
    .collect();
  IdComparison {
    matches: mismatched_positions.is_empty() && !submitted.is_empty(),
    submitted,
    received,
    mismatched_positions,
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmedPayment {
  pub tracking_number: String,
  pub order: Order,
}

pub struct VerificationGate {
  store: SharedStore,
  clock: Arc<dyn Clock>,
  settings: Arc<MarketSettings>,
  notifications: Arc<dyn OrderNotifications>,
}

impl VerificationGate {
  pub fn new(
    store: SharedStore,
    clock: Arc<dyn Clock>,
    settings: Arc<MarketSettings>,
    notifications: Arc<dyn OrderNotifications>,
  ) -> Self {
    VerificationGate {
      store,
      clock,
      settings,
      notifications,
    }
  }

  /// Pending orders carrying a buyer-submitted transaction id, oldest first.
  pub async fn pending_verifications(&self, session: &SessionContext) -> MarketResult<Vec<PendingVerification>> {
    session.require_role(&[Role::Admin])?;
    let pending = self.store.list_orders(OrderQuery::with_status(OrderStatus::Pending)).await?;
    Ok(
      pending
        .into_iter()
        .filter_map(|order| {
          let submitted_id = order.transaction_id.clone()?;
          Some(PendingVerification { order, submitted_id })
        })
        .collect(),
    )
  }

  async fn load_pending(&self, id: OrderId, to: OrderStatus) -> MarketResult<Order> {
    let order = self.store.get_order(id).await?.ok_or(MarketError::NotFound(id))?;
    ensure_transition(order.status, to)?;
    Ok(order)
  }

  /// `pending → confirmed`, assigning a fresh tracking number. Confirming an
  /// order that is no longer pending is an error and changes nothing.
  #[instrument(name = "VerificationGate::confirm", skip(self, session), fields(order_id = %id))]
  pub async fn confirm(
    &self,
    session: &SessionContext,
    id: OrderId,
    admin_ref: Option<String>,
  ) -> MarketResult<ConfirmedPayment> {
    let admin = session.require_role(&[Role::Admin])?;
    let order = self.load_pending(id, OrderStatus::Confirmed).await?;

    let now = self.clock.now();
    let tracking_number = tracking::generate(&self.settings.tracking_prefix, now);
    let verified_by = admin_ref
      .map(|r| r.trim().to_string())
      .filter(|r| !r.is_empty())
      .or_else(|| Some(admin.id.to_string()));
    let patch = OrderPatch::at(now)
      .expect_status(order.status)
      .status(OrderStatus::Confirmed)
      .tracking_number(tracking_number.clone())
      .verified_by(verified_by);
    let order = self.store.update_order(id, patch).await?;
    info!(tracking_number = %tracking_number, verified_by = ?order.verified_by, "Payment confirmed.");

    notifications::best_effort("payment_confirmed", &order, self.notifications.payment_confirmed(&order)).await;
    Ok(ConfirmedPayment { tracking_number, order })
  }

  /// `pending → rejected`. Stock taken at creation is not given back.
  #[instrument(name = "VerificationGate::reject", skip(self, session), fields(order_id = %id))]
  pub async fn reject(&self, session: &SessionContext, id: OrderId) -> MarketResult<Order> {
    session.require_role(&[Role::Admin])?;
    let order = self.load_pending(id, OrderStatus::Rejected).await?;
    let patch = OrderPatch::at(self.clock.now())
      .expect_status(order.status)
      .status(OrderStatus::Rejected);
    let order = self.store.update_order(id, patch).await?;
    info!("Order rejected.");

    notifications::best_effort("order_rejected", &order, self.notifications.order_rejected(&order)).await;
    Ok(order)
  }
}
