// marketplace/src/release.rs

//! Lock 2: vendor payout after the cooling-off period.
//!
//! No money moves here. Setting `payout_status = paid` records that the
//! admin has paid the vendor off-system. The time check always runs against
//! the clock at the moment of the release call; any countdown a client shows
//! is advisory.

use crate::clock::Clock;
use crate::error::{MarketError, MarketResult};
use crate::notifications::{self, OrderNotifications};
use crate::order::{Order, OrderId, OrderStatus, PayoutStatus};
use crate::session::{Role, SessionContext};
use crate::settings::MarketSettings;
use crate::store::{OrderPatch, OrderQuery, SharedStore};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ReleaseEligibility {
  Eligible,
  CoolingOff {
    #[serde(serialize_with = "serialize_seconds")]
    remaining: Duration,
    eligible_at: DateTime<Utc>,
  },
  NotDelivered,
  AlreadyPaid,
}

fn serialize_seconds<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
  s.serialize_i64(d.num_seconds())
}

/// Where `order` stands with respect to Lock 2 at `now`.
pub fn eligibility(order: &Order, cooling_off: Duration, now: DateTime<Utc>) -> ReleaseEligibility {
  if order.payout_status == PayoutStatus::Paid {
    return ReleaseEligibility::AlreadyPaid;
  }
  if order.status != OrderStatus::Delivered {
    return ReleaseEligibility::NotDelivered;
  }
  match order.funds_unlock_at(cooling_off) {
    Some(eligible_at) if now >= eligible_at => ReleaseEligibility::Eligible,
    Some(eligible_at) => ReleaseEligibility::CoolingOff {
      remaining: eligible_at - now,
      eligible_at,
    },
    // Delivered without a timestamp: nothing to count from.
    None => ReleaseEligibility::NotDelivered,
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReleasableOrder {
  pub order: Order,
  pub eligibility: ReleaseEligibility,
}

pub struct FundReleaseGate {
  store: SharedStore,
  clock: Arc<dyn Clock>,
  settings: Arc<MarketSettings>,
  notifications: Arc<dyn OrderNotifications>,
}

impl FundReleaseGate {
  pub fn new(
    store: SharedStore,
    clock: Arc<dyn Clock>,
    settings: Arc<MarketSettings>,
    notifications: Arc<dyn OrderNotifications>,
  ) -> Self {
    FundReleaseGate {
      store,
      clock,
      settings,
      notifications,
    }
  }

  pub fn eligibility(&self, order: &Order) -> ReleaseEligibility {
    eligibility(order, self.settings.cooling_off, self.clock.now())
  }

  /// Delivered orders whose payout is still pending, with their countdown.
  pub async fn releasable_orders(&self, session: &SessionContext) -> MarketResult<Vec<ReleasableOrder>> {
    session.require_role(&[Role::Admin])?;
    let query = OrderQuery {
      status: Some(OrderStatus::Delivered),
      payout_status: Some(PayoutStatus::Pending),
      ..Default::default()
    };
    let now = self.clock.now();
    let orders = self.store.list_orders(query).await?;
    Ok(
      orders
        .into_iter()
        .map(|order| ReleasableOrder {
          eligibility: eligibility(&order, self.settings.cooling_off, now),
          order,
        })
        .collect(),
    )
  }

  /// Marks the vendor payout as paid once the order has been delivered for
  /// at least the cooling-off period.
  #[instrument(name = "FundReleaseGate::release", skip(self, session), fields(order_id = %id))]
  pub async fn release(&self, session: &SessionContext, id: OrderId) -> MarketResult<Order> {
    session.require_role(&[Role::Admin])?;
    let order = self.store.get_order(id).await?.ok_or(MarketError::NotFound(id))?;

    let now = self.clock.now();
    match eligibility(&order, self.settings.cooling_off, now) {
      ReleaseEligibility::Eligible => {}
      ReleaseEligibility::AlreadyPaid => return Err(MarketError::PayoutAlreadyReleased),
      ReleaseEligibility::NotDelivered => return Err(MarketError::NotDelivered { status: order.status }),
      ReleaseEligibility::CoolingOff { remaining, eligible_at } => {
        warn!(remaining_minutes = remaining.num_minutes(), "Release attempted during cooling-off.");
        return Err(MarketError::NotYetEligible { eligible_at });
      }
    }

    let patch = OrderPatch::at(now)
      .expect_status(OrderStatus::Delivered)
      .expect_payout_status(PayoutStatus::Pending)
      .payout_status(PayoutStatus::Paid);
    let order = self.store.update_order(id, patch).await?;
    info!(vendor_payout = order.vendor_payout, "Vendor funds released.");

    notifications::best_effort("funds_released", &order, self.notifications.funds_released(&order)).await;
    Ok(order)
  }
}
