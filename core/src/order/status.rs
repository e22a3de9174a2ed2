// marketplace/src/order/status.rs

//! The order status machine.
//!
//! ```text
//! pending ──► confirmed ──► shipped ──► delivered
//!    │
//!    └──────► rejected
//! ```
//!
//! Every code path that writes `status` asks [`ensure_transition`] first, so
//! the table below is the only place the allowed moves are spelled out.

use crate::error::{MarketError, MarketResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
  Pending,
  Confirmed,
  Rejected,
  Shipped,
  Delivered,
}

impl OrderStatus {
  pub const ALL: [OrderStatus; 5] = [
    OrderStatus::Pending,
    OrderStatus::Confirmed,
    OrderStatus::Rejected,
    OrderStatus::Shipped,
    OrderStatus::Delivered,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      OrderStatus::Pending => "pending",
      OrderStatus::Confirmed => "confirmed",
      OrderStatus::Rejected => "rejected",
      OrderStatus::Shipped => "shipped",
      OrderStatus::Delivered => "delivered",
    }
  }

  pub fn can_transition_to(&self, next: OrderStatus) -> bool {
    matches!(
      (self, next),
      (OrderStatus::Pending, OrderStatus::Confirmed)
        | (OrderStatus::Pending, OrderStatus::Rejected)
        | (OrderStatus::Confirmed, OrderStatus::Shipped)
        | (OrderStatus::Shipped, OrderStatus::Delivered)
    )
  }

  /// No transition leaves a terminal status.
  pub fn is_terminal(&self) -> bool {
    matches!(self, OrderStatus::Rejected | OrderStatus::Delivered)
  }
}

pub fn ensure_transition(from: OrderStatus, to: OrderStatus) -> MarketResult<()> {
  if from.can_transition_to(to) {
    Ok(())
  } else {
    Err(MarketError::InvalidTransition { from, to })
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OrderStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    OrderStatus::ALL
      .into_iter()
      .find(|st| st.as_str() == s)
      .ok_or_else(|| format!("unknown order status '{}'", s))
  }
}
