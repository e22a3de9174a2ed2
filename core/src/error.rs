// marketplace/src/error.rs

//! Error types shared by every order operation.
//!
//! Entry points return `MarketResult<T>`; callers translate the error into a
//! user-facing message using [`MarketError::kind`].

use crate::order::{OrderId, OrderStatus};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Coarse classification used by presentation layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  /// Malformed input, rejected before any mutation.
  Validation,
  /// The order is not in a state that allows the operation.
  Precondition,
  NotFound,
  Forbidden,
  /// Persistent store or network failure. The step did not advance.
  Store,
  Internal,
}

#[derive(Debug, Error)]
pub enum MarketError {
  #[error("Validation error: {0}")]
  Validation(String),

  #[error("Order not found: {0}")]
  NotFound(OrderId),

  #[error("Forbidden: {0}")]
  Forbidden(String),

  #[error("Invalid status transition from '{from}' to '{to}'")]
  InvalidTransition { from: OrderStatus, to: OrderStatus },

  #[error("Order is '{status}', funds can only be released for delivered orders")]
  NotDelivered { status: OrderStatus },

  #[error("Vendor payout has already been released")]
  PayoutAlreadyReleased,

  #[error("not yet eligible: funds unlock at {eligible_at}")]
  NotYetEligible { eligible_at: DateTime<Utc> },

  #[error("Order {order_id} was modified concurrently, reload and retry")]
  StateChanged { order_id: OrderId },

  #[error("Store error: {0}")]
  Store(String),

  #[error("Internal error: {0}")]
  Internal(String),
}

impl MarketError {
  pub fn kind(&self) -> ErrorKind {
    match self {
      MarketError::Validation(_) => ErrorKind::Validation,
      MarketError::NotFound(_) => ErrorKind::NotFound,
      MarketError::Forbidden(_) => ErrorKind::Forbidden,
      MarketError::InvalidTransition { .. }
      | MarketError::NotDelivered { .. }
      | MarketError::PayoutAlreadyReleased
      | MarketError::NotYetEligible { .. }
      | MarketError::StateChanged { .. } => ErrorKind::Precondition,
      MarketError::Store(_) => ErrorKind::Store,
      MarketError::Internal(_) => ErrorKind::Internal,
    }
  }

  /// Store failures leave the state machine where it was, so the same
  /// operation can simply be issued again.
  pub fn is_retryable(&self) -> bool {
    self.kind() == ErrorKind::Store
  }

  pub(crate) fn validation(msg: impl Into<String>) -> Self {
    MarketError::Validation(msg.into())
  }
}

/// Errors reported by a [`crate::store::MarketStore`] implementation.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("Backend failure: {0}")]
  Backend(String),

  #[error("Order not found: {0}")]
  NotFound(OrderId),

  /// A guarded update found the row in a different state than expected.
  #[error("Order {order_id} changed underneath the update: {detail}")]
  Conflict { order_id: OrderId, detail: String },
}

impl From<StoreError> for MarketError {
  fn from(err: StoreError) -> Self {
    match err {
      StoreError::Backend(msg) => MarketError::Store(msg),
      StoreError::NotFound(id) => MarketError::NotFound(id),
      StoreError::Conflict { order_id, .. } => MarketError::StateChanged { order_id },
    }
  }
}

pub type MarketResult<T, E = MarketError> = std::result::Result<T, E>;

pub type StoreResult<T> = std::result::Result<T, StoreError>;
