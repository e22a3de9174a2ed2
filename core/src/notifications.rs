// marketplace/src/notifications.rs

//! Outbound notifications (emails, dashboard sounds). They are fire-and-forget
//! from the workflow's point of view: a failure is logged and never undoes or
//! blocks the state transition that triggered it.

use crate::order::Order;
use async_trait::async_trait;
use std::future::Future;
use tracing::warn;

#[async_trait]
pub trait OrderNotifications: Send + Sync {
  async fn order_placed(&self, order: &Order) -> anyhow::Result<()>;

  async fn payment_confirmed(&self, _order: &Order) -> anyhow::Result<()> {
    Ok(())
  }

  async fn order_rejected(&self, _order: &Order) -> anyhow::Result<()> {
    Ok(())
  }

  async fn funds_released(&self, _order: &Order) -> anyhow::Result<()> {
    Ok(())
  }
}

/// Sends nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoNotifications;

#[async_trait]
impl OrderNotifications for NoNotifications {
  async fn order_placed(&self, _order: &Order) -> anyhow::Result<()> {
    Ok(())
  }
}

/// Awaits `send` and swallows its error after logging it.
pub(crate) async fn best_effort<F>(what: &'static str, order: &Order, send: F)
where
  F: Future<Output = anyhow::Result<()>>,
{
  if let Err(e) = send.await {
    warn!(order_id = %order.id, notification = what, error = %e, "Notification failed, ignoring.");
  }
}
