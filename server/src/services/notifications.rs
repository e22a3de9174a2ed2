// marketplace_server/src/services/notifications.rs

//! Order emails. Delivery goes through the log until a mail relay is wired
//! in; callers treat every send as best-effort either way.

use async_trait::async_trait;
use marketplace::{Order, OrderNotifications};
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct EmailNotifications {
  sender: String,
}

impl EmailNotifications {
  pub fn new(sender: impl Into<String>) -> Self {
    EmailNotifications { sender: sender.into() }
  }

  #[instrument(skip(self, body), fields(from = %self.sender))]
  async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<String> {
    if to.trim().is_empty() {
      anyhow::bail!("no recipient for '{}'", subject);
    }
    tokio::time::sleep(std::time::Duration::from_millis(5)).await; // Stand-in for the relay round trip

    let message_id = format!("order_mail_{}", uuid::Uuid::new_v4());
    info!(%message_id, to, subject, body_len = body.len(), "Email handed to relay.");
    Ok(message_id)
  }
}

/// Orders do not carry an email address; staff mailboxes are addressed by
/// role and buyers are reached through their phone contact.
const ORDERS_DESK: &str = "orders-desk";
const FINANCE_DESK: &str = "finance-desk";

#[async_trait]
impl OrderNotifications for EmailNotifications {
  async fn order_placed(&self, order: &Order) -> anyhow::Result<()> {
    let subject = format!("New order #{} ({} FCFA)", order.order_number, order.total_amount);
    let body = match &order.transaction_id {
      Some(txn) => format!("Payment by {} to verify, transaction id {}.", order.payment_method, txn),
      None => format!("Cash on delivery to {}, {}.", order.district, order.city),
    };
    self.send(ORDERS_DESK, &subject, &body).await.map(|_| ())
  }

  async fn payment_confirmed(&self, order: &Order) -> anyhow::Result<()> {
    let subject = format!("Order #{} confirmed", order.order_number);
    let body = format!(
      "Tracking number {} for {}.",
      order.tracking_number.as_deref().unwrap_or("pending"),
      order.phone.as_deref().unwrap_or("the buyer")
    );
    self.send(ORDERS_DESK, &subject, &body).await.map(|_| ())
  }

  async fn order_rejected(&self, order: &Order) -> anyhow::Result<()> {
    let subject = format!("Order #{} rejected", order.order_number);
    self.send(ORDERS_DESK, &subject, "Payment could not be verified.").await.map(|_| ())
  }

  async fn funds_released(&self, order: &Order) -> anyhow::Result<()> {
    let subject = format!("Payout for order #{}", order.order_number);
    let body = format!(
      "Vendor payout {} FCFA released, commission {} FCFA kept.",
      order.vendor_payout, order.commission_amount
    );
    self.send(FINANCE_DESK, &subject, &body).await.map(|_| ())
  }
}
