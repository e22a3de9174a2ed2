// marketplace/src/order/model.rs

use super::commission::CommissionRate;
use super::status::OrderStatus;
use super::transaction_id::TransactionId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

pub type OrderId = Uuid;
pub type UserId = Uuid;
pub type ProductId = Uuid;

/// One cart line frozen into the order at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
  pub product_id: ProductId,
  pub name: String,
  /// Whole currency units, no fractional part.
  pub unit_price: i64,
  pub quantity: u32,
  #[serde(default)]
  pub image_ref: Option<String>,
  pub seller_id: UserId,
  #[serde(default)]
  pub selected_size: Option<String>,
  #[serde(default)]
  pub selected_color: Option<String>,
  /// Whether the product tracks a stock quantity.
  #[serde(default)]
  pub has_stock: bool,
}

impl OrderItem {
  /// `None` on overflow.
  pub fn subtotal(&self) -> Option<i64> {
    self.unit_price.checked_mul(i64::from(self.quantity))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
  Cash,
  MobileMoney,
  AirtelMoney,
  Whatsapp,
}

impl PaymentMethod {
  pub const ALL: [PaymentMethod; 4] = [
    PaymentMethod::Cash,
    PaymentMethod::MobileMoney,
    PaymentMethod::AirtelMoney,
    PaymentMethod::Whatsapp,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      PaymentMethod::Cash => "cash",
      PaymentMethod::MobileMoney => "mobile_money",
      PaymentMethod::AirtelMoney => "airtel_money",
      PaymentMethod::Whatsapp => "whatsapp",
    }
  }

  /// Every method except cash is paid ahead by transfer and must carry the
  /// provider's transaction id.
  pub fn requires_transaction_id(&self) -> bool {
    !matches!(self, PaymentMethod::Cash)
  }
}

impl fmt::Display for PaymentMethod {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for PaymentMethod {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    PaymentMethod::ALL
      .into_iter()
      .find(|m| m.as_str() == s)
      .ok_or_else(|| format!("unknown payment method '{}'", s))
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
  Pending,
  Paid,
}

impl PayoutStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      PayoutStatus::Pending => "pending",
      PayoutStatus::Paid => "paid",
    }
  }
}

impl fmt::Display for PayoutStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for PayoutStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "pending" => Ok(PayoutStatus::Pending),
      "paid" => Ok(PayoutStatus::Paid),
      other => Err(format!("unknown payout status '{}'", other)),
    }
  }
}

/// The financial record of one checkout. Never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
  pub id: OrderId,
  pub order_number: i64,
  pub buyer_id: Option<UserId>,
  /// Seller whose subscription plan fixed `commission_rate`.
  pub seller_id: Option<UserId>,

  pub items: Vec<OrderItem>,
  pub total_amount: i64,
  pub commission_rate: CommissionRate,
  pub commission_amount: i64,
  pub vendor_payout: i64,

  pub customer_name: Option<String>,
  pub phone: Option<String>,
  pub city: String,
  pub district: String,
  pub landmark: Option<String>,
  pub tracking_number: Option<String>,

  pub payment_method: PaymentMethod,
  pub transaction_id: Option<TransactionId>,
  pub payout_status: PayoutStatus,
  pub status: OrderStatus,

  pub verified_by: Option<String>,
  pub logistician_id: Option<UserId>,

  pub created_at: DateTime<Utc>,
  pub delivered_at: Option<DateTime<Utc>>,
  pub reception_confirmed_at: Option<DateTime<Utc>>,
  pub updated_at: DateTime<Utc>,
}

impl Order {
  pub fn is_cash(&self) -> bool {
    self.payment_method == PaymentMethod::Cash
  }

  /// True if any line of the order belongs to `seller`.
  pub fn involves_seller(&self, seller: UserId) -> bool {
    self.seller_id == Some(seller) || self.items.iter().any(|i| i.seller_id == seller)
  }

  /// The instant Lock 2 opens, once the order has been delivered.
  pub fn funds_unlock_at(&self, cooling_off: Duration) -> Option<DateTime<Utc>> {
    self.delivered_at.map(|at| at + cooling_off)
  }
}
