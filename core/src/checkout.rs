// marketplace/src/checkout.rs

//! The buyer's checkout flow.
//!
//! ```text
//! location ─► payment_method ─┬─► transfer_info ─► enter_id ─► waiting ─┬─► confirmed
//!                             │                                        └─► rejected
//!                             └─► cash_form ──────────────────────────────► confirmed
//! ```
//!
//! Nothing is persisted before `enter_id` or `cash_form` is submitted, so the
//! buyer can walk away from any earlier step. Once an order exists, dropping
//! the machine only stops observing it.

use crate::error::{MarketError, MarketResult};
use crate::order::zones;
use crate::order::{DeliveryLocation, Order, OrderId, OrderItem, OrderStatus, PaymentMethod, TransactionId};
use crate::realtime::Subscription;
use crate::repository::{OrderRepository, PlaceOrder};
use crate::session::SessionContext;
use crate::settings::MarketSettings;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStep {
  Location,
  PaymentMethod,
  TransferInfo,
  EnterId,
  CashForm,
  Waiting,
  Confirmed,
  Rejected,
}

impl CheckoutStep {
  pub fn as_str(&self) -> &'static str {
    match self {
      CheckoutStep::Location => "location",
      CheckoutStep::PaymentMethod => "payment_method",
      CheckoutStep::TransferInfo => "transfer_info",
      CheckoutStep::EnterId => "enter_id",
      CheckoutStep::CashForm => "cash_form",
      CheckoutStep::Waiting => "waiting",
      CheckoutStep::Confirmed => "confirmed",
      CheckoutStep::Rejected => "rejected",
    }
  }

  pub fn is_terminal(&self) -> bool {
    matches!(self, CheckoutStep::Confirmed | CheckoutStep::Rejected)
  }
}

impl fmt::Display for CheckoutStep {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Cash on delivery details. All four fields are required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CashForm {
  pub name: String,
  pub phone: String,
  pub quarter: String,
  pub address: String,
}

impl CashForm {
  pub fn missing_fields(&self) -> Vec<&'static str> {
    [
      ("name", &self.name),
      ("phone", &self.phone),
      ("quarter", &self.quarter),
      ("address", &self.address),
    ]
    .into_iter()
    .filter(|(_, v)| v.trim().is_empty())
    .map(|(field, _)| field)
    .collect()
  }

  pub fn is_complete(&self) -> bool {
    self.missing_fields().is_empty()
  }

  /// Quarter and address are stored together as the delivery landmark.
  fn landmark(&self) -> String {
    format!("{}, {}", self.quarter.trim(), self.address.trim())
  }
}

/// What the transfer screen shows: where to send the money and how much.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferInstructions {
  pub method: PaymentMethod,
  pub receiving_number: String,
  pub amount_due: i64,
}

enum CheckoutState {
  Location {
    city: Option<&'static str>,
    district: Option<&'static str>,
  },
  PaymentMethod {
    location: DeliveryLocation,
  },
  TransferInfo {
    location: DeliveryLocation,
    method: PaymentMethod,
  },
  EnterId {
    location: DeliveryLocation,
    method: PaymentMethod,
    raw_id: String,
  },
  CashForm {
    location: DeliveryLocation,
    form: CashForm,
  },
  Waiting {
    order: Order,
    subscription: Subscription,
  },
  Confirmed {
    order: Order,
  },
  Rejected {
    order: Order,
  },
}

impl CheckoutState {
  fn step(&self) -> CheckoutStep {
    match self {
      CheckoutState::Location { .. } => CheckoutStep::Location,
      CheckoutState::PaymentMethod { .. } => CheckoutStep::PaymentMethod,
      CheckoutState::TransferInfo { .. } => CheckoutStep::TransferInfo,
      CheckoutState::EnterId { .. } => CheckoutStep::EnterId,
      CheckoutState::CashForm { .. } => CheckoutStep::CashForm,
      CheckoutState::Waiting { .. } => CheckoutStep::Waiting,
      CheckoutState::Confirmed { .. } => CheckoutStep::Confirmed,
      CheckoutState::Rejected { .. } => CheckoutStep::Rejected,
    }
  }
}

pub struct CheckoutMachine {
  repository: Arc<OrderRepository>,
  settings: Arc<MarketSettings>,
  session: Arc<SessionContext>,
  items: Vec<OrderItem>,
  total_amount: i64,
  contact_name: Option<String>,
  contact_phone: Option<String>,
  state: CheckoutState,
}

impl CheckoutMachine {
  pub fn new(
    repository: Arc<OrderRepository>,
    settings: Arc<MarketSettings>,
    session: Arc<SessionContext>,
    items: Vec<OrderItem>,
  ) -> MarketResult<Self> {
    if items.is_empty() {
      return Err(MarketError::validation("the cart is empty"));
    }
    let total_amount = items.iter().try_fold(0_i64, |acc, item| {
      item
        .subtotal()
        .and_then(|sub| acc.checked_add(sub))
        .ok_or_else(|| MarketError::validation("order total is out of range"))
    })?;
    Ok(CheckoutMachine {
      repository,
      settings,
      session,
      items,
      total_amount,
      contact_name: None,
      contact_phone: None,
      state: CheckoutState::Location {
        city: None,
        district: None,
      },
    })
  }

  pub fn step(&self) -> CheckoutStep {
    self.state.step()
  }

  pub fn total_amount(&self) -> i64 {
    self.total_amount
  }

  /// The created order, once there is one.
  pub fn order(&self) -> Option<&Order> {
    match &self.state {
      CheckoutState::Waiting { order, .. } | CheckoutState::Confirmed { order } | CheckoutState::Rejected { order } => {
        Some(order)
      }
      _ => None,
    }
  }

  pub fn selected_city(&self) -> Option<&'static str> {
    match &self.state {
      CheckoutState::Location { city, .. } => *city,
      _ => None,
    }
  }

  /// Districts to offer for the selected city.
  pub fn available_districts(&self) -> &'static [&'static str] {
    self.selected_city().map(zones::districts).unwrap_or(&[])
  }

  fn wrong_step(&self, action: &str) -> MarketError {
    MarketError::Validation(format!("cannot {} at the '{}' step", action, self.step()))
  }

  // --- location ---

  pub fn select_city(&mut self, city: &str) -> MarketResult<()> {
    match &mut self.state {
      CheckoutState::Location { city: c, district } => {
        *c = Some(zones::resolve_city(city)?);
        *district = None;
        Ok(())
      }
      _ => Err(self.wrong_step("select a city")),
    }
  }

  pub fn select_district(&mut self, district: &str) -> MarketResult<()> {
    match &mut self.state {
      CheckoutState::Location { city: Some(city), district: d } => {
        *d = Some(zones::resolve_district(*city, district)?);
        Ok(())
      }
      CheckoutState::Location { city: None, .. } => Err(MarketError::validation("select a city first")),
      _ => Err(self.wrong_step("select a district")),
    }
  }

  pub fn confirm_location(&mut self) -> MarketResult<()> {
    let location = match &self.state {
      CheckoutState::Location {
        city: Some(city),
        district: Some(district),
      } => DeliveryLocation::new(city, district)?,
      CheckoutState::Location { .. } => return Err(MarketError::validation("city and district are both required")),
      _ => return Err(self.wrong_step("confirm the location")),
    };
    debug!(city = %location.city, district = %location.district, "Checkout location selected.");
    self.state = CheckoutState::PaymentMethod { location };
    Ok(())
  }

  // --- payment method ---

  pub fn choose_payment_method(&mut self, method: PaymentMethod) -> MarketResult<()> {
    let location = match &self.state {
      CheckoutState::PaymentMethod { location } => location.clone(),
      _ => return Err(self.wrong_step("choose a payment method")),
    };
    self.state = match method {
      PaymentMethod::Cash => CheckoutState::CashForm {
        location,
        form: CashForm::default(),
      },
      PaymentMethod::MobileMoney | PaymentMethod::AirtelMoney => CheckoutState::TransferInfo { location, method },
      PaymentMethod::Whatsapp => {
        return Err(MarketError::validation("whatsapp payment is not offered at checkout"));
      }
    };
    debug!(%method, next = %self.step(), "Checkout payment method chosen.");
    Ok(())
  }

  /// Name and phone to attach to a transfer-paid order.
  pub fn set_contact(&mut self, name: Option<String>, phone: Option<String>) {
    self.contact_name = name;
    self.contact_phone = phone;
  }

  // --- transfer ---

  pub fn transfer_instructions(&self) -> Option<TransferInstructions> {
    match &self.state {
      CheckoutState::TransferInfo { method, .. } | CheckoutState::EnterId { method, .. } => {
        self.settings.receiving_number(*method).map(|number| TransferInstructions {
          method: *method,
          receiving_number: number.to_string(),
          amount_due: self.total_amount,
        })
      }
      _ => None,
    }
  }

  /// The buyer states the transfer has been made.
  pub fn confirm_transfer_sent(&mut self) -> MarketResult<()> {
    let (location, method) = match &self.state {
      CheckoutState::TransferInfo { location, method } => (location.clone(), *method),
      _ => return Err(self.wrong_step("confirm the transfer")),
    };
    self.state = CheckoutState::EnterId {
      location,
      method,
      raw_id: String::new(),
    };
    Ok(())
  }

  pub fn enter_transaction_id(&mut self, raw: &str) -> MarketResult<()> {
    match &mut self.state {
      CheckoutState::EnterId { raw_id, .. } => {
        *raw_id = raw.to_string();
        Ok(())
      }
      _ => Err(self.wrong_step("enter a transaction id")),
    }
  }

  /// Whether the submit control should be enabled.
  pub fn can_submit_transaction_id(&self) -> bool {
    match &self.state {
      CheckoutState::EnterId { raw_id, .. } => TransactionId::is_acceptable(raw_id),
      _ => false,
    }
  }

  /// Creates the order and starts waiting for Lock 1. On a validation error
  /// the store is never called; on a store error the step stays `enter_id`.
  #[instrument(name = "CheckoutMachine::submit_transaction_id", skip(self))]
  pub async fn submit_transaction_id(&mut self) -> MarketResult<&Order> {
    let (location, method, raw_id) = match &self.state {
      CheckoutState::EnterId {
        location,
        method,
        raw_id,
      } => (location.clone(), *method, raw_id.clone()),
      _ => return Err(self.wrong_step("submit a transaction id")),
    };
    let transaction_id = TransactionId::parse(&raw_id)?;

    let request = PlaceOrder {
      items: self.items.clone(),
      city: location.city,
      district: location.district,
      payment_method: method,
      total_amount: self.total_amount,
      transaction_id: Some(transaction_id.to_string()),
      customer_name: self.contact_name.clone(),
      phone: self.contact_phone.clone(),
      landmark: None,
    };
    let order = self.repository.create_order(&self.session, request).await?;
    let subscription = self.repository.watch(order.id);
    info!(order_id = %order.id, "Transfer order created, waiting for payment verification.");

    // An admin may already have acted between the insert and the subscribe.
    let current = match self.repository.get_order(order.id).await {
      Ok(current) => current,
      Err(e) => {
        warn!(order_id = %order.id, error = %e, "Catch-up read failed, relying on realtime updates.");
        order
      }
    };
    self.state = CheckoutState::Waiting {
      order: current.clone(),
      subscription,
    };
    self.settle_from(current);
    self.order().ok_or_else(|| MarketError::Internal("order missing after submission".to_string()))
  }

  // --- cash ---

  pub fn update_cash_form(&mut self, form: CashForm) -> MarketResult<()> {
    match &mut self.state {
      CheckoutState::CashForm { form: f, .. } => {
        *f = form;
        Ok(())
      }
      _ => Err(self.wrong_step("fill the cash form")),
    }
  }

  /// Cash needs no transfer verification: the flow ends at `confirmed` while
  /// the order itself stays `pending` until staff act on it.
  #[instrument(name = "CheckoutMachine::submit_cash_form", skip(self))]
  pub async fn submit_cash_form(&mut self) -> MarketResult<&Order> {
    let (location, form) = match &self.state {
      CheckoutState::CashForm { location, form } => (location.clone(), form.clone()),
      _ => return Err(self.wrong_step("submit the cash form")),
    };
    let missing = form.missing_fields();
    if !missing.is_empty() {
      return Err(MarketError::Validation(format!("please fill in: {}", missing.join(", "))));
    }
    let request = PlaceOrder {
      items: self.items.clone(),
      city: location.city,
      district: location.district,
      payment_method: PaymentMethod::Cash,
      total_amount: self.total_amount,
      transaction_id: None,
      customer_name: Some(form.name.trim().to_string()),
      phone: Some(form.phone.trim().to_string()),
      landmark: Some(form.landmark()),
    };
    let order = self.repository.create_order(&self.session, request).await?;
    info!(order_id = %order.id, "Cash order created.");
    self.state = CheckoutState::Confirmed { order };
    self.order().ok_or_else(|| MarketError::Internal("order missing after submission".to_string()))
  }

  // --- waiting ---

  fn settle_from(&mut self, current: Order) {
    if !matches!(self.state, CheckoutState::Waiting { .. }) {
      return;
    }
    match current.status {
      OrderStatus::Pending => {
        if let CheckoutState::Waiting { order, .. } = &mut self.state {
          *order = current;
        }
      }
      OrderStatus::Rejected => {
        info!(order_id = %current.id, "Payment rejected.");
        self.state = CheckoutState::Rejected { order: current };
      }
      OrderStatus::Confirmed | OrderStatus::Shipped | OrderStatus::Delivered => {
        info!(order_id = %current.id, tracking = ?current.tracking_number, "Payment confirmed.");
        self.state = CheckoutState::Confirmed { order: current };
      }
    }
  }

  /// Waits, without timeout, for an admin to confirm or reject the payment.
  /// Returns immediately if the flow is already finished.
  pub async fn wait_for_resolution(&mut self) -> MarketResult<CheckoutStep> {
    loop {
      let step = self.step();
      if step.is_terminal() {
        return Ok(step);
      }
      let event = match &mut self.state {
        CheckoutState::Waiting { subscription, .. } => subscription.next().await,
        _ => {
          return Err(MarketError::Validation(format!(
            "cannot wait for payment verification at the '{}' step",
            step
          )))
        }
      };
      match event {
        Some(event) => self.settle_from(event.order),
        None => return Err(MarketError::Store("order updates are no longer available".to_string())),
      }
    }
  }

  // --- navigation ---

  /// Steps back one screen. Not possible once the order exists.
  pub fn back(&mut self) -> MarketResult<()> {
    let previous = match &self.state {
      CheckoutState::PaymentMethod { location } => CheckoutState::Location {
        city: zones::resolve_city(&location.city).ok(),
        district: zones::resolve_district(&location.city, &location.district).ok(),
      },
      CheckoutState::TransferInfo { location, .. } | CheckoutState::CashForm { location, .. } => {
        CheckoutState::PaymentMethod {
          location: location.clone(),
        }
      }
      CheckoutState::EnterId { location, method, .. } => CheckoutState::TransferInfo {
        location: location.clone(),
        method: *method,
      },
      _ => return Err(self.wrong_step("go back")),
    };
    self.state = previous;
    Ok(())
  }

  /// Leaves the flow. Returns the id of the order if one was already
  /// created; that order is not cancelled.
  pub fn abandon(self) -> Option<OrderId> {
    let order_id = self.order().map(|o| o.id);
    debug!(step = %self.step(), ?order_id, "Checkout abandoned.");
    order_id
  }
}

impl fmt::Debug for CheckoutMachine {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CheckoutMachine")
      .field("step", &self.step())
      .field("total_amount", &self.total_amount)
      .field("order_id", &self.order().map(|o| o.id))
      .finish()
  }
}
