// marketplace/src/lib.rs

//! Marketplace order lifecycle with dual-lock settlement.
//!
//! An order moves through a buyer checkout, a manual payment verification by
//! an admin (Lock 1), shipping and delivery, and finally a time-locked vendor
//! payout (Lock 2) that only opens once the order has been delivered for the
//! cooling-off period.
//!
//!  - [`checkout::CheckoutMachine`] drives the buyer's steps up to order creation
//!    and waits for the verdict over a realtime [`realtime::Subscription`].
//!  - [`verification::VerificationGate`] confirms or rejects pending orders.
//!  - [`fulfillment::FulfillmentService`] ships and delivers.
//!  - [`release::FundReleaseGate`] marks the vendor payout as paid.
//!
//! All of them talk to a [`store::MarketStore`] and receive the acting user
//! through a [`session::SessionContext`].

pub mod checkout;
pub mod clock;
pub mod error;
pub mod fulfillment;
pub mod notifications;
pub mod order;
pub mod pipeline;
pub mod realtime;
pub mod release;
pub mod repository;
pub mod services;
pub mod session;
pub mod settings;
pub mod store;
pub mod verification;

// --- Re-exports for the Public API ---

pub use crate::checkout::{CashForm, CheckoutMachine, CheckoutStep, TransferInstructions};
pub use crate::clock::{Clock, ManualClock, SystemClock};
pub use crate::error::{ErrorKind, MarketError, MarketResult, StoreError, StoreResult};
pub use crate::fulfillment::FulfillmentService;
pub use crate::notifications::{NoNotifications, OrderNotifications};
pub use crate::order::{
  CommissionRate, CommissionSplit, DeliveryLocation, Order, OrderId, OrderItem, OrderStatus, PaymentMethod,
  PayoutStatus, SubscriptionPlan, TransactionId, UserId,
};
pub use crate::realtime::{ChangeKind, Notifier, OrderEvent, OrderFilter, Subscription};
pub use crate::release::{FundReleaseGate, ReleasableOrder, ReleaseEligibility};
pub use crate::repository::{OrderRepository, PlaceOrder};
pub use crate::services::MarketServices;
pub use crate::session::{CurrentUser, Role, SessionContext, SessionProvider};
pub use crate::settings::MarketSettings;
pub use crate::store::{CatalogEntry, InMemoryStore, MarketStore, NewOrderRow, OrderPatch, OrderQuery, SharedStore};
pub use crate::verification::{compare_ids, ConfirmedPayment, IdComparison, PendingVerification, VerificationGate};
