// marketplace/src/order/mod.rs

//! The order record and the rules attached to its fields.

pub mod commission;
pub mod model;
pub mod status;
pub mod tracking;
pub mod transaction_id;
pub mod zones;

pub use commission::{CommissionRate, CommissionSplit, SubscriptionPlan};
pub use model::{Order, OrderId, OrderItem, PaymentMethod, PayoutStatus, UserId};
pub use status::{ensure_transition, OrderStatus};
pub use transaction_id::TransactionId;
pub use zones::DeliveryLocation;
