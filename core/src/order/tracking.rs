// marketplace/src/order/tracking.rs

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Builds a tracking number such as `TRK-20261019-4F9A1C2B` for delivery
/// correspondence. Uniqueness comes from a fresh v4 uuid.
pub fn generate(prefix: &str, now: DateTime<Utc>) -> String {
  let entropy = Uuid::new_v4().simple().to_string();
  format!(
    "{}-{}-{}",
    prefix,
    now.format("%Y%m%d"),
    entropy[..8].to_ascii_uppercase()
  )
}
