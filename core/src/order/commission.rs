// marketplace/src/order/commission.rs

//! Commission split between the marketplace and the vendor.
//!
//! The rate comes from the seller's subscription plan at order-creation time
//! and is frozen into the order. Rates are held in basis points so that the
//! split stays in whole currency units.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPlan {
  #[default]
  Basic,
  Pro,
  Premium,
}

impl SubscriptionPlan {
  /// Profiles store the plan as free text; anything unrecognised is billed
  /// at the base rate.
  pub fn from_profile(raw: Option<&str>) -> Self {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
      Some("pro") => SubscriptionPlan::Pro,
      Some("premium") => SubscriptionPlan::Premium,
      _ => SubscriptionPlan::Basic,
    }
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      SubscriptionPlan::Basic => "basic",
      SubscriptionPlan::Pro => "pro",
      SubscriptionPlan::Premium => "premium",
    }
  }

  pub fn commission_rate(&self) -> CommissionRate {
    match self {
      SubscriptionPlan::Basic => CommissionRate::BASE,
      SubscriptionPlan::Pro => CommissionRate::from_basis_points(700),
      SubscriptionPlan::Premium => CommissionRate::from_basis_points(400),
    }
  }
}

impl fmt::Display for SubscriptionPlan {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// A fraction of the order total, in hundredths of a percent.
/// Never above 100%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct CommissionRate(u32);

impl CommissionRate {
  const SCALE: i64 = 10_000;

  /// 10%, charged when the seller has no paid plan or the plan is unknown.
  pub const BASE: CommissionRate = CommissionRate(1_000);

  /// Rates above 10,000 bps are clamped to 100%.
  pub const fn from_basis_points(bps: u32) -> Self {
    if bps > Self::SCALE as u32 {
      CommissionRate(Self::SCALE as u32)
    } else {
      CommissionRate(bps)
    }
  }

  pub fn basis_points(&self) -> u32 {
    self.0
  }

  pub fn as_fraction(&self) -> f64 {
    f64::from(self.0) / Self::SCALE as f64
  }

  /// `round(total * rate)`, halves rounded up.
  pub fn apply(&self, total: i64) -> i64 {
    let scaled = i128::from(total) * i128::from(self.0);
    let scale = i128::from(Self::SCALE);
    let rounded = if scaled >= 0 {
      (scaled + scale / 2) / scale
    } else {
      -((-scaled + scale / 2 - 1) / scale)
    };
    // |rounded| <= |total| because the rate is at most 100%.
    rounded as i64
  }
}

impl From<u32> for CommissionRate {
  fn from(bps: u32) -> Self {
    CommissionRate::from_basis_points(bps)
  }
}

impl From<CommissionRate> for u32 {
  fn from(rate: CommissionRate) -> Self {
    rate.0
  }
}

impl Default for CommissionRate {
  fn default() -> Self {
    CommissionRate::BASE
  }
}

impl fmt::Display for CommissionRate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CommissionSplit {
  pub total_amount: i64,
  pub commission_rate: CommissionRate,
  pub commission_amount: i64,
  pub vendor_payout: i64,
}

impl CommissionSplit {
  pub fn compute(total_amount: i64, commission_rate: CommissionRate) -> Self {
    let commission_amount = commission_rate.apply(total_amount);
    CommissionSplit {
      total_amount,
      commission_rate,
      commission_amount,
      vendor_payout: total_amount - commission_amount,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pro_plan_on_ten_thousand() {
    let split = CommissionSplit::compute(10_000, SubscriptionPlan::Pro.commission_rate());
    assert_eq!(split.commission_amount, 700);
    assert_eq!(split.vendor_payout, 9_300);
  }

  #[test]
  fn split_always_sums_to_total() {
    for plan in [SubscriptionPlan::Basic, SubscriptionPlan::Pro, SubscriptionPlan::Premium] {
      for total in [0_i64, 1, 5, 14, 15, 99, 1_234, 7_777, 10_005, 2_500_001] {
        let split = CommissionSplit::compute(total, plan.commission_rate());
        assert_eq!(split.commission_amount + split.vendor_payout, total);
      }
    }
  }

  #[test]
  fn rounds_half_up() {
    // 4% of 25 is exactly 1.0, 4% of 37 is 1.48, 4% of 38 is 1.52.
    let premium = SubscriptionPlan::Premium.commission_rate();
    assert_eq!(premium.apply(25), 1);
    assert_eq!(premium.apply(37), 1);
    assert_eq!(premium.apply(38), 2);
    // 10% of 15 is 1.5.
    assert_eq!(CommissionRate::BASE.apply(15), 2);
    assert_eq!(CommissionRate::BASE.apply(14), 1);
  }

  #[test]
  fn unknown_plans_bill_the_base_rate() {
    assert_eq!(SubscriptionPlan::from_profile(Some(" PRO ")), SubscriptionPlan::Pro);
    assert_eq!(SubscriptionPlan::from_profile(Some("premium")), SubscriptionPlan::Premium);
    assert_eq!(SubscriptionPlan::from_profile(Some("gold")), SubscriptionPlan::Basic);
    assert_eq!(SubscriptionPlan::from_profile(None), SubscriptionPlan::Basic);
    assert_eq!(SubscriptionPlan::Basic.commission_rate(), CommissionRate::BASE);
  }

  #[test]
  fn rates_are_capped_at_the_whole_total() {
    let full = CommissionRate::from_basis_points(25_000);
    assert_eq!(full.basis_points(), 10_000);
    assert_eq!(full.apply(i64::MAX), i64::MAX);
    assert_eq!(full.apply(i64::MIN + 1), i64::MIN + 1);
    let split = CommissionSplit::compute(8_000, full);
    assert_eq!((split.commission_amount, split.vendor_payout), (8_000, 0));

    let stored: CommissionRate = serde_json::from_str("40000").unwrap();
    assert_eq!(stored.basis_points(), 10_000);
    assert_eq!(serde_json::to_string(&SubscriptionPlan::Pro.commission_rate()).unwrap(), "700");
  }

  #[test]
  fn displays_as_percentage() {
    assert_eq!(CommissionRate::BASE.to_string(), "10.00%");
    assert_eq!(SubscriptionPlan::Pro.commission_rate().to_string(), "7.00%");
    assert!((SubscriptionPlan::Premium.commission_rate().as_fraction() - 0.04).abs() < f64::EPSILON);
  }
}
