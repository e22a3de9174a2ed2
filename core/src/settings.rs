// marketplace/src/settings.rs

use crate::order::PaymentMethod;
use chrono::Duration;

/// Tunables for the settlement workflow. The server builds this from its
/// environment configuration.
#[derive(Debug, Clone)]
pub struct MarketSettings {
  /// Wait between delivery and vendor payout, during which buyers may
  /// report a problem.
  pub cooling_off: Duration,
  /// Number buyers send MTN mobile money to.
  pub mobile_money_number: String,
  /// Number buyers send Airtel money to.
  pub airtel_money_number: String,
  pub tracking_prefix: String,
}

impl MarketSettings {
  pub const DEFAULT_COOLING_OFF_HOURS: i64 = 48;

  /// Receiving number shown on the transfer instructions screen.
  pub fn receiving_number(&self, method: PaymentMethod) -> Option<&str> {
    match method {
      PaymentMethod::MobileMoney => Some(&self.mobile_money_number),
      PaymentMethod::AirtelMoney => Some(&self.airtel_money_number),
      PaymentMethod::Cash | PaymentMethod::Whatsapp => None,
    }
  }
}

impl Default for MarketSettings {
  fn default() -> Self {
    MarketSettings {
      cooling_off: Duration::hours(Self::DEFAULT_COOLING_OFF_HOURS),
      mobile_money_number: "+242 06 000 00 00".to_string(),
      airtel_money_number: "+242 05 000 00 00".to_string(),
      tracking_prefix: "TRK".to_string(),
    }
  }
}
