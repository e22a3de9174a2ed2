// marketplace/src/order/transaction_id.rs

use crate::error::{MarketError, MarketResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A mobile-money transaction id as printed on the provider's SMS receipt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TransactionId(String);

impl TransactionId {
  pub const LEN: usize = 15;

  /// Keeps only ASCII digits.
  pub fn normalize(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
  }

  /// Accepts input with separators or spaces as long as exactly 15 digits
  /// remain after stripping.
  pub fn parse(raw: &str) -> MarketResult<Self> {
    let digits = Self::normalize(raw);
    if digits.len() == Self::LEN {
      Ok(TransactionId(digits))
    } else {
      Err(MarketError::validation(format!(
        "transaction id must contain exactly {} digits, got {}",
        Self::LEN,
        digits.len()
      )))
    }
  }

  pub fn is_acceptable(raw: &str) -> bool {
    Self::normalize(raw).len() == Self::LEN
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl fmt::Display for TransactionId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl TryFrom<String> for TransactionId {
  type Error = MarketError;

  fn try_from(value: String) -> Result<Self, Self::Error> {
    TransactionId::parse(&value)
  }
}

impl From<TransactionId> for String {
  fn from(value: TransactionId) -> Self {
    value.0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_exactly_fifteen_digits() {
    assert_eq!(TransactionId::parse("123456789012345").unwrap().as_str(), "123456789012345");
    assert_eq!(TransactionId::parse(" 12345-67890 12345 ").unwrap().as_str(), "123456789012345");
    // Letters and separators from an SMS receipt are dropped.
    assert_eq!(TransactionId::parse("MP240101.1234.A12345").unwrap().as_str(), "240101123412345");
  }

  #[test]
  fn rejects_other_lengths() {
    for raw in ["", "12345678901234", "1234567890123456", "abcdefghijklmno", "MP240101.1234.A1234"] {
      assert!(!TransactionId::is_acceptable(raw), "{:?}", raw);
      assert!(matches!(TransactionId::parse(raw), Err(MarketError::Validation(_))));
    }
  }

  #[test]
  fn deserialization_validates() {
    let ok: TransactionId = serde_json::from_str("\"123 456 789 012 345\"").unwrap();
    assert_eq!(ok.as_str(), "123456789012345");
    assert!(serde_json::from_str::<TransactionId>("\"42\"").is_err());
  }
}
