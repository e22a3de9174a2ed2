// marketplace/src/order/zones.rs

//! Delivery zones. Cities and districts form a closed vocabulary: buyers pick
//! from these lists, they never type a city.

use crate::error::{MarketError, MarketResult};
use serde::{Deserialize, Serialize};

const ZONES: &[(&str, &[&str])] = &[
  (
    "Brazzaville",
    &[
      "Makélékélé",
      "Bacongo",
      "Poto-Poto",
      "Moungali",
      "Ouenzé",
      "Talangaï",
      "Mfilou",
      "Madibou",
      "Djiri",
    ],
  ),
  (
    "Pointe-Noire",
    &[
      "Lumumba",
      "Mvou-Mvou",
      "Tié-Tié",
      "Loandjili",
      "Mongo-Mpoukou",
      "Ngoyo",
    ],
  ),
  ("Dolisie", &["Dolisie Centre", "Tahouet", "Gare"]),
];

pub fn cities() -> impl Iterator<Item = &'static str> {
  ZONES.iter().map(|(city, _)| *city)
}

/// Districts served in `city`, in display order. Empty for unknown cities.
pub fn districts(city: &str) -> &'static [&'static str] {
  find_city(city).map(|(_, d)| d).unwrap_or(&[])
}

fn same_name(a: &str, b: &str) -> bool {
  a.trim().to_lowercase() == b.trim().to_lowercase()
}

fn find_city(city: &str) -> Option<(&'static str, &'static [&'static str])> {
  ZONES.iter().copied().find(|(name, _)| same_name(name, city))
}

/// Canonical spelling of `city`.
pub fn resolve_city(city: &str) -> MarketResult<&'static str> {
  find_city(city)
    .map(|(name, _)| name)
    .ok_or_else(|| MarketError::Validation(format!("we do not deliver to '{}'", city.trim())))
}

/// Canonical spelling of `district` within `city`.
pub fn resolve_district(city: &str, district: &str) -> MarketResult<&'static str> {
  let (city_name, districts) =
    find_city(city).ok_or_else(|| MarketError::Validation(format!("we do not deliver to '{}'", city.trim())))?;
  districts
    .iter()
    .copied()
    .find(|d| same_name(d, district))
    .ok_or_else(|| MarketError::Validation(format!("'{}' is not a district of {}", district.trim(), city_name)))
}

/// A validated city/district pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryLocation {
  pub city: String,
  pub district: String,
}

impl DeliveryLocation {
  pub fn new(city: &str, district: &str) -> MarketResult<Self> {
    let city = resolve_city(city)?;
    let district = resolve_district(city, district)?;
    Ok(DeliveryLocation {
      city: city.to_string(),
      district: district.to_string(),
    })
  }
}
