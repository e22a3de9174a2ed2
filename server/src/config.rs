// marketplace_server/src/config.rs

use crate::errors::{AppError, Result};
use chrono::Duration;
use dotenvy::dotenv;
use marketplace::MarketSettings;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
  Pretty,
  Json,
}

impl FromStr for LogFormat {
  type Err = AppError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "pretty" | "text" => Ok(LogFormat::Pretty),
      "json" => Ok(LogFormat::Json),
      other => Err(AppError::Config(format!("Invalid LOG_FORMAT '{}', expected 'pretty' or 'json'", other))),
    }
  }
}

impl LogFormat {
  /// `LOG_FORMAT`, pretty when unset. Read on its own because the log
  /// subscriber must exist before the rest of the configuration loads.
  pub fn from_env() -> Result<Self> {
    dotenv().ok();
    match env::var("LOG_FORMAT") {
      Ok(raw) => raw.parse(),
      Err(_) => Ok(LogFormat::Pretty),
    }
  }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  pub database_url: String,
  pub run_migrations: bool,

  /// Hours between delivery and the vendor payout becoming releasable.
  pub cooling_off_hours: i64,
  pub mobile_money_number: String,
  pub airtel_money_number: String,

  pub notification_sender: String,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present

    let get_env = |var_name: &str| {
      env::var(var_name).map_err(|e| AppError::Config(format!("Missing environment variable '{}': {}", var_name, e)))
    };

    let server_host = get_env("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let server_port = get_env("SERVER_PORT")
      .unwrap_or_else(|_| "8080".to_string())
      .parse::<u16>()
      .map_err(|e| AppError::Config(format!("Invalid SERVER_PORT: {}", e)))?;
    let database_url = get_env("DATABASE_URL")?;
    let run_migrations = get_env("RUN_MIGRATIONS")
      .unwrap_or_else(|_| "true".to_string())
      .parse::<bool>()
      .map_err(|e| AppError::Config(format!("Invalid RUN_MIGRATIONS value: {}", e)))?;

    let cooling_off_hours = get_env("COOLING_OFF_HOURS")
      .unwrap_or_else(|_| MarketSettings::DEFAULT_COOLING_OFF_HOURS.to_string())
      .parse::<i64>()
      .map_err(|e| AppError::Config(format!("Invalid COOLING_OFF_HOURS: {}", e)))?;
    if cooling_off_hours < 0 {
      return Err(AppError::Config("COOLING_OFF_HOURS cannot be negative".to_string()));
    }

    let defaults = MarketSettings::default();
    let mobile_money_number = get_env("MOBILE_MONEY_NUMBER").unwrap_or(defaults.mobile_money_number);
    let airtel_money_number = get_env("AIRTEL_MONEY_NUMBER").unwrap_or(defaults.airtel_money_number);
    let notification_sender =
      get_env("NOTIFICATION_SENDER").unwrap_or_else(|_| "commandes@marketplace.cg".to_string());

    tracing::info!("Application configuration loaded successfully.");

    Ok(Self {
      server_host,
      server_port,
      database_url,
      run_migrations,
      cooling_off_hours,
      mobile_money_number,
      airtel_money_number,
      notification_sender,
    })
  }

  pub fn market_settings(&self) -> MarketSettings {
    MarketSettings {
      cooling_off: Duration::hours(self.cooling_off_hours),
      mobile_money_number: self.mobile_money_number.clone(),
      airtel_money_number: self.airtel_money_number.clone(),
      ..MarketSettings::default()
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serial_test::serial;

  const VARS: [&str; 5] = ["LOG_FORMAT", "DATABASE_URL", "COOLING_OFF_HOURS", "SERVER_PORT", "RUN_MIGRATIONS"];

  fn clear_env() {
    for var in VARS {
      env::remove_var(var);
    }
  }

  #[test]
  fn log_format_parses_case_insensitively() {
    assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
    assert_eq!(" pretty ".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
    assert!("xml".parse::<LogFormat>().is_err());
  }

  #[test]
  #[serial]
  fn log_format_comes_from_the_environment() {
    clear_env();
    assert_eq!(LogFormat::from_env().unwrap(), LogFormat::Pretty);
    env::set_var("LOG_FORMAT", "json");
    assert_eq!(LogFormat::from_env().unwrap(), LogFormat::Json);
    env::set_var("LOG_FORMAT", "xml");
    assert!(matches!(LogFormat::from_env(), Err(AppError::Config(_))));
    clear_env();
  }

  #[test]
  #[serial]
  fn config_defaults_and_required_values() {
    clear_env();
    assert!(matches!(AppConfig::from_env(), Err(AppError::Config(m)) if m.contains("DATABASE_URL")));

    env::set_var("DATABASE_URL", "postgres://localhost/market");
    let config = AppConfig::from_env().unwrap();
    assert_eq!(config.server_port, 8080);
    assert!(config.run_migrations);
    assert_eq!(config.cooling_off_hours, 48);
    assert_eq!(config.market_settings().cooling_off, Duration::hours(48));

    env::set_var("COOLING_OFF_HOURS", "-1");
    assert!(matches!(AppConfig::from_env(), Err(AppError::Config(_))));
    env::set_var("COOLING_OFF_HOURS", "72");
    assert_eq!(AppConfig::from_env().unwrap().market_settings().cooling_off, Duration::hours(72));
    clear_env();
  }
}
