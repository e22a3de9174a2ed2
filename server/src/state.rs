// marketplace_server/src/state.rs
use crate::config::AppConfig;
use marketplace::MarketServices;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub services: Arc<MarketServices>,
  pub config: Arc<AppConfig>,
}
