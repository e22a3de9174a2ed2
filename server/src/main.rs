// marketplace_server/src/main.rs

mod config;
mod db;
mod errors;
mod services;
mod state;
mod web;

use crate::config::{AppConfig, LogFormat};
use crate::db::PgStore;
use crate::services::notifications::EmailNotifications;
use crate::state::AppState;

use actix_web::{web as actix_data, App, HttpServer};
use anyhow::Context;
use marketplace::{MarketServices, SharedStore, SystemClock};
use std::sync::Arc;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
  let builder = tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_span_events(FmtSpan::CLOSE);
  match format {
    LogFormat::Json => builder.json().init(),
    LogFormat::Pretty => builder.init(),
  }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
  init_tracing(LogFormat::from_env()?);

  tracing::info!("Starting marketplace order server...");

  let app_config = Arc::new(AppConfig::from_env().context("loading configuration")?);

  let pool = db::init_pool(&app_config.database_url, app_config.run_migrations)
    .await
    .context("initializing the database")?;
  let store: SharedStore = Arc::new(PgStore::new(pool));

  let services = MarketServices::new(
    store,
    Arc::new(SystemClock),
    app_config.market_settings(),
    Arc::new(EmailNotifications::new(app_config.notification_sender.clone())),
  );

  let app_state = AppState {
    services: Arc::new(services),
    config: app_config.clone(),
  };

  let server_address = format!("{}:{}", app_config.server_host, app_config.server_port);
  tracing::info!(
    address = %server_address,
    cooling_off_hours = app_config.cooling_off_hours,
    "Server listening."
  );

  HttpServer::new(move || {
    App::new()
      .app_data(actix_data::Data::new(app_state.clone()))
      .wrap(TracingLogger::default())
      .configure(web::configure_app_routes)
  })
  .bind(&server_address)
  .with_context(|| format!("binding {}", server_address))?
  .run()
  .await?;

  tracing::info!("Server stopped.");
  Ok(())
}
