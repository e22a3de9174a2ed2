// marketplace_server/src/web/handlers/vendor_handlers.rs

use actix_web::{web, HttpResponse};
use marketplace::OrderStatus;
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::RequestSession;
use crate::web::handlers::order_handlers::{event_stream, StatusFilter};

#[derive(Debug, Deserialize)]
pub struct UpdateStatusPayload {
  pub status: OrderStatus,
}

#[instrument(name = "handler::vendor_orders", skip(app_state, session))]
pub async fn vendor_orders_handler(
  app_state: web::Data<AppState>,
  session: RequestSession,
  params: web::Query<StatusFilter>,
) -> Result<HttpResponse, AppError> {
  let orders = app_state
    .services
    .repository
    .seller_orders(&session.0, params.into_inner().status)
    .await?;
  Ok(HttpResponse::Ok().json(json!({ "orders": orders })))
}

#[instrument(name = "handler::vendor_order_events", skip_all)]
pub async fn vendor_order_events_handler(
  app_state: web::Data<AppState>,
  session: RequestSession,
) -> Result<HttpResponse, AppError> {
  let repository = &app_state.services.repository;
  let subscription = repository.seller_feed(&session.0)?;
  let orders = repository.seller_orders(&session.0, None).await?;
  Ok(event_stream(&orders, subscription))
}

#[instrument(
  name = "handler::update_order_status",
  skip(app_state, session, payload),
  fields(status = %payload.status)
)]
pub async fn update_order_status_handler(
  app_state: web::Data<AppState>,
  session: RequestSession,
  path: web::Path<Uuid>,
  payload: web::Json<UpdateStatusPayload>,
) -> Result<HttpResponse, AppError> {
  let order = app_state
    .services
    .fulfillment
    .update_order_status(&session.0, path.into_inner(), payload.status)
    .await?;
  Ok(HttpResponse::Ok().json(json!({ "order": order })))
}
