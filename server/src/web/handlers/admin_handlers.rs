// marketplace_server/src/web/handlers/admin_handlers.rs

use actix_web::{web, HttpResponse};
use marketplace::{compare_ids, OrderQuery, OrderStatus, PayoutStatus};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::RequestSession;
use crate::web::handlers::order_handlers::{event_stream, StatusFilter};

#[derive(Debug, Default, Deserialize)]
pub struct OrderListParams {
  pub status: Option<OrderStatus>,
  pub payout_status: Option<PayoutStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfirmPaymentPayload {
  /// Free-text reference of the verifying admin.
  pub admin_ref: Option<String>,
  /// Transaction id as read on the provider's SMS, for the side-by-side diff.
  pub sms_transaction_id: Option<String>,
}

#[instrument(name = "handler::list_orders", skip(app_state, session))]
pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  session: RequestSession,
  params: web::Query<OrderListParams>,
) -> Result<HttpResponse, AppError> {
  let params = params.into_inner();
  let query = OrderQuery {
    status: params.status,
    payout_status: params.payout_status,
    ..Default::default()
  };
  let orders = app_state.services.repository.staff_orders(&session.0, query).await?;
  Ok(HttpResponse::Ok().json(json!({ "orders": orders })))
}

/// Live admin dashboard, optionally narrowed to one status.
#[instrument(name = "handler::admin_order_events", skip(app_state, session))]
pub async fn admin_order_events_handler(
  app_state: web::Data<AppState>,
  session: RequestSession,
  params: web::Query<StatusFilter>,
) -> Result<HttpResponse, AppError> {
  let status = params.into_inner().status;
  let repository = &app_state.services.repository;
  let subscription = repository.staff_feed(&session.0, status)?;
  let query = OrderQuery {
    status,
    ..Default::default()
  };
  let orders = repository.staff_orders(&session.0, query).await?;
  Ok(event_stream(&orders, subscription))
}

#[instrument(name = "handler::pending_verifications", skip_all)]
pub async fn pending_verifications_handler(
  app_state: web::Data<AppState>,
  session: RequestSession,
) -> Result<HttpResponse, AppError> {
  let pending = app_state.services.verification.pending_verifications(&session.0).await?;
  Ok(HttpResponse::Ok().json(json!({ "orders": pending })))
}

#[instrument(name = "handler::confirm_payment", skip(app_state, session, payload))]
pub async fn confirm_payment_handler(
  app_state: web::Data<AppState>,
  session: RequestSession,
  path: web::Path<Uuid>,
  payload: Option<web::Json<ConfirmPaymentPayload>>,
) -> Result<HttpResponse, AppError> {
  let payload = payload.map(web::Json::into_inner).unwrap_or_default();
  let confirmed = app_state
    .services
    .verification
    .confirm(&session.0, path.into_inner(), payload.admin_ref)
    .await?;

  // The diff is advisory: the admin has already decided.
  let comparison = payload.sms_transaction_id.map(|sms| {
    let submitted = confirmed.order.transaction_id.as_ref().map(|t| t.as_str()).unwrap_or_default();
    compare_ids(submitted, &sms)
  });
  if let Some(cmp) = comparison.as_ref().filter(|c| !c.matches) {
    info!(mismatched = ?cmp.mismatched_positions, "Payment confirmed despite differing transaction ids.");
  }
  Ok(HttpResponse::Ok().json(json!({
    "tracking_number": confirmed.tracking_number,
    "order": confirmed.order,
    "comparison": comparison,
  })))
}

#[instrument(name = "handler::reject_order", skip(app_state, session))]
pub async fn reject_order_handler(
  app_state: web::Data<AppState>,
  session: RequestSession,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order = app_state.services.verification.reject(&session.0, path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(json!({ "order": order })))
}

#[instrument(name = "handler::release_funds", skip(app_state, session))]
pub async fn release_funds_handler(
  app_state: web::Data<AppState>,
  session: RequestSession,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order = app_state.services.release.release(&session.0, path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(json!({ "order": order })))
}

#[instrument(name = "handler::releasable_orders", skip_all)]
pub async fn releasable_orders_handler(
  app_state: web::Data<AppState>,
  session: RequestSession,
) -> Result<HttpResponse, AppError> {
  let orders = app_state.services.release.releasable_orders(&session.0).await?;
  Ok(HttpResponse::Ok().json(json!({ "orders": orders })))
}
