// marketplace_server/src/web/handlers/order_handlers.rs

use actix_web::http::header;
use actix_web::web::{self, Bytes};
use actix_web::HttpResponse;
use futures_util::future::ready;
use futures_util::{stream, StreamExt};
use marketplace::{CurrentUser, MarketError, Order, OrderStatus, PlaceOrder, Role, SessionContext, Subscription};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::extractors::RequestSession;

/// `?status=` on list and feed routes.
#[derive(Debug, Default, Deserialize)]
pub struct StatusFilter {
  pub status: Option<OrderStatus>,
}

/// Staff see every order; sellers see orders with their products; buyers see
/// their own. Orders placed without an account are visible to anonymous
/// callers holding the id.
pub(crate) fn ensure_can_view(session: &SessionContext, order: &Order) -> Result<(), AppError> {
  let allowed = match session.current_user() {
    Some(CurrentUser {
      role: Role::Admin | Role::Logistician,
      ..
    }) => true,
    Some(CurrentUser { id, role: Role::Seller }) => order.involves_seller(id),
    Some(CurrentUser { id, role: Role::Buyer }) => order.buyer_id == Some(id),
    None => order.buyer_id.is_none(),
  };
  if allowed {
    Ok(())
  } else {
    Err(MarketError::Forbidden(format!("order {} belongs to another account", order.id)).into())
  }
}

#[instrument(
  name = "handler::create_order",
  skip(app_state, session, payload),
  fields(method = %payload.payment_method, items = payload.items.len())
)]
pub async fn create_order_handler(
  app_state: web::Data<AppState>,
  session: RequestSession,
  payload: web::Json<PlaceOrder>,
) -> Result<HttpResponse, AppError> {
  let order = app_state
    .services
    .repository
    .create_order(&session.0, payload.into_inner())
    .await?;
  info!(order_id = %order.id, order_number = order.order_number, "Order placed via API.");
  Ok(HttpResponse::Created().json(json!({ "order": order })))
}

#[instrument(name = "handler::my_orders", skip_all)]
pub async fn my_orders_handler(
  app_state: web::Data<AppState>,
  session: RequestSession,
) -> Result<HttpResponse, AppError> {
  let orders = app_state.services.repository.buyer_orders(&session.0).await?;
  Ok(HttpResponse::Ok().json(json!({ "orders": orders })))
}

#[instrument(name = "handler::get_order", skip(app_state, session))]
pub async fn get_order_handler(
  app_state: web::Data<AppState>,
  session: RequestSession,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order = app_state.services.repository.get_order(path.into_inner()).await?;
  ensure_can_view(&session.0, &order)?;
  let eligibility = app_state.services.release.eligibility(&order);
  Ok(HttpResponse::Ok().json(json!({ "order": order, "release": eligibility })))
}

fn sse_frame<T: Serialize>(event: &str, payload: &T) -> Bytes {
  match serde_json::to_string(payload) {
    Ok(data) => Bytes::from(format!("event: {}\ndata: {}\n\n", event, data)),
    Err(e) => {
      warn!(error = %e, event, "Could not serialize order event.");
      Bytes::from(format!(": dropped unserializable {} event\n\n", event))
    }
  }
}

/// A `snapshot` frame with `current`, then one `order` frame per change
/// until the client disconnects.
pub(crate) fn event_stream<T: Serialize>(current: &T, subscription: Subscription) -> HttpResponse {
  let snapshot = stream::once(ready(Ok::<_, Infallible>(sse_frame("snapshot", current))));
  let updates = stream::unfold(subscription, |mut subscription| async move {
    let event = subscription.next().await?;
    Some((Ok::<_, Infallible>(sse_frame("order", &event)), subscription))
  });
  HttpResponse::Ok()
    .content_type("text/event-stream")
    .insert_header((header::CACHE_CONTROL, "no-cache"))
    .streaming(snapshot.chain(updates))
}

/// Server-sent events for one order.
#[instrument(name = "handler::order_events", skip(app_state, session))]
pub async fn order_events_handler(
  app_state: web::Data<AppState>,
  session: RequestSession,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let id = path.into_inner();
  let repository = &app_state.services.repository;
  // Subscribe before reading so no change falls between the two.
  let subscription = repository.watch(id);
  let order = repository.get_order(id).await?;
  ensure_can_view(&session.0, &order)?;
  Ok(event_stream(&order, subscription))
}

#[instrument(name = "handler::confirm_reception", skip(app_state, session))]
pub async fn confirm_reception_handler(
  app_state: web::Data<AppState>,
  session: RequestSession,
  path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
  let order = app_state
    .services
    .fulfillment
    .confirm_reception(&session.0, path.into_inner())
    .await?;
  Ok(HttpResponse::Ok().json(json!({ "order": order })))
}
