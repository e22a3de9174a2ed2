// marketplace_server/src/web/routes.rs

use actix_web::web;

use crate::errors::AppError;
use crate::state::AppState;
use crate::web::handlers::{admin_handlers, order_handlers, vendor_handlers};

async fn health_check_handler(app_state: web::Data<AppState>) -> actix_web::HttpResponse {
  actix_web::HttpResponse::Ok().json(serde_json::json!({
    "status": "ok",
    "cooling_off_hours": app_state.config.cooling_off_hours,
  }))
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  // Extraction failures use the same JSON error body as everything else.
  cfg
    .app_data(web::JsonConfig::default().error_handler(|err, _req| AppError::Validation(err.to_string()).into()))
    .app_data(web::PathConfig::default().error_handler(|err, _req| AppError::Validation(err.to_string()).into()))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| AppError::Validation(err.to_string()).into()));
  cfg.service(
    web::scope("/api/v1")
      .route("/health", web::get().to(health_check_handler))
      // Buyer surface
      .service(
        web::scope("/orders")
          .route("", web::post().to(order_handlers::create_order_handler))
          .route("", web::get().to(order_handlers::my_orders_handler))
          .route("/{order_id}", web::get().to(order_handlers::get_order_handler))
          .route("/{order_id}/events", web::get().to(order_handlers::order_events_handler))
          .route(
            "/{order_id}/reception",
            web::post().to(order_handlers::confirm_reception_handler),
          ),
      )
      // Lock 1 and Lock 2
      .service(
        web::scope("/admin/orders")
          .route("", web::get().to(admin_handlers::list_orders_handler))
          .route("/events", web::get().to(admin_handlers::admin_order_events_handler))
          .route("/pending", web::get().to(admin_handlers::pending_verifications_handler))
          .route("/releasable", web::get().to(admin_handlers::releasable_orders_handler))
          .route("/{order_id}/confirm", web::post().to(admin_handlers::confirm_payment_handler))
          .route("/{order_id}/reject", web::post().to(admin_handlers::reject_order_handler))
          .route("/{order_id}/release", web::post().to(admin_handlers::release_funds_handler)),
      )
      // Vendor dashboard and fulfillment
      .service(
        web::scope("/vendor/orders")
          .route("", web::get().to(vendor_handlers::vendor_orders_handler))
          .route("/events", web::get().to(vendor_handlers::vendor_order_events_handler))
          .route(
            "/{order_id}/status",
            web::patch().to(vendor_handlers::update_order_status_handler),
          ),
      ),
  );
}
