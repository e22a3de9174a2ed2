// tests/fulfillment_tests.rs
mod common;

use chrono::Duration;
use common::*;
use marketplace::{ErrorKind, OrderStatus, PayoutStatus};
use uuid::Uuid;

#[tokio::test]
async fn seller_ships_and_delivers_own_order() {
  setup_tracing();
  let h = harness();
  let seller_id = Uuid::new_v4();
  let order = place_pending(&h, Uuid::new_v4(), seller_id, 20_000).await;
  h.services.verification.confirm(&admin(), order.id, None).await.unwrap();
  let vendor = seller(seller_id);
  let courier = Uuid::new_v4();

  let shipped = h.services.fulfillment.mark_shipped(&vendor, order.id, Some(courier)).await.unwrap();
  assert_eq!(shipped.status, OrderStatus::Shipped);
  assert_eq!(shipped.logistician_id, Some(courier));
  assert!(shipped.delivered_at.is_none());

  h.clock.advance(Duration::hours(5));
  let delivered = h
    .services
    .fulfillment
    .update_order_status(&vendor, order.id, OrderStatus::Delivered)
    .await
    .unwrap();
  assert_eq!(delivered.status, OrderStatus::Delivered);
  assert_eq!(delivered.delivered_at, Some(start_time() + Duration::hours(5)));
  // Delivery alone never pays the vendor.
  assert_eq!(delivered.payout_status, PayoutStatus::Pending);
}

#[tokio::test]
async fn statuses_only_move_forward() {
  setup_tracing();
  let h = harness();
  let order = place_pending(&h, Uuid::new_v4(), Uuid::new_v4(), 6_000).await;
  let admin = admin();
  let fulfillment = &h.services.fulfillment;

  // Not confirmed yet.
  let err = fulfillment.mark_shipped(&admin, order.id, None).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Precondition);
  let err = fulfillment.mark_delivered(&admin, order.id).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Precondition);

  h.services.verification.confirm(&admin, order.id, None).await.unwrap();
  // Confirmed cannot skip shipping.
  let err = fulfillment.mark_delivered(&admin, order.id).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Precondition);

  fulfillment.mark_shipped(&admin, order.id, None).await.unwrap();
  assert!(fulfillment.mark_shipped(&admin, order.id, None).await.is_err());
  let delivered = fulfillment.mark_delivered(&admin, order.id).await.unwrap();

  // Delivered is final; the timestamp is not moved by a second attempt.
  h.clock.advance(Duration::hours(1));
  assert!(fulfillment.mark_delivered(&admin, order.id).await.is_err());
  assert!(h.services.verification.confirm(&admin, order.id, None).await.is_err());
  let stored = h.services.repository.get_order(order.id).await.unwrap();
  assert_eq!(stored.status, OrderStatus::Delivered);
  assert_eq!(stored.delivered_at, delivered.delivered_at);
}

#[tokio::test]
async fn vendor_surface_refuses_admin_transitions() {
  setup_tracing();
  let h = harness();
  let seller_id = Uuid::new_v4();
  let order = place_pending(&h, Uuid::new_v4(), seller_id, 6_000).await;
  let vendor = seller(seller_id);

  for status in [OrderStatus::Pending, OrderStatus::Confirmed, OrderStatus::Rejected] {
    let err = h
      .services
      .fulfillment
      .update_order_status(&vendor, order.id, status)
      .await
      .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation, "{status}");
  }
  assert_eq!(
    h.services.repository.get_order(order.id).await.unwrap().status,
    OrderStatus::Pending
  );
}

#[tokio::test]
async fn sellers_cannot_move_other_sellers_orders() {
  setup_tracing();
  let h = harness();
  let order = place_pending(&h, Uuid::new_v4(), Uuid::new_v4(), 6_000).await;
  h.services.verification.confirm(&admin(), order.id, None).await.unwrap();

  let err = h
    .services
    .fulfillment
    .mark_shipped(&seller(Uuid::new_v4()), order.id, None)
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Forbidden);

  let err = h
    .services
    .fulfillment
    .mark_shipped(&buyer(Uuid::new_v4()), order.id, None)
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Forbidden);
}

#[tokio::test]
async fn logistician_shipping_is_recorded_as_handler() {
  setup_tracing();
  let h = harness();
  let order = place_pending(&h, Uuid::new_v4(), Uuid::new_v4(), 6_000).await;
  h.services.verification.confirm(&admin(), order.id, None).await.unwrap();
  let courier = logistician();

  let shipped = h
    .services
    .fulfillment
    .update_order_status(&courier, order.id, OrderStatus::Shipped)
    .await
    .unwrap();
  assert_eq!(shipped.logistician_id, courier.current_user().map(|u| u.id));
}

#[tokio::test]
async fn reception_is_informational() {
  setup_tracing();
  let h = harness();
  let buyer_id = Uuid::new_v4();
  let order = place_pending(&h, buyer_id, Uuid::new_v4(), 6_000).await;
  let me = buyer(buyer_id);

  let err = h.services.fulfillment.confirm_reception(&me, order.id).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Precondition);

  let delivered = deliver(&h, &order).await;
  let err = h
    .services
    .fulfillment
    .confirm_reception(&buyer(Uuid::new_v4()), order.id)
    .await
    .unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Forbidden);

  h.clock.advance(Duration::hours(3));
  let received = h.services.fulfillment.confirm_reception(&me, order.id).await.unwrap();
  assert_eq!(received.status, OrderStatus::Delivered);
  assert_eq!(received.delivered_at, delivered.delivered_at);
  assert_eq!(received.reception_confirmed_at, Some(start_time() + Duration::hours(3)));

  h.clock.advance(Duration::hours(3));
  let again = h.services.fulfillment.confirm_reception(&me, order.id).await.unwrap();
  assert_eq!(again.reception_confirmed_at, received.reception_confirmed_at);
}
