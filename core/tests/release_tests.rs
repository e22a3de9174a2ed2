// tests/release_tests.rs
mod common;

use chrono::Duration;
use common::*;
use marketplace::{ErrorKind, MarketError, OrderStatus, PayoutStatus, ReleaseEligibility};
use uuid::Uuid;

#[tokio::test]
async fn funds_unlock_after_forty_eight_hours() {
  setup_tracing();
  let h = harness();
  let order = place_pending(&h, Uuid::new_v4(), Uuid::new_v4(), 50_000).await;
  let delivered = deliver(&h, &order).await;
  let delivered_at = delivered.delivered_at.unwrap();
  let admin = admin();

  h.clock.set(delivered_at + Duration::hours(47));
  let err = h.services.release.release(&admin, order.id).await.unwrap_err();
  match err {
    MarketError::NotYetEligible { eligible_at } => assert_eq!(eligible_at, delivered_at + Duration::hours(48)),
    other => panic!("expected NotYetEligible, got {other:?}"),
  }
  assert!(err_message_mentions_eligibility(&h, &admin, order.id).await);
  assert_eq!(
    h.services.repository.get_order(order.id).await.unwrap().payout_status,
    PayoutStatus::Pending
  );

  h.clock.set(delivered_at + Duration::hours(48));
  let released = h.services.release.release(&admin, order.id).await.unwrap();
  assert_eq!(released.payout_status, PayoutStatus::Paid);
  assert_eq!(released.status, OrderStatus::Delivered);
  assert!(h.notifications.sent_for(order.id).contains(&"funds_released"));
}

async fn err_message_mentions_eligibility(h: &Harness, admin: &marketplace::SessionContext, id: Uuid) -> bool {
  match h.services.release.release(admin, id).await {
    Err(e) => e.to_string().contains("not yet eligible"),
    Ok(_) => false,
  }
}

#[tokio::test]
async fn one_minute_early_is_still_locked() {
  setup_tracing();
  let h = harness();
  let order = place_pending(&h, Uuid::new_v4(), Uuid::new_v4(), 10_000).await;
  let delivered_at = deliver(&h, &order).await.delivered_at.unwrap();
  let admin = admin();

  h.clock.set(delivered_at + Duration::hours(47) + Duration::minutes(59));
  let err = h.services.release.release(&admin, order.id).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Precondition);

  h.clock.advance(Duration::minutes(1));
  h.services.release.release(&admin, order.id).await.unwrap();
}

#[tokio::test]
async fn release_happens_once() {
  setup_tracing();
  let h = harness();
  let order = place_pending(&h, Uuid::new_v4(), Uuid::new_v4(), 10_000).await;
  deliver(&h, &order).await;
  h.clock.advance(Duration::days(3));
  let admin = admin();

  h.services.release.release(&admin, order.id).await.unwrap();
  let err = h.services.release.release(&admin, order.id).await.unwrap_err();
  assert!(matches!(err, MarketError::PayoutAlreadyReleased), "got {err:?}");
}

#[tokio::test]
async fn undelivered_orders_cannot_be_released() {
  setup_tracing();
  let h = harness();
  let order = place_pending(&h, Uuid::new_v4(), Uuid::new_v4(), 10_000).await;
  let admin = admin();
  h.clock.advance(Duration::days(10));

  let err = h.services.release.release(&admin, order.id).await.unwrap_err();
  assert!(matches!(err, MarketError::NotDelivered { status: OrderStatus::Pending }), "got {err:?}");

  h.services.verification.confirm(&admin, order.id, None).await.unwrap();
  h.services.fulfillment.mark_shipped(&admin, order.id, None).await.unwrap();
  h.clock.advance(Duration::days(10));
  let err = h.services.release.release(&admin, order.id).await.unwrap_err();
  assert!(matches!(err, MarketError::NotDelivered { status: OrderStatus::Shipped }), "got {err:?}");

  let err = h.services.release.release(&admin, Uuid::new_v4()).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn only_admins_release_funds() {
  setup_tracing();
  let h = harness();
  let seller_id = Uuid::new_v4();
  let order = place_pending(&h, Uuid::new_v4(), seller_id, 10_000).await;
  deliver(&h, &order).await;
  h.clock.advance(Duration::days(3));

  let err = h.services.release.release(&seller(seller_id), order.id).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Forbidden);
  assert!(h.services.release.releasable_orders(&seller(seller_id)).await.is_err());
}

#[tokio::test]
async fn releasable_orders_show_their_countdown() {
  setup_tracing();
  let h = harness();
  let early = place_pending(&h, Uuid::new_v4(), Uuid::new_v4(), 10_000).await;
  deliver(&h, &early).await;
  h.clock.advance(Duration::hours(30));
  let late = place_pending(&h, Uuid::new_v4(), Uuid::new_v4(), 20_000).await;
  deliver(&h, &late).await;
  place_pending(&h, Uuid::new_v4(), Uuid::new_v4(), 30_000).await;
  h.clock.advance(Duration::hours(20));

  let listed = h.services.release.releasable_orders(&admin()).await.unwrap();
  assert_eq!(listed.len(), 2);
  assert_eq!(listed[0].order.id, early.id);
  assert_eq!(listed[0].eligibility, ReleaseEligibility::Eligible);
  assert_eq!(listed[1].order.id, late.id);
  match listed[1].eligibility {
    ReleaseEligibility::CoolingOff { remaining, .. } => assert_eq!(remaining, Duration::hours(28)),
    other => panic!("expected a countdown, got {other:?}"),
  }
  assert_eq!(h.services.release.eligibility(&listed[1].order), listed[1].eligibility);
}

#[tokio::test]
async fn commission_split_is_untouched_by_release() {
  setup_tracing();
  let h = harness();
  let seller_id = Uuid::new_v4();
  h.store.set_subscription_plan(seller_id, "premium");
  let order = place_pending(&h, Uuid::new_v4(), seller_id, 12_345).await;
  deliver(&h, &order).await;
  h.clock.advance(Duration::hours(48));

  let released = h.services.release.release(&admin(), order.id).await.unwrap();
  assert_eq!(released.commission_amount, order.commission_amount);
  assert_eq!(released.vendor_payout, order.vendor_payout);
  assert_eq!(released.commission_amount + released.vendor_payout, 12_345);
}
