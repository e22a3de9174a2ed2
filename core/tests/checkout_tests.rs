// tests/checkout_tests.rs
mod common;

use common::*;
use marketplace::{
  compare_ids, CashForm, CheckoutMachine, CheckoutStep, ErrorKind, MarketError, MarketSettings, OrderStatus,
  PaymentMethod, SessionContext,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn checkout_at_payment(h: &Harness, session: SessionContext, amount: i64) -> CheckoutMachine {
  let mut checkout = h
    .services
    .checkout(Arc::new(session), vec![listed_item(&h.store, Uuid::new_v4(), amount, 2)])
    .unwrap();
  checkout.select_city("Brazzaville").unwrap();
  checkout.select_district("Bacongo").unwrap();
  checkout.confirm_location().unwrap();
  checkout
}

fn checkout_at_enter_id(h: &Harness, session: SessionContext) -> CheckoutMachine {
  let mut checkout = checkout_at_payment(h, session, 15_000);
  checkout.choose_payment_method(PaymentMethod::MobileMoney).unwrap();
  checkout.confirm_transfer_sent().unwrap();
  checkout
}

#[tokio::test]
async fn transfer_checkout_waits_for_admin_confirmation() {
  setup_tracing();
  let h = harness();
  let buyer_id = Uuid::new_v4();
  let mut checkout = h
    .services
    .checkout(Arc::new(buyer(buyer_id)), vec![listed_item(&h.store, Uuid::new_v4(), 15_000, 2)])
    .unwrap();
  assert_eq!(checkout.step(), CheckoutStep::Location);
  assert_eq!(checkout.total_amount(), 30_000);

  checkout.select_city("brazzaville").unwrap();
  assert_eq!(checkout.selected_city(), Some("Brazzaville"));
  assert!(checkout.available_districts().contains(&"Bacongo"));
  checkout.select_district("Bacongo").unwrap();
  checkout.confirm_location().unwrap();
  assert_eq!(checkout.step(), CheckoutStep::PaymentMethod);

  checkout.choose_payment_method(PaymentMethod::MobileMoney).unwrap();
  assert_eq!(checkout.step(), CheckoutStep::TransferInfo);
  let instructions = checkout.transfer_instructions().unwrap();
  assert_eq!(instructions.amount_due, 30_000);
  assert_eq!(instructions.receiving_number, MarketSettings::default().mobile_money_number);

  checkout.confirm_transfer_sent().unwrap();
  assert_eq!(checkout.step(), CheckoutStep::EnterId);
  checkout.enter_transaction_id(TXN_ID).unwrap();
  assert!(checkout.can_submit_transaction_id());

  let order = checkout.submit_transaction_id().await.unwrap().clone();
  assert_eq!(order.status, OrderStatus::Pending);
  assert_eq!(order.buyer_id, Some(buyer_id));
  assert_eq!(order.city, "Brazzaville");
  assert_eq!(order.district, "Bacongo");
  assert_eq!(checkout.step(), CheckoutStep::Waiting);

  // The admin sees the order and types the id from the SMS receipt.
  let admin = admin();
  let pending = h.services.verification.pending_verifications(&admin).await.unwrap();
  assert_eq!(pending.len(), 1);
  assert!(compare_ids(pending[0].submitted_id.as_str(), "123456789012345").matches);
  let confirmed = h
    .services
    .verification
    .confirm(&admin, order.id, Some("ops-desk".to_string()))
    .await
    .unwrap();
  assert!(!confirmed.tracking_number.is_empty());

  let step = tokio::time::timeout(Duration::from_secs(2), checkout.wait_for_resolution())
    .await
    .expect("realtime update should arrive")
    .unwrap();
  assert_eq!(step, CheckoutStep::Confirmed);
  let seen = checkout.order().unwrap();
  assert_eq!(seen.status, OrderStatus::Confirmed);
  assert_eq!(seen.tracking_number.as_deref(), Some(confirmed.tracking_number.as_str()));
}

#[tokio::test]
async fn rejected_payment_ends_the_flow_as_rejected() {
  setup_tracing();
  let h = harness();
  let mut checkout = checkout_at_enter_id(&h, buyer(Uuid::new_v4()));
  checkout.enter_transaction_id(TXN_ID).unwrap();
  let order_id = checkout.submit_transaction_id().await.unwrap().id;

  h.services.verification.reject(&admin(), order_id).await.unwrap();

  let step = tokio::time::timeout(Duration::from_secs(2), checkout.wait_for_resolution())
    .await
    .expect("realtime update should arrive")
    .unwrap();
  assert_eq!(step, CheckoutStep::Rejected);
  assert_eq!(checkout.order().unwrap().status, OrderStatus::Rejected);
}

#[tokio::test]
async fn malformed_transaction_id_never_reaches_the_store() {
  setup_tracing();
  let h = harness();
  let mut checkout = checkout_at_enter_id(&h, buyer(Uuid::new_v4()));

  for raw in ["", "12345", "1234567890123456", "abc-def-ghi-jkl-mno", "12345678901234"] {
    checkout.enter_transaction_id(raw).unwrap();
    assert!(!checkout.can_submit_transaction_id(), "'{raw}' should not be submittable");
    let err = checkout.submit_transaction_id().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation, "'{raw}' gave {err:?}");
    assert_eq!(checkout.step(), CheckoutStep::EnterId);
  }
  assert_eq!(h.store.order_count(), 0);

  // Separators are ignored as long as 15 digits remain.
  checkout.enter_transaction_id("123-456-789-012-345").unwrap();
  assert!(checkout.can_submit_transaction_id());
  let order = checkout.submit_transaction_id().await.unwrap();
  assert_eq!(order.transaction_id.as_ref().map(|t| t.as_str()), Some(TXN_ID));
}

#[tokio::test]
async fn store_failure_keeps_the_enter_id_step() {
  setup_tracing();
  let h = harness();
  let mut checkout = checkout_at_enter_id(&h, buyer(Uuid::new_v4()));
  checkout.enter_transaction_id(TXN_ID).unwrap();

  h.store.fail_inserts(true);
  let err = checkout.submit_transaction_id().await.unwrap_err();
  assert!(err.is_retryable());
  assert_eq!(checkout.step(), CheckoutStep::EnterId);
  assert_eq!(h.store.order_count(), 0);

  h.store.fail_inserts(false);
  checkout.submit_transaction_id().await.unwrap();
  assert_eq!(checkout.step(), CheckoutStep::Waiting);
  assert_eq!(h.store.order_count(), 1);
}

#[tokio::test]
async fn cash_orders_skip_verification() {
  setup_tracing();
  let h = harness();
  let mut checkout = checkout_at_payment(&h, buyer(Uuid::new_v4()), 8_000);
  checkout.choose_payment_method(PaymentMethod::Cash).unwrap();
  assert_eq!(checkout.step(), CheckoutStep::CashForm);
  assert!(checkout.transfer_instructions().is_none());

  checkout
    .update_cash_form(CashForm {
      name: "Grace Mabiala".to_string(),
      phone: "+242 06 123 45 67".to_string(),
      quarter: "Plateau des 15 ans".to_string(),
      address: "  ".to_string(),
    })
    .unwrap();
  let err = checkout.submit_cash_form().await.unwrap_err();
  match err {
    MarketError::Validation(msg) => assert!(msg.contains("address"), "unexpected message: {msg}"),
    other => panic!("expected a validation error, got {other:?}"),
  }
  assert_eq!(h.store.order_count(), 0);

  checkout
    .update_cash_form(CashForm {
      name: "Grace Mabiala".to_string(),
      phone: "+242 06 123 45 67".to_string(),
      quarter: "Plateau des 15 ans".to_string(),
      address: "12 rue Mfoa".to_string(),
    })
    .unwrap();
  let order = checkout.submit_cash_form().await.unwrap().clone();

  assert_eq!(checkout.step(), CheckoutStep::Confirmed);
  assert_eq!(order.payment_method, PaymentMethod::Cash);
  assert_eq!(order.status, OrderStatus::Pending);
  assert!(order.transaction_id.is_none());
  assert_eq!(order.landmark.as_deref(), Some("Plateau des 15 ans, 12 rue Mfoa"));
  // Nothing to wait for.
  assert_eq!(checkout.wait_for_resolution().await.unwrap(), CheckoutStep::Confirmed);
  // Cash orders do not show up for transaction id matching.
  assert!(h.services.verification.pending_verifications(&admin()).await.unwrap().is_empty());
}

#[tokio::test]
async fn whatsapp_is_not_offered_at_checkout() {
  setup_tracing();
  let h = harness();
  let mut checkout = checkout_at_payment(&h, buyer(Uuid::new_v4()), 5_000);
  let err = checkout.choose_payment_method(PaymentMethod::Whatsapp).unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
  assert_eq!(checkout.step(), CheckoutStep::PaymentMethod);
}

#[tokio::test]
async fn location_needs_a_known_city_and_district() {
  setup_tracing();
  let h = harness();
  let mut checkout = h
    .services
    .checkout(Arc::new(buyer(Uuid::new_v4())), vec![listed_item(&h.store, Uuid::new_v4(), 1_000, 1)])
    .unwrap();

  assert!(checkout.select_district("Bacongo").is_err());
  assert!(checkout.confirm_location().is_err());
  assert!(checkout.select_city("Kinshasa").is_err());

  checkout.select_city("Pointe-Noire").unwrap();
  assert!(checkout.select_district("Bacongo").is_err());
  checkout.select_district("Loandjili").unwrap();
  checkout.confirm_location().unwrap();
  assert_eq!(checkout.step(), CheckoutStep::PaymentMethod);
}

#[tokio::test]
async fn back_walks_to_previous_screens_until_an_order_exists() {
  setup_tracing();
  let h = harness();
  let mut checkout = checkout_at_enter_id(&h, buyer(Uuid::new_v4()));

  checkout.back().unwrap();
  assert_eq!(checkout.step(), CheckoutStep::TransferInfo);
  checkout.back().unwrap();
  assert_eq!(checkout.step(), CheckoutStep::PaymentMethod);
  checkout.back().unwrap();
  assert_eq!(checkout.step(), CheckoutStep::Location);
  assert_eq!(checkout.selected_city(), Some("Brazzaville"));
  assert!(checkout.back().is_err());

  checkout.confirm_location().unwrap();
  checkout.choose_payment_method(PaymentMethod::AirtelMoney).unwrap();
  assert_eq!(
    checkout.transfer_instructions().unwrap().receiving_number,
    MarketSettings::default().airtel_money_number
  );
  checkout.confirm_transfer_sent().unwrap();
  checkout.enter_transaction_id(TXN_ID).unwrap();
  checkout.submit_transaction_id().await.unwrap();
  assert!(checkout.back().is_err());
}

#[tokio::test]
async fn abandoning_reports_the_created_order_only() {
  setup_tracing();
  let h = harness();
  let early = checkout_at_enter_id(&h, buyer(Uuid::new_v4()));
  assert_eq!(early.abandon(), None);

  let mut late = checkout_at_enter_id(&h, buyer(Uuid::new_v4()));
  late.enter_transaction_id(TXN_ID).unwrap();
  let order_id = late.submit_transaction_id().await.unwrap().id;
  assert_eq!(late.abandon(), Some(order_id));
  // The order outlives the abandoned flow.
  assert_eq!(
    h.services.repository.get_order(order_id).await.unwrap().status,
    OrderStatus::Pending
  );
}

#[tokio::test]
async fn anonymous_buyers_can_check_out() {
  setup_tracing();
  let h = harness();
  let mut checkout = checkout_at_enter_id(&h, SessionContext::anonymous());
  checkout.enter_transaction_id(TXN_ID).unwrap();
  let order = checkout.submit_transaction_id().await.unwrap();
  assert_eq!(order.buyer_id, None);
}

#[test]
fn empty_cart_cannot_start_a_checkout() {
  let h = harness();
  let err = h.services.checkout(Arc::new(SessionContext::anonymous()), Vec::new()).unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Validation);
}
