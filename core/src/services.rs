// marketplace/src/services.rs

use crate::checkout::CheckoutMachine;
use crate::clock::Clock;
use crate::error::MarketResult;
use crate::fulfillment::FulfillmentService;
use crate::notifications::OrderNotifications;
use crate::order::OrderItem;
use crate::release::FundReleaseGate;
use crate::repository::OrderRepository;
use crate::session::SessionContext;
use crate::settings::MarketSettings;
use crate::store::SharedStore;
use crate::verification::VerificationGate;
use std::sync::Arc;

/// Every order surface wired over one store, clock and settings.
pub struct MarketServices {
  pub repository: Arc<OrderRepository>,
  pub verification: VerificationGate,
  pub fulfillment: FulfillmentService,
  pub release: FundReleaseGate,
  settings: Arc<MarketSettings>,
}

impl MarketServices {
  pub fn new(
    store: SharedStore,
    clock: Arc<dyn Clock>,
    settings: MarketSettings,
    notifications: Arc<dyn OrderNotifications>,
  ) -> Self {
    let settings = Arc::new(settings);
    MarketServices {
      repository: Arc::new(OrderRepository::new(store.clone(), clock.clone(), notifications.clone())),
      verification: VerificationGate::new(store.clone(), clock.clone(), settings.clone(), notifications.clone()),
      fulfillment: FulfillmentService::new(store.clone(), clock.clone()),
      release: FundReleaseGate::new(store, clock, settings.clone(), notifications),
      settings,
    }
  }

  pub fn settings(&self) -> &MarketSettings {
    &self.settings
  }

  /// Starts a checkout for `items` on behalf of `session`'s user.
  pub fn checkout(&self, session: Arc<SessionContext>, items: Vec<OrderItem>) -> MarketResult<CheckoutMachine> {
    CheckoutMachine::new(self.repository.clone(), self.settings.clone(), session, items)
  }
}
