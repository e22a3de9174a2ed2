// marketplace/src/session.rs

//! Who is acting. One `SessionContext` is handed to the checkout machine and
//! to every admin/vendor/buyer action instead of each component looking the
//! user up on its own.

use crate::error::{MarketError, MarketResult};
use crate::order::UserId;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Buyer,
  Seller,
  Logistician,
  Admin,
}

impl Role {
  pub fn as_str(&self) -> &'static str {
    match self {
      Role::Buyer => "buyer",
      Role::Seller => "seller",
      Role::Logistician => "logistician",
      Role::Admin => "admin",
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Role {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim().to_ascii_lowercase().as_str() {
      "buyer" | "client" => Ok(Role::Buyer),
      "seller" | "vendor" => Ok(Role::Seller),
      "logistician" => Ok(Role::Logistician),
      "admin" => Ok(Role::Admin),
      other => Err(format!("unknown role '{}'", other)),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
  pub id: UserId,
  pub role: Role,
}

/// Source of the signed-in user (auth backend, request headers, ...).
#[async_trait]
pub trait SessionProvider: Send + Sync {
  async fn fetch_current_user(&self) -> MarketResult<Option<CurrentUser>>;
}

/// Provider that always answers with the same user.
#[derive(Debug, Clone)]
pub struct StaticSession(pub Option<CurrentUser>);

#[async_trait]
impl SessionProvider for StaticSession {
  async fn fetch_current_user(&self) -> MarketResult<Option<CurrentUser>> {
    Ok(self.0)
  }
}

pub struct SessionContext {
  provider: Arc<dyn SessionProvider>,
  cached: RwLock<Option<CurrentUser>>,
}

impl SessionContext {
  /// Fetches the user once and caches it.
  pub async fn load(provider: Arc<dyn SessionProvider>) -> MarketResult<Self> {
    let user = provider.fetch_current_user().await?;
    Ok(SessionContext {
      provider,
      cached: RwLock::new(user),
    })
  }

  pub fn fixed(user: Option<CurrentUser>) -> Self {
    SessionContext {
      provider: Arc::new(StaticSession(user)),
      cached: RwLock::new(user),
    }
  }

  pub fn anonymous() -> Self {
    Self::fixed(None)
  }

  pub fn as_user(id: UserId, role: Role) -> Self {
    Self::fixed(Some(CurrentUser { id, role }))
  }

  pub fn current_user(&self) -> Option<CurrentUser> {
    *self.cached.read()
  }

  /// Re-fetches from the provider, e.g. after a role change.
  pub async fn refresh(&self) -> MarketResult<Option<CurrentUser>> {
    let user = self.provider.fetch_current_user().await?;
    *self.cached.write() = user;
    Ok(user)
  }

  pub fn require_role(&self, allowed: &[Role]) -> MarketResult<CurrentUser> {
    match self.current_user() {
      Some(user) if allowed.contains(&user.role) => Ok(user),
      Some(user) => Err(MarketError::Forbidden(format!(
        "role '{}' may not perform this action",
        user.role
      ))),
      None => Err(MarketError::Forbidden("sign-in required".to_string())),
    }
  }
}

impl fmt::Debug for SessionContext {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SessionContext")
      .field("current_user", &self.current_user())
      .finish()
  }
}
