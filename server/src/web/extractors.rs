// marketplace_server/src/web/extractors.rs

use actix_web::{FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use marketplace::{CurrentUser, Role, SessionContext};
use tracing::warn;
use uuid::Uuid;

use crate::errors::AppError;

pub const USER_ID_HEADER: &str = "X-User-ID";
pub const USER_ROLE_HEADER: &str = "X-User-Role";

/// The caller as asserted by the upstream auth gateway.
///
/// No `X-User-ID` header means an anonymous caller. A present but malformed
/// header is rejected rather than silently downgraded. The role defaults to
/// buyer.
#[derive(Debug)]
pub struct RequestSession(pub SessionContext);

fn header<'a>(req: &'a HttpRequest, name: &str) -> Result<Option<&'a str>, AppError> {
  match req.headers().get(name) {
    None => Ok(None),
    Some(value) => value
      .to_str()
      .map(|v| Some(v.trim()))
      .map_err(|_| AppError::Auth(format!("{} header is not valid text", name))),
  }
}

fn parse_identity(req: &HttpRequest) -> Result<Option<CurrentUser>, AppError> {
  let Some(raw_id) = header(req, USER_ID_HEADER)? else {
    return Ok(None);
  };
  let id = Uuid::parse_str(raw_id).map_err(|_| AppError::Auth(format!("{} is not a valid user id", USER_ID_HEADER)))?;
  let role = match header(req, USER_ROLE_HEADER)? {
    Some(raw_role) => raw_role.parse::<Role>().map_err(AppError::Auth)?,
    None => Role::Buyer,
  };
  Ok(Some(CurrentUser { id, role }))
}

impl FromRequest for RequestSession {
  type Error = AppError;
  type Future = Ready<Result<Self, Self::Error>>;

  fn from_request(req: &HttpRequest, _payload: &mut actix_web::dev::Payload) -> Self::Future {
    let result = parse_identity(req)
      .map(|user| RequestSession(SessionContext::fixed(user)))
      .inspect_err(|e| warn!(error = %e, "RequestSession extractor: rejecting identity headers."));
    ready(result)
  }
}
