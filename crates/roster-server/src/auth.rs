//! Bearer-token authentication extractor.

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use roster_core::{directory::DirectoryStore, token::TokenKind};

use crate::{AppState, error::Error};

/// The authenticated uid behind a request's session token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller(pub String);

fn bearer(headers: &HeaderMap) -> Option<&str> {
  headers
    .get(header::AUTHORIZATION)?
    .to_str()
    .ok()?
    .strip_prefix("Bearer ")
    .map(str::trim)
}

impl<D> FromRequestParts<AppState<D>> for Caller
where
  D: DirectoryStore + 'static,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<D>,
  ) -> Result<Self, Self::Rejection> {
    let token = bearer(&parts.headers).ok_or(Error::Unauthorized)?;
    let claims = state
      .tokens
      .verify(token, TokenKind::Session)
      .map_err(|_| Error::Unauthorized)?;
    Ok(Caller(claims.sub))
  }
}
