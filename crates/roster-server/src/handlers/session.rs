//! `POST /login`.

use axum::{Json, extract::State};
use roster_core::{directory::DirectoryStore, token::TokenKind};
use serde::{Deserialize, Serialize};

use crate::{AppState, error::{Error, Result}};

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub uid:      String,
  pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
  pub token:    String,
  /// The account has not been activated yet.
  pub inactive: bool,
}

/// `POST /login`. Unknown uids and wrong passwords get the same 401.
pub async fn login<D: DirectoryStore + 'static>(
  State(state): State<AppState<D>>,
  Json(body): Json<LoginBody>,
) -> Result<Json<LoginResponse>> {
  let check = state.identity.check_password(&body.uid, &body.password).await;
  if !check.success {
    return Err(Error::Unauthorized);
  }
  let token = state.tokens.issue(&body.uid, TokenKind::Session, None)?;
  tracing::info!(uid = %body.uid, inactive = check.was_inactive, "login");
  Ok(Json(LoginResponse { token, inactive: check.was_inactive }))
}
