//! Password recovery by alternative mail address.

use axum::{Json, extract::State, http::StatusCode};
use roster_core::{directory::DirectoryStore, notify::Notification, token::TokenKind};

use crate::{
  AppState,
  error::Result,
  handlers::users::{MailBody, TokenPasswordBody},
};

pub const PASSWORD_RESET_TEMPLATE: &str = "password_reset_mail";

/// `POST /password_reset`. Always 202, whether or not the address belongs to
/// anyone.
pub async fn request_reset<D: DirectoryStore + 'static>(
  State(state): State<AppState<D>>,
  Json(body): Json<MailBody>,
) -> StatusCode {
  match state.identity.find_by_alternative_mail(&body.mail).await {
    Ok(Some(person)) => match state.tokens.issue(&person.uid, TokenKind::PasswordReset, None) {
      Ok(token) => {
        state.notifier.notify(
          Notification::new(&body.mail, "Reset your password", PASSWORD_RESET_TEMPLATE)
            .var("name", &person.display_name)
            .var("uid", &person.uid)
            .var("token", &token)
            .var(
              "reset_url",
              format!("{}/reset_password?token={token}", state.config.frontend_url),
            ),
        );
        tracing::info!(uid = %person.uid, "password reset requested");
      }
      Err(e) => tracing::error!(error = %e, "cannot issue reset token"),
    },
    Ok(None) => tracing::debug!("password reset for unknown address"),
    Err(e) => tracing::warn!(error = %e, "password reset lookup failed"),
  }
  StatusCode::ACCEPTED
}

/// `POST /password_reset/confirm`
pub async fn confirm_reset<D: DirectoryStore + 'static>(
  State(state): State<AppState<D>>,
  Json(body): Json<TokenPasswordBody>,
) -> Result<StatusCode> {
  let claims = state.tokens.verify(&body.token, TokenKind::PasswordReset)?;
  state.identity.set_password(&claims.sub, &body.password).await?;
  Ok(StatusCode::NO_CONTENT)
}
