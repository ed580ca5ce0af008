//! Signed, expiring tokens.
//!
//! Tokens are never stored or revoked; they simply expire.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
  Session,
  PasswordReset,
  /// Confirms a changed alternative mail address; carries the new address.
  EmailConfirmation,
  /// Confirms the address given at signup and sets the first password.
  InitialConfirmation,
}

impl TokenKind {
  pub fn lifetime(self) -> Duration {
    match self {
      Self::EmailConfirmation => Duration::hours(48),
      Self::Session | Self::PasswordReset | Self::InitialConfirmation => {
        Duration::minutes(30)
      }
    }
  }
}

/// The payload of every token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
  /// The uid the token was issued for.
  pub sub:   String,
  pub kind:  TokenKind,
  /// Expiry as a unix timestamp.
  pub exp:   i64,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
}

impl TokenClaims {
  pub fn new(subject: &str, kind: TokenKind, email: Option<&str>) -> Self {
    Self {
      sub: subject.to_owned(),
      kind,
      exp: (Utc::now() + kind.lifetime()).timestamp(),
      email: email.map(str::to_owned),
    }
  }
}

/// Issues and verifies tokens.
pub trait TokenService: Send + Sync {
  fn issue(
    &self,
    subject: &str,
    kind: TokenKind,
    email: Option<&str>,
  ) -> Result<String>;

  /// Verify signature, expiry and kind. Any failure is
  /// [`crate::Error::AuthenticationFailed`].
  fn verify(&self, token: &str, kind: TokenKind) -> Result<TokenClaims>;
}
