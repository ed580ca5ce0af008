//! [`JwtTokenService`]: HS256 JSON Web Tokens.

use jsonwebtoken::{
  Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use roster_core::{
  Error, Result,
  token::{TokenClaims, TokenKind, TokenService},
};

pub struct JwtTokenService {
  encoding:   EncodingKey,
  decoding:   DecodingKey,
  validation: Validation,
}

impl JwtTokenService {
  pub fn new(secret: &str) -> Self {
    Self {
      encoding:   EncodingKey::from_secret(secret.as_bytes()),
      decoding:   DecodingKey::from_secret(secret.as_bytes()),
      validation: Validation::new(Algorithm::HS256),
    }
  }
}

impl TokenService for JwtTokenService {
  fn issue(&self, subject: &str, kind: TokenKind, email: Option<&str>) -> Result<String> {
    let claims = TokenClaims::new(subject, kind, email);
    encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
      .map_err(|e| Error::Token(e.to_string()))
  }

  fn verify(&self, token: &str, kind: TokenKind) -> Result<TokenClaims> {
    let claims = decode::<TokenClaims>(token, &self.decoding, &self.validation)
      .map_err(|e| {
        tracing::debug!(error = %e, "token rejected");
        Error::AuthenticationFailed
      })?
      .claims;
    if claims.kind != kind {
      tracing::debug!(expected = ?kind, got = ?claims.kind, "token of the wrong kind");
      return Err(Error::AuthenticationFailed);
    }
    Ok(claims)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn issued_token_verifies() {
    let svc = JwtTokenService::new("brotzeit");
    let token = svc
      .issue("jane.doe", TokenKind::EmailConfirmation, Some("jane@new.org"))
      .unwrap();
    let claims = svc.verify(&token, TokenKind::EmailConfirmation).unwrap();
    assert_eq!(claims.sub, "jane.doe");
    assert_eq!(claims.email.as_deref(), Some("jane@new.org"));
  }

  #[test]
  fn kind_is_checked() {
    let svc = JwtTokenService::new("brotzeit");
    let token = svc.issue("jane.doe", TokenKind::PasswordReset, None).unwrap();
    assert!(matches!(
      svc.verify(&token, TokenKind::Session),
      Err(Error::AuthenticationFailed)
    ));
  }

  #[test]
  fn foreign_signature_is_rejected() {
    let token = JwtTokenService::new("other")
      .issue("jane.doe", TokenKind::Session, None)
      .unwrap();
    assert!(matches!(
      JwtTokenService::new("brotzeit").verify(&token, TokenKind::Session),
      Err(Error::AuthenticationFailed)
    ));
  }

  #[test]
  fn expired_token_is_rejected() {
    let svc = JwtTokenService::new("brotzeit");
    let mut claims = TokenClaims::new("jane.doe", TokenKind::Session, None);
    claims.exp = (chrono::Utc::now() - chrono::Duration::hours(1)).timestamp();
    let token = encode(&Header::new(Algorithm::HS256), &claims, &svc.encoding).unwrap();
    assert!(matches!(
      svc.verify(&token, TokenKind::Session),
      Err(Error::AuthenticationFailed)
    ));
  }

  #[test]
  fn garbage_is_rejected() {
    let svc = JwtTokenService::new("brotzeit");
    assert!(svc.verify("not-a-token", TokenKind::Session).is_err());
  }
}
