//! `userPassword` values.
//!
//! Hashes are argon2id PHC strings behind the `{ARGON2}` scheme tag, the form
//! the directory's argon2 password module checks on bind.

use std::sync::OnceLock;

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::SaltString,
};
use rand_core::{OsRng, RngCore as _};

use crate::{Error, Result};

pub const SCHEME: &str = "{ARGON2}";

/// Hash `password` into a `userPassword` value.
pub fn hash_password(password: &str) -> Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  let phc = Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map_err(|e| Error::PasswordHash(e.to_string()))?;
  Ok(format!("{SCHEME}{phc}"))
}

/// Check `password` against a stored `userPassword` value. Values in any
/// other scheme never match.
pub fn verify_password(stored: &str, password: &str) -> bool {
  let Some(phc) = stored.strip_prefix(SCHEME) else {
    return false;
  };
  let Ok(parsed) = PasswordHash::new(phc) else {
    return false;
  };
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed)
    .is_ok()
}

/// Verify `password` against a fixed hash nobody knows the secret of. Always
/// false; costs one argon2 verification, the same as checking a real account.
pub fn verify_against_decoy(password: &str) -> bool {
  static DECOY: OnceLock<Option<String>> = OnceLock::new();
  match DECOY.get_or_init(|| hash_password(&random_placeholder()).ok()) {
    Some(stored) => verify_password(stored, password),
    None => false,
  }
}

/// A random secret nobody knows, used until a token-gated flow sets the real
/// password.
pub fn random_placeholder() -> String {
  let mut bytes = [0u8; 32];
  OsRng.fill_bytes(&mut bytes);
  hex::encode(bytes)
}
