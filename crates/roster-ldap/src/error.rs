//! Error type for `roster-ldap`.

use roster_core::directory::DirectoryError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("ldap protocol error: {0}")]
  Protocol(#[from] ldap3::LdapError),

  /// The server answered with a result code the caller has no mapping for.
  #[error("ldap {operation} on {dn} failed with code {rc}: {text}")]
  Status {
    operation: &'static str,
    dn:        String,
    rc:        u32,
    text:      String,
  },

  /// The service identity was rejected when opening the shared connection.
  #[error("service bind as {0} rejected")]
  ServiceBind(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for DirectoryError {
  fn from(e: Error) -> Self { DirectoryError::backend(e) }
}
