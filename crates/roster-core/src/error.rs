//! Error types for `roster-core`.

use thiserror::Error;

use crate::directory::DirectoryError;

#[derive(Debug, Error)]
pub enum Error {
  /// A person, group, or relation target does not exist.
  #[error("not found: {0}")]
  NotFound(String),

  /// A create collided with an existing identifier.
  #[error("directory conflict: {0}")]
  DirectoryConflict(String),

  /// Bad credentials or an invalid token. Never says which part was wrong.
  #[error("authentication failed")]
  AuthenticationFailed,

  /// The caller is known but a policy predicate rejected the action.
  #[error("unauthorized")]
  Unauthorized,

  /// A multi-step operation committed some of its steps and then failed.
  /// Nothing is rolled back.
  #[error("{operation} failed after {completed}: {source}")]
  PartialFailure {
    operation: &'static str,
    completed: &'static str,
    #[source]
    source:    Box<Error>,
  },

  #[error("invalid input: {0}")]
  InvalidInput(String),

  #[error("password hashing failed: {0}")]
  PasswordHash(String),

  #[error("token error: {0}")]
  Token(String),

  #[error("directory error: {0}")]
  Directory(#[from] DirectoryError),
}

impl Error {
  pub fn not_found(what: impl Into<String>) -> Self {
    Self::NotFound(what.into())
  }

  /// Wrap `source` as a partial failure of `operation` and log it.
  pub(crate) fn partial(
    operation: &'static str,
    completed: &'static str,
    source: Error,
  ) -> Self {
    tracing::error!(
      operation,
      completed,
      error = %source,
      "multi-step operation left the directory partially updated"
    );
    Self::PartialFailure { operation, completed, source: Box::new(source) }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
