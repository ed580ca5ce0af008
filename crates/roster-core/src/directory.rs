//! The `DirectoryStore` trait and the entry, filter and modification types it
//! speaks.
//!
//! The trait is implemented by directory backends (`roster-ldap`,
//! `roster-memory`). Every call is atomic for the single entry it touches and
//! nothing more; there are no cross-entry transactions.

use std::{collections::BTreeMap, future::Future};

use thiserror::Error;

// ─── Entries ─────────────────────────────────────────────────────────────────

/// A single directory entry as returned by a search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entry {
  pub dn:    String,
  /// Attribute values keyed by attribute name as the backend reported it.
  pub attrs: BTreeMap<String, Vec<String>>,
}

impl Entry {
  pub fn new(dn: impl Into<String>) -> Self {
    Self { dn: dn.into(), attrs: BTreeMap::new() }
  }

  /// All values of `attr`, matched case-insensitively.
  pub fn values(&self, attr: &str) -> &[String] {
    self
      .attrs
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(attr))
      .map(|(_, v)| v.as_slice())
      .unwrap_or(&[])
  }

  pub fn first(&self, attr: &str) -> Option<&str> {
    self.values(attr).first().map(String::as_str)
  }

  pub fn has(&self, attr: &str) -> bool { !self.values(attr).is_empty() }
}

// ─── Filters ─────────────────────────────────────────────────────────────────

/// A search filter. Backends either render it (LDAP) or evaluate it (memory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
  And(Vec<Filter>),
  Or(Vec<Filter>),
  Equals(String, String),
  Present(String),
}

impl Filter {
  pub fn eq(attr: impl Into<String>, value: impl Into<String>) -> Self {
    Self::Equals(attr.into(), value.into())
  }

  pub fn object_class(class: &str) -> Self { Self::eq("objectClass", class) }

  pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
    Self::And(filters.into_iter().collect())
  }
}

// ─── Modifications ───────────────────────────────────────────────────────────

/// One attribute change inside a `modify` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Modification {
  Add(String, Vec<String>),
  /// Delete the listed values; an empty list deletes the whole attribute.
  Delete(String, Vec<String>),
  Replace(String, Vec<String>),
}

impl Modification {
  pub fn add(attr: &str, value: impl Into<String>) -> Self {
    Self::Add(attr.to_owned(), vec![value.into()])
  }

  pub fn delete(attr: &str, value: impl Into<String>) -> Self {
    Self::Delete(attr.to_owned(), vec![value.into()])
  }

  pub fn replace(attr: &str, value: impl Into<String>) -> Self {
    Self::Replace(attr.to_owned(), vec![value.into()])
  }
}

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum DirectoryError {
  /// The target entry does not exist.
  #[error("no such object: {0}")]
  NoSuchObject(String),

  /// An entry with this DN already exists.
  #[error("entry already exists: {0}")]
  AlreadyExists(String),

  /// An added attribute value is already present on the entry.
  #[error("attribute value already exists on {0}")]
  ValueExists(String),

  /// A deleted attribute value is not present on the entry. Distinct from
  /// [`DirectoryError::NoSuchObject`].
  #[error("no such attribute value on {0}")]
  NoSuchValue(String),

  /// A bind was rejected.
  #[error("invalid credentials")]
  InvalidCredentials,

  #[error("directory backend error: {0}")]
  Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl DirectoryError {
  pub fn backend(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Backend(Box::new(e))
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a hierarchical person/group directory.
///
/// All methods return `Send` futures so the trait can be used from axum
/// handlers on a multi-threaded runtime.
pub trait DirectoryStore: Send + Sync {
  /// Subtree search below `base`. A base that does not exist yields an empty
  /// result. Entries come back in backend order.
  fn search<'a>(
    &'a self,
    base: &'a str,
    filter: &'a Filter,
    attributes: &'a [&'a str],
  ) -> impl Future<Output = Result<Vec<Entry>, DirectoryError>> + Send + 'a;

  /// Create an entry. Fails with [`DirectoryError::AlreadyExists`] if `dn` is
  /// taken.
  fn add<'a>(
    &'a self,
    dn: &'a str,
    object_classes: &'a [&'a str],
    attrs: Vec<(String, Vec<String>)>,
  ) -> impl Future<Output = Result<(), DirectoryError>> + Send + 'a;

  /// Apply `mods` to a single entry, all or nothing.
  fn modify<'a>(
    &'a self,
    dn: &'a str,
    mods: Vec<Modification>,
  ) -> impl Future<Output = Result<(), DirectoryError>> + Send + 'a;

  fn delete<'a>(
    &'a self,
    dn: &'a str,
  ) -> impl Future<Output = Result<(), DirectoryError>> + Send + 'a;

  /// Move `dn` to `new_rdn,new_parent`. References held by other entries are
  /// not rewritten.
  fn rename<'a>(
    &'a self,
    dn: &'a str,
    new_rdn: &'a str,
    new_parent: &'a str,
  ) -> impl Future<Output = Result<(), DirectoryError>> + Send + 'a;

  /// Authenticate as `dn` with `secret`, on a connection separate from the one
  /// used for every other call. Rejected credentials yield
  /// [`DirectoryError::InvalidCredentials`].
  fn bind<'a>(
    &'a self,
    dn: &'a str,
    secret: &'a str,
  ) -> impl Future<Output = Result<(), DirectoryError>> + Send + 'a;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn entry_lookup_ignores_attribute_case() {
    let mut entry = Entry::new("uid=a,ou=active");
    entry.attrs.insert("mailAlias".into(), vec!["x@example.org".into()]);

    assert_eq!(entry.first("mailalias"), Some("x@example.org"));
    assert!(entry.has("MAILALIAS"));
    assert!(entry.values("member").is_empty());
  }
}
