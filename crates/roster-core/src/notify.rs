//! Outbound notifications.
//!
//! Sending is fire-and-forget: [`Notifier::notify`] must return immediately and
//! never report delivery failure to the caller.

use std::collections::BTreeMap;

/// A templated message for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
  pub to:        String,
  pub subject:   String,
  /// Template name, resolved by the delivery side.
  pub template:  String,
  pub variables: BTreeMap<String, String>,
}

impl Notification {
  pub fn new(
    to: impl Into<String>,
    subject: impl Into<String>,
    template: impl Into<String>,
  ) -> Self {
    Self {
      to:        to.into(),
      subject:   subject.into(),
      template:  template.into(),
      variables: BTreeMap::new(),
    }
  }

  pub fn var(mut self, key: &str, value: impl Into<String>) -> Self {
    self.variables.insert(key.to_owned(), value.into());
    self
  }
}

pub trait Notifier: Send + Sync {
  fn notify(&self, notification: Notification);
}
