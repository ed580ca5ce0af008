//! Connection settings for the directory server.

use std::{fmt, time::Duration};

use serde::Deserialize;

#[derive(Clone, Deserialize)]
pub struct LdapConfig {
  /// `ldap://` or `ldaps://` URL of the server.
  pub url: String,

  /// Service identity used for every operation except password checks.
  pub bind_dn: String,

  pub bind_password: String,

  /// Upgrade a plain `ldap://` connection with STARTTLS.
  #[serde(default)]
  pub starttls: bool,

  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 { 10 }

impl LdapConfig {
  pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }
}

impl fmt::Debug for LdapConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("LdapConfig")
      .field("url", &self.url)
      .field("bind_dn", &self.bind_dn)
      .field("bind_password", &"<redacted>")
      .field("starttls", &self.starttls)
      .field("timeout_secs", &self.timeout_secs)
      .finish()
  }
}
