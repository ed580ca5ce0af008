//! [`LdapDirectory`]: the `ldap3` implementation of [`DirectoryStore`].

use std::{collections::HashSet, sync::Arc};

use ldap3::{
  Ldap, LdapConnAsync, LdapConnSettings, LdapResult, Mod, Scope, SearchEntry,
  SearchResult,
};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use roster_core::directory::{
  DirectoryError, DirectoryStore, Entry, Filter, Modification,
};

use crate::{Error, LdapConfig, filter::render};

// Result codes this backend distinguishes (RFC 4511, appendix A).
const RC_SUCCESS: u32 = 0;
const RC_NO_SUCH_ATTRIBUTE: u32 = 16;
const RC_VALUE_EXISTS: u32 = 20;
const RC_NO_SUCH_OBJECT: u32 = 32;
const RC_INVALID_CREDENTIALS: u32 = 49;
const RC_ALREADY_EXISTS: u32 = 68;

type Result<T, E = DirectoryError> = std::result::Result<T, E>;

// ─── Store ───────────────────────────────────────────────────────────────────

/// Directory access over LDAP.
///
/// Cloning is cheap; clones share the cached service connection.
#[derive(Clone)]
pub struct LdapDirectory {
  config:     Arc<LdapConfig>,
  connection: Arc<RwLock<Option<Ldap>>>,
}

impl LdapDirectory {
  /// Create a directory handle. No connection is made until the first call.
  pub fn new(config: LdapConfig) -> Self {
    Self { config: Arc::new(config), connection: Arc::new(RwLock::new(None)) }
  }

  /// Open the service connection now, so misconfiguration shows at startup.
  pub async fn connect(&self) -> crate::Result<()> {
    self.service().await.map(drop)
  }

  /// A handle on the shared service connection, reconnecting if the cached
  /// one has been closed.
  async fn service(&self) -> crate::Result<Ldap> {
    if let Some(ldap) = self.connection.read().await.clone() {
      let mut probe = ldap.clone();
      if !probe.is_closed() {
        return Ok(ldap);
      }
    }

    let mut guard = self.connection.write().await;
    // Another task may have reconnected while we waited for the lock.
    if let Some(ldap) = guard.as_ref() {
      let mut probe = ldap.clone();
      if !probe.is_closed() {
        return Ok(ldap.clone());
      }
      warn!(url = %self.config.url, "service connection closed; reconnecting");
    }

    let mut ldap = self.open().await?;
    let res = ldap
      .simple_bind(&self.config.bind_dn, &self.config.bind_password)
      .await?;
    if res.rc == RC_INVALID_CREDENTIALS {
      return Err(Error::ServiceBind(self.config.bind_dn.clone()));
    }
    res.success()?;

    info!(url = %self.config.url, bind_dn = %self.config.bind_dn, "directory connection established");
    *guard = Some(ldap.clone());
    Ok(ldap)
  }

  /// Forget the cached connection after a transport error.
  async fn invalidate(&self) {
    self.connection.write().await.take();
  }

  /// Open an unauthenticated connection and spawn its driver.
  async fn open(&self) -> crate::Result<Ldap> {
    debug!(url = %self.config.url, "connecting to directory");
    let settings = LdapConnSettings::new()
      .set_conn_timeout(self.config.timeout())
      .set_starttls(self.config.starttls);
    let (conn, ldap) = LdapConnAsync::with_settings(settings, &self.config.url).await?;
    tokio::spawn(async move {
      if let Err(e) = conn.drive().await {
        warn!(error = %e, "directory connection driver error");
      }
    });
    Ok(ldap)
  }

  /// Run `op` on the service connection. A protocol-level failure drops the
  /// cached connection so the next call reconnects.
  async fn with_service<T, F, Fut>(&self, op: F) -> Result<T>
  where
    F: FnOnce(Ldap) -> Fut,
    Fut: Future<Output = Result<T, ldap3::LdapError>>,
  {
    let ldap = self.service().await?;
    match op(ldap).await {
      Ok(v) => Ok(v),
      Err(e) => {
        warn!(error = %e, "directory operation failed; dropping connection");
        self.invalidate().await;
        Err(Error::Protocol(e).into())
      }
    }
  }
}

/// Map a result code to the typed errors callers branch on.
fn check(operation: &'static str, dn: &str, res: LdapResult) -> Result<()> {
  match res.rc {
    RC_SUCCESS => Ok(()),
    RC_NO_SUCH_OBJECT => Err(DirectoryError::NoSuchObject(dn.to_owned())),
    RC_ALREADY_EXISTS => Err(DirectoryError::AlreadyExists(dn.to_owned())),
    RC_VALUE_EXISTS => Err(DirectoryError::ValueExists(dn.to_owned())),
    RC_NO_SUCH_ATTRIBUTE => Err(DirectoryError::NoSuchValue(dn.to_owned())),
    RC_INVALID_CREDENTIALS => Err(DirectoryError::InvalidCredentials),
    rc => Err(
      Error::Status { operation, dn: dn.to_owned(), rc, text: res.text }.into(),
    ),
  }
}

fn to_ldap_mod(modification: Modification) -> Mod<String> {
  match modification {
    Modification::Add(attr, values) => Mod::Add(attr, values.into_iter().collect()),
    Modification::Delete(attr, values) => {
      Mod::Delete(attr, values.into_iter().collect())
    }
    Modification::Replace(attr, values) => {
      Mod::Replace(attr, values.into_iter().collect())
    }
  }
}

fn to_entry(entry: SearchEntry) -> Entry {
  Entry { dn: entry.dn, attrs: entry.attrs.into_iter().collect() }
}

// ─── DirectoryStore impl ─────────────────────────────────────────────────────

impl DirectoryStore for LdapDirectory {
  #[instrument(level = "debug", skip(self, attributes))]
  async fn search(
    &self,
    base: &str,
    filter: &Filter,
    attributes: &[&str],
  ) -> Result<Vec<Entry>> {
    let rendered = render(filter);
    let attrs: Vec<&str> =
      if attributes.is_empty() { vec!["*"] } else { attributes.to_vec() };

    let SearchResult(entries, res) = self
      .with_service(|mut ldap| async move {
        ldap.search(base, Scope::Subtree, &rendered, attrs).await
      })
      .await?;

    if res.rc == RC_NO_SUCH_OBJECT {
      debug!(%base, "search base does not exist");
      return Ok(Vec::new());
    }
    check("search", base, res)?;

    Ok(
      entries
        .into_iter()
        .map(SearchEntry::construct)
        .map(to_entry)
        .collect(),
    )
  }

  #[instrument(level = "debug", skip(self, attrs))]
  async fn add(
    &self,
    dn: &str,
    object_classes: &[&str],
    attrs: Vec<(String, Vec<String>)>,
  ) -> Result<()> {
    let mut ldap_attrs: Vec<(String, HashSet<String>)> = vec![(
      "objectClass".to_owned(),
      object_classes.iter().map(|c| (*c).to_owned()).collect(),
    )];
    ldap_attrs.extend(
      attrs
        .into_iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(name, values)| (name, values.into_iter().collect())),
    );

    let res = self
      .with_service(|mut ldap| async move { ldap.add(dn, ldap_attrs).await })
      .await?;
    check("add", dn, res)
  }

  #[instrument(level = "debug", skip(self, mods))]
  async fn modify(&self, dn: &str, mods: Vec<Modification>) -> Result<()> {
    let mods: Vec<Mod<String>> = mods.into_iter().map(to_ldap_mod).collect();
    let res = self
      .with_service(|mut ldap| async move { ldap.modify(dn, mods).await })
      .await?;
    check("modify", dn, res)
  }

  #[instrument(level = "debug", skip(self))]
  async fn delete(&self, dn: &str) -> Result<()> {
    let res = self
      .with_service(|mut ldap| async move { ldap.delete(dn).await })
      .await?;
    check("delete", dn, res)
  }

  #[instrument(level = "debug", skip(self))]
  async fn rename(&self, dn: &str, new_rdn: &str, new_parent: &str) -> Result<()> {
    let res = self
      .with_service(|mut ldap| async move {
        ldap.modifydn(dn, new_rdn, true, Some(new_parent)).await
      })
      .await?;
    check("rename", dn, res)
  }

  #[instrument(level = "debug", skip(self, secret))]
  async fn bind(&self, dn: &str, secret: &str) -> Result<()> {
    let mut ldap = self.open().await?;
    let outcome = match ldap.simple_bind(dn, secret).await {
      Ok(res) => check("bind", dn, res),
      Err(e) => Err(Error::Protocol(e).into()),
    };
    if let Err(e) = ldap.unbind().await {
      debug!(error = %e, "unbind after password check failed");
    }
    outcome
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn result(rc: u32) -> LdapResult {
    LdapResult {
      rc,
      matched: String::new(),
      text: "server says no".into(),
      refs: vec![],
      ctrls: vec![],
    }
  }

  #[test]
  fn result_codes_map_to_typed_errors() {
    let dn = "uid=a,ou=active,o=org";
    assert!(check("modify", dn, result(0)).is_ok());
    assert!(matches!(check("modify", dn, result(16)), Err(DirectoryError::NoSuchValue(_))));
    assert!(matches!(check("modify", dn, result(20)), Err(DirectoryError::ValueExists(_))));
    assert!(matches!(check("modify", dn, result(32)), Err(DirectoryError::NoSuchObject(_))));
    assert!(matches!(check("bind", dn, result(49)), Err(DirectoryError::InvalidCredentials)));
    assert!(matches!(check("add", dn, result(68)), Err(DirectoryError::AlreadyExists(_))));
    assert!(matches!(check("add", dn, result(50)), Err(DirectoryError::Backend(_))));
  }

  #[test]
  fn empty_delete_clears_attribute() {
    let m = to_ldap_mod(Modification::Delete("mailAlias".into(), vec![]));
    assert!(matches!(m, Mod::Delete(attr, values) if attr == "mailAlias" && values.is_empty()));
  }

  #[tokio::test]
  async fn unreachable_server_is_a_backend_error() {
    let dir = LdapDirectory::new(LdapConfig {
      url:           "ldap://127.0.0.1:1".into(),
      bind_dn:       "cn=admin,o=org".into(),
      bind_password: "secret".into(),
      starttls:      false,
      timeout_secs:  1,
    });
    let err = dir
      .search("o=org", &Filter::Present("objectClass".into()), &[])
      .await
      .unwrap_err();
    assert!(matches!(err, DirectoryError::Backend(_)));
  }
}
