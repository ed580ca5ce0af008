//! [`MemoryDirectory`]: the in-process implementation of [`DirectoryStore`].

use std::{collections::BTreeMap, sync::Arc};

use tokio::sync::RwLock;

use roster_core::{
  directory::{DirectoryError, DirectoryStore, Entry, Filter, Modification},
  layout::normalize_dn,
  password::verify_password,
  person,
};

use crate::filter::{matches, values_match};

const OBJECT_CLASS: &str = "objectClass";

type Result<T, E = DirectoryError> = std::result::Result<T, E>;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A directory held entirely in memory, keyed by normalized DN.
///
/// Cloning is cheap and clones share the same entries.
#[derive(Clone, Default)]
pub struct MemoryDirectory {
  entries: Arc<RwLock<BTreeMap<String, Entry>>>,
}

impl MemoryDirectory {
  pub fn new() -> Self { Self::default() }

  /// A stored entry with every attribute, including `userPassword`.
  pub async fn entry(&self, dn: &str) -> Option<Entry> {
    self.entries.read().await.get(&normalize_dn(dn)).cloned()
  }

  /// Number of stored entries.
  pub async fn len(&self) -> usize { self.entries.read().await.len() }

  pub async fn is_empty(&self) -> bool { self.entries.read().await.is_empty() }
}

fn in_subtree(key: &str, base: &str) -> bool {
  key == base || key.ends_with(&format!(",{base}"))
}

/// Copy of `entry` restricted to `attributes`. An empty list keeps everything.
fn project(entry: &Entry, attributes: &[&str]) -> Entry {
  if attributes.is_empty() {
    return entry.clone();
  }
  Entry {
    dn:    entry.dn.clone(),
    attrs: entry
      .attrs
      .iter()
      .filter(|(k, _)| attributes.iter().any(|a| a.eq_ignore_ascii_case(k)))
      .map(|(k, v)| (k.clone(), v.clone()))
      .collect(),
  }
}

/// The stored key for `attr`, keeping whatever case it was first written in.
fn attr_key(entry: &Entry, attr: &str) -> String {
  entry
    .attrs
    .keys()
    .find(|k| k.eq_ignore_ascii_case(attr))
    .cloned()
    .unwrap_or_else(|| attr.to_owned())
}

fn apply(entry: &mut Entry, modification: Modification) -> Result<()> {
  match modification {
    Modification::Add(attr, values) => {
      let key = attr_key(entry, &attr);
      let current = entry.attrs.entry(key).or_default();
      for value in values {
        if current.iter().any(|v| values_match(v, &value)) {
          return Err(DirectoryError::ValueExists(entry.dn.clone()));
        }
        current.push(value);
      }
    }
    Modification::Delete(attr, values) => {
      let key = attr_key(entry, &attr);
      let Some(current) = entry.attrs.get_mut(&key) else {
        return Err(DirectoryError::NoSuchValue(entry.dn.clone()));
      };
      for value in &values {
        let before = current.len();
        current.retain(|v| !values_match(v, value));
        if current.len() == before {
          return Err(DirectoryError::NoSuchValue(entry.dn.clone()));
        }
      }
      if values.is_empty() || current.is_empty() {
        entry.attrs.remove(&key);
      }
    }
    Modification::Replace(attr, values) => {
      let key = attr_key(entry, &attr);
      if values.is_empty() {
        entry.attrs.remove(&key);
      } else {
        entry.attrs.insert(key, values);
      }
    }
  }
  Ok(())
}

// ─── DirectoryStore impl ─────────────────────────────────────────────────────

impl DirectoryStore for MemoryDirectory {
  async fn search(
    &self,
    base: &str,
    filter: &Filter,
    attributes: &[&str],
  ) -> Result<Vec<Entry>> {
    let base = normalize_dn(base);
    let entries = self.entries.read().await;
    let found: Vec<Entry> = entries
      .iter()
      .filter(|(key, _)| in_subtree(key, &base))
      .filter(|(_, entry)| matches(entry, filter))
      .map(|(_, entry)| project(entry, attributes))
      .collect();
    tracing::trace!(%base, count = found.len(), "memory search");
    Ok(found)
  }

  async fn add(
    &self,
    dn: &str,
    object_classes: &[&str],
    attrs: Vec<(String, Vec<String>)>,
  ) -> Result<()> {
    let key = normalize_dn(dn);
    let mut entries = self.entries.write().await;
    if entries.contains_key(&key) {
      return Err(DirectoryError::AlreadyExists(dn.to_owned()));
    }

    let mut entry = Entry::new(dn);
    entry.attrs.insert(
      OBJECT_CLASS.to_owned(),
      object_classes.iter().map(|c| (*c).to_owned()).collect(),
    );
    for (attr, values) in attrs {
      if values.is_empty() {
        continue;
      }
      let key = attr_key(&entry, &attr);
      entry.attrs.entry(key).or_default().extend(values);
    }
    entries.insert(key, entry);
    Ok(())
  }

  async fn modify(&self, dn: &str, mods: Vec<Modification>) -> Result<()> {
    let key = normalize_dn(dn);
    let mut entries = self.entries.write().await;
    let Some(stored) = entries.get(&key) else {
      return Err(DirectoryError::NoSuchObject(dn.to_owned()));
    };

    // All or nothing: work on a copy and only commit if every change applies.
    let mut updated = stored.clone();
    for modification in mods {
      apply(&mut updated, modification)?;
    }
    entries.insert(key, updated);
    Ok(())
  }

  async fn delete(&self, dn: &str) -> Result<()> {
    match self.entries.write().await.remove(&normalize_dn(dn)) {
      Some(_) => Ok(()),
      None => Err(DirectoryError::NoSuchObject(dn.to_owned())),
    }
  }

  async fn rename(&self, dn: &str, new_rdn: &str, new_parent: &str) -> Result<()> {
    let new_dn = format!("{new_rdn},{new_parent}");
    let (old_key, new_key) = (normalize_dn(dn), normalize_dn(&new_dn));

    let mut entries = self.entries.write().await;
    if !entries.contains_key(&old_key) {
      return Err(DirectoryError::NoSuchObject(dn.to_owned()));
    }
    if entries.contains_key(&new_key) {
      return Err(DirectoryError::AlreadyExists(new_dn));
    }
    let Some(mut entry) = entries.remove(&old_key) else {
      return Err(DirectoryError::NoSuchObject(dn.to_owned()));
    };
    entry.dn = new_dn;
    entries.insert(new_key, entry);
    Ok(())
  }

  async fn bind(&self, dn: &str, secret: &str) -> Result<()> {
    let entries = self.entries.read().await;
    let Some(entry) = entries.get(&normalize_dn(dn)) else {
      return Err(DirectoryError::InvalidCredentials);
    };
    // An empty secret is an anonymous bind, which always succeeds.
    if secret.is_empty() {
      return Ok(());
    }
    if entry
      .values(person::attr::PASSWORD)
      .iter()
      .any(|stored| verify_password(stored, secret))
    {
      Ok(())
    } else {
      Err(DirectoryError::InvalidCredentials)
    }
  }
}
