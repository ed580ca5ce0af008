//! Where things live in the directory tree.
//!
//! A person's location depends on its lifecycle state: the same `uid` resolves
//! to a different DN in the active, inactive and guest partitions. Identity
//! references therefore always carry their [`Partition`].

use serde::{Deserialize, Serialize};

/// The subtree a person entry lives in, which doubles as its lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
  Active,
  Inactive,
  Guest,
}

/// A person identity tagged with the partition it was resolved in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersonRef {
  pub uid:       String,
  pub partition: Partition,
}

impl PersonRef {
  pub fn new(uid: impl Into<String>, partition: Partition) -> Self {
    Self { uid: uid.into(), partition }
  }
}

/// Base DNs and naming constants of the organization's directory.
#[derive(Debug, Clone, Deserialize)]
pub struct DirectoryLayout {
  pub groups_base:   String,
  /// Parent of the three person partitions; username probes search here.
  pub people_base:   String,
  pub active_base:   String,
  pub inactive_base: String,
  pub guests_base:   String,
  /// Primary mail addresses are `uid@mail_domain`.
  pub mail_domain:   String,
  #[serde(default = "default_mail_root")]
  pub mail_root:     String,
  /// The catch-all group every active person belongs to.
  #[serde(default = "default_general_group")]
  pub general_group: String,
  /// The distinguished administrative identifier.
  pub admin_uid:     String,
}

fn default_mail_root() -> String { "/srv/vmail".to_owned() }

fn default_general_group() -> String { "allgemein".to_owned() }

impl DirectoryLayout {
  pub fn partition_base(&self, partition: Partition) -> &str {
    match partition {
      Partition::Active => &self.active_base,
      Partition::Inactive => &self.inactive_base,
      Partition::Guest => &self.guests_base,
    }
  }

  pub fn group_dn(&self, ou: &str) -> String {
    format!("ou={},{}", escape_rdn_value(ou), self.groups_base)
  }

  pub fn person_dn(&self, uid: &str, partition: Partition) -> String {
    format!("{},{}", person_rdn(uid), self.partition_base(partition))
  }

  pub fn ref_dn(&self, person: &PersonRef) -> String {
    self.person_dn(&person.uid, person.partition)
  }

  pub fn primary_mail(&self, uid: &str) -> String {
    format!("{uid}@{}", self.mail_domain)
  }

  /// Map a stored person DN back to a tagged reference. Returns `None` for DNs
  /// outside the three partitions or without a `uid` RDN.
  pub fn parse_person_dn(&self, dn: &str) -> Option<PersonRef> {
    let (rdn, parent) = split_first_rdn(dn)?;
    let (attr, value) = rdn.split_once('=')?;
    if !attr.trim().eq_ignore_ascii_case("uid") {
      return None;
    }

    let parent = normalize_dn(parent);
    let partition = [Partition::Active, Partition::Inactive, Partition::Guest]
      .into_iter()
      .find(|p| normalize_dn(self.partition_base(*p)) == parent)?;

    Some(PersonRef::new(unescape_rdn_value(value.trim()), partition))
  }
}

/// `uid=<value>` with the value escaped for use inside a DN.
pub fn person_rdn(uid: &str) -> String {
  format!("uid={}", escape_rdn_value(uid))
}

/// Compare-friendly DN: lower-cased, without spaces around separators.
pub fn normalize_dn(dn: &str) -> String {
  dn.split(',')
    .map(|rdn| {
      rdn
        .split('=')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("=")
        .to_ascii_lowercase()
    })
    .collect::<Vec<_>>()
    .join(",")
}

/// Escape a DN attribute value (RFC 4514).
pub fn escape_rdn_value(value: &str) -> String {
  let last = value.chars().count().saturating_sub(1);
  let mut out = String::with_capacity(value.len());
  for (i, ch) in value.chars().enumerate() {
    match ch {
      ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
        out.push('\\');
        out.push(ch);
      }
      '\0' => out.push_str("\\00"),
      ' ' if i == 0 || i == last => out.push_str("\\20"),
      '#' if i == 0 => out.push_str("\\23"),
      _ => out.push(ch),
    }
  }
  out
}

/// Split at the first comma that is not escaped.
fn split_first_rdn(dn: &str) -> Option<(&str, &str)> {
  let mut escaped = false;
  for (i, ch) in dn.char_indices() {
    match ch {
      '\\' if !escaped => escaped = true,
      ',' if !escaped => return Some((&dn[..i], &dn[i + 1..])),
      _ => escaped = false,
    }
  }
  None
}

fn unescape_rdn_value(value: &str) -> String {
  let mut out = String::with_capacity(value.len());
  let mut chars = value.chars();
  while let Some(ch) = chars.next() {
    if ch == '\\'
      && let Some(next) = chars.next()
    {
      match next {
        '0' | '2' => {
          let code: String = [next].into_iter().chain(chars.next()).collect();
          match u8::from_str_radix(&code, 16) {
            Ok(b) => out.push(char::from(b)),
            Err(_) => out.push_str(&code),
          }
        }
        _ => out.push(next),
      }
    } else {
      out.push(ch);
    }
  }
  out
}
