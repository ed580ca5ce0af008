//! Person entries.

use serde::{Deserialize, Serialize};

use crate::{
  directory::Entry,
  layout::{DirectoryLayout, Partition, PersonRef},
};

/// Object classes of a member entry.
pub const MEMBER_OBJECT_CLASSES: &[&str] = &[
  "top",
  "person",
  "organizationalPerson",
  "inetOrgPerson",
  "PostfixBookMailAccount",
  "PostfixBookMailForward",
];

/// Object classes of a guest entry. Guests have no mailbox.
pub const GUEST_OBJECT_CLASSES: &[&str] = &["top", "inetOrgPerson"];

pub const PERSON_CLASS: &str = "inetOrgPerson";

/// Attributes fetched whenever a person is resolved.
pub const PERSON_ATTRIBUTES: &[&str] = &[
  "uid",
  "cn",
  "displayName",
  "givenName",
  "sn",
  "mail",
  "mail-alternative",
  "mailAlias",
];

pub mod attr {
  pub const UID: &str = "uid";
  pub const COMMON_NAME: &str = "cn";
  pub const DISPLAY_NAME: &str = "displayName";
  pub const GIVEN_NAME: &str = "givenName";
  pub const SURNAME: &str = "sn";
  pub const MAIL: &str = "mail";
  pub const ALTERNATIVE_MAIL: &str = "mail-alternative";
  pub const MAIL_ALIAS: &str = "mailAlias";
  pub const PASSWORD: &str = "userPassword";
}

/// An individual, as read from the directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
  pub uid:              String,
  pub display_name:     String,
  pub given_name:       Option<String>,
  pub surname:          Option<String>,
  /// `uid@mail_domain` for members; the supplied address for guests.
  pub primary_mail:     Option<String>,
  /// Recovery address supplied by the person.
  pub alternative_mail: Option<String>,
  pub mail_aliases:     Vec<String>,
  /// Lifecycle state, i.e. the partition the entry currently lives in.
  pub state:            Partition,
}

impl Person {
  /// Build a person from a search entry. Returns `None` if the entry sits
  /// outside the person partitions.
  pub fn from_entry(entry: &Entry, layout: &DirectoryLayout) -> Option<Self> {
    let reference = layout.parse_person_dn(&entry.dn)?;
    let uid = entry
      .first(attr::UID)
      .map(str::to_owned)
      .unwrap_or(reference.uid);

    let display_name = entry
      .first(attr::DISPLAY_NAME)
      .or_else(|| entry.first(attr::COMMON_NAME))
      .unwrap_or(&uid)
      .to_owned();

    Some(Self {
      display_name,
      given_name: entry.first(attr::GIVEN_NAME).map(str::to_owned),
      surname: entry.first(attr::SURNAME).map(str::to_owned),
      primary_mail: entry.first(attr::MAIL).map(str::to_owned),
      alternative_mail: entry.first(attr::ALTERNATIVE_MAIL).map(str::to_owned),
      mail_aliases: entry.values(attr::MAIL_ALIAS).to_vec(),
      state: reference.partition,
      uid,
    })
  }

  pub fn reference(&self) -> PersonRef {
    PersonRef::new(self.uid.clone(), self.state)
  }

  pub fn is_active(&self) -> bool { self.state == Partition::Active }
}

/// Input to [`crate::identity::IdentityDirectory::create_member`].
#[derive(Debug, Clone)]
pub struct NewMember {
  pub first_name:       String,
  pub last_name:        String,
  pub alternative_mail: String,
  /// Initial password; a random placeholder is stored when `None`.
  pub password:         Option<String>,
}

/// Outcome of [`crate::identity::IdentityDirectory::check_password`].
///
/// A failed check looks the same whether the uid exists or not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PasswordCheck {
  pub success:      bool,
  /// The entry was found in the inactive partition.
  pub was_inactive: bool,
}

impl PasswordCheck {
  pub const FAILED: Self = Self { success: false, was_inactive: false };
}
