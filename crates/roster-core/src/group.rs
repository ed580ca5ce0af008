//! Group entries and their three relation sets.

use serde::{Deserialize, Serialize};

use crate::{
  directory::Entry,
  layout::{DirectoryLayout, Partition, PersonRef},
  person::Person,
};

pub const GROUP_CLASS: &str = "groupOfNames";

pub const GROUP_ATTRIBUTES: &[&str] =
  &["ou", "cn", "businessCategory", "mail", "owner", "member", "pending"];

pub mod attr {
  pub const OU: &str = "ou";
  pub const COMMON_NAME: &str = "cn";
  pub const CATEGORY: &str = "businessCategory";
  pub const MAIL: &str = "mail";
  pub const OWNER: &str = "owner";
  pub const MEMBER: &str = "member";
  pub const PENDING: &str = "pending";
}

/// A mailing/permission group.
///
/// Relation sets hold tagged references parsed from the stored DNs; DNs that
/// do not point into a person partition are dropped when parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
  pub ou:          String,
  pub common_name: String,
  pub category:    Option<String>,
  /// When set, every owner carries this address as a mail alias.
  pub mail:        Option<String>,
  pub owners:      Vec<PersonRef>,
  pub members:     Vec<PersonRef>,
  pub pending:     Vec<PersonRef>,
}

impl Group {
  pub fn from_entry(entry: &Entry, layout: &DirectoryLayout) -> Option<Self> {
    let ou = entry.first(attr::OU)?.to_owned();
    let refs = |name: &str| -> Vec<PersonRef> {
      entry
        .values(name)
        .iter()
        .filter_map(|dn| {
          let parsed = layout.parse_person_dn(dn);
          if parsed.is_none() {
            tracing::debug!(group = %ou, %dn, relation = name, "ignoring foreign reference");
          }
          parsed
        })
        .collect()
    };

    Some(Self {
      common_name: entry.first(attr::COMMON_NAME).unwrap_or(&ou).to_owned(),
      category: entry.first(attr::CATEGORY).map(str::to_owned),
      mail: entry.first(attr::MAIL).map(str::to_owned),
      owners: refs(attr::OWNER),
      members: refs(attr::MEMBER),
      pending: refs(attr::PENDING),
      ou,
    })
  }

  pub fn has_owner(&self, uid: &str) -> bool {
    self.owners.iter().any(|r| r.uid == uid)
  }

  pub fn has_member(&self, uid: &str) -> bool {
    self.members.iter().any(|r| r.uid == uid)
  }

  /// Pending references for `uid`, in whichever partition they were stored.
  pub fn pending_for<'a>(
    &'a self,
    uid: &'a str,
  ) -> impl Iterator<Item = &'a PersonRef> + 'a {
    self.pending.iter().filter(move |r| r.uid == uid)
  }

  pub fn has_pending(&self, uid: &str, partition: Partition) -> bool {
    self.pending_for(uid).any(|r| r.partition == partition)
  }
}

/// The ways a person can relate to a group, for
/// [`crate::membership::GroupMembershipEngine::list_groups_by_relation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupRelation {
  Member,
  Owner,
  ActivePending,
  InactivePending,
}

impl GroupRelation {
  /// The group attribute holding this relation.
  pub fn attribute(self) -> &'static str {
    match self {
      Self::Member => attr::MEMBER,
      Self::Owner => attr::OWNER,
      Self::ActivePending | Self::InactivePending => attr::PENDING,
    }
  }

  /// The partition the person must be resolved in.
  pub fn partition(self) -> Partition {
    match self {
      Self::InactivePending => Partition::Inactive,
      _ => Partition::Active,
    }
  }
}

/// The single label shown for a person in a merged group listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RosterRole {
  Owner,
  Member,
}

#[derive(Debug, Clone, Serialize)]
pub struct RosterEntry {
  pub person: Person,
  pub role:   RosterRole,
}
