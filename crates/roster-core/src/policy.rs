//! [`AccessPolicy`]: authorization predicates over already-fetched groups.
//!
//! Nothing here touches the directory. Callers fetch the groups they need and
//! ask; [`AccessPolicy::ensure`] turns a `false` into [`Error::Unauthorized`].

use crate::{Error, Result, group::Group};

#[derive(Debug, Clone)]
pub struct AccessPolicy {
  admin_uid: String,
}

impl AccessPolicy {
  pub fn new(admin_uid: impl Into<String>) -> Self {
    Self { admin_uid: admin_uid.into() }
  }

  /// The distinguished administrative identifier. It can never be removed as
  /// an owner and does not count towards "last owner" checks.
  pub fn is_privileged_user(&self, uid: &str) -> bool { uid == self.admin_uid }

  pub fn is_owner_of(&self, uid: &str, group: &Group) -> bool {
    group.has_owner(uid)
  }

  /// True if `uid` owns `group` and removing it would leave no owner other
  /// than the privileged one.
  pub fn is_sole_owner(&self, group: &Group, uid: &str) -> bool {
    if self.is_privileged_user(uid) || !group.has_owner(uid) {
      return false;
    }
    !group
      .owners
      .iter()
      .any(|o| o.uid != uid && !self.is_privileged_user(&o.uid))
  }

  /// Linear scan over every group's owners.
  pub fn is_group_owner_anywhere(&self, uid: &str, groups: &[Group]) -> bool {
    groups.iter().any(|g| g.has_owner(uid))
  }

  /// The caller acts on their own behalf or owns the group.
  pub fn is_self_or_owner(&self, caller: &str, target: &str, group: &Group) -> bool {
    caller == target || self.is_owner_of(caller, group)
  }

  /// Whether `caller` may take `target` off the owners of `group`.
  pub fn may_remove_owner(&self, caller: &str, target: &str, group: &Group) -> bool {
    (self.is_owner_of(caller, group) || self.is_privileged_user(caller))
      && !self.is_privileged_user(target)
      && !self.is_sole_owner(group, target)
  }

  pub fn ensure(&self, allowed: bool) -> Result<()> {
    if allowed { Ok(()) } else { Err(Error::Unauthorized) }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::layout::{Partition, PersonRef};

  fn group(owners: &[&str]) -> Group {
    Group {
      ou:          "lg_aachen".into(),
      common_name: "LG Aachen".into(),
      category:    None,
      mail:        None,
      owners:      owners
        .iter()
        .map(|u| PersonRef::new(*u, Partition::Active))
        .collect(),
      members:     vec![],
      pending:     vec![],
    }
  }

  #[test]
  fn owner_check() {
    let p = AccessPolicy::new("admin");
    let g = group(&["bob"]);
    assert!(p.is_owner_of("bob", &g));
    assert!(!p.is_owner_of("jane", &g));
  }

  #[test]
  fn sole_owner_ignores_admin() {
    let p = AccessPolicy::new("admin");
    assert!(p.is_sole_owner(&group(&["bob"]), "bob"));
    assert!(p.is_sole_owner(&group(&["bob", "admin"]), "bob"));
    assert!(!p.is_sole_owner(&group(&["bob", "alice"]), "bob"));
    assert!(!p.is_sole_owner(&group(&["bob"]), "jane"));
    assert!(!p.is_sole_owner(&group(&["admin"]), "admin"));
  }

  #[test]
  fn admin_is_never_removable() {
    let p = AccessPolicy::new("admin");
    let g = group(&["bob", "alice", "admin"]);
    assert!(!p.may_remove_owner("bob", "admin", &g));
    assert!(p.may_remove_owner("bob", "alice", &g));
    assert!(p.may_remove_owner("admin", "alice", &g));
    assert!(!p.may_remove_owner("jane", "alice", &g));
  }

  #[test]
  fn last_owner_is_protected() {
    let p = AccessPolicy::new("admin");
    let g = group(&["bob", "admin"]);
    assert!(!p.may_remove_owner("admin", "bob", &g));
  }

  #[test]
  fn owner_anywhere_scans_all_groups() {
    let p = AccessPolicy::new("admin");
    let groups = vec![group(&["alice"]), group(&["bob"])];
    assert!(p.is_group_owner_anywhere("bob", &groups));
    assert!(!p.is_group_owner_anywhere("jane", &groups));
  }

  #[test]
  fn ensure_maps_to_unauthorized() {
    let p = AccessPolicy::new("admin");
    assert!(p.ensure(true).is_ok());
    assert!(matches!(p.ensure(false), Err(Error::Unauthorized)));
  }
}
