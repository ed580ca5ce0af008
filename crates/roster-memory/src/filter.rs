//! Filter evaluation against stored entries.

use roster_core::{
  directory::{Entry, Filter},
  layout::normalize_dn,
};

/// Values compare case-insensitively, and DN-shaped values ignore spacing
/// around separators.
pub(crate) fn values_match(a: &str, b: &str) -> bool {
  normalize_dn(a) == normalize_dn(b)
}

pub(crate) fn matches(entry: &Entry, filter: &Filter) -> bool {
  match filter {
    Filter::And(parts) => parts.iter().all(|f| matches(entry, f)),
    Filter::Or(parts) => parts.iter().any(|f| matches(entry, f)),
    Filter::Equals(attr, value) => {
      entry.values(attr).iter().any(|v| values_match(v, value))
    }
    Filter::Present(attr) => entry.has(attr),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry() -> Entry {
    let mut e = Entry::new("ou=lg_aachen,ou=groups,o=org");
    e.attrs.insert("objectClass".into(), vec!["groupOfNames".into()]);
    e.attrs.insert(
      "member".into(),
      vec!["uid=bob,ou=active,ou=people,o=org".into()],
    );
    e
  }

  #[test]
  fn equality_ignores_case_and_dn_spacing() {
    let e = entry();
    assert!(matches(&e, &Filter::eq("objectclass", "GROUPOFNAMES")));
    assert!(matches(
      &e,
      &Filter::eq("member", "uid=bob, ou=active, ou=people, o=org")
    ));
    assert!(!matches(&e, &Filter::eq("member", "uid=jane,ou=active,ou=people,o=org")));
  }

  #[test]
  fn boolean_combinators() {
    let e = entry();
    let owner = Filter::Present("owner".into());
    let class = Filter::object_class("groupOfNames");
    assert!(!matches(&e, &Filter::And(vec![class.clone(), owner.clone()])));
    assert!(matches(&e, &Filter::Or(vec![class, owner])));
    assert!(matches(&e, &Filter::And(vec![])));
  }
}
