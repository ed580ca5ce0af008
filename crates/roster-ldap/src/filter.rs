//! Rendering [`Filter`] as an RFC 4515 filter string.

use ldap3::ldap_escape;
use roster_core::directory::Filter;

pub(crate) fn render(filter: &Filter) -> String {
  match filter {
    Filter::And(parts) => format!("(&{})", parts.iter().map(render).collect::<String>()),
    Filter::Or(parts) => format!("(|{})", parts.iter().map(render).collect::<String>()),
    Filter::Equals(attr, value) => format!("({attr}={})", ldap_escape(value)),
    Filter::Present(attr) => format!("({attr}=*)"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn equality() {
    assert_eq!(render(&Filter::eq("uid", "jane.doe")), "(uid=jane.doe)");
  }

  #[test]
  fn nested() {
    let filter = Filter::and([
      Filter::object_class("groupOfNames"),
      Filter::Or(vec![
        Filter::eq("member", "uid=a,ou=active,o=org"),
        Filter::Present("owner".into()),
      ]),
    ]);
    assert_eq!(
      render(&filter),
      "(&(objectClass=groupOfNames)(|(member=uid=a,ou=active,o=org)(owner=*)))"
    );
  }

  #[test]
  fn values_are_escaped() {
    assert_eq!(
      render(&Filter::eq("cn", "*)(uid=*")),
      "(cn=\\2a\\29\\28uid=\\2a)"
    );
    assert_eq!(render(&Filter::eq("cn", "a\\b")), "(cn=a\\5cb)");
  }
}
