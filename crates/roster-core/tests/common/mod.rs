//! Shared fixtures: an in-memory directory seeded with the organization's
//! groups, and a notifier that records instead of sending.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use roster_core::{
  directory::{DirectoryError, DirectoryStore, Entry, Filter, Modification},
  identity::IdentityDirectory,
  layout::DirectoryLayout,
  membership::GroupMembershipEngine,
  notify::{Notification, Notifier},
  person::NewMember,
};
use roster_memory::MemoryDirectory;

pub const GROUP_MAIL: &str = "lg-aachen@example.org";

#[derive(Default)]
pub struct RecordingNotifier {
  pub sent: Mutex<Vec<Notification>>,
}

impl Notifier for RecordingNotifier {
  fn notify(&self, notification: Notification) {
    self.sent.lock().unwrap().push(notification);
  }
}

pub struct Fixture {
  pub store:    Arc<MemoryDirectory>,
  pub layout:   Arc<DirectoryLayout>,
  pub identity: IdentityDirectory<MemoryDirectory>,
  pub engine:   GroupMembershipEngine<MemoryDirectory>,
  pub notifier: Arc<RecordingNotifier>,
}

pub fn layout() -> DirectoryLayout {
  DirectoryLayout {
    groups_base:   "ou=groups,o=org".into(),
    people_base:   "ou=people,o=org".into(),
    active_base:   "ou=active,ou=people,o=org".into(),
    inactive_base: "ou=inactive,ou=people,o=org".into(),
    guests_base:   "ou=guests,ou=people,o=org".into(),
    mail_domain:   "example.org".into(),
    mail_root:     "/srv/vmail".into(),
    general_group: "allgemein".into(),
    admin_uid:     "admin".into(),
  }
}

pub async fn fixture() -> Fixture {
  let store = Arc::new(MemoryDirectory::new());
  let layout = Arc::new(layout());
  let notifier = Arc::new(RecordingNotifier::default());

  add_group(&store, &layout, "allgemein", "Allgemein", None).await;
  add_group(&store, &layout, "lg_aachen", "LG Aachen", Some(GROUP_MAIL)).await;
  add_group(&store, &layout, "lg_koeln", "LG Köln", None).await;

  Fixture {
    identity: IdentityDirectory::new(Arc::clone(&store), Arc::clone(&layout)),
    engine: GroupMembershipEngine::new(
      Arc::clone(&store),
      Arc::clone(&layout),
      notifier.clone(),
    ),
    store,
    layout,
    notifier,
  }
}

pub async fn add_group(
  store: &MemoryDirectory,
  layout: &DirectoryLayout,
  ou: &str,
  cn: &str,
  mail: Option<&str>,
) {
  let mut attrs = vec![
    ("ou".to_owned(), vec![ou.to_owned()]),
    ("cn".to_owned(), vec![cn.to_owned()]),
  ];
  if let Some(mail) = mail {
    attrs.push(("mail".to_owned(), vec![mail.to_owned()]));
  }
  store
    .add(&layout.group_dn(ou), &["groupOfNames", "top"], attrs)
    .await
    .unwrap();
}

pub fn new_member(first: &str, last: &str, password: Option<&str>) -> NewMember {
  NewMember {
    first_name:       first.into(),
    last_name:        last.into(),
    alternative_mail: format!("{}@x.org", first.to_lowercase()),
    password:         password.map(str::to_owned),
  }
}

impl Fixture {
  /// Create and activate a member, returning the uid.
  pub async fn active_member(&self, first: &str, last: &str) -> String {
    let uid = self
      .identity
      .create_member(new_member(first, last, Some("secret")))
      .await
      .unwrap();
    self.identity.activate_user(&uid).await.unwrap();
    uid
  }
}

// ─── Fault injection ─────────────────────────────────────────────────────────

/// A [`MemoryDirectory`] that rejects every modify of an entry whose DN
/// contains `fail_on`, once it is set.
#[derive(Default)]
pub struct FaultyDirectory {
  pub inner:   MemoryDirectory,
  pub fail_on: Mutex<Option<String>>,
}

impl FaultyDirectory {
  pub fn fail_modifies_on(&self, dn_part: &str) {
    *self.fail_on.lock().unwrap() = Some(dn_part.to_owned());
  }
}

impl DirectoryStore for FaultyDirectory {
  async fn search<'a>(
    &'a self,
    base: &'a str,
    filter: &'a Filter,
    attributes: &'a [&'a str],
  ) -> Result<Vec<Entry>, DirectoryError> {
    self.inner.search(base, filter, attributes).await
  }

  async fn add<'a>(
    &'a self,
    dn: &'a str,
    object_classes: &'a [&'a str],
    attrs: Vec<(String, Vec<String>)>,
  ) -> Result<(), DirectoryError> {
    self.inner.add(dn, object_classes, attrs).await
  }

  async fn modify<'a>(
    &'a self,
    dn: &'a str,
    mods: Vec<Modification>,
  ) -> Result<(), DirectoryError> {
    let fail = self
      .fail_on
      .lock()
      .unwrap()
      .as_deref()
      .is_some_and(|part| dn.contains(part));
    if fail {
      return Err(DirectoryError::backend(std::io::Error::other("injected fault")));
    }
    self.inner.modify(dn, mods).await
  }

  async fn delete<'a>(&'a self, dn: &'a str) -> Result<(), DirectoryError> {
    self.inner.delete(dn).await
  }

  async fn rename<'a>(
    &'a self,
    dn: &'a str,
    new_rdn: &'a str,
    new_parent: &'a str,
  ) -> Result<(), DirectoryError> {
    self.inner.rename(dn, new_rdn, new_parent).await
  }

  async fn bind<'a>(
    &'a self,
    dn: &'a str,
    secret: &'a str,
  ) -> Result<(), DirectoryError> {
    self.inner.bind(dn, secret).await
  }
}
