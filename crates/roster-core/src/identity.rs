//! [`IdentityDirectory`]: people, their lifecycle, and their credentials.
//!
//! A person is created inactive (or as a permanent guest), is moved to the
//! active partition on activation, and is deleted outright. None of the
//! multi-step operations here are transactional; a failure part-way leaves the
//! steps already taken in place and is reported as
//! [`Error::PartialFailure`].

use std::sync::Arc;

use crate::{
  Error, Result,
  backend::Backend,
  directory::{DirectoryError, DirectoryStore, Filter, Modification},
  group,
  layout::{DirectoryLayout, Partition, PersonRef, person_rdn},
  password,
  person::{
    self, GUEST_OBJECT_CLASSES, MEMBER_OBJECT_CLASSES, NewMember, PERSON_ATTRIBUTES,
    PERSON_CLASS, PasswordCheck, Person,
  },
  slug::{USERNAME_SEPARATOR, slugify},
};

/// Namespace prefix of every guest uid.
pub const GUEST_PREFIX: &str = "guest.";

const MAIL_UID_NUMBER: &str = "5000";
const MAIL_GID_NUMBER: &str = "5000";

pub struct IdentityDirectory<D> {
  backend: Backend<D>,
}

impl<D> Clone for IdentityDirectory<D> {
  fn clone(&self) -> Self { Self { backend: self.backend.clone() } }
}

impl<D: DirectoryStore> IdentityDirectory<D> {
  pub fn new(store: Arc<D>, layout: Arc<DirectoryLayout>) -> Self {
    Self { backend: Backend::new(store, layout) }
  }

  pub fn layout(&self) -> &DirectoryLayout { &self.backend.layout }

  // ── Usernames ─────────────────────────────────────────────────────────────

  /// Derive a free uid from `full_name`: the slug itself, then `slug2`,
  /// `slug3`, … until no person in any partition carries it.
  ///
  /// The probe and the later add are not atomic; see
  /// [`IdentityDirectory::create_member`] for how a lost race is detected.
  pub async fn generate_username(&self, full_name: &str) -> Result<String> {
    let base = slugify(full_name, USERNAME_SEPARATOR);
    if base.is_empty() {
      return Err(Error::InvalidInput(format!(
        "cannot derive a username from {full_name:?}"
      )));
    }

    let mut candidate = base.clone();
    let mut index = 2u32;
    while !self.backend.people_with_uid(&candidate).await?.is_empty() {
      tracing::debug!(%candidate, "username taken");
      candidate = format!("{base}{index}");
      index += 1;
    }
    Ok(candidate)
  }

  // ── Creation ──────────────────────────────────────────────────────────────

  /// Create an inactive member entry and return its uid. No group relation is
  /// granted.
  pub async fn create_member(&self, input: NewMember) -> Result<String> {
    let layout = &self.backend.layout;
    let display_name = format!("{} {}", input.first_name.trim(), input.last_name.trim());
    let uid = self.generate_username(&display_name).await?;
    let mail = layout.primary_mail(&uid);
    let secret = input.password.unwrap_or_else(password::random_placeholder);

    let attrs = vec![
      (person::attr::UID.to_owned(), vec![uid.clone()]),
      (person::attr::DISPLAY_NAME.to_owned(), vec![display_name.clone()]),
      (person::attr::COMMON_NAME.to_owned(), vec![display_name]),
      (person::attr::GIVEN_NAME.to_owned(), vec![input.first_name.trim().to_owned()]),
      (person::attr::SURNAME.to_owned(), vec![input.last_name.trim().to_owned()]),
      (person::attr::PASSWORD.to_owned(), vec![password::hash_password(&secret)?]),
      (person::attr::MAIL.to_owned(), vec![mail.clone()]),
      (person::attr::ALTERNATIVE_MAIL.to_owned(), vec![input.alternative_mail]),
      ("mailHomeDirectory".to_owned(), vec![format!("{}/{mail}", layout.mail_root)]),
      (
        "mailStorageDirectory".to_owned(),
        vec![format!("maildir:{}/{mail}/Maildir", layout.mail_root)],
      ),
      ("mailEnabled".to_owned(), vec!["TRUE".to_owned()]),
      ("mailUidNumber".to_owned(), vec![MAIL_UID_NUMBER.to_owned()]),
      ("mailGidNumber".to_owned(), vec![MAIL_GID_NUMBER.to_owned()]),
    ];

    self
      .add_unique(&uid, Partition::Inactive, MEMBER_OBJECT_CLASSES, attrs)
      .await?;
    tracing::info!(%uid, "member created");
    Ok(uid)
  }

  /// Create a permanent guest entry with no password. The uid always starts
  /// with [`GUEST_PREFIX`].
  pub async fn create_guest(&self, name: &str, mail: &str) -> Result<String> {
    let name = name.trim();
    let slug = slugify(name, USERNAME_SEPARATOR);
    if slug.is_empty() {
      return Err(Error::InvalidInput(format!(
        "cannot derive a guest username from {name:?}"
      )));
    }
    let uid = self.generate_username(&format!("{GUEST_PREFIX}{slug}")).await?;
    let given = name.split_whitespace().next().unwrap_or(name);
    let surname = name.split_whitespace().last().unwrap_or(name);

    let attrs = vec![
      (person::attr::UID.to_owned(), vec![uid.clone()]),
      (person::attr::DISPLAY_NAME.to_owned(), vec![name.to_owned()]),
      (person::attr::COMMON_NAME.to_owned(), vec![name.to_owned()]),
      (person::attr::GIVEN_NAME.to_owned(), vec![given.to_owned()]),
      (person::attr::SURNAME.to_owned(), vec![surname.to_owned()]),
      (person::attr::MAIL.to_owned(), vec![mail.to_owned()]),
    ];

    self
      .add_unique(&uid, Partition::Guest, GUEST_OBJECT_CLASSES, attrs)
      .await?;
    tracing::info!(%uid, "guest created");
    Ok(uid)
  }

  /// Add the entry, then re-resolve the uid across every partition. If a
  /// concurrent signup claimed the same uid elsewhere, our entry is deleted
  /// again and the caller gets `DirectoryConflict`.
  async fn add_unique(
    &self,
    uid: &str,
    partition: Partition,
    object_classes: &[&str],
    attrs: Vec<(String, Vec<String>)>,
  ) -> Result<()> {
    let dn = self.backend.layout.person_dn(uid, partition);
    match self.backend.store.add(&dn, object_classes, attrs).await {
      Ok(()) => {}
      Err(DirectoryError::AlreadyExists(_)) => {
        return Err(Error::DirectoryConflict(format!("uid {uid} already exists")));
      }
      Err(e) => return Err(e.into()),
    }

    if self.backend.people_with_uid(uid).await?.len() > 1 {
      tracing::warn!(%uid, "uid claimed concurrently; backing out");
      self.backend.store.delete(&dn).await?;
      return Err(Error::DirectoryConflict(format!("uid {uid} already exists")));
    }
    Ok(())
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  /// Resolve `uid` in whichever partition it lives.
  pub async fn get_user(&self, uid: &str) -> Result<Person> {
    self.backend.person_anywhere(uid).await
  }

  /// Resolve `uid` in exactly `partition`.
  pub async fn get_user_in(&self, uid: &str, partition: Partition) -> Result<Person> {
    self.backend.person(uid, partition).await
  }

  /// All active people.
  pub async fn list_users(&self) -> Result<Vec<Person>> {
    let layout = &self.backend.layout;
    let entries = self
      .backend
      .store
      .search(
        &layout.active_base,
        &Filter::object_class(PERSON_CLASS),
        PERSON_ATTRIBUTES,
      )
      .await?;
    Ok(
      entries
        .iter()
        .filter_map(|e| Person::from_entry(e, layout))
        .filter(Person::is_active)
        .collect(),
    )
  }

  pub async fn find_by_alternative_mail(&self, mail: &str) -> Result<Option<Person>> {
    let layout = &self.backend.layout;
    let filter = Filter::and([
      Filter::object_class(PERSON_CLASS),
      Filter::eq(person::attr::ALTERNATIVE_MAIL, mail),
    ]);
    let entries = self
      .backend
      .store
      .search(&layout.people_base, &filter, PERSON_ATTRIBUTES)
      .await?;
    Ok(entries.iter().find_map(|e| Person::from_entry(e, layout)))
  }

  /// Whether `uid` exists in the active partition. Says nothing about
  /// credentials.
  pub async fn is_active(&self, uid: &str) -> Result<bool> {
    Ok(self.backend.find_person(uid, Partition::Active).await?.is_some())
  }

  // ── Lifecycle ─────────────────────────────────────────────────────────────

  /// Move an inactive person into the active partition.
  ///
  /// Pending requests made while inactive are lifted off the group, the entry
  /// is renamed, and the requests are put back against the active DN. The
  /// person then joins the general group.
  pub async fn activate_user(&self, uid: &str) -> Result<()> {
    let backend = &self.backend;
    let inactive = backend.person(uid, Partition::Inactive).await?.reference();
    let active = PersonRef::new(uid, Partition::Active);
    let pending = backend.groups_with(group::attr::PENDING, &inactive).await?;

    for (done, g) in pending.iter().enumerate() {
      backend
        .remove_relation(&g.ou, group::attr::PENDING, &inactive)
        .await
        .map_err(|e| {
          if done == 0 {
            e
          } else {
            Error::partial("activate_user", "some pending requests lifted", e)
          }
        })?;
    }

    let lifted = !pending.is_empty();
    backend
      .store
      .rename(
        &backend.layout.ref_dn(&inactive),
        &person_rdn(uid),
        &backend.layout.active_base,
      )
      .await
      .map_err(|e| {
        let e = Error::from(e);
        if lifted {
          Error::partial("activate_user", "pending requests lifted", e)
        } else {
          e
        }
      })?;

    for g in &pending {
      backend
        .add_relation(&g.ou, group::attr::PENDING, &active)
        .await
        .map_err(|e| {
          Error::partial("activate_user", "entry moved to the active partition", e)
        })?;
    }

    // Without this step the person is active but outside the general group;
    // a repair pass has to add them.
    backend
      .add_relation(&backend.layout.general_group, group::attr::MEMBER, &active)
      .await
      .map_err(|e| Error::partial("activate_user", "entry moved and requests restored", e))?;

    tracing::info!(%uid, pending = pending.len(), "user activated");
    Ok(())
  }

  /// Delete a person after removing every relation it holds.
  ///
  /// Relations are cleaned up first so that no group is left pointing at a
  /// deleted entry. Owner removal also drops the group mail alias.
  pub async fn delete_user(&self, uid: &str) -> Result<()> {
    let backend = &self.backend;
    let person = backend.person_anywhere(uid).await?.reference();
    let mut touched = false;

    let mark = |touched: bool| {
      move |e: Error| {
        if touched {
          Error::partial("delete_user", "some relations removed", e)
        } else {
          e
        }
      }
    };

    for g in backend.groups_with(group::attr::MEMBER, &person).await? {
      backend
        .remove_relation(&g.ou, group::attr::MEMBER, &person)
        .await
        .map_err(mark(touched))?;
      touched = true;
    }
    for g in backend.groups_with(group::attr::OWNER, &person).await? {
      backend.remove_owner(&g, &person).await.map_err(mark(touched))?;
      touched = true;
    }
    for g in backend.groups_with(group::attr::PENDING, &person).await? {
      backend
        .remove_relation(&g.ou, group::attr::PENDING, &person)
        .await
        .map_err(mark(touched))?;
      touched = true;
    }

    match backend.store.delete(&backend.layout.ref_dn(&person)).await {
      Ok(()) => {}
      Err(DirectoryError::NoSuchObject(_)) if !touched => {
        return Err(Error::not_found(format!("person {uid}")));
      }
      Err(e) => return Err(mark(touched)(e.into())),
    }

    tracing::info!(%uid, "user deleted");
    Ok(())
  }

  // ── Attributes ────────────────────────────────────────────────────────────

  pub async fn set_password(&self, uid: &str, new_password: &str) -> Result<()> {
    if new_password.is_empty() {
      return Err(Error::InvalidInput("password must not be empty".into()));
    }
    let person = self.backend.person_anywhere(uid).await?.reference();
    let hashed = password::hash_password(new_password)?;
    self
      .backend
      .modify_person(&person, vec![Modification::replace(person::attr::PASSWORD, hashed)])
      .await?;
    tracing::info!(%uid, "password set");
    Ok(())
  }

  pub async fn set_alternative_mail(&self, uid: &str, mail: &str) -> Result<()> {
    let person = self.backend.person_anywhere(uid).await?.reference();
    self
      .backend
      .modify_person(
        &person,
        vec![Modification::replace(person::attr::ALTERNATIVE_MAIL, mail)],
      )
      .await?;
    tracing::info!(%uid, "alternative mail set");
    Ok(())
  }

  pub async fn add_mail_alias(&self, uid: &str, mail: &str) -> Result<()> {
    let person = self.backend.person_anywhere(uid).await?.reference();
    self.backend.add_alias(&person, mail).await
  }

  pub async fn remove_mail_alias(&self, uid: &str, mail: &str) -> Result<()> {
    let person = self.backend.person_anywhere(uid).await?.reference();
    self.backend.remove_alias(&person, mail).await
  }

  // ── Credentials ───────────────────────────────────────────────────────────

  /// Bind as `uid` with `password`, looking in the active partition first and
  /// the inactive one second. Guests never authenticate.
  ///
  /// Every failure, including an unknown uid or a directory error, yields
  /// [`PasswordCheck::FAILED`].
  pub async fn check_password(&self, uid: &str, password: &str) -> PasswordCheck {
    // An empty password would be an anonymous bind, which directories accept.
    if password.is_empty() {
      return PasswordCheck::FAILED;
    }

    let mut found = None;
    for (partition, was_inactive) in [(Partition::Active, false), (Partition::Inactive, true)] {
      match self.backend.find_person(uid, partition).await {
        Ok(Some(p)) => {
          found = Some((p.reference(), was_inactive));
          break;
        }
        Ok(None) => {}
        Err(e) => {
          tracing::warn!(%uid, error = %e, "person lookup failed during password check");
          return PasswordCheck::FAILED;
        }
      }
    }

    let Some((person, was_inactive)) = found else {
      // An unknown uid costs a bind and a hash verification, like a wrong
      // password.
      let absent = PersonRef::new(uid, Partition::Inactive);
      let _ = self.backend.store.bind(&self.backend.layout.ref_dn(&absent), password).await;
      password::verify_against_decoy(password);
      tracing::debug!(%uid, "password check for unknown uid");
      return PasswordCheck::FAILED;
    };

    let dn = self.backend.layout.ref_dn(&person);
    match self.backend.store.bind(&dn, password).await {
      Ok(()) => PasswordCheck { success: true, was_inactive },
      Err(e) => {
        tracing::debug!(%uid, error = %e, "bind rejected");
        PasswordCheck::FAILED
      }
    }
  }
}
