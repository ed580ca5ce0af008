//! Lookup and relation primitives shared by the identity and membership
//! components.

use std::sync::Arc;

use crate::{
  Error, Result,
  directory::{DirectoryError, DirectoryStore, Filter, Modification},
  group::{self, GROUP_ATTRIBUTES, GROUP_CLASS, Group},
  layout::{DirectoryLayout, Partition, PersonRef},
  person::{self, PERSON_ATTRIBUTES, PERSON_CLASS, Person},
};

pub(crate) struct Backend<D> {
  pub store:  Arc<D>,
  pub layout: Arc<DirectoryLayout>,
}

impl<D> Clone for Backend<D> {
  fn clone(&self) -> Self {
    Self { store: Arc::clone(&self.store), layout: Arc::clone(&self.layout) }
  }
}

fn person_filter(uid: &str) -> Filter {
  Filter::and([Filter::object_class(PERSON_CLASS), Filter::eq(person::attr::UID, uid)])
}

impl<D: DirectoryStore> Backend<D> {
  pub fn new(store: Arc<D>, layout: Arc<DirectoryLayout>) -> Self {
    Self { store, layout }
  }

  // ── People ────────────────────────────────────────────────────────────────

  pub async fn find_person(
    &self,
    uid: &str,
    partition: Partition,
  ) -> Result<Option<Person>> {
    let base = self.layout.partition_base(partition);
    let entries = self
      .store
      .search(base, &person_filter(uid), PERSON_ATTRIBUTES)
      .await?;
    Ok(
      entries
        .iter()
        .filter_map(|e| Person::from_entry(e, &self.layout))
        .find(|p| p.state == partition),
    )
  }

  /// Resolve `uid` in `partition`, or fail with `NotFound`.
  pub async fn person(&self, uid: &str, partition: Partition) -> Result<Person> {
    self
      .find_person(uid, partition)
      .await?
      .ok_or_else(|| Error::not_found(format!("person {uid}")))
  }

  /// Every entry carrying `uid`, across all person partitions.
  pub async fn people_with_uid(&self, uid: &str) -> Result<Vec<Person>> {
    let entries = self
      .store
      .search(&self.layout.people_base, &person_filter(uid), PERSON_ATTRIBUTES)
      .await?;
    Ok(
      entries
        .iter()
        .filter_map(|e| Person::from_entry(e, &self.layout))
        .collect(),
    )
  }

  /// Resolve `uid` wherever it lives. The result is tagged with the partition
  /// it was found in.
  pub async fn person_anywhere(&self, uid: &str) -> Result<Person> {
    self
      .people_with_uid(uid)
      .await?
      .into_iter()
      .next()
      .ok_or_else(|| Error::not_found(format!("person {uid}")))
  }

  /// Resolve each reference, skipping (and logging) those that no longer
  /// point at an entry.
  pub async fn resolve_refs<'a>(
    &self,
    refs: impl IntoIterator<Item = &'a PersonRef>,
  ) -> Result<Vec<Person>> {
    let mut people = Vec::new();
    for r in refs {
      match self.find_person(&r.uid, r.partition).await? {
        Some(p) => people.push(p),
        None => tracing::warn!(
          uid = %r.uid,
          partition = ?r.partition,
          "skipping dangling person reference"
        ),
      }
    }
    Ok(people)
  }

  // ── Groups ────────────────────────────────────────────────────────────────

  async fn search_groups(&self, filter: &Filter) -> Result<Vec<Group>> {
    let entries = self
      .store
      .search(&self.layout.groups_base, filter, GROUP_ATTRIBUTES)
      .await?;
    Ok(
      entries
        .iter()
        .filter_map(|e| Group::from_entry(e, &self.layout))
        .collect(),
    )
  }

  pub async fn groups(&self) -> Result<Vec<Group>> {
    self.search_groups(&Filter::object_class(GROUP_CLASS)).await
  }

  pub async fn group(&self, ou: &str) -> Result<Group> {
    let filter = Filter::and([
      Filter::object_class(GROUP_CLASS),
      Filter::eq(group::attr::OU, ou),
    ]);
    self
      .search_groups(&filter)
      .await?
      .into_iter()
      .next()
      .ok_or_else(|| Error::not_found(format!("group {ou}")))
  }

  /// Groups whose `relation` attribute contains `person`.
  pub async fn groups_with(
    &self,
    relation: &str,
    person: &PersonRef,
  ) -> Result<Vec<Group>> {
    let filter = Filter::and([
      Filter::object_class(GROUP_CLASS),
      Filter::eq(relation, self.layout.ref_dn(person)),
    ]);
    self.search_groups(&filter).await
  }

  // ── Relations ─────────────────────────────────────────────────────────────

  /// Add `person` to the `relation` set of group `ou`. Already present is
  /// fine.
  pub async fn add_relation(
    &self,
    ou: &str,
    relation: &str,
    person: &PersonRef,
  ) -> Result<()> {
    let group_dn = self.layout.group_dn(ou);
    let value = self.layout.ref_dn(person);
    match self
      .store
      .modify(&group_dn, vec![Modification::add(relation, value)])
      .await
    {
      Ok(()) | Err(DirectoryError::ValueExists(_)) => Ok(()),
      Err(DirectoryError::NoSuchObject(_)) => {
        Err(Error::not_found(format!("group {ou}")))
      }
      Err(e) => Err(e.into()),
    }
  }

  /// Remove `person` from the `relation` set of group `ou`. Already absent is
  /// fine.
  pub async fn remove_relation(
    &self,
    ou: &str,
    relation: &str,
    person: &PersonRef,
  ) -> Result<()> {
    let group_dn = self.layout.group_dn(ou);
    let value = self.layout.ref_dn(person);
    match self
      .store
      .modify(&group_dn, vec![Modification::delete(relation, value)])
      .await
    {
      Ok(()) | Err(DirectoryError::NoSuchValue(_)) => Ok(()),
      Err(DirectoryError::NoSuchObject(_)) => {
        Err(Error::not_found(format!("group {ou}")))
      }
      Err(e) => Err(e.into()),
    }
  }

  // ── Person attributes ─────────────────────────────────────────────────────

  pub async fn modify_person(
    &self,
    person: &PersonRef,
    mods: Vec<Modification>,
  ) -> Result<()> {
    match self.store.modify(&self.layout.ref_dn(person), mods).await {
      Ok(()) => Ok(()),
      Err(DirectoryError::NoSuchObject(_)) => {
        Err(Error::not_found(format!("person {}", person.uid)))
      }
      Err(e) => Err(e.into()),
    }
  }

  pub async fn add_alias(&self, person: &PersonRef, mail: &str) -> Result<()> {
    match self
      .modify_person(person, vec![Modification::add(person::attr::MAIL_ALIAS, mail)])
      .await
    {
      Err(Error::Directory(DirectoryError::ValueExists(_))) => Ok(()),
      other => other,
    }
  }

  pub async fn remove_alias(&self, person: &PersonRef, mail: &str) -> Result<()> {
    match self
      .modify_person(
        person,
        vec![Modification::delete(person::attr::MAIL_ALIAS, mail)],
      )
      .await
    {
      Err(Error::Directory(DirectoryError::NoSuchValue(_))) => Ok(()),
      other => other,
    }
  }

  // ── Ownership ─────────────────────────────────────────────────────────────

  /// Add an owner and, if the group has a mail address, the matching alias.
  pub async fn add_owner(&self, group: &Group, person: &PersonRef) -> Result<()> {
    self.add_relation(&group.ou, group::attr::OWNER, person).await?;
    if let Some(mail) = &group.mail {
      self
        .add_alias(person, mail)
        .await
        .map_err(|e| Error::partial("add_owner", "owner relation added", e))?;
    }
    tracing::info!(group = %group.ou, uid = %person.uid, "owner added");
    Ok(())
  }

  /// Remove an owner and the group's mail alias, if any. The alias stays while
  /// another group the person still owns uses the same address.
  pub async fn remove_owner(
    &self,
    group: &Group,
    person: &PersonRef,
  ) -> Result<()> {
    self.remove_relation(&group.ou, group::attr::OWNER, person).await?;
    if let Some(mail) = &group.mail {
      let partial = |e| Error::partial("remove_owner", "owner relation removed", e);
      let still_mapped = self
        .groups_with(group::attr::OWNER, person)
        .await
        .map_err(partial)?
        .iter()
        .any(|g| g.ou != group.ou && g.mail.as_deref() == Some(mail.as_str()));
      if !still_mapped {
        self.remove_alias(person, mail).await.map_err(partial)?;
      }
    }
    tracing::info!(group = %group.ou, uid = %person.uid, "owner removed");
    Ok(())
  }
}
