//! [`GroupMembershipEngine`]: groups and the owner, member and pending
//! relations people hold on them.
//!
//! Pending requests come in two flavours that are stored identically: those
//! made by inactive people during onboarding and those made later by active
//! people. Which one a stored reference is follows from the partition its DN
//! points into.

use std::sync::Arc;

use crate::{
  Error, Result,
  backend::Backend,
  directory::DirectoryStore,
  group::{self, Group, GroupRelation, RosterEntry, RosterRole},
  identity::IdentityDirectory,
  layout::{DirectoryLayout, Partition},
  notify::{Notification, Notifier},
  person::Person,
};

/// Template used to tell owners about a new join request.
pub const PENDING_REQUEST_TEMPLATE: &str = "new_pending_member_mail";

pub struct GroupMembershipEngine<D> {
  backend:  Backend<D>,
  identity: IdentityDirectory<D>,
  notifier: Arc<dyn Notifier>,
}

impl<D> Clone for GroupMembershipEngine<D> {
  fn clone(&self) -> Self {
    Self {
      backend:  self.backend.clone(),
      identity: self.identity.clone(),
      notifier: Arc::clone(&self.notifier),
    }
  }
}

impl<D: DirectoryStore> GroupMembershipEngine<D> {
  pub fn new(
    store: Arc<D>,
    layout: Arc<DirectoryLayout>,
    notifier: Arc<dyn Notifier>,
  ) -> Self {
    Self {
      identity: IdentityDirectory::new(Arc::clone(&store), Arc::clone(&layout)),
      backend: Backend::new(store, layout),
      notifier,
    }
  }

  // ── Groups ────────────────────────────────────────────────────────────────

  pub async fn list_groups(&self) -> Result<Vec<Group>> {
    self.backend.groups().await
  }

  pub async fn get_group(&self, ou: &str) -> Result<Group> {
    self.backend.group(ou).await
  }

  /// Groups in which `uid` holds `relation`.
  ///
  /// The person is resolved in the partition the relation implies first;
  /// a uid missing there is `NotFound`.
  pub async fn list_groups_by_relation(
    &self,
    uid: &str,
    relation: GroupRelation,
  ) -> Result<Vec<Group>> {
    let person = self.backend.person(uid, relation.partition()).await?;
    self
      .backend
      .groups_with(relation.attribute(), &person.reference())
      .await
  }

  // ── Listings ──────────────────────────────────────────────────────────────
  //
  // References to people that no longer exist are skipped, never fatal.

  /// Active members of `ou`.
  pub async fn members(&self, ou: &str) -> Result<Vec<Person>> {
    let g = self.backend.group(ou).await?;
    self
      .backend
      .resolve_refs(g.members.iter().filter(|r| r.partition == Partition::Active).collect::<Vec<_>>())
      .await
  }

  /// Guest members of `ou`.
  pub async fn guests(&self, ou: &str) -> Result<Vec<Person>> {
    let g = self.backend.group(ou).await?;
    self
      .backend
      .resolve_refs(g.members.iter().filter(|r| r.partition == Partition::Guest).collect::<Vec<_>>())
      .await
  }

  pub async fn owners(&self, ou: &str) -> Result<Vec<Person>> {
    let g = self.backend.group(ou).await?;
    self.backend.resolve_refs(&g.owners).await
  }

  /// Pending requests on `ou` made from `partition`.
  pub async fn pending(&self, ou: &str, partition: Partition) -> Result<Vec<Person>> {
    let g = self.backend.group(ou).await?;
    self
      .backend
      .resolve_refs(g.pending.iter().filter(|r| r.partition == partition).collect::<Vec<_>>())
      .await
  }

  /// Owners and members merged into one list, one entry per person. Owners
  /// are listed as owners even if they are also stored as members.
  pub async fn roster(&self, ou: &str) -> Result<Vec<RosterEntry>> {
    let g = self.backend.group(ou).await?;
    let owners = self.backend.resolve_refs(&g.owners).await?;
    let members = self
      .backend
      .resolve_refs(g.members.iter().filter(|r| !g.has_owner(&r.uid)).collect::<Vec<_>>())
      .await?;

    Ok(
      owners
        .into_iter()
        .map(|person| RosterEntry { person, role: RosterRole::Owner })
        .chain(
          members
            .into_iter()
            .map(|person| RosterEntry { person, role: RosterRole::Member }),
        )
        .collect(),
    )
  }

  // ── Members ───────────────────────────────────────────────────────────────

  /// Add `uid` to the members of `ou`, at the location the person currently
  /// lives (active or guest).
  pub async fn add_member(&self, ou: &str, uid: &str) -> Result<()> {
    let person = self.backend.person_anywhere(uid).await?.reference();
    self
      .backend
      .add_relation(ou, group::attr::MEMBER, &person)
      .await?;
    tracing::info!(group = %ou, %uid, "member added");
    Ok(())
  }

  /// Remove `uid` from the members of `ou`. The caller must then check
  /// [`GroupMembershipEngine::account_should_be_deleted`].
  pub async fn remove_member(&self, ou: &str, uid: &str) -> Result<()> {
    let person = self.backend.person_anywhere(uid).await?.reference();
    self
      .backend
      .remove_relation(ou, group::attr::MEMBER, &person)
      .await?;
    tracing::info!(group = %ou, %uid, "member removed");
    Ok(())
  }

  // ── Owners ────────────────────────────────────────────────────────────────

  /// Make an active person an owner of `ou`. If the group has a mail address
  /// the person receives it as an alias.
  pub async fn add_owner(&self, ou: &str, uid: &str) -> Result<()> {
    let g = self.backend.group(ou).await?;
    let person = self.backend.person(uid, Partition::Active).await?;
    self.backend.add_owner(&g, &person.reference()).await
  }

  /// Undo [`GroupMembershipEngine::add_owner`], alias included.
  pub async fn remove_owner(&self, ou: &str, uid: &str) -> Result<()> {
    let g = self.backend.group(ou).await?;
    let person = self.backend.person(uid, Partition::Active).await?;
    self.backend.remove_owner(&g, &person.reference()).await
  }

  // ── Pending requests ──────────────────────────────────────────────────────

  /// An active person asks to join `ou`. Every owner is notified; the request
  /// stands whether or not the notifications go out.
  ///
  /// No ownership of the target group is required.
  pub async fn request_active_pending(&self, ou: &str, uid: &str) -> Result<()> {
    let g = self.backend.group(ou).await?;
    let requester = self.backend.person(uid, Partition::Active).await?;
    self
      .backend
      .add_relation(ou, group::attr::PENDING, &requester.reference())
      .await?;
    tracing::info!(group = %ou, %uid, "join request recorded");

    let owners = match self.backend.resolve_refs(&g.owners).await {
      Ok(owners) => owners,
      Err(e) => {
        tracing::warn!(group = %ou, error = %e, "cannot resolve owners to notify");
        return Ok(());
      }
    };

    for owner in owners {
      let Some(to) = owner.primary_mail.clone() else {
        tracing::warn!(group = %ou, owner = %owner.uid, "owner has no mail address");
        continue;
      };
      self.notifier.notify(
        Notification::new(
          to,
          format!("New membership request for {}", g.common_name),
          PENDING_REQUEST_TEMPLATE,
        )
        .var("name", &owner.display_name)
        .var("group_name", &g.common_name)
        .var("new_member_name", &requester.display_name),
      );
    }
    Ok(())
  }

  /// An inactive person, still onboarding, asks to join `ou`. Owners see the
  /// request once they accept it, which also activates the person.
  pub async fn request_inactive_pending(&self, ou: &str, uid: &str) -> Result<()> {
    let person = self.backend.person(uid, Partition::Inactive).await?;
    self
      .backend
      .add_relation(ou, group::attr::PENDING, &person.reference())
      .await?;
    tracing::info!(group = %ou, %uid, "onboarding join request recorded");
    Ok(())
  }

  /// Grant a pending request. `NotFound` if `uid` has none on `ou`.
  ///
  /// If the request was made while inactive, accepting it activates the
  /// person first. Either way the (active) pending reference is removed and a
  /// member reference added.
  pub async fn accept_pending_member(&self, ou: &str, uid: &str) -> Result<()> {
    let g = self.backend.group(ou).await?;
    if g.pending_for(uid).next().is_none() {
      return Err(Error::not_found(format!("pending request of {uid} on {ou}")));
    }

    let was_inactive = g.has_pending(uid, Partition::Inactive)
      && self
        .backend
        .find_person(uid, Partition::Inactive)
        .await?
        .is_some();
    if was_inactive {
      self.identity.activate_user(uid).await?;
    }

    let person = self.backend.person(uid, Partition::Active).await?.reference();
    self
      .backend
      .remove_relation(ou, group::attr::PENDING, &person)
      .await
      .map_err(|e| {
        if was_inactive {
          Error::partial("accept_pending_member", "person activated", e)
        } else {
          e
        }
      })?;
    self
      .backend
      .add_relation(ou, group::attr::MEMBER, &person)
      .await
      .map_err(|e| Error::partial("accept_pending_member", "pending request removed", e))?;

    tracing::info!(group = %ou, %uid, activated = was_inactive, "pending member accepted");
    Ok(())
  }

  /// Drop every pending reference `uid` holds on `ou`, from either partition.
  /// Used both for self-withdrawal and for an owner's rejection; who may call
  /// it is decided by [`crate::policy::AccessPolicy`].
  pub async fn remove_pending_member(&self, ou: &str, uid: &str) -> Result<()> {
    let g = self.backend.group(ou).await?;
    for r in g.pending_for(uid) {
      self.backend.remove_relation(ou, group::attr::PENDING, r).await?;
    }
    tracing::info!(group = %ou, %uid, "pending request removed");
    Ok(())
  }

  // ── Cascade ───────────────────────────────────────────────────────────────

  /// Whether the account of `uid` must be deleted after being removed from
  /// `ou`: always for the general group, otherwise once no member, owner or
  /// active pending relation remains anywhere.
  pub async fn account_should_be_deleted(&self, ou: &str, uid: &str) -> Result<bool> {
    if ou == self.backend.layout.general_group {
      return Ok(true);
    }

    let person = self.backend.person_anywhere(uid).await?.reference();
    for relation in [GroupRelation::Member, GroupRelation::Owner, GroupRelation::ActivePending] {
      if !self
        .backend
        .groups_with(relation.attribute(), &person)
        .await?
        .is_empty()
      {
        return Ok(false);
      }
    }
    Ok(true)
  }
}
