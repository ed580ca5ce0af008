//! Handlers for `/groups`.
//!
//! | Method | Path | Who |
//! |--------|------|-----|
//! | `GET`  | `/groups`, `/groups/{ou}` | authenticated |
//! | `GET`  | `/groups/{ou}/members` | authenticated |
//! | `POST` | `/groups/{ou}/members` | owner or privileged |
//! | `DELETE` | `/groups/{ou}/members/{uid}` | self, owner or privileged |
//! | `GET`  | `/groups/{ou}/owners` | authenticated |
//! | `POST` | `/groups/{ou}/owners` | owner or privileged |
//! | `DELETE` | `/groups/{ou}/owners/{uid}` | owner or privileged, never the admin or the last owner |
//! | `GET`  | `/groups/{ou}/pending` | owner or privileged |
//! | `POST` | `/groups/{ou}/pending` | the caller, for themselves |
//! | `POST` | `/groups/{ou}/pending/{uid}/accept` | owner or privileged |
//! | `DELETE` | `/groups/{ou}/pending/{uid}` | self, owner or privileged |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use roster_core::{
  directory::DirectoryStore,
  group::{Group, RosterEntry},
  layout::Partition,
  person::Person,
};
use serde::{Deserialize, Serialize};

use crate::{AppState, auth::Caller, error::Result};

fn owner_or_privileged<D>(state: &AppState<D>, caller: &str, group: &Group) -> bool {
  state.policy.is_owner_of(caller, group) || state.policy.is_privileged_user(caller)
}

#[derive(Debug, Deserialize)]
pub struct UidBody {
  pub uid: String,
}

// ─── Groups ──────────────────────────────────────────────────────────────────

/// `GET /groups`
pub async fn list<D: DirectoryStore + 'static>(
  State(state): State<AppState<D>>,
  _caller: Caller,
) -> Result<Json<Vec<Group>>> {
  Ok(Json(state.engine.list_groups().await?))
}

/// `GET /groups/{ou}`
pub async fn get_one<D: DirectoryStore + 'static>(
  State(state): State<AppState<D>>,
  _caller: Caller,
  Path(ou): Path<String>,
) -> Result<Json<Group>> {
  Ok(Json(state.engine.get_group(&ou).await?))
}

// ─── Members ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct MembersView {
  /// Owners and active members, one entry per person.
  pub roster: Vec<RosterEntry>,
  pub guests: Vec<Person>,
}

/// `GET /groups/{ou}/members`
pub async fn members<D: DirectoryStore + 'static>(
  State(state): State<AppState<D>>,
  _caller: Caller,
  Path(ou): Path<String>,
) -> Result<Json<MembersView>> {
  Ok(Json(MembersView {
    roster: state.engine.roster(&ou).await?,
    guests: state.engine.guests(&ou).await?,
  }))
}

/// `POST /groups/{ou}/members`
pub async fn add_member<D: DirectoryStore + 'static>(
  State(state): State<AppState<D>>,
  Caller(caller): Caller,
  Path(ou): Path<String>,
  Json(body): Json<UidBody>,
) -> Result<StatusCode> {
  let group = state.engine.get_group(&ou).await?;
  state.policy.ensure(owner_or_privileged(&state, &caller, &group))?;
  state.engine.add_member(&ou, &body.uid).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Serialize)]
pub struct RemovalOutcome {
  /// The person had no reason left to keep an account and was deleted.
  pub account_deleted: bool,
}

/// `DELETE /groups/{ou}/members/{uid}`. Removal from the general group, or
/// of the last relation a person holds, deletes the account.
pub async fn remove_member<D: DirectoryStore + 'static>(
  State(state): State<AppState<D>>,
  Caller(caller): Caller,
  Path((ou, uid)): Path<(String, String)>,
) -> Result<Json<RemovalOutcome>> {
  let group = state.engine.get_group(&ou).await?;
  state.policy.ensure(
    state.policy.is_self_or_owner(&caller, &uid, &group)
      || state.policy.is_privileged_user(&caller),
  )?;

  state.engine.remove_member(&ou, &uid).await?;
  let account_deleted = state.engine.account_should_be_deleted(&ou, &uid).await?;
  if account_deleted {
    state.identity.delete_user(&uid).await?;
    tracing::info!(%uid, group = %ou, by = %caller, "account deleted after last removal");
  }
  Ok(Json(RemovalOutcome { account_deleted }))
}

// ─── Owners ──────────────────────────────────────────────────────────────────

/// `GET /groups/{ou}/owners`
pub async fn owners<D: DirectoryStore + 'static>(
  State(state): State<AppState<D>>,
  _caller: Caller,
  Path(ou): Path<String>,
) -> Result<Json<Vec<Person>>> {
  Ok(Json(state.engine.owners(&ou).await?))
}

/// `POST /groups/{ou}/owners`
pub async fn add_owner<D: DirectoryStore + 'static>(
  State(state): State<AppState<D>>,
  Caller(caller): Caller,
  Path(ou): Path<String>,
  Json(body): Json<UidBody>,
) -> Result<StatusCode> {
  let group = state.engine.get_group(&ou).await?;
  state.policy.ensure(owner_or_privileged(&state, &caller, &group))?;
  state.engine.add_owner(&ou, &body.uid).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /groups/{ou}/owners/{uid}`
pub async fn remove_owner<D: DirectoryStore + 'static>(
  State(state): State<AppState<D>>,
  Caller(caller): Caller,
  Path((ou, uid)): Path<(String, String)>,
) -> Result<StatusCode> {
  let group = state.engine.get_group(&ou).await?;
  state.policy.ensure(state.policy.may_remove_owner(&caller, &uid, &group))?;
  state.engine.remove_owner(&ou, &uid).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Pending requests ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PendingView {
  pub active:   Vec<Person>,
  /// Requests filed during onboarding; accepting one activates the person.
  pub inactive: Vec<Person>,
}

/// `GET /groups/{ou}/pending`
pub async fn pending<D: DirectoryStore + 'static>(
  State(state): State<AppState<D>>,
  Caller(caller): Caller,
  Path(ou): Path<String>,
) -> Result<Json<PendingView>> {
  let group = state.engine.get_group(&ou).await?;
  state.policy.ensure(owner_or_privileged(&state, &caller, &group))?;
  Ok(Json(PendingView {
    active:   state.engine.pending(&ou, Partition::Active).await?,
    inactive: state.engine.pending(&ou, Partition::Inactive).await?,
  }))
}

/// `POST /groups/{ou}/pending`: the caller asks to join. No ownership is
/// needed. A caller that has not been activated yet files an onboarding
/// request instead.
pub async fn request_membership<D: DirectoryStore + 'static>(
  State(state): State<AppState<D>>,
  Caller(caller): Caller,
  Path(ou): Path<String>,
) -> Result<StatusCode> {
  if state.identity.is_active(&caller).await? {
    state.engine.request_active_pending(&ou, &caller).await?;
  } else {
    state.engine.request_inactive_pending(&ou, &caller).await?;
  }
  Ok(StatusCode::ACCEPTED)
}

/// `POST /groups/{ou}/pending/{uid}/accept`
pub async fn accept_pending<D: DirectoryStore + 'static>(
  State(state): State<AppState<D>>,
  Caller(caller): Caller,
  Path((ou, uid)): Path<(String, String)>,
) -> Result<StatusCode> {
  let group = state.engine.get_group(&ou).await?;
  state.policy.ensure(owner_or_privileged(&state, &caller, &group))?;
  state.engine.accept_pending_member(&ou, &uid).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /groups/{ou}/pending/{uid}`: withdrawal by the requester or
/// rejection by an owner.
pub async fn remove_pending<D: DirectoryStore + 'static>(
  State(state): State<AppState<D>>,
  Caller(caller): Caller,
  Path((ou, uid)): Path<(String, String)>,
) -> Result<StatusCode> {
  let group = state.engine.get_group(&ou).await?;
  state.policy.ensure(
    state.policy.is_self_or_owner(&caller, &uid, &group)
      || state.policy.is_privileged_user(&caller),
  )?;
  state.engine.remove_pending_member(&ou, &uid).await?;
  Ok(StatusCode::NO_CONTENT)
}
