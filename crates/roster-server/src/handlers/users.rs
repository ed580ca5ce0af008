//! Handlers for `/users` and `/guests`.
//!
//! | Method | Path | Who |
//! |--------|------|-----|
//! | `POST` | `/users` | anyone (signup) |
//! | `POST` | `/users/confirm` | initial-confirmation token |
//! | `GET`  | `/users` | authenticated |
//! | `GET`  | `/users/{uid}` | authenticated |
//! | `DELETE` | `/users/{uid}` | self or privileged |
//! | `POST` | `/users/{uid}/password` | self |
//! | `POST` | `/users/{uid}/alternative_mail` | self |
//! | `POST` | `/users/alternative_mail/confirm` | the token's subject |
//! | `POST` | `/users/{uid}/activate` | privileged |
//! | `GET`  | `/users/{uid}/groups?relation=` | self or privileged |
//! | `POST` | `/guests` | owner of some group |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use roster_core::{
  directory::DirectoryStore,
  group::{Group, GroupRelation},
  notify::Notification,
  person::{NewMember, Person},
  token::TokenKind,
};
use serde::{Deserialize, Serialize};

use crate::{
  AppState,
  auth::Caller,
  error::{Error, Result},
};

pub const INITIAL_CONFIRMATION_TEMPLATE: &str = "initial_confirmation_mail";
pub const EMAIL_CONFIRMATION_TEMPLATE: &str = "email_confirmation_mail";

#[derive(Debug, Serialize)]
pub struct Created {
  pub uid: String,
}

// ─── Signup ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SignupBody {
  pub first_name:       String,
  pub last_name:        String,
  pub alternative_mail: String,
  /// Groups to request membership in once activated.
  #[serde(default)]
  pub groups:           Vec<String>,
}

/// `POST /users`: create an inactive member, file its join requests and mail
/// a confirmation link to the alternative address.
pub async fn signup<D: DirectoryStore + 'static>(
  State(state): State<AppState<D>>,
  Json(body): Json<SignupBody>,
) -> Result<impl IntoResponse> {
  if body.alternative_mail.trim().is_empty() {
    return Err(Error::BadRequest("alternative_mail is required".into()));
  }

  let uid = state
    .identity
    .create_member(NewMember {
      first_name:       body.first_name.clone(),
      last_name:        body.last_name.clone(),
      alternative_mail: body.alternative_mail.clone(),
      password:         None,
    })
    .await?;

  for ou in &body.groups {
    // The account exists now; a bad group name must not undo the signup.
    if let Err(e) = state.engine.request_inactive_pending(ou, &uid).await {
      tracing::warn!(%uid, group = %ou, error = %e, "signup join request failed");
    }
  }

  let token = state.tokens.issue(
    &uid,
    TokenKind::InitialConfirmation,
    Some(&body.alternative_mail),
  )?;
  state.notifier.notify(
    Notification::new(
      &body.alternative_mail,
      "Confirm your account",
      INITIAL_CONFIRMATION_TEMPLATE,
    )
    .var("name", format!("{} {}", body.first_name.trim(), body.last_name.trim()))
    .var("uid", &uid)
    .var("token", &token)
    .var("confirm_url", format!("{}/confirm?token={token}", state.config.frontend_url)),
  );

  Ok((StatusCode::CREATED, Json(Created { uid })))
}

#[derive(Debug, Deserialize)]
pub struct TokenPasswordBody {
  pub token:    String,
  pub password: String,
}

/// `POST /users/confirm`: set the first password.
pub async fn confirm_signup<D: DirectoryStore + 'static>(
  State(state): State<AppState<D>>,
  Json(body): Json<TokenPasswordBody>,
) -> Result<StatusCode> {
  let claims = state
    .tokens
    .verify(&body.token, TokenKind::InitialConfirmation)?;
  state.identity.set_password(&claims.sub, &body.password).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Reads ───────────────────────────────────────────────────────────────────

/// `GET /users`
pub async fn list<D: DirectoryStore + 'static>(
  State(state): State<AppState<D>>,
  _caller: Caller,
) -> Result<Json<Vec<Person>>> {
  Ok(Json(state.identity.list_users().await?))
}

/// `GET /users/{uid}`
pub async fn get_one<D: DirectoryStore + 'static>(
  State(state): State<AppState<D>>,
  _caller: Caller,
  Path(uid): Path<String>,
) -> Result<Json<Person>> {
  Ok(Json(state.identity.get_user(&uid).await?))
}

#[derive(Debug, Deserialize)]
pub struct GroupsParams {
  #[serde(default = "default_relation")]
  pub relation: GroupRelation,
}

fn default_relation() -> GroupRelation { GroupRelation::Member }

/// `GET /users/{uid}/groups[?relation=member|owner|active_pending|inactive_pending]`
pub async fn groups<D: DirectoryStore + 'static>(
  State(state): State<AppState<D>>,
  Caller(caller): Caller,
  Path(uid): Path<String>,
  Query(params): Query<GroupsParams>,
) -> Result<Json<Vec<Group>>> {
  state
    .policy
    .ensure(caller == uid || state.policy.is_privileged_user(&caller))?;
  let groups = state
    .engine
    .list_groups_by_relation(&uid, params.relation)
    .await?;
  Ok(Json(groups))
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

/// `DELETE /users/{uid}`
pub async fn delete_one<D: DirectoryStore + 'static>(
  State(state): State<AppState<D>>,
  Caller(caller): Caller,
  Path(uid): Path<String>,
) -> Result<StatusCode> {
  state
    .policy
    .ensure(caller == uid || state.policy.is_privileged_user(&caller))?;
  state.identity.delete_user(&uid).await?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /users/{uid}/activate`
pub async fn activate<D: DirectoryStore + 'static>(
  State(state): State<AppState<D>>,
  Caller(caller): Caller,
  Path(uid): Path<String>,
) -> Result<StatusCode> {
  state.policy.ensure(state.policy.is_privileged_user(&caller))?;
  state.identity.activate_user(&uid).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Credentials and addresses ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PasswordBody {
  pub password: String,
}

/// `POST /users/{uid}/password`
pub async fn set_password<D: DirectoryStore + 'static>(
  State(state): State<AppState<D>>,
  Caller(caller): Caller,
  Path(uid): Path<String>,
  Json(body): Json<PasswordBody>,
) -> Result<StatusCode> {
  state.policy.ensure(caller == uid)?;
  state.identity.set_password(&uid, &body.password).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct MailBody {
  pub mail: String,
}

/// `POST /users/{uid}/alternative_mail`: mail a confirmation link to the new
/// address. Nothing changes until it is confirmed.
pub async fn change_alternative_mail<D: DirectoryStore + 'static>(
  State(state): State<AppState<D>>,
  Caller(caller): Caller,
  Path(uid): Path<String>,
  Json(body): Json<MailBody>,
) -> Result<StatusCode> {
  state.policy.ensure(caller == uid)?;
  let person = state.identity.get_user(&uid).await?;
  let token = state
    .tokens
    .issue(&uid, TokenKind::EmailConfirmation, Some(&body.mail))?;
  state.notifier.notify(
    Notification::new(&body.mail, "Confirm your new address", EMAIL_CONFIRMATION_TEMPLATE)
      .var("name", &person.display_name)
      .var("token", &token)
      .var(
        "confirm_url",
        format!("{}/confirm_mail?token={token}", state.config.frontend_url),
      ),
  );
  Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize)]
pub struct TokenBody {
  pub token: String,
}

/// `POST /users/alternative_mail/confirm`
pub async fn confirm_alternative_mail<D: DirectoryStore + 'static>(
  State(state): State<AppState<D>>,
  Caller(caller): Caller,
  Json(body): Json<TokenBody>,
) -> Result<StatusCode> {
  let claims = state.tokens.verify(&body.token, TokenKind::EmailConfirmation)?;
  state.policy.ensure(claims.sub == caller)?;
  let mail = claims.email.ok_or(Error::Unauthorized)?;
  state.identity.set_alternative_mail(&claims.sub, &mail).await?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Guests ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GuestBody {
  pub name:  String,
  pub mail:  String,
  /// Group the guest is added to as a member.
  pub group: String,
}

/// `POST /guests`
pub async fn create_guest<D: DirectoryStore + 'static>(
  State(state): State<AppState<D>>,
  Caller(caller): Caller,
  Json(body): Json<GuestBody>,
) -> Result<impl IntoResponse> {
  let groups = state.engine.list_groups().await?;
  state
    .policy
    .ensure(state.policy.is_group_owner_anywhere(&caller, &groups))?;
  if !groups.iter().any(|g| g.ou == body.group) {
    return Err(Error::NotFound);
  }

  let uid = state.identity.create_guest(&body.name, &body.mail).await?;
  state.engine.add_member(&body.group, &uid).await?;
  tracing::info!(%uid, group = %body.group, by = %caller, "guest added");
  Ok((StatusCode::CREATED, Json(Created { uid })))
}
