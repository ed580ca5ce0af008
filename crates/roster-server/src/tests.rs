//! Router tests against the in-memory directory.

use std::sync::{Arc, Mutex};

use axum::{
  body::Body,
  http::{Request, StatusCode, header},
  response::Response,
};
use roster_core::{
  directory::DirectoryStore,
  layout::{DirectoryLayout, Partition},
  notify::{Notification, Notifier},
  person::NewMember,
  token::TokenKind,
};
use roster_memory::MemoryDirectory;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::{AppState, BackendKind, ServerConfig, router, tokens::JwtTokenService};

// ─── Fixtures ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct Outbox(Mutex<Vec<Notification>>);

impl Notifier for Outbox {
  fn notify(&self, notification: Notification) {
    self.0.lock().unwrap().push(notification);
  }
}

impl Outbox {
  fn take(&self) -> Vec<Notification> { std::mem::take(&mut self.0.lock().unwrap()) }
}

fn config() -> ServerConfig {
  ServerConfig {
    host:                "127.0.0.1".into(),
    port:                0,
    backend:             BackendKind::Memory,
    ldap:                None,
    directory:           DirectoryLayout {
      groups_base:   "ou=groups,o=org".into(),
      people_base:   "ou=people,o=org".into(),
      active_base:   "ou=active,ou=people,o=org".into(),
      inactive_base: "ou=inactive,ou=people,o=org".into(),
      guests_base:   "ou=guests,ou=people,o=org".into(),
      mail_domain:   "example.org".into(),
      mail_root:     "/srv/vmail".into(),
      general_group: "allgemein".into(),
      admin_uid:     "admin".into(),
    },
    jwt_secret:          "test-secret".into(),
    frontend_url:        "https://dash.example.org".into(),
    template_dir:        "templates".into(),
    mail_queue_capacity: 8,
  }
}

/// State over a directory holding `allgemein` and `lg_aachen`.
pub(crate) async fn state() -> (AppState<MemoryDirectory>, Arc<Outbox>) {
  let cfg = config();
  let store = Arc::new(MemoryDirectory::new());
  for (ou, cn) in [("allgemein", "Allgemein"), ("lg_aachen", "LG Aachen")] {
    store
      .add(
        &cfg.directory.group_dn(ou),
        &["groupOfNames", "top"],
        vec![("ou".into(), vec![ou.into()]), ("cn".into(), vec![cn.into()])],
      )
      .await
      .unwrap();
  }
  let outbox = Arc::new(Outbox::default());
  let state = AppState::new(
    store,
    cfg.clone(),
    Arc::new(JwtTokenService::new(&cfg.jwt_secret)),
    outbox.clone(),
  );
  (state, outbox)
}

async fn active_member(state: &AppState<MemoryDirectory>, first: &str, last: &str) -> String {
  let uid = state
    .identity
    .create_member(NewMember {
      first_name:       first.into(),
      last_name:        last.into(),
      alternative_mail: format!("{}@x.org", first.to_lowercase()),
      password:         Some("secret".into()),
    })
    .await
    .unwrap();
  state.identity.activate_user(&uid).await.unwrap();
  uid
}

fn bearer(state: &AppState<MemoryDirectory>, uid: &str) -> String {
  let token = state.tokens.issue(uid, TokenKind::Session, None).unwrap();
  format!("Bearer {token}")
}

async fn call(
  state: &AppState<MemoryDirectory>,
  method: &str,
  uri: &str,
  auth: Option<&str>,
  body: Option<Value>,
) -> Response {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some(auth) = auth {
    builder = builder.header(header::AUTHORIZATION, auth);
  }
  let body = match body {
    Some(v) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(v.to_string())
    }
    None => Body::empty(),
  };
  router(state.clone()).oneshot(builder.body(body).unwrap()).await.unwrap()
}

async fn json_body(resp: Response) -> Value {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

// ── Login ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn login_failures_are_indistinguishable() {
  let (state, _) = state().await;
  let jane = active_member(&state, "Jane", "Doe").await;

  let wrong = call(&state, "POST", "/login", None, Some(json!({"uid": jane, "password": "nope"}))).await;
  let unknown = call(&state, "POST", "/login", None, Some(json!({"uid": "ghost", "password": "nope"}))).await;

  assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
  assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
  assert_eq!(json_body(wrong).await, json_body(unknown).await);
}

#[tokio::test]
async fn login_returns_session_token() {
  let (state, _) = state().await;
  let jane = active_member(&state, "Jane", "Doe").await;

  let resp = call(&state, "POST", "/login", None, Some(json!({"uid": jane, "password": "secret"}))).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = json_body(resp).await;
  assert_eq!(body["inactive"], false);

  let token = body["token"].as_str().unwrap();
  let auth = format!("Bearer {token}");
  let me = call(&state, "GET", "/users/jane.doe", Some(&auth), None).await;
  assert_eq!(me.status(), StatusCode::OK);
  assert_eq!(json_body(me).await["state"], "active");
}

#[tokio::test]
async fn protected_routes_need_a_session() {
  let (state, _) = state().await;
  let resp = call(&state, "GET", "/users", None, None).await;
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
}

// ── Signup ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn signup_confirm_and_login() {
  let (state, outbox) = state().await;

  let resp = call(
    &state,
    "POST",
    "/users",
    None,
    Some(json!({
      "first_name": "Jane",
      "last_name": "Doe",
      "alternative_mail": "jane@x.org",
      "groups": ["lg_aachen"],
    })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  assert_eq!(json_body(resp).await["uid"], "jane.doe");

  let mail = outbox.take().pop().unwrap();
  assert_eq!(mail.to, "jane@x.org");
  let token = mail.variables["token"].clone();

  let resp = call(
    &state,
    "POST",
    "/users/confirm",
    None,
    Some(json!({"token": token, "password": "hunter2"})),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::NO_CONTENT);

  let resp = call(&state, "POST", "/login", None, Some(json!({"uid": "jane.doe", "password": "hunter2"}))).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await["inactive"], true);

  let group = state.engine.get_group("lg_aachen").await.unwrap();
  assert!(group.has_pending("jane.doe", Partition::Inactive));
}

// ── Pending requests ─────────────────────────────────────────────────────────

#[tokio::test]
async fn owner_accepts_onboarding_request() {
  let (state, _) = state().await;
  let bob = active_member(&state, "Bob", "Builder").await;
  state.engine.add_owner("lg_aachen", &bob).await.unwrap();
  let mallory = active_member(&state, "Mallory", "Evil").await;

  let jane = state
    .identity
    .create_member(NewMember {
      first_name:       "Jane".into(),
      last_name:        "Doe".into(),
      alternative_mail: "jane@x.org".into(),
      password:         None,
    })
    .await
    .unwrap();
  state.engine.request_inactive_pending("lg_aachen", &jane).await.unwrap();

  let uri = format!("/groups/lg_aachen/pending/{jane}/accept");
  let denied = call(&state, "POST", &uri, Some(&bearer(&state, &mallory)), None).await;
  assert_eq!(denied.status(), StatusCode::FORBIDDEN);

  let accepted = call(&state, "POST", &uri, Some(&bearer(&state, &bob)), None).await;
  assert_eq!(accepted.status(), StatusCode::NO_CONTENT);
  assert!(state.identity.is_active(&jane).await.unwrap());
  assert!(state.engine.get_group("lg_aachen").await.unwrap().has_member(&jane));
}

#[tokio::test]
async fn anyone_active_may_ask_to_join() {
  let (state, outbox) = state().await;
  let bob = active_member(&state, "Bob", "Builder").await;
  state.engine.add_owner("lg_aachen", &bob).await.unwrap();
  let jane = active_member(&state, "Jane", "Doe").await;

  let resp = call(&state, "POST", "/groups/lg_aachen/pending", Some(&bearer(&state, &jane)), None).await;
  assert_eq!(resp.status(), StatusCode::ACCEPTED);

  let sent = outbox.take();
  assert_eq!(sent.len(), 1);
  assert_eq!(sent[0].to, "bob.builder@example.org");

  let listing = call(&state, "GET", "/groups/lg_aachen/pending", Some(&bearer(&state, &bob)), None).await;
  assert_eq!(listing.status(), StatusCode::OK);
  assert_eq!(json_body(listing).await["active"][0]["uid"], "jane.doe");
}

// ── Owners ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn admin_and_last_owner_are_protected() {
  let (state, _) = state().await;
  let admin = active_member(&state, "Admin", "").await;
  assert_eq!(admin, "admin");
  let bob = active_member(&state, "Bob", "Builder").await;
  state.engine.add_owner("lg_aachen", &admin).await.unwrap();
  state.engine.add_owner("lg_aachen", &bob).await.unwrap();

  let resp = call(&state, "DELETE", "/groups/lg_aachen/owners/admin", Some(&bearer(&state, &bob)), None).await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);

  let resp = call(&state, "DELETE", &format!("/groups/lg_aachen/owners/{bob}"), Some(&bearer(&state, &admin)), None).await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

// ── Members ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn removing_a_guest_from_its_only_group_deletes_it() {
  let (state, _) = state().await;
  let bob = active_member(&state, "Bob", "Builder").await;
  state.engine.add_owner("lg_aachen", &bob).await.unwrap();
  let auth = bearer(&state, &bob);

  let resp = call(
    &state,
    "POST",
    "/guests",
    Some(&auth),
    Some(json!({"name": "Max Mustermann", "mail": "max@x.org", "group": "lg_aachen"})),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CREATED);
  let guest = json_body(resp).await["uid"].as_str().unwrap().to_owned();
  assert_eq!(guest, "guest.max.mustermann");

  let resp = call(&state, "DELETE", &format!("/groups/lg_aachen/members/{guest}"), Some(&auth), None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await["account_deleted"], true);
  assert!(state.identity.get_user(&guest).await.is_err());
}

#[tokio::test]
async fn leaving_the_general_group_deletes_the_account() {
  let (state, _) = state().await;
  let jane = active_member(&state, "Jane", "Doe").await;
  let bob = active_member(&state, "Bob", "Builder").await;
  state.engine.add_member("lg_aachen", &jane).await.unwrap();

  let resp = call(
    &state,
    "DELETE",
    &format!("/groups/allgemein/members/{jane}"),
    Some(&bearer(&state, &jane)),
    None,
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);
  assert_eq!(json_body(resp).await["account_deleted"], true);

  let resp = call(&state, "GET", &format!("/users/{jane}"), Some(&bearer(&state, &bob)), None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  assert!(!state.engine.get_group("lg_aachen").await.unwrap().has_member(&jane));
}

#[tokio::test]
async fn non_owner_cannot_create_guests() {
  let (state, _) = state().await;
  let jane = active_member(&state, "Jane", "Doe").await;
  let resp = call(
    &state,
    "POST",
    "/guests",
    Some(&bearer(&state, &jane)),
    Some(json!({"name": "Max", "mail": "max@x.org", "group": "lg_aachen"})),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn unknown_group_is_a_plain_404() {
  let (state, _) = state().await;
  let jane = active_member(&state, "Jane", "Doe").await;
  let resp = call(&state, "GET", "/groups/nowhere", Some(&bearer(&state, &jane)), None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  assert_eq!(json_body(resp).await, json!({"error": "Not Found"}));
}

// ── Password reset ────────────────────────────────────────────────────────────

#[tokio::test]
async fn reset_does_not_reveal_addresses() {
  let (state, outbox) = state().await;
  let jane = active_member(&state, "Jane", "Doe").await;

  let unknown = call(&state, "POST", "/password_reset", None, Some(json!({"mail": "nobody@x.org"}))).await;
  assert_eq!(unknown.status(), StatusCode::ACCEPTED);
  assert!(outbox.take().is_empty());

  let known = call(&state, "POST", "/password_reset", None, Some(json!({"mail": "jane@x.org"}))).await;
  assert_eq!(known.status(), StatusCode::ACCEPTED);
  let token = outbox.take().pop().unwrap().variables["token"].clone();

  let resp = call(
    &state,
    "POST",
    "/password_reset/confirm",
    None,
    Some(json!({"token": token, "password": "fresh"})),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::NO_CONTENT);
  assert!(state.identity.check_password(&jane, "fresh").await.success);
}

#[tokio::test]
async fn users_cannot_change_each_others_passwords() {
  let (state, _) = state().await;
  let jane = active_member(&state, "Jane", "Doe").await;
  let bob = active_member(&state, "Bob", "Builder").await;
  let resp = call(
    &state,
    "POST",
    &format!("/users/{jane}/password"),
    Some(&bearer(&state, &bob)),
    Some(json!({"password": "owned"})),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}
