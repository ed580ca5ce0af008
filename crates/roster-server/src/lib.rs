//! HTTP boundary for roster.
//!
//! Exposes an axum [`Router`] over the core components. Every route except
//! signup, login and the token-confirmation endpoints requires a session
//! token; handlers enforce [`AccessPolicy`] before calling into the core.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod mailer;
pub mod tokens;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use roster_core::{
  directory::DirectoryStore,
  identity::IdentityDirectory,
  layout::DirectoryLayout,
  membership::GroupMembershipEngine,
  notify::Notifier,
  policy::AccessPolicy,
  token::TokenService,
};
use roster_ldap::LdapConfig;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use handlers::{groups, password, session, users};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Which directory implementation the server talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
  #[default]
  Ldap,
  /// Process-local directory; contents are lost on restart.
  Memory,
}

/// Runtime server configuration, deserialised from `config.toml` and
/// `ROSTER_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                String,
  #[serde(default = "default_port")]
  pub port:                u16,
  #[serde(default)]
  pub backend:             BackendKind,
  /// Required when `backend = "ldap"`.
  pub ldap:                Option<LdapConfig>,
  pub directory:           DirectoryLayout,
  pub jwt_secret:          String,
  /// Base URL of the web frontend; links in mails point here.
  pub frontend_url:        String,
  #[serde(default = "default_template_dir")]
  pub template_dir:        PathBuf,
  #[serde(default = "default_mail_queue_capacity")]
  pub mail_queue_capacity: usize,
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8080 }

fn default_template_dir() -> PathBuf { PathBuf::from("templates") }

fn default_mail_queue_capacity() -> usize { 256 }

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<D> {
  pub identity: IdentityDirectory<D>,
  pub engine:   GroupMembershipEngine<D>,
  pub policy:   Arc<AccessPolicy>,
  pub tokens:   Arc<dyn TokenService>,
  pub notifier: Arc<dyn Notifier>,
  pub config:   Arc<ServerConfig>,
}

impl<D> Clone for AppState<D> {
  fn clone(&self) -> Self {
    Self {
      identity: self.identity.clone(),
      engine:   self.engine.clone(),
      policy:   Arc::clone(&self.policy),
      tokens:   Arc::clone(&self.tokens),
      notifier: Arc::clone(&self.notifier),
      config:   Arc::clone(&self.config),
    }
  }
}

impl<D: DirectoryStore> AppState<D> {
  pub fn new(
    store: Arc<D>,
    config: ServerConfig,
    tokens: Arc<dyn TokenService>,
    notifier: Arc<dyn Notifier>,
  ) -> Self {
    let layout = Arc::new(config.directory.clone());
    Self {
      identity: IdentityDirectory::new(Arc::clone(&store), Arc::clone(&layout)),
      engine: GroupMembershipEngine::new(store, Arc::clone(&layout), Arc::clone(&notifier)),
      policy: Arc::new(AccessPolicy::new(layout.admin_uid.clone())),
      tokens,
      notifier,
      config: Arc::new(config),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the axum [`Router`] for the membership API.
pub fn router<D>(state: AppState<D>) -> Router
where
  D: DirectoryStore + 'static,
{
  Router::new()
    // Session and password recovery
    .route("/login",                          post(session::login::<D>))
    .route("/password_reset",                 post(password::request_reset::<D>))
    .route("/password_reset/confirm",         post(password::confirm_reset::<D>))
    // Users
    .route("/users",                          get(users::list::<D>).post(users::signup::<D>))
    .route("/users/confirm",                  post(users::confirm_signup::<D>))
    .route("/users/alternative_mail/confirm", post(users::confirm_alternative_mail::<D>))
    .route("/users/{uid}",                    get(users::get_one::<D>).delete(users::delete_one::<D>))
    .route("/users/{uid}/password",           post(users::set_password::<D>))
    .route("/users/{uid}/alternative_mail",   post(users::change_alternative_mail::<D>))
    .route("/users/{uid}/activate",           post(users::activate::<D>))
    .route("/users/{uid}/groups",             get(users::groups::<D>))
    .route("/guests",                         post(users::create_guest::<D>))
    // Groups
    .route("/groups",                         get(groups::list::<D>))
    .route("/groups/{ou}",                    get(groups::get_one::<D>))
    .route("/groups/{ou}/members",            get(groups::members::<D>).post(groups::add_member::<D>))
    .route("/groups/{ou}/members/{uid}",      axum::routing::delete(groups::remove_member::<D>))
    .route("/groups/{ou}/owners",             get(groups::owners::<D>).post(groups::add_owner::<D>))
    .route("/groups/{ou}/owners/{uid}",       axum::routing::delete(groups::remove_owner::<D>))
    .route("/groups/{ou}/pending",            get(groups::pending::<D>).post(groups::request_membership::<D>))
    .route("/groups/{ou}/pending/{uid}",      axum::routing::delete(groups::remove_pending::<D>))
    .route("/groups/{ou}/pending/{uid}/accept", post(groups::accept_pending::<D>))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

#[cfg(test)]
mod tests;
