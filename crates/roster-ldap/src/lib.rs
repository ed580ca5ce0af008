//! LDAP backend for roster.
//!
//! [`LdapDirectory`] implements [`roster_core::directory::DirectoryStore`] on
//! top of [`ldap3`]. One service connection is opened lazily, shared by every
//! request, and replaced when the server drops it. Password checks bind on a
//! connection of their own so the service identity is never rebound.

mod filter;
mod store;

pub mod config;
pub mod error;

pub use config::LdapConfig;
pub use error::{Error, Result};
pub use store::LdapDirectory;
