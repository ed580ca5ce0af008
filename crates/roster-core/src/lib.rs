//! Core types and orchestration logic for the roster membership backend.
//!
//! This crate is free of HTTP and LDAP dependencies. It talks to the directory
//! through the [`directory::DirectoryStore`] trait and leaves token signing and
//! mail delivery to the [`token::TokenService`] and [`notify::Notifier`]
//! collaborators.
//!
//! The three components built on top of the store are
//! [`identity::IdentityDirectory`] (people and their lifecycle),
//! [`membership::GroupMembershipEngine`] (owner, member and pending relations)
//! and [`policy::AccessPolicy`] (authorization predicates).

// Native `async fn` in traits; `Send` bounds are spelled out on the trait.
#![allow(async_fn_in_trait)]

mod backend;

pub mod directory;
pub mod error;
pub mod group;
pub mod identity;
pub mod layout;
pub mod membership;
pub mod notify;
pub mod password;
pub mod person;
pub mod policy;
pub mod slug;
pub mod token;

pub use error::{Error, Result};
