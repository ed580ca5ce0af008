//! In-process directory backend for roster.
//!
//! Holds every entry in memory behind a [`tokio::sync::RwLock`]. Enforces the
//! same per-entry rules a real directory does (unique DNs, distinct errors for
//! duplicate and missing values, password checks on bind) so the core
//! components can be exercised without a server.

mod filter;
mod store;

pub use store::MemoryDirectory;
