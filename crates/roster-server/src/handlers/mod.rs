//! Route handlers, grouped by resource.

pub mod groups;
pub mod password;
pub mod session;
pub mod users;
