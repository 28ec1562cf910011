//! API route modules, grouped by component.

pub mod account;
pub mod backup;
pub mod calls;
pub mod deletion;
pub mod groups;
pub mod health;
pub mod invites;
pub mod messages;
pub mod misc;
pub mod prekeys;
pub mod vault;
