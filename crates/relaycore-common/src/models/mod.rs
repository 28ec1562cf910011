//! Domain models — one module per data-model family from the persistent
//! state layout. Row types derive `sqlx::FromRow` for direct use against
//! `SqlitePool`; request/response shapes are plain serde types consumed at
//! the API boundary.

pub mod account;
pub mod backup;
pub mod call;
pub mod conversation;
pub mod deletion;
pub mod device;
pub mod invite;
pub mod media;
pub mod message;
pub mod prekey;
pub mod subscription;
pub mod vault;
