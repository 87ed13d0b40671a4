//! Stored prompt/response history scoped to an identity.
pub mod db;
pub mod models;
mod store;

pub use db::*;
pub use models::*;
pub use store::{BoxedSessionStore, SessionStore, SqliteSessionStore};
