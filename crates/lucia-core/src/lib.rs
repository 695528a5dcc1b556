// lucia-core — the adapter contract shared by Lucia storage backends.
//
// Defines the `Adapter` trait the auth library drives, the user / session / key
// records it exchanges, and the typed error codes adapters raise.

pub mod db;
pub mod env;
pub mod error;

// Re-exports for convenience
pub use db::adapter::{Adapter, AdapterResult};
pub use db::models::{Key, Session, SessionAndUser, User, UserAttributes};
pub use error::{AdapterError, ErrorCode, LuciaError};
