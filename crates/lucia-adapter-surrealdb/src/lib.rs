// lucia-adapter-surrealdb — SurrealDB storage for the Lucia authentication library.
//
// Persists users, sessions and keys as SurrealDB records (`table:id`), with
// sessions and keys linked to their user record. The SurrealDB driver is
// reached through the `SurrealClient` trait; `SurrealDriver` implements it on
// the official `surrealdb` crate.

pub mod adapter;
pub mod classify;
pub mod client;
pub mod connection;
pub mod driver;
pub mod error;
pub mod options;
pub mod query;
pub mod thing;
pub mod translate;

pub use adapter::SurrealAdapter;
pub use classify::{ErrorClassifier, Operation, SurrealErrorClassifier};
pub use client::{QueryResponse, QueryStatus, SurrealClient, SurrealConnector, Vars};
pub use driver::{DriverConnector, SurrealDriver};
pub use error::SurrealError;
pub use options::{
    Connection, ConnectionOptions, Credentials, ErrorHook, SurrealAdapterOptions, Targets,
};

use lucia_core::AdapterError;

/// Create a SurrealDB adapter.
///
/// Table names default to `user`, `session` and `key`. The connection is
/// resolved on the first adapter call.
pub fn surreal_adapter(
    connection: Connection,
    options: SurrealAdapterOptions,
) -> Result<SurrealAdapter, AdapterError> {
    SurrealAdapter::new(connection, options)
}
