// Errors surfaced by the SurrealDB client seam and the connection provider.

use lucia_core::AdapterError;

/// Failure reported by a [`SurrealClient`](crate::client::SurrealClient) or
/// while establishing one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurrealError {
    /// URI connection requested without namespace, database, user and password.
    #[error("surreal:connection-args:required")]
    ConnectionArgsRequired,

    /// A caller-supplied client was already closed on first use.
    #[error("surreal:connection:closed")]
    ConnectionClosed,

    #[error("Connection error: {0}")]
    Connection(String),

    /// Error text reported by the datastore, verbatim.
    #[error("{0}")]
    Db(String),
}

impl SurrealError {
    /// The raw message the error classifier matches against.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<SurrealError> for AdapterError {
    fn from(error: SurrealError) -> Self {
        AdapterError::backend(error)
    }
}
