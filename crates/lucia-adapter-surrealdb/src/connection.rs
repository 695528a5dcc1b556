// Connection provider — resolves the SurrealDB client an adapter runs against.
//
// A caller-supplied client is used as-is; a URI connection is opened on first
// use. Resolution runs at most once at a time and its success is cached for
// the adapter's lifetime. A failed attempt is not cached.

use std::sync::Arc;

use tokio::sync::OnceCell;

use crate::client::SurrealClient;
use crate::error::SurrealError;
use crate::options::Connection;

#[derive(Debug)]
pub struct ConnectionProvider {
    source: Connection,
    client: OnceCell<Arc<dyn SurrealClient>>,
}

impl ConnectionProvider {
    pub fn new(source: Connection) -> Self {
        Self {
            source,
            client: OnceCell::new(),
        }
    }

    /// The live client, connecting first if needed.
    pub async fn client(&self) -> Result<Arc<dyn SurrealClient>, SurrealError> {
        self.client
            .get_or_try_init(|| self.resolve())
            .await
            .cloned()
    }

    /// Whether a client has been resolved.
    pub fn is_connected(&self) -> bool {
        self.client.initialized()
    }

    async fn resolve(&self) -> Result<Arc<dyn SurrealClient>, SurrealError> {
        match &self.source {
            Connection::Client(client) => {
                if client.is_closed() {
                    return Err(SurrealError::ConnectionClosed);
                }
                Ok(client.clone())
            }
            Connection::Uri {
                uri,
                options,
                connector,
            } => {
                let credentials = options.require()?;
                tracing::debug!(
                    "[SurrealDB Adapter] connecting to '{}' (ns: '{}', db: '{}')",
                    uri,
                    credentials.namespace,
                    credentials.database
                );
                connector.connect(uri, &credentials).await
            }
        }
    }
}
