// SurrealDB client seam — the operations the adapter needs from a SurrealDB driver.
//
// `SurrealDriver` implements `SurrealClient` over the `surrealdb` crate. Other
// drivers implement it themselves, plus `SurrealConnector` to let the adapter
// open connections lazily from a URI.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SurrealError;
use crate::options::Credentials;

/// Bound query variables (`$name` → value).
pub type Vars = serde_json::Map<String, serde_json::Value>;

/// Per-statement status in a query response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "ERR")]
    Err,
}

/// Outcome of one statement within a `query` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub status: QueryStatus,
    #[serde(default)]
    pub result: Vec<serde_json::Value>,
    /// Error text when `status` is `ERR`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl QueryResponse {
    pub fn ok(result: Vec<serde_json::Value>) -> Self {
        Self {
            status: QueryStatus::Ok,
            result,
            detail: None,
        }
    }

    pub fn err(detail: impl Into<String>) -> Self {
        Self {
            status: QueryStatus::Err,
            result: Vec::new(),
            detail: Some(detail.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == QueryStatus::Ok
    }

    /// The statement's error, if it failed.
    pub fn error(&self) -> Option<SurrealError> {
        match self.status {
            QueryStatus::Ok => None,
            QueryStatus::Err => Some(SurrealError::Db(
                self.detail.clone().unwrap_or_else(|| "unknown error".to_string()),
            )),
        }
    }
}

/// A live SurrealDB handle, already signed in and scoped to a namespace/database.
///
/// `thing` arguments are either a composite record id (`table:id`) or a bare
/// table name.
#[async_trait]
pub trait SurrealClient: Send + Sync + fmt::Debug {
    /// Run one or more `;`-separated statements with bound variables.
    /// Returns one response per statement.
    async fn query(&self, sql: &str, vars: Vars) -> Result<Vec<QueryResponse>, SurrealError>;

    /// Create a record. Returns the stored record.
    async fn create(
        &self,
        thing: &str,
        data: serde_json::Value,
    ) -> Result<serde_json::Value, SurrealError>;

    /// Merge fields into an existing record. `None` if it does not exist.
    async fn merge(
        &self,
        thing: &str,
        data: serde_json::Value,
    ) -> Result<Option<serde_json::Value>, SurrealError>;

    /// Delete one record, or every record of a table.
    async fn delete(&self, thing: &str) -> Result<(), SurrealError>;

    /// Select one record, or every record of a table.
    async fn select(&self, thing: &str) -> Result<Vec<serde_json::Value>, SurrealError>;

    /// Whether the underlying connection has been closed.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Opens a [`SurrealClient`] from a URI and root credentials.
#[async_trait]
pub trait SurrealConnector: Send + Sync + fmt::Debug {
    async fn connect(
        &self,
        uri: &str,
        credentials: &Credentials,
    ) -> Result<Arc<dyn SurrealClient>, SurrealError>;
}
