// Adapter configuration: table names, connection source, error handling.

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use lucia_core::AdapterError;

use crate::classify::{ErrorClassifier, Operation};
use crate::client::{SurrealClient, SurrealConnector};
use crate::error::SurrealError;

/// Plain SurrealQL identifier; anything else is rejected as a table name.
static TABLE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Table names for the three record kinds.
///
/// Default: `user`, `session`, `key`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Targets {
    pub user: String,
    pub session: String,
    pub key: String,
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            user: "user".to_string(),
            session: "session".to_string(),
            key: "key".to_string(),
        }
    }
}

impl Targets {
    /// Reject table names that are not plain identifiers.
    pub fn validate(&self) -> Result<(), AdapterError> {
        for name in [&self.user, &self.session, &self.key] {
            if !TABLE_NAME.is_match(name) {
                return Err(AdapterError::Config(format!(
                    "invalid table name '{name}': expected [A-Za-z_][A-Za-z0-9_]*"
                )));
            }
        }
        Ok(())
    }
}

/// Namespace, database and root credentials for a URI connection.
/// All four are required; see [`ConnectionOptions::require`].
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ConnectionOptions {
    #[serde(rename = "ns")]
    pub namespace: Option<String>,
    #[serde(rename = "db")]
    pub database: Option<String>,
    pub user: Option<String>,
    pub pass: Option<String>,
}

impl fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("namespace", &self.namespace)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("pass", &self.pass.as_ref().map(|_| "***"))
            .finish()
    }
}

impl ConnectionOptions {
    pub fn new(
        namespace: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        pass: impl Into<String>,
    ) -> Self {
        Self {
            namespace: Some(namespace.into()),
            database: Some(database.into()),
            user: Some(user.into()),
            pass: Some(pass.into()),
        }
    }

    /// Complete credentials, or `surreal:connection-args:required`.
    pub fn require(&self) -> Result<Credentials, SurrealError> {
        match (&self.namespace, &self.database, &self.user, &self.pass) {
            (Some(namespace), Some(database), Some(user), Some(pass)) => Ok(Credentials {
                namespace: namespace.clone(),
                database: database.clone(),
                user: user.clone(),
                pass: pass.clone(),
            }),
            _ => Err(SurrealError::ConnectionArgsRequired),
        }
    }
}

/// Validated connection credentials handed to a [`SurrealConnector`].
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub namespace: String,
    pub database: String,
    pub user: String,
    pub pass: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("namespace", &self.namespace)
            .field("database", &self.database)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Where the adapter gets its SurrealDB handle from.
#[derive(Debug, Clone)]
pub enum Connection {
    /// Reuse an existing, already signed-in client.
    Client(Arc<dyn SurrealClient>),
    /// Open a client on first use.
    Uri {
        uri: String,
        options: ConnectionOptions,
        connector: Arc<dyn SurrealConnector>,
    },
}

impl Connection {
    pub fn client(client: Arc<dyn SurrealClient>) -> Self {
        Self::Client(client)
    }

    pub fn uri(
        uri: impl Into<String>,
        options: ConnectionOptions,
        connector: Arc<dyn SurrealConnector>,
    ) -> Self {
        Self::Uri {
            uri: uri.into(),
            options,
            connector,
        }
    }
}

/// Callback for backend errors that matched no classification rule.
/// Runs before the error is returned to the caller.
pub type ErrorHook = Arc<dyn Fn(&SurrealError, Operation) + Send + Sync>;

/// Options for [`SurrealAdapter`](crate::SurrealAdapter).
#[derive(Clone, Default)]
pub struct SurrealAdapterOptions {
    /// Table name overrides.
    pub targets: Targets,

    /// Emit a `tracing::debug!` line per adapter operation.
    ///
    /// Default: false
    pub debug_logs: bool,

    /// Hook for unclassified errors. Default: no-op.
    pub on_error: Option<ErrorHook>,

    /// Replaces the default SurrealDB error-text classifier.
    pub classifier: Option<Arc<dyn ErrorClassifier>>,
}

impl fmt::Debug for SurrealAdapterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurrealAdapterOptions")
            .field("targets", &self.targets)
            .field("debug_logs", &self.debug_logs)
            .field("on_error", &self.on_error.as_ref().map(|_| "<hook>"))
            .field("classifier", &self.classifier)
            .finish()
    }
}

impl SurrealAdapterOptions {
    pub fn with_targets(mut self, targets: Targets) -> Self {
        self.targets = targets;
        self
    }

    pub fn with_debug_logs(mut self, debug_logs: bool) -> Self {
        self.debug_logs = debug_logs;
        self
    }

    pub fn on_error(mut self, hook: impl Fn(&SurrealError, Operation) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(hook));
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }
}
