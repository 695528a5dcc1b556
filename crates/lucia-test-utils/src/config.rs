// Test environment — SurrealDB connection settings for conformance runs.
//
// Read from SURREALDB_URL / SURREALDB_NS / SURREALDB_DB / SURREALDB_USER /
// SURREALDB_PASS, after loading a `.env` file from the working directory if
// one exists.

use std::sync::Arc;

use lucia_adapter_surrealdb::{Connection, ConnectionOptions, SurrealConnector};

pub const URL_VAR: &str = "SURREALDB_URL";
pub const NS_VAR: &str = "SURREALDB_NS";
pub const DB_VAR: &str = "SURREALDB_DB";
pub const USER_VAR: &str = "SURREALDB_USER";
pub const PASS_VAR: &str = "SURREALDB_PASS";

/// Connection settings for the database under test.
#[derive(Clone)]
pub struct TestEnv {
    pub url: String,
    pub namespace: String,
    pub database: String,
    pub user: String,
    pub pass: String,
}

impl std::fmt::Debug for TestEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestEnv")
            .field("url", &self.url)
            .field("namespace", &self.namespace)
            .field("database", &self.database)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl TestEnv {
    /// Load settings from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if it exists
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through `lookup`. Empty values count as missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        match (get(URL_VAR), get(NS_VAR), get(DB_VAR), get(USER_VAR), get(PASS_VAR)) {
            (Some(url), Some(namespace), Some(database), Some(user), Some(pass)) => Ok(Self {
                url,
                namespace,
                database,
                user,
                pass,
            }),
            _ => {
                let missing: Vec<&str> = [URL_VAR, NS_VAR, DB_VAR, USER_VAR, PASS_VAR]
                    .into_iter()
                    .filter(|key| get(*key).is_none())
                    .collect();
                anyhow::bail!(".env is not set up (missing {})", missing.join(", "))
            }
        }
    }

    pub fn connection_options(&self) -> ConnectionOptions {
        ConnectionOptions::new(&self.namespace, &self.database, &self.user, &self.pass)
    }

    /// A lazily-opened URI connection through `connector`.
    pub fn connection(&self, connector: Arc<dyn SurrealConnector>) -> Connection {
        Connection::uri(&self.url, self.connection_options(), connector)
    }
}
