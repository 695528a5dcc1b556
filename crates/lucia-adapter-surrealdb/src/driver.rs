// Native driver — `SurrealClient` over the official `surrealdb` crate.
//
// Connects through the `any` engine, so the same client serves `ws://`,
// `wss://`, `http://`, `https://` and the embedded `mem://` datastore.
// Record ids come back from the driver as structured values; they are
// flattened to `table:id` strings before reaching the adapter.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use surrealdb::engine::any::{self, Any};
use surrealdb::opt::auth::Root;
use surrealdb::opt::Config;
use surrealdb::Surreal;

use crate::client::{QueryResponse, SurrealClient, SurrealConnector, Vars};
use crate::error::SurrealError;
use crate::options::Credentials;
use crate::thing;
use crate::translate;

pub struct SurrealDriver {
    db: Surreal<Any>,
    closed: AtomicBool,
}

impl fmt::Debug for SurrealDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurrealDriver")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl SurrealDriver {
    /// Wrap an already signed-in handle with namespace and database selected.
    pub fn new(db: Surreal<Any>) -> Self {
        Self {
            db,
            closed: AtomicBool::new(false),
        }
    }

    /// Open a connection, sign in as root and select namespace and database.
    pub async fn connect(uri: &str, credentials: &Credentials) -> Result<Self, SurrealError> {
        let root = || Root {
            username: &credentials.user,
            password: &credentials.pass,
        };
        let db = any::connect((uri, Config::new().user(root())))
            .await
            .map_err(connection_error)?;
        db.signin(root()).await.map_err(connection_error)?;
        db.use_ns(&credentials.namespace)
            .use_db(&credentials.database)
            .await
            .map_err(connection_error)?;

        tracing::info!(
            namespace = %credentials.namespace,
            database = %credentials.database,
            "SurrealDB connection established"
        );
        Ok(Self::new(db))
    }

    /// Mark the client closed. Later calls fail and the adapter reports
    /// `surreal:connection:closed` on its next resolution.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn ensure_open(&self) -> Result<(), SurrealError> {
        if self.is_closed() {
            return Err(SurrealError::Connection("connection closed".into()));
        }
        Ok(())
    }

    async fn run(&self, sql: &str, target: &str, data: Option<Value>) -> Result<Vec<Value>, SurrealError> {
        let (table, id) = thing::split(target);
        let mut vars = Vars::new();
        vars.insert("tb".into(), json!(table));
        if let Some(id) = id {
            vars.insert("id".into(), json!(id));
        }
        if let Some(data) = data {
            vars.insert("data".into(), data);
        }
        let sql = sql.replace("{target}", target_expr(id.is_some()));
        translate::checked_rows(self.query(&sql, vars).await?)
    }
}

fn target_expr(is_record: bool) -> &'static str {
    if is_record {
        "type::thing($tb, $id)"
    } else {
        "type::table($tb)"
    }
}

fn connection_error(e: surrealdb::Error) -> SurrealError {
    SurrealError::Connection(e.to_string())
}

#[async_trait]
impl SurrealClient for SurrealDriver {
    async fn query(&self, sql: &str, vars: Vars) -> Result<Vec<QueryResponse>, SurrealError> {
        self.ensure_open()?;
        let mut response = self
            .db
            .query(sql)
            .bind(vars)
            .await
            .map_err(|e| SurrealError::Db(e.to_string()))?;

        let count = response.num_statements();
        let mut out = Vec::with_capacity(count);
        for idx in 0..count {
            out.push(match response.take::<Vec<Value>>(idx) {
                Ok(rows) => QueryResponse::ok(rows.into_iter().map(flatten_record_ids).collect()),
                Err(e) => QueryResponse::err(e.to_string()),
            });
        }
        Ok(out)
    }

    async fn create(&self, thing: &str, data: Value) -> Result<Value, SurrealError> {
        self.run("CREATE {target} CONTENT $data", thing, Some(data))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| SurrealError::Db(format!("CREATE {thing} returned no record")))
    }

    async fn merge(&self, thing: &str, data: Value) -> Result<Option<Value>, SurrealError> {
        if thing::split(thing).1.is_none() {
            return Err(SurrealError::Db(format!("MERGE needs a record id, got `{thing}`")));
        }
        // UPDATE never creates a missing record.
        let rows = self.run("UPDATE {target} MERGE $data", thing, Some(data)).await?;
        Ok(rows.into_iter().next())
    }

    async fn delete(&self, thing: &str) -> Result<(), SurrealError> {
        self.run("DELETE {target}", thing, None).await?;
        Ok(())
    }

    async fn select(&self, thing: &str) -> Result<Vec<Value>, SurrealError> {
        self.run("SELECT * FROM {target}", thing, None).await
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Opens `SurrealDriver` connections for `Connection::Uri`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DriverConnector;

#[async_trait]
impl SurrealConnector for DriverConnector {
    async fn connect(
        &self,
        uri: &str,
        credentials: &Credentials,
    ) -> Result<Arc<dyn SurrealClient>, SurrealError> {
        Ok(Arc::new(SurrealDriver::connect(uri, credentials).await?))
    }
}

// ─── Record ids ─────────────────────────────────────────────────

/// Replace structured record ids (`{"tb": .., "id": ..}`) with `table:id`.
pub fn flatten_record_ids(value: Value) -> Value {
    match value {
        Value::Object(obj) => {
            if let Some(thing) = as_thing(&obj) {
                return Value::String(thing);
            }
            Value::Object(
                obj.into_iter()
                    .map(|(k, v)| (k, flatten_record_ids(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(flatten_record_ids).collect()),
        other => other,
    }
}

fn as_thing(obj: &serde_json::Map<String, Value>) -> Option<String> {
    if obj.len() != 2 {
        return None;
    }
    let table = obj.get("tb")?.as_str()?;
    let id = match obj.get("id")? {
        Value::Object(inner) if inner.len() == 1 => match inner.iter().next()? {
            (kind, v) if kind == "String" || kind == "Number" => scalar(v)?,
            _ => return None,
        },
        other => scalar(other)?,
    };
    Some(thing::encode(table, &id))
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_credentials() -> Credentials {
        crate::options::ConnectionOptions::new("test", "test", "root", "root")
            .require()
            .unwrap()
    }

    #[test]
    fn test_flatten_record_ids() {
        let raw = json!({
            "id": {"tb": "session", "id": {"String": "s1"}},
            "user": {"tb": "user", "id": "u1"},
            "seq": {"tb": "counter", "id": {"Number": 7}},
            "expires": 42,
            "nested": [{"tb": "key", "id": "k1"}],
        });
        let flat = flatten_record_ids(raw);
        assert_eq!(flat["id"], "session:s1");
        assert_eq!(flat["user"], "user:u1");
        assert_eq!(flat["seq"], "counter:7");
        assert_eq!(flat["expires"], 42);
        assert_eq!(flat["nested"][0], "key:k1");
    }

    #[test]
    fn test_flatten_leaves_plain_objects() {
        let raw = json!({"tb": "user", "id": "u1", "extra": true});
        assert_eq!(flatten_record_ids(raw.clone()), raw);
        let raw = json!({"tb": "user", "id": {"Array": [1]}});
        assert_eq!(flatten_record_ids(raw.clone()), raw);
    }

    #[tokio::test]
    async fn test_record_round_trip_on_mem() {
        let client = SurrealDriver::connect("mem://", &mem_credentials()).await.unwrap();

        let created = client.create("user:u1", json!({"name": "Alice"})).await.unwrap();
        assert_eq!(created["name"], "Alice");

        let merged = client.merge("user:u1", json!({"age": 3})).await.unwrap().unwrap();
        assert_eq!(merged["name"], "Alice");
        assert_eq!(merged["age"], 3);
        assert!(client.merge("user:ghost", json!({"age": 3})).await.unwrap().is_none());
        assert!(client.merge("user", json!({})).await.is_err());

        assert_eq!(client.select("user").await.unwrap().len(), 1);
        client.delete("user:u1").await.unwrap();
        assert!(client.select("user").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_statement_errors_stay_per_statement() {
        let client = SurrealDriver::connect("mem://", &mem_credentials()).await.unwrap();
        client.create("user:u1", json!({})).await.unwrap();

        let responses = client
            .query("CREATE user:u1; SELECT VALUE record::id(id) FROM user;", Vars::new())
            .await
            .unwrap();
        assert_eq!(responses.len(), 2);
        assert!(responses[0].error().unwrap().to_string().contains("already exists"));
        assert_eq!(responses[1].result, vec![json!("u1")]);
    }

    #[tokio::test]
    async fn test_closed_driver_refuses_calls() {
        let client = SurrealDriver::connect("mem://", &mem_credentials()).await.unwrap();
        client.close();
        assert!(client.is_closed());
        let err = client.select("user").await.unwrap_err();
        assert!(matches!(err, SurrealError::Connection(_)));
    }
}
