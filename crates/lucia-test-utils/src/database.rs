// Fixture database — seeds and reads records behind the adapter's back.
//
// Conformance tests use this to set up state and to check what an adapter
// call actually wrote, without going through the adapter under test.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use lucia_adapter_surrealdb::query::{QueryBuilder, SurrealQuery, KEY_ID_FIELD, USER_LINK_FIELD};
use lucia_adapter_surrealdb::{thing, translate, SurrealClient, Targets};
use lucia_core::{AdapterError, AdapterResult, Key, Session, User};

/// Direct access to the stored records of one backend.
///
/// Reads return records as the auth library sees them: bare ids, no
/// backend-internal fields.
#[async_trait]
pub trait Database: Send + Sync + fmt::Debug {
    /// Name of the table users are stored in.
    fn user_table(&self) -> &str;

    async fn get_users(&self) -> AdapterResult<Vec<Value>>;
    async fn get_sessions(&self) -> AdapterResult<Vec<Value>>;
    async fn get_keys(&self) -> AdapterResult<Vec<Value>>;

    async fn insert_user(&self, user: &User) -> AdapterResult<()>;
    async fn insert_session(&self, session: &Session) -> AdapterResult<()>;
    async fn insert_key(&self, key: &Key) -> AdapterResult<()>;

    async fn clear_users(&self) -> AdapterResult<()>;
    async fn clear_sessions(&self) -> AdapterResult<()>;
    async fn clear_keys(&self) -> AdapterResult<()>;

    /// Remove every user, session and key.
    async fn clear_all(&self) -> AdapterResult<()> {
        self.clear_keys().await?;
        self.clear_sessions().await?;
        self.clear_users().await
    }
}

/// [`Database`] over a SurrealDB client, using the adapter's storage layout.
#[derive(Debug, Clone)]
pub struct SurrealDatabase {
    client: Arc<dyn SurrealClient>,
    queries: QueryBuilder,
    targets: Targets,
}

fn fields<T: serde::Serialize>(record: &T) -> AdapterResult<serde_json::Map<String, Value>> {
    match serde_json::to_value(record)? {
        Value::Object(fields) => Ok(fields),
        other => Err(AdapterError::Config(format!("expected a record object, got {other}"))),
    }
}

impl SurrealDatabase {
    pub fn new(client: Arc<dyn SurrealClient>, targets: Targets) -> Self {
        Self {
            client,
            queries: QueryBuilder::new(targets.clone()),
            targets,
        }
    }

    pub fn targets(&self) -> &Targets {
        &self.targets
    }

    /// Every record of `table`, with the bare record id in `id`.
    async fn select(&self, table: &str) -> AdapterResult<Vec<Value>> {
        let query = SurrealQuery::new("SELECT *, record::id(id) AS id FROM type::table($tb)")
            .bind("tb", table);
        self.run(query).await
    }

    async fn run(&self, query: SurrealQuery) -> AdapterResult<Vec<Value>> {
        let responses = self.client.query(&query.sql, query.vars).await?;
        Ok(translate::checked_rows(responses)?)
    }
}

#[async_trait]
impl Database for SurrealDatabase {
    fn user_table(&self) -> &str {
        &self.targets.user
    }

    async fn get_users(&self) -> AdapterResult<Vec<Value>> {
        self.select(&self.targets.user).await
    }

    async fn get_sessions(&self) -> AdapterResult<Vec<Value>> {
        let mut sessions = self.select(&self.targets.session).await?;
        for session in &mut sessions {
            if let Some(obj) = session.as_object_mut() {
                obj.remove(USER_LINK_FIELD);
            }
        }
        Ok(sessions)
    }

    async fn get_keys(&self) -> AdapterResult<Vec<Value>> {
        let mut keys = self.select(&self.targets.key).await?;
        for key in &mut keys {
            if let Some(obj) = key.as_object_mut() {
                obj.remove(USER_LINK_FIELD);
                obj.remove("id");
                if let Some(key_id) = obj.remove(KEY_ID_FIELD) {
                    obj.insert("id".to_string(), key_id);
                }
            }
        }
        Ok(keys)
    }

    async fn insert_user(&self, user: &User) -> AdapterResult<()> {
        let mut content = fields(user)?;
        content.remove("id");
        self.client
            .create(&thing::encode(&self.targets.user, &user.id), Value::Object(content))
            .await?;
        Ok(())
    }

    async fn insert_session(&self, session: &Session) -> AdapterResult<()> {
        let query = self.queries.create_linked(
            &self.targets.session,
            Some(&session.id),
            &fields(session)?,
            &session.user_id,
        );
        self.run(query).await?;
        Ok(())
    }

    async fn insert_key(&self, key: &Key) -> AdapterResult<()> {
        let mut content = fields(key)?;
        if let Some(id) = content.remove("id") {
            content.insert(KEY_ID_FIELD.to_string(), id);
        }
        let query = self
            .queries
            .create_linked(&self.targets.key, None, &content, &key.user_id);
        self.run(query).await?;
        Ok(())
    }

    async fn clear_users(&self) -> AdapterResult<()> {
        Ok(self.client.delete(&self.targets.user).await?)
    }

    async fn clear_sessions(&self) -> AdapterResult<()> {
        Ok(self.client.delete(&self.targets.session).await?)
    }

    async fn clear_keys(&self) -> AdapterResult<()> {
        Ok(self.client.delete(&self.targets.key).await?)
    }
}
