// SurrealAdapter — the Lucia adapter contract on top of a SurrealDB client.
//
// Each call resolves the client, builds its statement, runs it, and shapes the
// result. Writes that depend on another record (a session or key needing its
// user, a password update needing its key) look that record up first and fail
// with a typed error before anything is written. The lookup and the write are
// separate round trips with no transaction around them.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use lucia_core::{
    Adapter, AdapterError, AdapterResult, ErrorCode, Key, Session, SessionAndUser, User,
    UserAttributes,
};

use crate::classify::{ErrorPolicy, Operation};
use crate::client::{QueryResponse, SurrealClient};
use crate::connection::ConnectionProvider;
use crate::options::{Connection, SurrealAdapterOptions, Targets};
use crate::query::{QueryBuilder, SurrealQuery, KEY_ID_FIELD, USER_LINK_FIELD};
use crate::thing;
use crate::translate::{self, Translator};

/// Lucia adapter backed by SurrealDB.
///
/// # Usage
///
/// ```rust,ignore
/// use lucia_adapter_surrealdb::{surreal_adapter, Connection, SurrealAdapterOptions};
///
/// let adapter = surreal_adapter(Connection::client(client), SurrealAdapterOptions::default())?;
/// adapter.create_schema().await?;
/// ```
#[derive(Debug)]
pub struct SurrealAdapter {
    connection: ConnectionProvider,
    queries: QueryBuilder,
    translator: Translator,
    errors: ErrorPolicy,
    debug_logs: bool,
}

impl SurrealAdapter {
    /// Build an adapter. Fails if a table name is not a plain identifier.
    ///
    /// No connection is made until the first operation.
    pub fn new(connection: Connection, options: SurrealAdapterOptions) -> Result<Self, AdapterError> {
        options.targets.validate()?;

        Ok(Self {
            connection: ConnectionProvider::new(connection),
            queries: QueryBuilder::new(options.targets.clone()),
            translator: Translator::new(options.targets),
            errors: ErrorPolicy::new(options.classifier, options.on_error),
            debug_logs: options.debug_logs,
        })
    }

    pub fn targets(&self) -> &Targets {
        self.queries.targets()
    }

    /// Define the unique indexes on `user.provider_id` and `key.key_id`.
    ///
    /// Idempotent. Duplicate provider ids and key ids are only detected by the
    /// datastore once these exist.
    pub async fn create_schema(&self) -> AdapterResult<()> {
        let op = Operation::DefineSchema;
        self.log(op, &self.targets().user);

        let responses = self.query(op, self.queries.define_unique_indexes()).await?;
        translate::check_all(&responses).map_err(|e| self.errors.resolve(op, e))
    }

    // ─── Plumbing ────────────────────────────────────────────────

    fn log(&self, op: Operation, table: &str) {
        if self.debug_logs {
            tracing::debug!("[SurrealDB Adapter] {} on '{}'", op, table);
        }
    }

    async fn client(&self, op: Operation) -> AdapterResult<Arc<dyn SurrealClient>> {
        self.connection
            .client()
            .await
            .map_err(|e| self.errors.resolve(op, e))
    }

    async fn query(&self, op: Operation, query: SurrealQuery) -> AdapterResult<Vec<QueryResponse>> {
        let client = self.client(op).await?;
        client
            .query(&query.sql, query.vars)
            .await
            .map_err(|e| self.errors.resolve(op, e))
    }

    /// Rows of a statement whose failure must surface.
    async fn fetch(&self, op: Operation, query: SurrealQuery) -> AdapterResult<Vec<Value>> {
        let responses = self.query(op, query).await?;
        translate::checked_rows(responses).map_err(|e| self.errors.resolve(op, e))
    }

    async fn fetch_one(&self, op: Operation, query: SurrealQuery) -> AdapterResult<Option<Value>> {
        Ok(translate::first(self.fetch(op, query).await?))
    }

    async fn find_user(&self, op: Operation, user_id: &str) -> AdapterResult<Option<User>> {
        let query = self.queries.select_by_id(&self.targets().user, user_id);
        self.fetch_one(op, query)
            .await?
            .map(|record| self.translator.user(record))
            .transpose()
    }

    async fn find_key(&self, op: Operation, key_id: &str) -> AdapterResult<Option<Key>> {
        self.fetch_one(op, self.queries.select_key(key_id))
            .await?
            .map(|record| self.translator.key(record))
            .transpose()
    }

    async fn require_user(&self, op: Operation, user_id: &str) -> AdapterResult<()> {
        match self.find_user(op, user_id).await? {
            Some(_) => Ok(()),
            None => Err(ErrorCode::AuthInvalidUserId.into()),
        }
    }

    async fn require_key(&self, op: Operation, key_id: &str) -> AdapterResult<Key> {
        self.find_key(op, key_id)
            .await?
            .ok_or_else(|| ErrorCode::AuthInvalidKeyId.into())
    }

    async fn reject_duplicate_key(&self, op: Operation, key_id: &str) -> AdapterResult<()> {
        match self.find_key(op, key_id).await? {
            Some(_) => Err(ErrorCode::AuthDuplicateKeyId.into()),
            None => Ok(()),
        }
    }

    /// Write a key record. Ownership and duplicates are checked by the caller.
    async fn insert_key(&self, key: &Key) -> AdapterResult<()> {
        let op = Operation::SetKey;
        let mut fields = to_fields(key)?;
        if let Some(id) = fields.remove("id") {
            fields.insert(KEY_ID_FIELD.to_string(), id);
        }

        let query = self
            .queries
            .create_linked(&self.targets().key, None, &fields, &key.user_id);
        self.fetch(op, query).await?;
        Ok(())
    }
}

/// Pin a returned record's `id` to the record it was written as.
fn with_record_id(mut record: Value, table: &str, id: &str) -> Value {
    if let Some(obj) = record.as_object_mut() {
        obj.insert("id".to_string(), Value::String(thing::encode(table, id)));
    }
    record
}

/// Serialize a record into its field map.
fn to_fields<T: serde::Serialize>(record: &T) -> AdapterResult<serde_json::Map<String, Value>> {
    match serde_json::to_value(record)? {
        Value::Object(fields) => Ok(fields),
        other => Err(AdapterError::Config(format!(
            "expected a record object, got {other}"
        ))),
    }
}

#[async_trait]
impl Adapter for SurrealAdapter {
    // ─── Users ───────────────────────────────────────────────────

    async fn get_user(&self, user_id: &str) -> AdapterResult<Option<User>> {
        self.log(Operation::GetUser, &self.targets().user);
        self.find_user(Operation::GetUser, user_id).await
    }

    async fn set_user(
        &self,
        user_id: &str,
        mut attributes: UserAttributes,
        key: Option<Key>,
    ) -> AdapterResult<User> {
        let op = Operation::SetUser;
        self.log(op, &self.targets().user);

        if let Some(key) = &key {
            if key.user_id != user_id {
                return Err(ErrorCode::AuthInvalidUserId.into());
            }
            self.reject_duplicate_key(op, &key.id).await?;
        }

        attributes.remove("id");
        let client = self.client(op).await?;
        let created = client
            .create(
                &thing::encode(&self.targets().user, user_id),
                Value::Object(attributes),
            )
            .await
            .map_err(|e| self.errors.resolve(op, e))?;

        if let Some(key) = &key {
            self.log(Operation::SetKey, &self.targets().key);
            self.insert_key(key).await?;
        }

        self.translator
            .user(with_record_id(created, &self.targets().user, user_id))
    }

    async fn delete_user(&self, user_id: &str) -> AdapterResult<()> {
        let op = Operation::DeleteUser;
        self.log(op, &self.targets().user);

        let client = self.client(op).await?;
        client
            .delete(&thing::encode(&self.targets().user, user_id))
            .await
            .map_err(|e| self.errors.resolve(op, e))
    }

    async fn update_user_attributes(
        &self,
        user_id: &str,
        mut attributes: UserAttributes,
    ) -> AdapterResult<User> {
        let op = Operation::UpdateUserAttributes;
        self.log(op, &self.targets().user);

        // MERGE on a missing record id would create it.
        self.require_user(op, user_id).await?;

        attributes.remove("id");
        let client = self.client(op).await?;
        let merged = client
            .merge(
                &thing::encode(&self.targets().user, user_id),
                Value::Object(attributes),
            )
            .await
            .map_err(|e| self.errors.resolve(op, e))?;

        match merged {
            Some(record) => self
                .translator
                .user(with_record_id(record, &self.targets().user, user_id)),
            None => Err(ErrorCode::AuthInvalidUserId.into()),
        }
    }

    // ─── Sessions ────────────────────────────────────────────────

    async fn get_session_and_user_by_session_id(
        &self,
        session_id: &str,
    ) -> AdapterResult<Option<SessionAndUser>> {
        let op = Operation::GetSessionAndUser;
        self.log(op, &self.targets().session);

        let query = self.queries.select_session_with_user(session_id);
        match self.fetch_one(op, query).await? {
            Some(record) => self.translator.session_and_user(record),
            None => Ok(None),
        }
    }

    async fn get_session(&self, session_id: &str) -> AdapterResult<Option<Session>> {
        let op = Operation::GetSession;
        self.log(op, &self.targets().session);

        let query = self.queries.select_by_id(&self.targets().session, session_id);
        self.fetch_one(op, query)
            .await?
            .map(|record| self.translator.session(record))
            .transpose()
    }

    async fn get_sessions_by_user_id(&self, user_id: &str) -> AdapterResult<Vec<Session>> {
        let op = Operation::GetSessionsByUserId;
        self.log(op, &self.targets().session);

        let query = self.queries.select_by_user_id(&self.targets().session, user_id);
        let responses = self.query(op, query).await?;
        self.translator.sessions(translate::rows(responses))
    }

    async fn set_session(&self, session: Session) -> AdapterResult<()> {
        let op = Operation::SetSession;
        self.log(op, &self.targets().session);

        if session.extra.contains_key(USER_LINK_FIELD) {
            return Err(AdapterError::Config(format!(
                "session attribute '{USER_LINK_FIELD}' is reserved for the user link"
            )));
        }
        self.require_user(op, &session.user_id).await?;

        let fields = to_fields(&session)?;
        let query = self.queries.create_linked(
            &self.targets().session,
            Some(&session.id),
            &fields,
            &session.user_id,
        );
        self.fetch(op, query).await?;
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> AdapterResult<()> {
        let op = Operation::DeleteSession;
        self.log(op, &self.targets().session);

        let client = self.client(op).await?;
        client
            .delete(&thing::encode(&self.targets().session, session_id))
            .await
            .map_err(|e| self.errors.resolve(op, e))
    }

    async fn delete_sessions_by_user_id(&self, user_id: &str) -> AdapterResult<()> {
        let op = Operation::DeleteSessionsByUserId;
        self.log(op, &self.targets().session);

        let query = self.queries.delete_by_user_id(&self.targets().session, user_id);
        self.fetch(op, query).await?;
        Ok(())
    }

    // ─── Keys ────────────────────────────────────────────────────

    async fn get_key(&self, key_id: &str) -> AdapterResult<Option<Key>> {
        self.log(Operation::GetKey, &self.targets().key);
        self.find_key(Operation::GetKey, key_id).await
    }

    async fn set_key(&self, key: Key) -> AdapterResult<()> {
        let op = Operation::SetKey;
        self.log(op, &self.targets().key);

        self.require_user(op, &key.user_id).await?;
        self.reject_duplicate_key(op, &key.id).await?;
        self.insert_key(&key).await
    }

    async fn get_keys_by_user_id(&self, user_id: &str) -> AdapterResult<Vec<Key>> {
        let op = Operation::GetKeysByUserId;
        self.log(op, &self.targets().key);

        let query = self.queries.select_by_user_id(&self.targets().key, user_id);
        let responses = self.query(op, query).await?;
        self.translator.keys(translate::rows(responses))
    }

    async fn update_key_password(
        &self,
        key_id: &str,
        hashed_password: Option<String>,
    ) -> AdapterResult<Key> {
        let op = Operation::UpdateKeyPassword;
        self.log(op, &self.targets().key);

        self.require_key(op, key_id).await?;

        let query = self
            .queries
            .update_key_password(key_id, hashed_password.as_deref());
        match self.fetch_one(op, query).await? {
            Some(record) => self.translator.key(record),
            None => Err(ErrorCode::AuthInvalidKeyId.into()),
        }
    }

    async fn delete_keys_by_user_id(&self, user_id: &str) -> AdapterResult<()> {
        let op = Operation::DeleteKeysByUserId;
        self.log(op, &self.targets().key);

        let query = self.queries.delete_by_user_id(&self.targets().key, user_id);
        self.fetch(op, query).await?;
        Ok(())
    }

    async fn delete_non_primary_key(&self, key_id: &str) -> AdapterResult<()> {
        let op = Operation::DeleteNonPrimaryKey;
        self.log(op, &self.targets().key);

        self.require_key(op, key_id).await?;

        self.fetch(op, self.queries.delete_non_primary_key(key_id))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use serde_json::json;

    use crate::client::Vars;
    use crate::error::SurrealError;

    /// Answers every `query` from a fixed function and records what was sent.
    struct RecordingClient {
        respond: fn(&str) -> Vec<QueryResponse>,
        calls: Mutex<Vec<(String, Vars)>>,
    }

    impl std::fmt::Debug for RecordingClient {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("RecordingClient").finish_non_exhaustive()
        }
    }

    impl RecordingClient {
        fn new(respond: fn(&str) -> Vec<QueryResponse>) -> Arc<Self> {
            Arc::new(Self {
                respond,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn record(&self, call: String, vars: Vars) {
            self.calls.lock().unwrap().push((call, vars));
        }

        fn calls(&self) -> Vec<(String, Vars)> {
            self.calls.lock().unwrap().clone()
        }

        fn wrote(&self) -> bool {
            self.calls().iter().any(|(sql, _)| {
                ["CREATE", "UPDATE", "DELETE", "MERGE"]
                    .iter()
                    .any(|verb| sql.starts_with(verb))
            })
        }
    }

    #[async_trait]
    impl SurrealClient for RecordingClient {
        async fn query(&self, sql: &str, vars: Vars) -> Result<Vec<QueryResponse>, SurrealError> {
            self.record(sql.to_string(), vars);
            Ok((self.respond)(sql))
        }
        async fn create(&self, thing: &str, data: Value) -> Result<Value, SurrealError> {
            self.record(format!("CREATE {thing}"), Vars::new());
            let mut record = data;
            record["id"] = json!(thing);
            Ok(record)
        }
        async fn merge(&self, thing: &str, data: Value) -> Result<Option<Value>, SurrealError> {
            self.record(format!("MERGE {thing}"), Vars::new());
            let mut record = data;
            record["id"] = json!(thing);
            Ok(Some(record))
        }
        async fn delete(&self, thing: &str) -> Result<(), SurrealError> {
            self.record(format!("DELETE {thing}"), Vars::new());
            Ok(())
        }
        async fn select(&self, _: &str) -> Result<Vec<Value>, SurrealError> {
            Ok(Vec::new())
        }
    }

    fn empty(_: &str) -> Vec<QueryResponse> {
        vec![QueryResponse::ok(Vec::new())]
    }

    fn stored_key(_: &str) -> Vec<QueryResponse> {
        vec![QueryResponse::ok(vec![json!({
            "id": "key:r1",
            "key_id": "email:alice@example.com",
            "user_id": "u1",
            "hashed_password": "new-hash",
            "primary_key": false,
            "user": "user:u1"
        })])]
    }

    fn adapter(client: Arc<RecordingClient>) -> SurrealAdapter {
        SurrealAdapter::new(Connection::client(client), SurrealAdapterOptions::default()).unwrap()
    }

    #[test]
    fn test_invalid_targets_rejected() {
        let options = SurrealAdapterOptions::default().with_targets(Targets {
            session: "session WHERE true".into(),
            ..Default::default()
        });
        let result = SurrealAdapter::new(Connection::client(RecordingClient::new(empty)), options);
        assert!(matches!(result, Err(AdapterError::Config(_))));
    }

    #[tokio::test]
    async fn test_set_session_missing_user_writes_nothing() {
        let client = RecordingClient::new(empty);
        let adapter = adapter(client.clone());

        let err = adapter
            .set_session(Session::new("s1", "nonexistent", 1, 2))
            .await
            .unwrap_err();

        assert_eq!(err.code(), Some(ErrorCode::AuthInvalidUserId));
        assert!(!client.wrote());
    }

    #[tokio::test]
    async fn test_set_key_missing_user_writes_nothing() {
        let client = RecordingClient::new(empty);
        let adapter = adapter(client.clone());

        let err = adapter
            .set_key(Key::new("github:alice", "nonexistent", None, true))
            .await
            .unwrap_err();

        assert_eq!(err.code(), Some(ErrorCode::AuthInvalidUserId));
        assert!(!client.wrote());
    }

    #[tokio::test]
    async fn test_update_missing_user_never_merges() {
        let client = RecordingClient::new(empty);
        let adapter = adapter(client.clone());

        let err = adapter
            .update_user_attributes("ghost", UserAttributes::new())
            .await
            .unwrap_err();

        assert_eq!(err.code(), Some(ErrorCode::AuthInvalidUserId));
        assert!(!client.wrote());
    }

    #[tokio::test]
    async fn test_update_key_password_is_bound() {
        let client = RecordingClient::new(stored_key);
        let adapter = adapter(client.clone());

        let key = adapter
            .update_key_password("email:alice@example.com", Some("new-hash".into()))
            .await
            .unwrap();
        assert_eq!(key.id, "email:alice@example.com");
        assert_eq!(key.hashed_password.as_deref(), Some("new-hash"));

        let calls = client.calls();
        let (sql, vars) = calls
            .iter()
            .find(|(sql, _)| sql.starts_with("UPDATE"))
            .unwrap();
        assert!(!sql.contains("new-hash"));
        assert_eq!(vars["hashed_password"], "new-hash");
        assert_eq!(vars["key_id"], "email:alice@example.com");
    }

    #[tokio::test]
    async fn test_unknown_key_is_invalid_key_id() {
        let client = RecordingClient::new(empty);
        let adapter = adapter(client.clone());

        let err = adapter
            .update_key_password("github:nobody", None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::AuthInvalidKeyId));

        let err = adapter
            .delete_non_primary_key("github:nobody")
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::AuthInvalidKeyId));
        assert!(!client.wrote());
    }

    #[tokio::test]
    async fn test_set_user_strips_prefix_and_id_attribute() {
        let client = RecordingClient::new(empty);
        let adapter = adapter(client.clone());

        let mut attributes = UserAttributes::new();
        attributes.insert("id".into(), json!("spoofed"));
        attributes.insert("username".into(), json!("alice"));

        let user = adapter.set_user("u1", attributes, None).await.unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.attribute("username"), Some(&json!("alice")));
        assert!(client.calls().iter().any(|(call, _)| call == "CREATE user:u1"));
    }

    #[tokio::test]
    async fn test_set_user_with_existing_key_writes_nothing() {
        let client = RecordingClient::new(stored_key);
        let adapter = adapter(client.clone());

        let key = Key::new("email:alice@example.com", "u2", None, true);
        let err = adapter
            .set_user("u2", UserAttributes::new(), Some(key))
            .await
            .unwrap_err();

        assert_eq!(err.code(), Some(ErrorCode::AuthDuplicateKeyId));
        assert!(!client.wrote());
    }

    #[tokio::test]
    async fn test_set_user_with_foreign_key_writes_nothing() {
        let client = RecordingClient::new(empty);
        let adapter = adapter(client.clone());

        let key = Key::new("github:alice", "ghost", None, true);
        let err = adapter
            .set_user("u1", UserAttributes::new(), Some(key))
            .await
            .unwrap_err();

        assert_eq!(err.code(), Some(ErrorCode::AuthInvalidUserId));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_session_user_attribute_is_reserved() {
        let client = RecordingClient::new(empty);
        let adapter = adapter(client.clone());

        let mut session = Session::new("s1", "u1", 1, 2);
        session.extra.insert("user".into(), json!("someone-else"));
        let err = adapter.set_session(session).await.unwrap_err();

        assert!(matches!(err, AdapterError::Config(ref msg) if msg.contains("'user'")));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_list_reads_treat_failed_statement_as_empty() {
        fn failing(_: &str) -> Vec<QueryResponse> {
            vec![QueryResponse::err("table not found")]
        }
        let adapter = adapter(RecordingClient::new(failing));

        assert!(adapter.get_sessions_by_user_id("u1").await.unwrap().is_empty());
        assert!(adapter.get_keys_by_user_id("u1").await.unwrap().is_empty());
        assert!(adapter.get_user("u1").await.is_err());
    }

    #[tokio::test]
    async fn test_closed_client_goes_through_error_hook() {
        #[derive(Debug)]
        struct Closed;

        #[async_trait]
        impl SurrealClient for Closed {
            async fn query(&self, _: &str, _: Vars) -> Result<Vec<QueryResponse>, SurrealError> {
                unreachable!()
            }
            async fn create(&self, _: &str, _: Value) -> Result<Value, SurrealError> {
                unreachable!()
            }
            async fn merge(&self, _: &str, _: Value) -> Result<Option<Value>, SurrealError> {
                unreachable!()
            }
            async fn delete(&self, _: &str) -> Result<(), SurrealError> {
                unreachable!()
            }
            async fn select(&self, _: &str) -> Result<Vec<Value>, SurrealError> {
                unreachable!()
            }
            fn is_closed(&self) -> bool {
                true
            }
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let hook_seen = seen.clone();
        let options = SurrealAdapterOptions::default().on_error(move |e: &SurrealError, op: Operation| {
            hook_seen.lock().unwrap().push((e.clone(), op));
        });
        let adapter = SurrealAdapter::new(Connection::client(Arc::new(Closed)), options).unwrap();

        let err = adapter.get_user("u1").await.unwrap_err();
        assert_eq!(err.to_string(), "surreal:connection:closed");
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(SurrealError::ConnectionClosed, Operation::GetUser)]
        );
    }
}
