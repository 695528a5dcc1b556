// Result translator — SurrealDB query responses -> Lucia records.
//
// Every statement the adapter sends is a single statement, so only the first
// response is inspected. Record ids are decoded again here even though the
// SELECT projections already return bare ids; decoding is idempotent and
// records coming from `create` / `merge` still carry the `table:` prefix.

use serde_json::Value;

use lucia_core::{AdapterError, Key, Session, SessionAndUser, User};

use crate::client::QueryResponse;
use crate::error::SurrealError;
use crate::options::Targets;
use crate::query::{KEY_ID_FIELD, USER_LINK_FIELD};
use crate::thing;

/// Rows of the first statement, or nothing if it failed.
///
/// Used for list reads, where a failed statement reads as "no records".
pub fn rows(responses: Vec<QueryResponse>) -> Vec<Value> {
    match responses.into_iter().next() {
        Some(response) if response.is_ok() => response.result,
        _ => Vec::new(),
    }
}

/// Rows of the first statement, surfacing its error.
pub fn checked_rows(responses: Vec<QueryResponse>) -> Result<Vec<Value>, SurrealError> {
    match responses.into_iter().next() {
        Some(response) => match response.error() {
            Some(error) => Err(error),
            None => Ok(response.result),
        },
        None => Ok(Vec::new()),
    }
}

/// Fail on the first statement that reported an error.
pub fn check_all(responses: &[QueryResponse]) -> Result<(), SurrealError> {
    match responses.iter().find_map(QueryResponse::error) {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// First row, if any.
pub fn first(rows: Vec<Value>) -> Option<Value> {
    rows.into_iter().next()
}

/// Shapes stored records into the models the auth library expects.
#[derive(Debug, Clone)]
pub struct Translator {
    targets: Targets,
}

impl Translator {
    pub fn new(targets: Targets) -> Self {
        Self { targets }
    }

    pub fn user(&self, mut record: Value) -> Result<User, AdapterError> {
        thing::decode_record_id(&self.targets.user, &mut record);
        Ok(serde_json::from_value(record)?)
    }

    pub fn session(&self, mut record: Value) -> Result<Session, AdapterError> {
        thing::decode_record_id(&self.targets.session, &mut record);
        if let Some(obj) = record.as_object_mut() {
            obj.remove(USER_LINK_FIELD);
        }
        Ok(serde_json::from_value(record)?)
    }

    /// Key records keep the auth key id in `key_id`; the record id is internal.
    pub fn key(&self, mut record: Value) -> Result<Key, AdapterError> {
        if let Some(obj) = record.as_object_mut() {
            obj.remove(USER_LINK_FIELD);
            obj.remove("id");
            if let Some(key_id) = obj.remove(KEY_ID_FIELD) {
                obj.insert("id".to_string(), key_id);
            }
        }
        Ok(serde_json::from_value(record)?)
    }

    /// Split a session row carrying its fetched `user` into both records.
    ///
    /// `None` when the linked user no longer exists. The user's id is taken
    /// from the session's `user_id`.
    pub fn session_and_user(&self, mut record: Value) -> Result<Option<SessionAndUser>, AdapterError> {
        let linked = record
            .as_object_mut()
            .and_then(|obj| obj.remove(USER_LINK_FIELD));

        let user = match linked {
            Some(mut user @ Value::Object(_)) => {
                if let Some(user_id) = record.get("user_id") {
                    user["id"] = user_id.clone();
                }
                self.user(user)?
            }
            _ => return Ok(None),
        };
        let session = self.session(record)?;

        Ok(Some(SessionAndUser { user, session }))
    }

    pub fn sessions(&self, records: Vec<Value>) -> Result<Vec<Session>, AdapterError> {
        records.into_iter().map(|r| self.session(r)).collect()
    }

    pub fn keys(&self, records: Vec<Value>) -> Result<Vec<Key>, AdapterError> {
        records.into_iter().map(|r| self.key(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn translator() -> Translator {
        Translator::new(Targets::default())
    }

    #[test]
    fn test_rows_lenient_on_error() {
        assert!(rows(vec![QueryResponse::err("boom")]).is_empty());
        assert!(rows(Vec::new()).is_empty());
        assert_eq!(
            rows(vec![QueryResponse::ok(vec![json!({"id": "a"})])]).len(),
            1
        );
    }

    #[test]
    fn test_checked_rows_surfaces_error() {
        assert_eq!(
            checked_rows(vec![QueryResponse::err("boom")]),
            Err(SurrealError::Db("boom".into()))
        );
        assert_eq!(checked_rows(Vec::new()), Ok(Vec::new()));
    }

    #[test]
    fn test_check_all_finds_later_failure() {
        let responses = vec![QueryResponse::ok(Vec::new()), QueryResponse::err("second")];
        assert_eq!(check_all(&responses), Err(SurrealError::Db("second".into())));
        assert!(check_all(&responses[..1]).is_ok());
    }

    #[test]
    fn test_user_id_decoded() {
        let user = translator()
            .user(json!({"id": "user:u1", "username": "alice"}))
            .unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.attribute("username"), Some(&json!("alice")));
    }

    #[test]
    fn test_session_drops_link() {
        let session = translator()
            .session(json!({
                "id": "s1",
                "user_id": "u1",
                "expires": 1,
                "idle_expires": 2,
                "user": "user:u1"
            }))
            .unwrap();
        assert_eq!(session.id, "s1");
        assert!(session.extra.get("user").is_none());
    }

    #[test]
    fn test_key_surfaces_key_id() {
        let key = translator()
            .key(json!({
                "id": "x9f2",
                "key_id": "github:alice",
                "user_id": "u1",
                "hashed_password": null,
                "primary_key": true,
                "user": "user:u1"
            }))
            .unwrap();
        assert_eq!(key.id, "github:alice");
        assert_eq!(key.user_id, "u1");
        assert!(key.primary_key);
    }

    #[test]
    fn test_session_and_user_unnested() {
        let result = translator()
            .session_and_user(json!({
                "id": "s1",
                "user_id": "u1",
                "expires": 1,
                "idle_expires": 2,
                "user": {"id": "user:u1", "username": "alice"}
            }))
            .unwrap()
            .unwrap();
        assert_eq!(result.session.id, "s1");
        assert_eq!(result.user.id, "u1");
        assert_eq!(result.user.attribute("username"), Some(&json!("alice")));
    }

    #[test]
    fn test_session_and_user_takes_id_from_session() {
        let result = translator()
            .session_and_user(json!({
                "id": "s1",
                "user_id": "u-1",
                "expires": 1,
                "idle_expires": 2,
                "user": {"username": "alice"}
            }))
            .unwrap()
            .unwrap();
        assert_eq!(result.user.id, "u-1");
    }

    #[test]
    fn test_session_and_user_missing_user() {
        let result = translator()
            .session_and_user(json!({
                "id": "s1",
                "user_id": "u1",
                "expires": 1,
                "idle_expires": 2,
                "user": null
            }))
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_malformed_record_is_serialization_error() {
        let err = translator().session(json!({"id": "s1"})).unwrap_err();
        assert!(matches!(err, AdapterError::Serialization(_)));
    }
}
