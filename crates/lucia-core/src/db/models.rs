// Records the auth library persists through an adapter: users, sessions and keys.

use serde::{Deserialize, Serialize};

/// Caller-defined user attributes, stored alongside the user id.
pub type UserAttributes = serde_json::Map<String, serde_json::Value>;

/// User record.
///
/// Only `id` is fixed; everything else is whatever the application
/// declared as user attributes (optionally `provider_id` and
/// `hashed_password` for a single default credential).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(flatten)]
    pub attributes: UserAttributes,
}

impl User {
    pub fn new(id: impl Into<String>, attributes: UserAttributes) -> Self {
        Self {
            id: id.into(),
            attributes,
        }
    }

    /// Look up a single attribute.
    pub fn attribute(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name)
    }
}

/// Session record.
///
/// `expires` and `idle_expires` are unix timestamps in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub expires: i64,
    pub idle_expires: i64,
    /// Additional session attributes.
    ///
    /// `user` is reserved by storage backends that link sessions to their
    /// user record; such backends reject a session carrying it.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Session {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        expires: i64,
        idle_expires: i64,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            expires,
            idle_expires,
            extra: serde_json::Map::new(),
        }
    }
}

/// Key record: a credential that resolves to a user.
///
/// The id is conventionally `"<provider>:<provider-user-id>"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Key {
    pub id: String,
    pub user_id: String,
    pub hashed_password: Option<String>,
    pub primary_key: bool,
    /// Expiry for single-use keys (unix milliseconds); `None` for persistent keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<i64>,
}

impl Key {
    pub fn new(
        id: impl Into<String>,
        user_id: impl Into<String>,
        hashed_password: Option<String>,
        primary_key: bool,
    ) -> Self {
        Self {
            id: id.into(),
            user_id: user_id.into(),
            hashed_password,
            primary_key,
            expires: None,
        }
    }
}

/// Result of the combined session + owning user lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAndUser {
    pub user: User,
    pub session: Session,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_attributes_flatten() {
        let user: User = serde_json::from_value(json!({
            "id": "u1",
            "username": "alice",
            "provider_id": "email:alice@example.com"
        }))
        .unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.attribute("username"), Some(&json!("alice")));
        assert!(user.attributes.get("id").is_none());

        let back = serde_json::to_value(&user).unwrap();
        assert_eq!(back["username"], "alice");
        assert_eq!(back["id"], "u1");
    }

    #[test]
    fn test_session_extra_fields() {
        let session: Session = serde_json::from_value(json!({
            "id": "s1",
            "user_id": "u1",
            "expires": 1_700_000_000_000i64,
            "idle_expires": 1_700_000_100_000i64,
            "country": "NL"
        }))
        .unwrap();
        assert_eq!(session.user_id, "u1");
        assert_eq!(session.extra["country"], "NL");
    }

    #[test]
    fn test_key_optional_fields() {
        let key: Key = serde_json::from_value(json!({
            "id": "github:alice",
            "user_id": "u1",
            "hashed_password": null,
            "primary_key": true
        }))
        .unwrap();
        assert!(key.hashed_password.is_none());
        assert!(key.expires.is_none());

        let value = serde_json::to_value(&key).unwrap();
        assert!(value.get("expires").is_none());
        assert_eq!(value["hashed_password"], serde_json::Value::Null);
    }
}
