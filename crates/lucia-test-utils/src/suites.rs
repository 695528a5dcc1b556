// Adapter conformance suites — users, sessions and keys.
//
// Each test seeds or inspects records through the fixture `Database` and
// drives the adapter under test, so a passing run says the adapter wrote what
// it claimed to write and nothing else.

use serde_json::{json, Value};

use lucia_core::{ErrorCode, Key, User, UserAttributes};

use crate::test_suite::{
    ensure, expect_code, generate_test_key, generate_test_session, generate_test_user, TestFuture,
    TestHelpers, TestSuite,
};

/// Every suite, in dependency order.
pub fn all_suites() -> Vec<TestSuite> {
    vec![user_suite(), session_suite(), key_suite()]
}

fn attributes(value: Value) -> UserAttributes {
    match value {
        Value::Object(map) => map,
        _ => UserAttributes::new(),
    }
}

/// True if any string anywhere in `value` starts with `prefix`.
fn mentions_prefix(value: &Value, prefix: &str) -> bool {
    match value {
        Value::String(s) => s.starts_with(prefix),
        Value::Array(items) => items.iter().any(|v| mentions_prefix(v, prefix)),
        Value::Object(map) => map.values().any(|v| mentions_prefix(v, prefix)),
        _ => false,
    }
}

async fn create_user(h: &TestHelpers) -> Result<User, Box<dyn std::error::Error + Send + Sync>> {
    let user = generate_test_user();
    h.db.insert_user(&user).await?;
    Ok(user)
}

// ─── Users ──────────────────────────────────────────────────────────

pub fn user_suite() -> TestSuite {
    TestSuite::new("users", true)
        .test("get_user returns None for unknown id", get_unknown_user)
        .test("set_user then get_user round trips", set_then_get_user)
        .test("set_user drops an id attribute", set_user_ignores_id_attribute)
        .test("set_user rejects duplicate user id", duplicate_user_id)
        .test("set_user rejects duplicate provider id", duplicate_provider_id)
        .test("set_user with key creates both", set_user_with_key)
        .test("set_user with taken key id creates nothing", set_user_with_taken_key)
        .test("set_user with another user's key creates nothing", set_user_with_foreign_key)
        .test("delete_user leaves sessions and keys", delete_user_does_not_cascade)
        .test("update_user_attributes merges", update_user_attributes)
        .test("update_user_attributes on unknown id", update_unknown_user)
}

fn get_unknown_user(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let user = h.adapter.get_user("nobody").await?;
        ensure(user.is_none(), "expected no user")
    })
}

fn set_then_get_user(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let user = generate_test_user();
        let created = h
            .adapter
            .set_user(&user.id, user.attributes.clone(), None)
            .await?;
        ensure(created == user, format!("set_user returned {created:?}"))?;

        let fetched = h.adapter.get_user(&user.id).await?;
        ensure(fetched.as_ref() == Some(&user), format!("get_user returned {fetched:?}"))?;

        let prefix = format!("{}:", h.db.user_table());
        let stored = h.db.get_users().await?;
        ensure(stored.len() == 1, "expected one stored user")?;
        ensure(
            !mentions_prefix(&serde_json::to_value(&fetched)?, &prefix)
                && !mentions_prefix(&stored[0], &prefix),
            "table prefix leaked into a user field",
        )
    })
}

fn set_user_ignores_id_attribute(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let created = h
            .adapter
            .set_user("u-plain", attributes(json!({"id": "other", "username": "a"})), None)
            .await?;
        ensure(created.id == "u-plain", format!("unexpected id {}", created.id))?;
        ensure(created.attribute("id").is_none(), "id leaked into attributes")?;

        let stored = h.db.get_users().await?;
        ensure(stored == vec![json!({"id": "u-plain", "username": "a"})], format!("stored {stored:?}"))
    })
}

fn duplicate_user_id(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let user = create_user(h).await?;

        let second = h
            .adapter
            .set_user(&user.id, attributes(json!({"username": "impostor"})), None)
            .await;
        expect_code(second, ErrorCode::AuthDuplicateUserId)?;

        let fetched = h.adapter.get_user(&user.id).await?;
        ensure(fetched == Some(user), "first user's attributes changed")
    })
}

fn duplicate_provider_id(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let provider = json!({"provider_id": "email:shared@example.com"});
        h.adapter
            .set_user("u-first", attributes(provider.clone()), None)
            .await?;

        let second = h.adapter.set_user("u-second", attributes(provider), None).await;
        expect_code(second, ErrorCode::AuthDuplicateProviderId)?;

        let missing = h.adapter.get_user("u-second").await?;
        ensure(missing.is_none(), "second user was written")
    })
}

fn set_user_with_key(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let user = generate_test_user();
        let key = generate_test_key(&user.id, true);
        h.adapter
            .set_user(&user.id, user.attributes.clone(), Some(key.clone()))
            .await?;

        ensure(h.adapter.get_user(&user.id).await?.is_some(), "user not created")?;
        let stored = h.adapter.get_key(&key.id).await?;
        ensure(stored == Some(key), format!("get_key returned {stored:?}"))
    })
}

fn set_user_with_taken_key(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let owner = create_user(h).await?;
        let key = generate_test_key(&owner.id, true);
        h.db.insert_key(&key).await?;

        let user = generate_test_user();
        let result = h
            .adapter
            .set_user(&user.id, user.attributes.clone(), Some(Key::new(&key.id, &user.id, None, true)))
            .await;
        expect_code(result, ErrorCode::AuthDuplicateKeyId)?;

        ensure(h.adapter.get_user(&user.id).await?.is_none(), "user was written")?;
        ensure(h.db.get_keys().await?.len() == 1, "key table changed")
    })
}

fn set_user_with_foreign_key(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let user = generate_test_user();
        let key = generate_test_key("ghost", true);
        let result = h
            .adapter
            .set_user(&user.id, user.attributes.clone(), Some(key))
            .await;
        expect_code(result, ErrorCode::AuthInvalidUserId)?;

        ensure(h.db.get_users().await?.is_empty(), "user was written")?;
        ensure(h.db.get_keys().await?.is_empty(), "key was written")
    })
}

fn delete_user_does_not_cascade(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let user = create_user(h).await?;
        h.db.insert_session(&generate_test_session(&user.id)).await?;
        h.db.insert_key(&generate_test_key(&user.id, true)).await?;

        h.adapter.delete_user(&user.id).await?;
        h.adapter.delete_user(&user.id).await?;

        ensure(h.db.get_users().await?.is_empty(), "user still stored")?;
        ensure(h.db.get_sessions().await?.len() == 1, "session was removed")?;
        ensure(h.db.get_keys().await?.len() == 1, "key was removed")
    })
}

fn update_user_attributes(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let user = create_user(h).await?;

        let updated = h
            .adapter
            .update_user_attributes(&user.id, attributes(json!({"username": "renamed", "age": 30})))
            .await?;
        ensure(updated.id == user.id, "id changed")?;
        ensure(updated.attribute("username") == Some(&json!("renamed")), "username not merged")?;
        ensure(updated.attribute("age") == Some(&json!(30)), "age not merged")?;

        let fetched = h.adapter.get_user(&user.id).await?;
        ensure(fetched == Some(updated), "get_user disagrees with update result")
    })
}

fn update_unknown_user(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let result = h
            .adapter
            .update_user_attributes("ghost", attributes(json!({"username": "ghost"})))
            .await;
        expect_code(result, ErrorCode::AuthInvalidUserId)?;
        ensure(h.db.get_users().await?.is_empty(), "update created a user")
    })
}

// ─── Sessions ───────────────────────────────────────────────────────

pub fn session_suite() -> TestSuite {
    TestSuite::new("sessions", true)
        .test("get_session returns None for unknown id", get_unknown_session)
        .test("set_session then get_session round trips", set_then_get_session)
        .test("set_session for unknown user writes nothing", set_session_unknown_user)
        .test("set_session rejects duplicate session id", duplicate_session_id)
        .test("get_session_and_user returns both", get_session_and_user)
        .test("get_session_and_user with deleted user", session_with_deleted_user)
        .test("get_sessions_by_user_id filters by user", sessions_by_user)
        .test("delete_session removes one session", delete_session)
        .test("delete_sessions_by_user_id", delete_sessions_by_user)
}

fn get_unknown_session(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        ensure(h.adapter.get_session("nothing").await?.is_none(), "expected no session")?;
        let both = h.adapter.get_session_and_user_by_session_id("nothing").await?;
        ensure(both.is_none(), "expected no session and user")
    })
}

fn set_then_get_session(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let user = create_user(h).await?;
        let session = generate_test_session(&user.id);
        h.adapter.set_session(session.clone()).await?;

        let fetched = h.adapter.get_session(&session.id).await?;
        ensure(fetched.as_ref() == Some(&session), format!("get_session returned {fetched:?}"))?;

        let stored = h.db.get_sessions().await?;
        ensure(stored == vec![serde_json::to_value(&session)?], format!("stored {stored:?}"))
    })
}

fn set_session_unknown_user(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let result = h.adapter.set_session(generate_test_session("nonexistent")).await;
        expect_code(result, ErrorCode::AuthInvalidUserId)?;
        ensure(h.db.get_sessions().await?.is_empty(), "session was written")
    })
}

fn duplicate_session_id(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let user = create_user(h).await?;
        let session = generate_test_session(&user.id);
        h.db.insert_session(&session).await?;

        let mut again = generate_test_session(&user.id);
        again.id = session.id.clone();
        expect_code(h.adapter.set_session(again).await, ErrorCode::AuthDuplicateSessionId)?;

        let fetched = h.adapter.get_session(&session.id).await?;
        ensure(fetched == Some(session), "first session changed")
    })
}

fn get_session_and_user(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let user = create_user(h).await?;
        let session = generate_test_session(&user.id);
        h.db.insert_session(&session).await?;

        let both = h
            .adapter
            .get_session_and_user_by_session_id(&session.id)
            .await?
            .ok_or("expected session and user")?;
        ensure(both.session == session, format!("session was {:?}", both.session))?;
        ensure(both.user == user, format!("user was {:?}", both.user))
    })
}

/// A session whose user is gone is invisible to the combined lookup but
/// still returned by the plain session read.
fn session_with_deleted_user(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let user = create_user(h).await?;
        let session = generate_test_session(&user.id);
        h.db.insert_session(&session).await?;
        h.adapter.delete_user(&user.id).await?;

        let both = h.adapter.get_session_and_user_by_session_id(&session.id).await?;
        ensure(both.is_none(), format!("expected None, got {both:?}"))?;

        let plain = h.adapter.get_session(&session.id).await?;
        ensure(plain == Some(session), "dangling session not returned")
    })
}

fn sessions_by_user(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let user = create_user(h).await?;
        let other = create_user(h).await?;
        let first = generate_test_session(&user.id);
        let second = generate_test_session(&user.id);
        h.db.insert_session(&first).await?;
        h.db.insert_session(&second).await?;
        h.db.insert_session(&generate_test_session(&other.id)).await?;

        let mut ids: Vec<String> = h
            .adapter
            .get_sessions_by_user_id(&user.id)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();
        ids.sort();
        let mut expected = vec![first.id, second.id];
        expected.sort();
        ensure(ids == expected, format!("got sessions {ids:?}"))?;

        let none = h.adapter.get_sessions_by_user_id("nobody").await?;
        ensure(none.is_empty(), "unknown user has sessions")
    })
}

fn delete_session(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let user = create_user(h).await?;
        let doomed = generate_test_session(&user.id);
        let kept = generate_test_session(&user.id);
        h.db.insert_session(&doomed).await?;
        h.db.insert_session(&kept).await?;

        h.adapter.delete_session(&doomed.id).await?;
        h.adapter.delete_session("never-existed").await?;

        ensure(h.adapter.get_session(&doomed.id).await?.is_none(), "session not deleted")?;
        ensure(h.adapter.get_session(&kept.id).await?.is_some(), "wrong session deleted")
    })
}

fn delete_sessions_by_user(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let user = create_user(h).await?;
        let other = create_user(h).await?;
        h.db.insert_session(&generate_test_session(&user.id)).await?;
        h.db.insert_session(&generate_test_session(&user.id)).await?;
        h.db.insert_session(&generate_test_session(&other.id)).await?;

        h.adapter.delete_sessions_by_user_id(&user.id).await?;

        let left = h.adapter.get_sessions_by_user_id(&user.id).await?;
        ensure(left.is_empty(), format!("{} sessions left", left.len()))?;
        let others = h.adapter.get_sessions_by_user_id(&other.id).await?;
        ensure(others.len() == 1, "another user's session was deleted")
    })
}

// ─── Keys ───────────────────────────────────────────────────────────

pub fn key_suite() -> TestSuite {
    TestSuite::new("keys", true)
        .test("get_key returns None for unknown id", get_unknown_key)
        .test("set_key then get_key round trips", set_then_get_key)
        .test("set_key for unknown user writes nothing", set_key_unknown_user)
        .test("set_key rejects duplicate key id only", duplicate_key_id)
        .test("get_keys_by_user_id filters by user", keys_by_user)
        .test("update_key_password", update_key_password)
        .test("update_key_password on unknown key", update_unknown_key_password)
        .test("delete_keys_by_user_id", delete_keys_by_user)
        .test("delete_non_primary_key keeps primary keys", delete_non_primary_key)
        .test("delete_non_primary_key on unknown key", delete_unknown_key)
}

fn get_unknown_key(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        ensure(h.adapter.get_key("email:nobody@example.com").await?.is_none(), "expected no key")
    })
}

fn set_then_get_key(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let user = create_user(h).await?;
        let key = generate_test_key(&user.id, false);
        h.adapter.set_key(key.clone()).await?;

        let fetched = h.adapter.get_key(&key.id).await?;
        ensure(fetched.as_ref() == Some(&key), format!("get_key returned {fetched:?}"))?;

        let stored = h.db.get_keys().await?;
        ensure(stored == vec![serde_json::to_value(&key)?], format!("stored {stored:?}"))
    })
}

fn set_key_unknown_user(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let result = h.adapter.set_key(generate_test_key("nonexistent", true)).await;
        expect_code(result, ErrorCode::AuthInvalidUserId)?;
        ensure(h.db.get_keys().await?.is_empty(), "key was written")
    })
}

fn duplicate_key_id(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let user = create_user(h).await?;
        let key = generate_test_key(&user.id, true);
        h.db.insert_key(&key).await?;

        let same_id = Key::new(&key.id, &user.id, None, false);
        expect_code(h.adapter.set_key(same_id).await, ErrorCode::AuthDuplicateKeyId)?;

        // Same password hash and owner, different id.
        let mut sibling = generate_test_key(&user.id, false);
        sibling.hashed_password = key.hashed_password.clone();
        h.adapter.set_key(sibling).await?;

        ensure(h.db.get_keys().await?.len() == 2, "expected two keys")
    })
}

fn keys_by_user(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let user = create_user(h).await?;
        let other = create_user(h).await?;
        let key = generate_test_key(&user.id, true);
        h.db.insert_key(&key).await?;
        h.db.insert_key(&generate_test_key(&other.id, true)).await?;

        let keys = h.adapter.get_keys_by_user_id(&user.id).await?;
        ensure(keys == vec![key], format!("got keys {keys:?}"))?;
        ensure(h.adapter.get_keys_by_user_id("nobody").await?.is_empty(), "unknown user has keys")
    })
}

fn update_key_password(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let user = create_user(h).await?;
        let key = generate_test_key(&user.id, true);
        h.db.insert_key(&key).await?;

        let updated = h
            .adapter
            .update_key_password(&key.id, Some("s2:rotated".to_string()))
            .await?;
        ensure(updated.hashed_password.as_deref() == Some("s2:rotated"), "password not updated")?;
        ensure(updated.id == key.id && updated.user_id == key.user_id, "identity changed")?;

        let cleared = h.adapter.update_key_password(&key.id, None).await?;
        ensure(cleared.hashed_password.is_none(), "password not cleared")?;
        let fetched = h.adapter.get_key(&key.id).await?;
        ensure(fetched == Some(cleared), "get_key disagrees with update result")
    })
}

fn update_unknown_key_password(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let result = h
            .adapter
            .update_key_password("email:ghost@example.com", Some("s2:x".to_string()))
            .await;
        expect_code(result, ErrorCode::AuthInvalidKeyId)?;
        ensure(h.db.get_keys().await?.is_empty(), "update created a key")
    })
}

fn delete_keys_by_user(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let user = create_user(h).await?;
        let other = create_user(h).await?;
        h.db.insert_key(&generate_test_key(&user.id, true)).await?;
        h.db.insert_key(&generate_test_key(&user.id, false)).await?;
        h.db.insert_key(&generate_test_key(&other.id, true)).await?;

        h.adapter.delete_keys_by_user_id(&user.id).await?;

        ensure(h.adapter.get_keys_by_user_id(&user.id).await?.is_empty(), "keys left")?;
        ensure(
            h.adapter.get_keys_by_user_id(&other.id).await?.len() == 1,
            "another user's key was deleted",
        )
    })
}

fn delete_non_primary_key(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let user = create_user(h).await?;
        let primary = generate_test_key(&user.id, true);
        let secondary = generate_test_key(&user.id, false);
        h.db.insert_key(&primary).await?;
        h.db.insert_key(&secondary).await?;

        h.adapter.delete_non_primary_key(&secondary.id).await?;
        h.adapter.delete_non_primary_key(&primary.id).await?;

        ensure(h.adapter.get_key(&secondary.id).await?.is_none(), "secondary key kept")?;
        ensure(h.adapter.get_key(&primary.id).await? == Some(primary), "primary key deleted")
    })
}

fn delete_unknown_key(h: &TestHelpers) -> TestFuture<'_> {
    Box::pin(async move {
        let result = h.adapter.delete_non_primary_key("email:ghost@example.com").await;
        expect_code(result, ErrorCode::AuthInvalidKeyId)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suites_are_populated() {
        let suites = all_suites();
        let names: Vec<&str> = suites.iter().map(|s| s.config.name.as_str()).collect();
        assert_eq!(names, ["users", "sessions", "keys"]);
        assert!(suites.iter().all(|s| s.test_count() > 0 && s.config.reset_before_each));
    }

    #[test]
    fn test_mentions_prefix() {
        assert!(mentions_prefix(&json!({"a": ["x", "user:1"]}), "user:"));
        assert!(!mentions_prefix(&json!({"id": "1", "n": 2}), "user:"));
    }
}
