// Identifier codec — bare auth ids <-> SurrealDB record ids (`table:id`).
//
// Ids are not escaped: an id that itself contains a colon is stored as-is after
// the table prefix, and `decode` only ever strips the exact `table:` prefix.
// Key ids (`provider:provider-key`) are therefore kept in a field, never used
// as record ids.

/// Build the composite record id for a bare id.
pub fn encode(table: &str, id: &str) -> String {
    format!("{table}:{id}")
}

/// Strip the `table:` prefix if present. Decoding a bare id is a no-op.
pub fn decode(table: &str, thing: &str) -> String {
    thing
        .strip_prefix(table)
        .and_then(|rest| rest.strip_prefix(':'))
        .unwrap_or(thing)
        .to_string()
}

/// Split a target into its table and optional record id, on the first colon.
pub fn split(target: &str) -> (&str, Option<&str>) {
    match target.split_once(':') {
        Some((table, id)) => (table, Some(id)),
        None => (target, None),
    }
}

/// Decode the `id` field of a record object in place.
pub fn decode_record_id(table: &str, record: &mut serde_json::Value) {
    let Some(obj) = record.as_object_mut() else {
        return;
    };
    let bare = match obj.get("id") {
        Some(serde_json::Value::String(id)) => decode(table, id),
        _ => return,
    };
    obj.insert("id".to_string(), serde_json::Value::String(bare));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode() {
        assert_eq!(encode("user", "abc123"), "user:abc123");
        assert_eq!(encode("session", ""), "session:");
    }

    #[test]
    fn test_decode_round_trip() {
        for id in ["abc123", "", "user", "a:b", "user:nested", "émoji-✓"] {
            assert_eq!(decode("user", &encode("user", id)), id);
        }
    }

    #[test]
    fn test_decode_is_idempotent() {
        for input in ["user:abc", "abc", "session:abc", "user:a:b", "useruser"] {
            let once = decode("user", input);
            assert_eq!(decode("user", &once), once, "input {input}");
        }
    }

    #[test]
    fn test_decode_other_table_untouched() {
        assert_eq!(decode("user", "session:abc"), "session:abc");
        assert_eq!(decode("user", "users:abc"), "users:abc");
        assert_eq!(decode("user", "userabc"), "userabc");
    }

    #[test]
    fn test_decode_strips_only_one_prefix() {
        // An id that starts with its own table prefix is not idempotent under
        // decode; this is the accepted cost of not escaping ids.
        assert_eq!(decode("user", "user:user:x"), "user:x");
    }

    #[test]
    fn test_split() {
        assert_eq!(split("user"), ("user", None));
        assert_eq!(split("user:u1"), ("user", Some("u1")));
        assert_eq!(split("key:github:alice"), ("key", Some("github:alice")));
    }

    #[test]
    fn test_decode_record_id() {
        let mut record = json!({"id": "user:u1", "name": "Alice"});
        decode_record_id("user", &mut record);
        assert_eq!(record["id"], "u1");
        assert_eq!(record["name"], "Alice");

        let mut no_id = json!({"name": "Bob"});
        decode_record_id("user", &mut no_id);
        assert!(no_id.get("id").is_none());
    }
}
