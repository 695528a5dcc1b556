// Query builder — SurrealQL statements for each adapter operation.
//
// Table names and caller values travel as bound variables (`type::table($tb)`,
// `type::thing($tb, $id)`, `$v0`...). Only identifiers are ever written into the
// statement text: field names in SET lists (backtick-quoted when not plain) and
// the validated table names in DEFINE INDEX.

use std::sync::LazyLock;

use regex::Regex;

use crate::client::Vars;
use crate::options::Targets;

/// Record link from a session or key to its owning user.
pub const USER_LINK_FIELD: &str = "user";
/// Unique field that holds a key's auth id.
pub const KEY_ID_FIELD: &str = "key_id";
/// Unique user field for the single default credential.
pub const PROVIDER_ID_FIELD: &str = "provider_id";

/// Projection that returns the bare id alongside every stored field.
const SELECT_DECODED: &str = "SELECT *, record::id(id) AS id";

static PLAIN_IDENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// A statement with its bound variables.
#[derive(Debug, Clone, PartialEq)]
pub struct SurrealQuery {
    pub sql: String,
    pub vars: Vars,
}

impl SurrealQuery {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            vars: Vars::new(),
        }
    }

    /// Bind `$name`.
    pub fn bind(mut self, name: &str, value: impl Into<serde_json::Value>) -> Self {
        self.vars.insert(name.to_string(), value.into());
        self
    }
}

/// Quote a field name for use as a SurrealQL identifier.
pub fn quote_ident(name: &str) -> String {
    if PLAIN_IDENT.is_match(name) {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

/// Name of the unique index on `table.field`.
pub fn unique_index_name(table: &str, field: &str) -> String {
    format!("{table}_{field}_unique")
}

/// Builds the statements for a fixed set of table names.
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    targets: Targets,
}

impl QueryBuilder {
    pub fn new(targets: Targets) -> Self {
        Self { targets }
    }

    pub fn targets(&self) -> &Targets {
        &self.targets
    }

    /// Point lookup by bare id.
    pub fn select_by_id(&self, table: &str, id: &str) -> SurrealQuery {
        SurrealQuery::new(format!("{SELECT_DECODED} FROM type::thing($tb, $id)"))
            .bind("tb", table)
            .bind("id", id)
    }

    /// All records of `table` owned by `user_id`.
    pub fn select_by_user_id(&self, table: &str, user_id: &str) -> SurrealQuery {
        SurrealQuery::new(format!(
            "{SELECT_DECODED} FROM type::table($tb) WHERE user_id = $user_id"
        ))
        .bind("tb", table)
        .bind("user_id", user_id)
    }

    /// Key lookup by its auth id.
    pub fn select_key(&self, key_id: &str) -> SurrealQuery {
        SurrealQuery::new(format!(
            "{SELECT_DECODED} FROM type::table($tb) WHERE {KEY_ID_FIELD} = $key_id"
        ))
        .bind("tb", self.targets.key.as_str())
        .bind("key_id", key_id)
    }

    /// Session lookup that also fetches the linked user into `user`.
    pub fn select_session_with_user(&self, session_id: &str) -> SurrealQuery {
        SurrealQuery::new(format!(
            "{SELECT_DECODED}, {USER_LINK_FIELD}.* AS {USER_LINK_FIELD} FROM type::thing($tb, $id)"
        ))
        .bind("tb", self.targets.session.as_str())
        .bind("id", session_id)
    }

    /// Create a record in `table` linked to `user_id`.
    ///
    /// With `record_id` the record is created at `table:record_id` (and fails if
    /// it exists); without, SurrealDB generates the id. `id` and the link field
    /// itself are never taken from `fields`.
    pub fn create_linked(
        &self,
        table: &str,
        record_id: Option<&str>,
        fields: &serde_json::Map<String, serde_json::Value>,
        user_id: &str,
    ) -> SurrealQuery {
        let target = if record_id.is_some() {
            "type::thing($tb, $id)"
        } else {
            "type::table($tb)"
        };

        let mut query = SurrealQuery::new(String::new()).bind("tb", table);
        if let Some(id) = record_id {
            query = query.bind("id", id);
        }

        let mut assignments = Vec::with_capacity(fields.len() + 1);
        for (idx, (name, value)) in fields
            .iter()
            .filter(|(name, _)| name.as_str() != "id" && name.as_str() != USER_LINK_FIELD)
            .enumerate()
        {
            let var = format!("v{idx}");
            assignments.push(format!("{} = ${var}", quote_ident(name)));
            query = query.bind(&var, value.clone());
        }
        assignments.push(format!(
            "{USER_LINK_FIELD} = type::thing($user_tb, $user_id)"
        ));

        query.sql = format!("CREATE {target} SET {}", assignments.join(", "));
        query
            .bind("user_tb", self.targets.user.as_str())
            .bind("user_id", user_id)
    }

    /// Bulk delete of every record in `table` owned by `user_id`.
    pub fn delete_by_user_id(&self, table: &str, user_id: &str) -> SurrealQuery {
        SurrealQuery::new("DELETE FROM type::table($tb) WHERE user_id = $user_id")
            .bind("tb", table)
            .bind("user_id", user_id)
    }

    pub fn delete_non_primary_key(&self, key_id: &str) -> SurrealQuery {
        SurrealQuery::new(format!(
            "DELETE FROM type::table($tb) WHERE {KEY_ID_FIELD} = $key_id AND primary_key = false"
        ))
        .bind("tb", self.targets.key.as_str())
        .bind("key_id", key_id)
    }

    pub fn update_key_password(&self, key_id: &str, hashed_password: Option<&str>) -> SurrealQuery {
        SurrealQuery::new(format!(
            "UPDATE type::table($tb) SET hashed_password = $hashed_password WHERE {KEY_ID_FIELD} = $key_id"
        ))
        .bind("tb", self.targets.key.as_str())
        .bind("key_id", key_id)
        .bind("hashed_password", hashed_password)
    }

    /// Unique indexes the duplicate-error classification relies on.
    /// Table names must already be validated.
    pub fn define_unique_indexes(&self) -> SurrealQuery {
        let statements = [
            (self.targets.user.as_str(), PROVIDER_ID_FIELD),
            (self.targets.key.as_str(), KEY_ID_FIELD),
        ]
        .iter()
        .map(|(table, field)| {
            format!(
                "DEFINE INDEX IF NOT EXISTS {} ON TABLE {table} COLUMNS {field} UNIQUE;",
                unique_index_name(table, field)
            )
        })
        .collect::<Vec<_>>();

        SurrealQuery::new(statements.join("\n"))
    }
}
