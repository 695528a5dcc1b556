// Test suite definition — a named batch of adapter conformance tests.
//
// A `TestSuite` groups related tests and tracks statistics (reset count, reset
// time, test count, duration). Suites can ask for the backing tables to be
// cleared before every test.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use lucia_core::{Adapter, AdapterError, ErrorCode, Key, Session, User, UserAttributes};

use crate::database::Database;

/// Outcome of a single test.
pub type TestResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub type TestFuture<'a> = Pin<Box<dyn Future<Output = TestResult> + Send + 'a>>;

/// A test body: borrows the helpers for the duration of the test.
pub type TestFn = Box<dyn for<'a> Fn(&'a TestHelpers) -> TestFuture<'a> + Send + Sync>;

/// Statistics for a completed test suite.
#[derive(Debug, Clone)]
pub struct TestSuiteStats {
    pub reset_count: usize,
    pub total_reset_time_ms: f64,
    pub test_count: usize,
    pub suite_start_time: Instant,
    pub suite_duration_ms: f64,
    pub suite_name: String,
}

/// Configuration for a test suite.
#[derive(Debug, Clone)]
pub struct TestSuiteConfig {
    /// Name of the test suite.
    pub name: String,
    /// Clear users, sessions and keys before each test.
    pub reset_before_each: bool,
}

impl Default for TestSuiteConfig {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            reset_before_each: true,
        }
    }
}

/// A test case entry.
pub struct TestEntry {
    pub name: String,
    pub test_fn: TestFn,
}

impl TestEntry {
    pub fn new(
        name: &str,
        test_fn: impl for<'a> Fn(&'a TestHelpers) -> TestFuture<'a> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            test_fn: Box::new(test_fn),
        }
    }
}

/// What a test gets to work with.
pub struct TestHelpers {
    /// The adapter under test.
    pub adapter: Arc<dyn Adapter>,
    /// Direct access to the same backend.
    pub db: Arc<dyn Database>,
    pub log: TestLogger,
}

/// Test logger, prefixing every line with the adapter name.
#[derive(Debug, Clone)]
pub struct TestLogger {
    pub adapter_name: String,
}

impl TestLogger {
    pub fn new(adapter_name: &str) -> Self {
        Self {
            adapter_name: adapter_name.to_string(),
        }
    }

    pub fn info(&self, msg: &str) {
        tracing::info!("[{}] {}", self.adapter_name, msg);
    }

    pub fn success(&self, msg: &str) {
        tracing::info!("[{}] ✓ {}", self.adapter_name, msg);
    }

    pub fn error(&self, msg: &str) {
        tracing::error!("[{}] {}", self.adapter_name, msg);
    }

    pub fn debug(&self, msg: &str) {
        tracing::debug!("[{}] {}", self.adapter_name, msg);
    }
}

/// A test suite that groups related adapter tests.
pub struct TestSuite {
    pub config: TestSuiteConfig,
    pub tests: Vec<TestEntry>,
    pub stats: TestSuiteStats,
}

impl TestSuite {
    pub fn new(name: &str, reset_before_each: bool) -> Self {
        let config = TestSuiteConfig {
            name: name.to_string(),
            reset_before_each,
        };

        let stats = TestSuiteStats {
            reset_count: 0,
            total_reset_time_ms: 0.0,
            test_count: 0,
            suite_start_time: Instant::now(),
            suite_duration_ms: 0.0,
            suite_name: name.to_string(),
        };

        Self {
            config,
            tests: Vec::new(),
            stats,
        }
    }

    pub fn add_test(&mut self, entry: TestEntry) {
        self.tests.push(entry);
    }

    /// Builder form of [`TestSuite::add_test`].
    pub fn test(
        mut self,
        name: &str,
        test_fn: impl for<'a> Fn(&'a TestHelpers) -> TestFuture<'a> + Send + Sync + 'static,
    ) -> Self {
        self.add_test(TestEntry::new(name, test_fn));
        self
    }

    pub fn test_count(&self) -> usize {
        self.tests.len()
    }

    pub fn finalize_stats(&mut self) {
        self.stats.test_count = self.tests.len();
        self.stats.suite_duration_ms = self.stats.suite_start_time.elapsed().as_secs_f64() * 1000.0;
    }
}

// ─── Assertions ─────────────────────────────────────────────────────

/// Fail the test with `message` unless `condition` holds.
pub fn ensure(condition: bool, message: impl Into<String>) -> TestResult {
    if condition {
        Ok(())
    } else {
        Err(message.into().into())
    }
}

/// Fail unless `result` is an error carrying `code`.
pub fn expect_code<T: std::fmt::Debug>(result: Result<T, AdapterError>, code: ErrorCode) -> TestResult {
    match result {
        Err(err) if err.code() == Some(code) => Ok(()),
        Err(err) => Err(format!("expected {code}, got error: {err}").into()),
        Ok(value) => Err(format!("expected {code}, got Ok({value:?})").into()),
    }
}

// ─── Model generators ───────────────────────────────────────────────

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Generate a user with a random id and username.
pub fn generate_test_user() -> User {
    let id = uuid::Uuid::new_v4().to_string();
    let mut attributes = UserAttributes::new();
    attributes.insert(
        "username".to_string(),
        serde_json::Value::String(format!("user-{}", &id[..8])),
    );
    User::new(id, attributes)
}

/// Generate an active session for `user_id`.
///
/// Active for one day, idle-expiring after two.
pub fn generate_test_session(user_id: &str) -> Session {
    let now = chrono::Utc::now();
    Session::new(
        uuid::Uuid::new_v4().to_string(),
        user_id,
        (now + chrono::TimeDelta::days(1)).timestamp_millis(),
        (now + chrono::TimeDelta::days(2)).timestamp_millis(),
    )
}

/// Generate a password key (`email:<address>`) for `user_id`.
pub fn generate_test_key(user_id: &str, primary_key: bool) -> Key {
    Key::new(
        format!("email:user-{}@example.com", short_id()),
        user_id,
        Some(format!("s2:{}", short_id())),
        primary_key,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_test_user() {
        let user = generate_test_user();
        assert!(!user.id.is_empty());
        assert!(user.attribute("username").unwrap().is_string());
        assert_ne!(generate_test_user().id, user.id);
    }

    #[test]
    fn test_generate_test_session() {
        let session = generate_test_session("user-123");
        assert_eq!(session.user_id, "user-123");
        assert!(session.expires > chrono::Utc::now().timestamp_millis());
        assert!(session.idle_expires > session.expires);
    }

    #[test]
    fn test_generate_test_key() {
        let key = generate_test_key("user-456", true);
        assert!(key.id.starts_with("email:"));
        assert_eq!(key.user_id, "user-456");
        assert!(key.primary_key);
        assert!(key.hashed_password.is_some());
    }

    #[test]
    fn test_suite_creation() {
        let suite = TestSuite::new("test-suite", false);
        assert_eq!(suite.config.name, "test-suite");
        assert!(!suite.config.reset_before_each);
        assert_eq!(suite.test_count(), 0);
    }

    #[test]
    fn test_suite_stats() {
        let mut suite = TestSuite::new("stats-test", true);
        suite.finalize_stats();
        assert_eq!(suite.stats.test_count, 0);
        assert!(suite.stats.suite_duration_ms >= 0.0);
    }

    #[test]
    fn test_expect_code() {
        let err: Result<(), AdapterError> = Err(ErrorCode::AuthInvalidKeyId.into());
        assert!(expect_code(err, ErrorCode::AuthInvalidKeyId).is_ok());

        let err: Result<(), AdapterError> = Err(ErrorCode::AuthInvalidKeyId.into());
        assert!(expect_code(err, ErrorCode::AuthInvalidUserId).is_err());

        assert!(expect_code(Ok(1), ErrorCode::AuthInvalidUserId).is_err());
    }

    #[test]
    fn test_ensure() {
        assert!(ensure(true, "fine").is_ok());
        assert_eq!(ensure(false, "broken").unwrap_err().to_string(), "broken");
    }
}
