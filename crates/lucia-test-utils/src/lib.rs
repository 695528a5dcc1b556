// lucia-test-utils — conformance testing for Lucia adapters.
//
// Provides adapter testing infrastructure:
// - `Database`, a fixture view of the backing store, and its SurrealDB version
// - `TestSuite` batches and the user / session / key suites
// - `TestAdapter` for running suites against any adapter
// - `TestEnv`, connection settings loaded from `.env`

pub mod config;
pub mod database;
pub mod suites;
pub mod test_adapter;
pub mod test_suite;

pub use config::TestEnv;
pub use database::{Database, SurrealDatabase};
pub use suites::{all_suites, key_suite, session_suite, user_suite};
pub use test_adapter::{TestAdapter, TestAdapterConfig};
pub use test_suite::{TestHelpers, TestResult, TestSuite, TestSuiteConfig, TestSuiteStats};
