// Runs every conformance suite against the SurrealDB adapter.
//
// The embedded `mem://` engine runs by default. `test_conformance_live` runs
// the same suites against the server named in `.env`.

use std::sync::Arc;

use lucia_adapter_surrealdb::{
    surreal_adapter, Connection, DriverConnector, SurrealAdapterOptions, SurrealClient,
    SurrealConnector, SurrealDriver, Targets,
};
use lucia_test_utils::config::{DB_VAR, NS_VAR, PASS_VAR, URL_VAR, USER_VAR};
use lucia_test_utils::{all_suites, SurrealDatabase, TestAdapter, TestAdapterConfig, TestEnv};

fn mem_env() -> TestEnv {
    TestEnv::from_lookup(|key| {
        let value = match key {
            URL_VAR => "mem://",
            NS_VAR => "test",
            DB_VAR => "lucia",
            USER_VAR => "root",
            PASS_VAR => "root",
            _ => return None,
        };
        Some(value.to_string())
    })
    .unwrap()
}

async fn run_conformance(name: &str, connection: Connection, fixture: Arc<dyn SurrealClient>, targets: Targets) {
    lucia_core::env::init_logger();

    let adapter = surreal_adapter(
        connection,
        SurrealAdapterOptions::default()
            .with_targets(targets.clone())
            .with_debug_logs(true),
    )
    .unwrap();
    adapter.create_schema().await.unwrap();

    let mut runner = TestAdapter::new(TestAdapterConfig {
        adapter_display_name: name.to_string(),
        adapter: Arc::new(adapter),
        db: Arc::new(SurrealDatabase::new(fixture, targets)),
        test_suites: all_suites(),
        prefix_tests: Some("surrealdb".to_string()),
    });

    if let Err(e) = runner.execute().await {
        panic!("conformance failed: {e}");
    }

    let stats = runner.stats();
    assert_eq!(stats.len(), 3);
    assert!(stats.iter().all(|s| s.reset_count == s.test_count));
}

/// Each `mem://` connection is its own datastore, so the adapter and the
/// fixture share one client.
async fn run_on_mem(name: &str, targets: Targets) {
    let env = mem_env();
    let credentials = env.connection_options().require().unwrap();
    let client: Arc<dyn SurrealClient> =
        Arc::new(SurrealDriver::connect(&env.url, &credentials).await.unwrap());

    run_conformance(name, Connection::client(client.clone()), client, targets).await;
}

#[tokio::test]
async fn test_conformance_default_tables() {
    run_on_mem("SurrealDB (mem)", Targets::default()).await;
}

#[tokio::test]
async fn test_conformance_custom_tables() {
    let targets = Targets {
        user: "auth_user".to_string(),
        session: "auth_session".to_string(),
        key: "auth_key".to_string(),
    };
    run_on_mem("SurrealDB (mem, custom tables)", targets).await;
}

#[tokio::test]
#[ignore = "needs a SurrealDB server configured in .env"]
async fn test_conformance_live() {
    let env = TestEnv::from_env().unwrap();
    let credentials = env.connection_options().require().unwrap();
    let connector = Arc::new(DriverConnector);
    let fixture = connector.connect(&env.url, &credentials).await.unwrap();

    run_conformance("SurrealDB", env.connection(connector), fixture, Targets::default()).await;
}
