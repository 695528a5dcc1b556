// Test adapter runner — drives conformance suites against one adapter.
//
// The `TestAdapter` orchestrates a run:
// 1. Clears the fixture database before each test (when the suite asks)
// 2. Executes each test suite in order
// 3. Stops at the first failing test
// 4. Reports aggregate statistics

use std::sync::Arc;
use std::time::Instant;

use lucia_core::Adapter;

use crate::database::Database;
use crate::test_suite::{TestHelpers, TestLogger, TestResult, TestSuite, TestSuiteStats};

/// Configuration for the test adapter runner.
pub struct TestAdapterConfig {
    /// Display name for the adapter being tested.
    pub adapter_display_name: String,
    /// The adapter under test.
    pub adapter: Arc<dyn Adapter>,
    /// Fixture access to the same backend the adapter writes to.
    pub db: Arc<dyn Database>,
    /// Test suites to run.
    pub test_suites: Vec<TestSuite>,
    /// Prefix to add to test suite names.
    pub prefix_tests: Option<String>,
}

/// The test adapter runner.
pub struct TestAdapter {
    config: TestAdapterConfig,
    log: TestLogger,
    all_stats: Vec<TestSuiteStats>,
}

impl TestAdapter {
    pub fn new(config: TestAdapterConfig) -> Self {
        let log = TestLogger::new(&config.adapter_display_name);
        Self {
            config,
            log,
            all_stats: Vec::new(),
        }
    }

    /// Run all test suites, returning the first failure.
    pub async fn execute(&mut self) -> TestResult {
        self.log.info("Starting test adapter execution");

        let helpers = TestHelpers {
            adapter: Arc::clone(&self.config.adapter),
            db: Arc::clone(&self.config.db),
            log: TestLogger::new(&self.config.adapter_display_name),
        };

        for suite in &mut self.config.test_suites {
            let suite_name = match &self.config.prefix_tests {
                Some(prefix) => format!("{} > {}", prefix, suite.config.name),
                None => suite.config.name.clone(),
            };

            self.log.info(&format!("Running suite: {}", suite_name));
            suite.stats.suite_start_time = Instant::now();

            for test in &suite.tests {
                if suite.config.reset_before_each {
                    let reset_start = Instant::now();
                    helpers.db.clear_all().await?;
                    suite.stats.reset_count += 1;
                    suite.stats.total_reset_time_ms += reset_start.elapsed().as_secs_f64() * 1000.0;
                }

                self.log.debug(&format!("  Running test: {}", test.name));

                match (test.test_fn)(&helpers).await {
                    Ok(()) => {
                        self.log.success(&format!("{} > {}", suite_name, test.name));
                    }
                    Err(e) => {
                        self.log
                            .error(&format!("✗ {} > {}: {}", suite_name, test.name, e));
                        return Err(format!("{} > {}: {}", suite_name, test.name, e).into());
                    }
                }
            }

            suite.finalize_stats();
            self.all_stats.push(suite.stats.clone());
        }

        let cleanup_start = Instant::now();
        helpers.db.clear_all().await?;
        self.log.success(&format!(
            "CLEAN-UP completed successfully ({:.3}ms)",
            cleanup_start.elapsed().as_secs_f64() * 1000.0
        ));

        self.print_aggregate_stats();
        Ok(())
    }

    /// Print aggregate statistics across all suites.
    fn print_aggregate_stats(&self) {
        if self.all_stats.is_empty() {
            return;
        }

        let total_tests: usize = self.all_stats.iter().map(|s| s.test_count).sum();
        let total_resets: usize = self.all_stats.iter().map(|s| s.reset_count).sum();
        let total_reset_ms: f64 = self.all_stats.iter().map(|s| s.total_reset_time_ms).sum();
        let total_ms: f64 = self.all_stats.iter().map(|s| s.suite_duration_ms).sum();

        let dash = "─".repeat(80);
        println!("\n{dash}");
        println!("ADAPTER CONFORMANCE: {}", self.config.adapter_display_name);
        println!("{dash}");
        for stats in &self.all_stats {
            println!(
                "  {:<12} {:>3} tests  {:>9.2}ms",
                stats.suite_name, stats.test_count, stats.suite_duration_ms
            );
        }
        println!("  Total Tests: {}", total_tests);
        println!("  Total Resets: {} ({:.2}ms)", total_resets, total_reset_ms);
        println!("  Total Duration: {:.2}ms", total_ms);
        println!("{dash}\n");
    }

    /// Statistics of the suites that completed.
    pub fn stats(&self) -> &[TestSuiteStats] {
        &self.all_stats
    }
}
