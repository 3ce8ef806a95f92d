use anyhow::{Context, Result};
use dotenvy::dotenv;
use stakeprobe_core::{load_provider, read, setup_info_logger, Engine, FileKeystoreManager};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

mod tests;

use tests::registry::ScenarioRegistry;
use tests::test_case::TestCase;
use tests::test_runner::TestRunner;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    setup_info_logger();

    let config_path = PathBuf::from(
        std::env::var("STAKEPROBE_CONFIG").unwrap_or_else(|_| "stakeprobe.yaml".to_string()),
    );
    let config = Arc::new(
        read(&config_path, false)
            .with_context(|| format!("Failed to load {}", config_path.display()))?,
    );

    // Check for test filter
    let test_filter = std::env::var("STAKEPROBE_TEST_FILTER").ok();

    if let Some(filter) = &test_filter {
        info!("Running single test case: {}", filter);
    } else {
        info!("Running all E2E test cases on {}...", config.network.name);
    }

    let provider = load_provider(&config.network).await?;
    let keystore = FileKeystoreManager::new(config.keystore.directory.clone())?;
    let engine = Engine::new(config.clone(), Arc::new(provider), Arc::new(keystore)).await?;

    let registry = ScenarioRegistry::get_all_scenarios()?;
    for scenario in registry.missing() {
        warn!("Scenario {} has no handler, cases using it will be dismissed", scenario);
    }
    let runner = TestRunner::new(engine, registry);
    let mut cases = runner.load_suite(TestCase::catalogue());

    let test_suite = if let Some(filter) = test_filter {
        runner.run_filtered_test(&mut cases, &filter).await
    } else {
        runner.run_all_tests(&mut cases).await
    };

    // Exit with appropriate code based on test results
    if test_suite.has_failures() {
        std::process::exit(1);
    }

    Ok(())
}
