//! Lifecycle demo binary
//!
//! Starts three interdependent components and prints the order they opened in.
//! Set `ORGANA_WAIT_TIMEOUT_MS` to change the `waitFor` timeout.

use lifecycle_demo::run_dashboard;
use organa_runtime::{Runtime, RuntimeConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lifecycle_demo=info,organa_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== Lifecycle Demo: components waiting on each other ===\n");

    let config = RuntimeConfig::from_env();
    println!("waitFor timeout: {:?}", config.wait_timeout());

    let runtime = Runtime::new(config);
    let opened = run_dashboard(&runtime).await?;

    println!("\nOpened in order:");
    for (position, name) in opened.iter().enumerate() {
        println!("  {}. {name}", position + 1);
    }

    runtime.shutdown();
    Ok(())
}
