/// Tenantflow: multi-tenant automation core
///
/// Development entry point. Boots the system from environment
/// configuration, leaves the schedule service running and tears everything
/// down on Ctrl-C. The HTTP layer consuming this core lives elsewhere.

use tenantflow::{config::Config, loader};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    loader::init_tracing();

    let config = Config::from_env();
    let system = loader::boot(config).await?;

    tracing::info!(
        "🚀 automation core running ({} tools, {} agents, {} executors)",
        system.tools.len(),
        system.agents.len(),
        system.executors.len()
    );

    tokio::signal::ctrl_c().await?;
    system.shutdown().await;

    Ok(())
}
