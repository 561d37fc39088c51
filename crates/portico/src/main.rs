//! The `portico` binary: configuration, logging, store, serve.

use anyhow::Context;
use portico::config::ConfigLoader;
use portico::server::ShutdownSignal;
use portico::store::MemoryCatalog;

const CONFIG_FILE: &str = "portico.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::new()
        .with_defaults()
        .with_optional_file(CONFIG_FILE)?
        .with_dotenv()
        .with_env_prefix("PORTICO")
        .load()
        .context("invalid configuration")?;

    portico::telemetry::init_telemetry(&config.to_log_config(), &config.to_metrics_config())
        .context("failed to initialise telemetry")?;
    tracing::info!(?config, "configuration loaded");

    let catalog = MemoryCatalog::new();
    let store = match portico::connect_store(&catalog, &config.store).await {
        Ok(store) => store,
        Err(error) => {
            tracing::error!(%error, url = %config.store.url, "could not acquire the store, exiting");
            std::process::exit(1);
        }
    };

    let gateway = portico::assemble(&config, store)
        .await
        .context("failed to start the gateway")?;
    let shutdown = ShutdownSignal::with_os_signals().context("failed to install signal handlers")?;

    gateway.serve(shutdown).await?;
    tracing::info!("portico stopped");
    Ok(())
}
