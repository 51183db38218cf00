//! # Tessera
//!
//! Opens the configured metadata store, applies pending migrations, checks
//! the connection and logs an inventory of the stored objects.
//!
//! Configuration comes from `./config/*.toml` and `TESSERA__*` environment
//! variables; see `tessera_config::ConfigLoader`.

use tessera_bootstrap::startup::{print_banner, print_inventory};
use tessera_bootstrap::App;
use tessera_config::{AppConfig, ConfigLoader};
use tessera_core::{init_telemetry, TesseraResult};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match load_config().await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = init_telemetry(&config.observability.telemetry()) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    print_banner();
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(config).await {
        error!("Application error: {}", e);
        std::process::exit(1);
    }
}

async fn load_config() -> TesseraResult<AppConfig> {
    let loader = ConfigLoader::from_default_location()?;
    Ok(loader.get().await)
}

async fn run(config: AppConfig) -> TesseraResult<()> {
    let database = config.database.clone();
    let app = App::start(config).await?;

    let inventory = app.inventory().await?;
    print_inventory(&database, &inventory);

    app.shutdown().await;
    Ok(())
}
