mod server;

use anyhow::Result;
use tracing::info;

use danmutv_core::{bootstrap::load_config, logging};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load and validate configuration
    let config = load_config()?;

    // 2. Initialize logging
    logging::init_logging(&config.logging)?;
    info!("DanmuTV starting...");
    info!("HTTP address: {}", config.http_address());

    // 3. Run the server until shutdown
    server::run(config).await
}
