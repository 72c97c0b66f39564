use http_cache_buffer::logger::init_logger;
use http_cache_buffer::prelude::*;
use http_cache_buffer::Config;
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    init_logger();

    info!("Starting HTTP cache buffer server");

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let server = CacheServer::from_config(&config)?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e.into());
            }
        }
        _ = wait_for_shutdown() => {
            info!("Shutting down...");
        }
    }

    info!("Shutdown complete");
    Ok(())
}

async fn wait_for_shutdown() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal"),
        Err(e) => error!("Unable to listen for shutdown signal: {}", e),
    }
}
