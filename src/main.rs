//! # Channel Router
//!
//! Loads a channel snapshot, keeps the routing index in sync with it, and
//! either answers a single pick from the command line or runs until Ctrl-C.

use channel_router::{ChannelCache, Config, JsonFileChannelStore};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse configuration from CLI args and .env file
    let config = Config::parse_args();

    let store = Arc::new(JsonFileChannelStore::new(&config.store_path));
    let cache = Arc::new(ChannelCache::from_config(&config, store));

    info!("🚀 Channel router starting");
    info!("Channel store: {}", config.store_path);
    info!("Memory cache: {}", if cache.is_enabled() { "enabled" } else { "disabled" });

    cache.rebuild().await?;

    if let Some((group, model, retry)) = config.pick_request() {
        match cache.pick_channel(group, model, retry).await? {
            Some(channel) => println!("{}", serde_json::to_string_pretty(channel.as_ref())?),
            None => {
                warn!("No channel serves group '{}' model '{}'", group, model);
                std::process::exit(2);
            }
        }
        return Ok(());
    }

    let sync_task = cache.spawn_sync_task(config.sync_interval());
    info!("Syncing channels every {} seconds, press Ctrl-C to stop", config.sync_frequency);

    tokio::signal::ctrl_c().await?;
    info!("📡 Received SIGINT (Ctrl+C), stopping channel sync");
    sync_task.abort();

    let stats = cache.stats().await;
    info!("✅ Stopped after {} generations", stats.generation);
    Ok(())
}
