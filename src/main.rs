use anyhow::{Context, Result};
use listing_sync::cache::load_seed_cache;
use listing_sync::config::{Config, RunMode};
use listing_sync::engine::SessionRunner;
use listing_sync::probe;
use listing_sync::remote::{EventSink, HttpRemoteStore, NullEventSink, WsEventSink};
use listing_sync::scrapers::{ChromeRenderEngine, ZonapropExtractor};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("🏠 Listing Sync - crawl and reconcile");
    info!("=====================================");

    let config = Config::from_env()?;

    let port = config.port;
    tokio::spawn(async move {
        if let Err(e) = probe::serve(port).await {
            error!("Liveness probe failed: {:#}", e);
        }
    });

    let events: Arc<dyn EventSink> = match config.events_url.clone() {
        Some(url) => {
            let (sink, _driver) = WsEventSink::connect(url, config.reconnect);
            Arc::new(sink)
        }
        None => {
            info!("EVENTS_URL not set, live events disabled");
            Arc::new(NullEventSink)
        }
    };

    let store = HttpRemoteStore::new(&config.api_base_url, config.api_timeout)
        .context("Failed to create HTTP client")?;
    let engine = ChromeRenderEngine::launch(config.headless)?;

    let mut runner = SessionRunner::new(
        Arc::new(engine),
        Arc::new(ZonapropExtractor),
        Arc::new(store),
        events,
        config.crawler.clone(),
    )
    .context("Invalid SITE_BASE_URL")?;

    if let Some(path) = &config.seed_cache_path {
        runner = runner.with_seed(load_seed_cache(path).await);
    }

    loop {
        let result = runner.run_one_session().await;

        info!("");
        info!("Session summary:");
        info!("  Listings added:    {}", result.added);
        info!("  Listings removed:  {}", result.removed);
        info!("  Listings existing: {}", result.existing);
        info!("  Stop reason:       {}", result.termination);

        let summary = serde_json::to_string(&result)?;
        info!("{}", summary);

        if config.run_mode == RunMode::Once {
            return Ok(());
        }

        let pause = config.cooldown.draw();
        info!("Cooling down for {} minutes", pause.as_secs() / 60);
        tokio::time::sleep(pause).await;

        if config.run_mode == RunMode::Exit {
            // The supervisor relaunches the process for the next session.
            info!("Cooldown over, exiting for relaunch");
            std::process::exit(0);
        }
    }
}
