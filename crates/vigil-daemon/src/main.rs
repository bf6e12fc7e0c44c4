mod config;

use anyhow::anyhow;
use tracing::info;

use vigil_engine::{Engine, resolve_channels};
use vigil_source::{GatewaySource, ProxyEntry, SourceConfig, SourceError};
use vigil_store::Store;

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vigil=info".into()),
        )
        .init();

    let cfg = Config::from_env()?;

    let names = config::load_channel_names(&cfg.channel_file)?;
    info!(?names, "configured channels");

    let store = Store::open(&cfg.db_path)?;

    let source = GatewaySource::connect(&SourceConfig {
        base_url: cfg.gateway_url.clone(),
        token: cfg.gateway_token.clone(),
        proxy: ProxyEntry::choose(&cfg.proxies).cloned(),
    })
    .await
    .map_err(|e| match e {
        SourceError::NotAuthorized => anyhow!(
            "the gateway rejected the configured credential; \
             obtain a fresh token and set VIGIL_GATEWAY_TOKEN"
        ),
        e => e.into(),
    })?;

    let channels = resolve_channels(&source, &names).await?;
    let engine = Engine::new(source, store, channels, cfg.engine)?;

    // In-flight store dispatches finish during runtime teardown.
    tokio::select! {
        res = engine.run() => res,
        _ = tokio::signal::ctrl_c() => {
            info!("shutting down");
            Ok(())
        }
    }
}
