//! Sharegate server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use sharegate_core::config::AppConfig;
use sharegate_server::bootstrap::{ensure_service_account, validate_config};
use sharegate_server::reader::DeltaLogReader;
use sharegate_server::{AppState, create_router};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sharegate - Delta Sharing credential authority and protocol proxy
#[derive(Parser, Debug)]
#[command(name = "sharegated")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "SHAREGATE_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

/// Load configuration from the optional file, overridden by `SHAREGATE_` env vars.
fn load_config(path: &str) -> Result<AppConfig> {
    let config_path = std::path::Path::new(path);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %path, "Loading configuration from file");
        figment = figment.merge(Toml::file(path));
    } else {
        tracing::debug!("No config file found at {}", path);
    }

    // SHAREGATE_CONFIG only carries the path
    let has_env_config = std::env::vars()
        .any(|(key, _)| key.starts_with("SHAREGATE_") && key != "SHAREGATE_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: sharegated --config /path/to/config.toml\n  \
             2. Environment variables: SHAREGATE_SERVER__BIND=0.0.0.0:8080 \
             SHAREGATE_ADMIN__TOKEN_HASH=YOUR_TOKEN_HASH_HERE sharegated\n\n\
             See config/server.example.toml for example configuration.\n\
             Set SHAREGATE_CONFIG env var to specify a default config file path."
        );
    }

    if !has_config_file {
        tracing::info!("Using environment variables for configuration");
    }

    figment
        .merge(Env::prefixed("SHAREGATE_").split("__"))
        .extract()
        .context("failed to load configuration")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("sharegate v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(&args.config)?;
    validate_config(&config)?;

    sharegate_server::metrics::register_metrics();
    tracing::info!("Prometheus metrics registered");

    let metadata = sharegate_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    metadata
        .health_check()
        .await
        .context("metadata store health check failed")?;
    tracing::info!("Metadata store initialized");

    let addr: SocketAddr = config.server.bind.parse().context("invalid bind address")?;

    let state = AppState::new(config, metadata, Arc::new(DeltaLogReader::new()))
        .context("failed to initialize application state")?;
    ensure_service_account(&state).await?;

    let app = create_router(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind to {}", addr))?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_config_from_file() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("server.toml");
        std::fs::write(
            &path,
            r#"
[server]
bind = "0.0.0.0:9090"

[admin]
token_hash = "17d6bfe05d1b1fb7bc499f8e3f639c7b3eda4c40f321eef8887a0c04c89a99c5"

[proxy]
mode = "hybrid"
endpoint = "https://upstream.example.com/delta-sharing"

[secrets]
passphrase = "correct horse battery"
"#,
        )
        .unwrap();

        let config = load_config(path.to_str().unwrap()).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:9090");
        assert!(config.proxy.is_hybrid());
        validate_config(&config).unwrap();
    }
}
