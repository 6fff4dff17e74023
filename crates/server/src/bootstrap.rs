//! Startup checks and service account initialization.

use crate::proxy::ProxyMode;
use crate::state::AppState;
use anyhow::{Context, Result, bail};
use sharegate_core::config::AppConfig;

/// Reject configurations the server cannot run with.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if let Err(reason) = config.validate() {
        bail!("invalid configuration: {reason}");
    }
    if config.credentials.validity().is_none() {
        tracing::warn!("credentials.validity_days is 0, issued credentials never expire");
    }
    Ok(())
}

/// Make sure the service account can authenticate upstream before serving.
///
/// In hybrid mode the credential is loaded (or provisioned) and its grants are
/// brought in line with the current shares. Standalone mode provisions lazily.
pub async fn ensure_service_account(state: &AppState) -> Result<()> {
    let ProxyMode::Hybrid(upstream) = state.proxy.mode() else {
        tracing::debug!("Standalone mode, service account provisioned on demand");
        return Ok(());
    };

    let Some(manager) = &state.service_account else {
        bail!("hybrid mode requires secrets.passphrase for the service account");
    };

    manager
        .ensure_token()
        .await
        .context("failed to initialize service account credential")?;
    let granted = manager
        .sync_grants()
        .await
        .context("failed to sync service account grants")?;

    tracing::info!(
        upstream = %upstream.endpoint,
        shares = granted,
        "Service account ready"
    );
    Ok(())
}
