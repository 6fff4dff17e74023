//! Application state shared across handlers.

use crate::credentials::CredentialAuthority;
use crate::grants::GrantLedger;
use crate::proxy::{ProtocolProxy, ProxyMode, ProxyResult};
use crate::reader::TableReader;
use crate::service_account::ServiceAccountManager;
use sharegate_core::config::AppConfig;
use sharegate_crypto::SecretCipher;
use sharegate_metadata::MetadataStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Metadata store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Recipient credential issuance and validation.
    pub credentials: Arc<CredentialAuthority>,
    /// Recipient-to-share grants.
    pub grants: Arc<GrantLedger>,
    /// Service account, present when a secrets passphrase is configured.
    pub service_account: Option<Arc<ServiceAccountManager>>,
    /// Data-access requests in the configured mode.
    pub proxy: Arc<ProtocolProxy>,
}

impl AppState {
    /// Wire the components together.
    ///
    /// Fails when the proxy configuration is unusable, e.g. hybrid mode
    /// without a passphrase to keep the service account credential.
    pub fn new(
        config: AppConfig,
        metadata: Arc<dyn MetadataStore>,
        reader: Arc<dyn TableReader>,
    ) -> ProxyResult<Self> {
        let credentials = Arc::new(CredentialAuthority::new(
            metadata.clone(),
            config.secrets.hash_cost,
            config.credentials.validity(),
            config.server.public_endpoint.clone(),
        ));
        let grants = Arc::new(GrantLedger::new(metadata.clone()));

        let service_account = config.secrets.passphrase.as_deref().map(|passphrase| {
            Arc::new(ServiceAccountManager::new(
                metadata.clone(),
                credentials.clone(),
                SecretCipher::new(passphrase),
            ))
        });

        let mode = ProxyMode::from_config(&config.proxy)?;
        tracing::info!(mode = mode.name(), "Configured protocol proxy");
        let proxy = Arc::new(ProtocolProxy::new(
            mode,
            metadata.clone(),
            reader,
            service_account.clone(),
        )?);

        Ok(Self {
            config: Arc::new(config),
            metadata,
            credentials,
            grants,
            service_account,
            proxy,
        })
    }
}
