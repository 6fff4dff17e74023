//! Internal service account used to authenticate against the upstream server.
//!
//! The service account is a system recipient holding a full grant on every
//! share. Its plaintext secret is stored encrypted under the configured
//! passphrase and cached in memory once loaded.

use crate::credentials::{CredentialAuthority, CredentialError};
use crate::metrics;
use sharegate_core::{GrantOptions, Patch, RecipientId};
use sharegate_crypto::{CryptoError, SecretCipher};
use sharegate_metadata::models::{RecipientRow, SERVICE_ACCOUNT_KEY, ServiceAccountRow};
use sharegate_metadata::{MetadataError, MetadataStore};
use std::future::Future;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

/// Reserved name of the system recipient.
pub const SYSTEM_RECIPIENT_NAME: &str = "__system__";

const SYSTEM_GRANTOR: &str = "system";

/// Service account errors.
#[derive(Debug, thiserror::Error)]
pub enum ServiceAccountError {
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// A regular recipient already holds the reserved name.
    #[error("recipient name '{0}' is taken by a non-system recipient")]
    NameConflict(String),
}

pub type ServiceAccountResult<T> = std::result::Result<T, ServiceAccountError>;

/// Single-flight cache for one secret value.
///
/// Reads take the `RwLock` fast path. Loads are serialized by the mutex so
/// concurrent misses trigger exactly one load.
#[derive(Default)]
pub struct CredentialCache {
    value: RwLock<Option<String>>,
    load: Mutex<()>,
}

impl CredentialCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Option<String> {
        self.value.read().await.clone()
    }

    /// Return the cached value or run `load` once to fill it.
    pub async fn get_or_load<F, Fut, E>(&self, load: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        if let Some(value) = self.get().await {
            return Ok(value);
        }

        let _guard = self.load.lock().await;
        // another caller may have filled it while we waited
        if let Some(value) = self.get().await {
            return Ok(value);
        }

        let value = load().await?;
        *self.value.write().await = Some(value.clone());
        Ok(value)
    }

    /// Drop the cached value and load a replacement under the load lock.
    pub async fn refresh<F, Fut, E>(&self, load: F) -> Result<String, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        let _guard = self.load.lock().await;
        self.invalidate().await;
        let value = load().await?;
        *self.value.write().await = Some(value.clone());
        Ok(value)
    }

    pub async fn invalidate(&self) {
        *self.value.write().await = None;
    }
}

impl std::fmt::Debug for CredentialCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialCache([REDACTED])")
    }
}

/// Provisions, caches and rotates the service account credential.
pub struct ServiceAccountManager {
    metadata: Arc<dyn MetadataStore>,
    credentials: Arc<CredentialAuthority>,
    cipher: SecretCipher,
    cache: CredentialCache,
}

impl ServiceAccountManager {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        credentials: Arc<CredentialAuthority>,
        cipher: SecretCipher,
    ) -> Self {
        Self {
            metadata,
            credentials,
            cipher,
            cache: CredentialCache::new(),
        }
    }

    /// The plaintext service account secret, provisioning one if needed.
    pub async fn ensure_token(&self) -> ServiceAccountResult<String> {
        self.cache.get_or_load(|| self.load_or_provision()).await
    }

    /// Forget the cached secret; the next call reloads it from the store.
    pub async fn invalidate_cache(&self) {
        self.cache.invalidate().await;
        tracing::debug!("Service account cache invalidated");
    }

    /// Issue a new service account secret and make it the cached one.
    pub async fn rotate(&self) -> ServiceAccountResult<()> {
        self.cache
            .refresh(|| async {
                let recipient_id = self.system_recipient().await?;
                let issued = self.credentials.rotate(recipient_id).await?;
                self.grant_all_shares(recipient_id).await?;
                self.persist(recipient_id, &issued.secret).await?;
                tracing::info!(recipient_id = %recipient_id, "Rotated service account credential");
                Ok::<_, ServiceAccountError>(issued.secret)
            })
            .await
            .map(|_| ())
    }

    /// Give the system recipient a full grant on every share.
    ///
    /// Returns the number of shares granted. A no-op before the account is
    /// provisioned.
    pub async fn sync_grants(&self) -> ServiceAccountResult<u64> {
        let Some(recipient) = self
            .metadata
            .get_recipient_by_name(SYSTEM_RECIPIENT_NAME)
            .await?
            .filter(|row| row.is_system)
        else {
            tracing::debug!("Service account not provisioned, skipping grant sync");
            return Ok(0);
        };
        self.grant_all_shares(RecipientId::from(recipient.recipient_id))
            .await
    }

    async fn load_or_provision(&self) -> ServiceAccountResult<String> {
        if let Some(secret) = self.load_stored().await? {
            return Ok(secret);
        }
        self.provision().await
    }

    /// Load and check the stored credential. `None` means it must be reprovisioned.
    async fn load_stored(&self) -> ServiceAccountResult<Option<String>> {
        let Some(row) = self.metadata.get_service_account().await? else {
            tracing::info!("No service account credential stored");
            return Ok(None);
        };

        let secret = match self.cipher.decrypt(&row.ciphertext) {
            Ok(secret) => secret,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "Stored service account credential cannot be decrypted, reprovisioning"
                );
                return Ok(None);
            }
        };

        if self.metadata.get_recipient(row.recipient_id).await?.is_none() {
            tracing::warn!(
                recipient_id = %row.recipient_id,
                "Service account recipient no longer exists, reprovisioning"
            );
            return Ok(None);
        }

        let now = OffsetDateTime::now_utc();
        let has_usable_token = self
            .metadata
            .list_tokens_for_recipient(row.recipient_id)
            .await?
            .iter()
            .any(|token| token.is_usable(now));
        if !has_usable_token {
            tracing::warn!(
                recipient_id = %row.recipient_id,
                "Service account has no usable token, reprovisioning"
            );
            return Ok(None);
        }

        match self.credentials.validate(&secret).await? {
            Some(validated) if *validated.recipient_id.as_uuid() == row.recipient_id => {
                Ok(Some(secret))
            }
            _ => {
                tracing::warn!(
                    recipient_id = %row.recipient_id,
                    "Stored service account secret does not validate, reprovisioning"
                );
                Ok(None)
            }
        }
    }

    async fn provision(&self) -> ServiceAccountResult<String> {
        let recipient_id = self.system_recipient().await?;
        let issued = self.credentials.rotate(recipient_id).await?;
        let shares = self.grant_all_shares(recipient_id).await?;
        self.persist(recipient_id, &issued.secret).await?;

        metrics::SERVICE_ACCOUNT_PROVISIONS.inc();
        tracing::info!(
            recipient_id = %recipient_id,
            shares,
            "Provisioned service account credential"
        );
        Ok(issued.secret)
    }

    /// Find or create the system recipient.
    async fn system_recipient(&self) -> ServiceAccountResult<RecipientId> {
        if let Some(row) = self
            .metadata
            .get_recipient_by_name(SYSTEM_RECIPIENT_NAME)
            .await?
        {
            if !row.is_system {
                return Err(ServiceAccountError::NameConflict(row.name));
            }
            return Ok(RecipientId::from(row.recipient_id));
        }

        let row = RecipientRow {
            recipient_id: Uuid::new_v4(),
            name: SYSTEM_RECIPIENT_NAME.to_string(),
            description: Some("Internal service account".to_string()),
            is_system: true,
            created_at: OffsetDateTime::now_utc(),
        };
        self.metadata.create_recipient(&row).await?;
        tracing::info!(recipient_id = %row.recipient_id, "Created system recipient");
        Ok(RecipientId::from(row.recipient_id))
    }

    async fn grant_all_shares(&self, recipient_id: RecipientId) -> ServiceAccountResult<u64> {
        let options = GrantOptions {
            granted_by: Some(SYSTEM_GRANTOR.to_string()),
            expires_at: Patch::Clear,
            can_download: Some(true),
            can_query: Some(true),
            max_rows_per_query: Patch::Clear,
        };
        let now = OffsetDateTime::now_utc();
        let shares = self.metadata.list_shares().await?;
        for share in &shares {
            self.metadata
                .upsert_grant(*recipient_id.as_uuid(), share.share_id, &options, now)
                .await?;
        }
        tracing::debug!(recipient_id = %recipient_id, shares = shares.len(), "Synced service account grants");
        Ok(shares.len() as u64)
    }

    async fn persist(&self, recipient_id: RecipientId, secret: &str) -> ServiceAccountResult<()> {
        let row = ServiceAccountRow {
            account_key: SERVICE_ACCOUNT_KEY.to_string(),
            ciphertext: self.cipher.encrypt(secret)?,
            recipient_id: *recipient_id.as_uuid(),
            updated_at: OffsetDateTime::now_utc(),
        };
        self.metadata.put_service_account(&row).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_cache_loads_once() {
        let cache = CredentialCache::new();
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_load(|| async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, std::convert::Infallible>("secret".to_string())
                })
                .await
                .unwrap();
            assert_eq!(value, "secret");
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_single_flight_under_concurrency() {
        let cache = Arc::new(CredentialCache::new());
        let loads = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let loads = loads.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_load(|| async {
                        loads.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        Ok::<_, std::convert::Infallible>("secret".to_string())
                    })
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), "secret");
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_failed_load_is_not_cached() {
        let cache = CredentialCache::new();
        let err = cache
            .get_or_load(|| async { Err::<String, _>("boom") })
            .await
            .unwrap_err();
        assert_eq!(err, "boom");
        assert!(cache.get().await.is_none());
    }

    #[tokio::test]
    async fn test_cache_invalidate_and_refresh() {
        let cache = CredentialCache::new();
        cache
            .get_or_load(|| async { Ok::<_, ()>("one".to_string()) })
            .await
            .unwrap();
        cache.invalidate().await;
        assert!(cache.get().await.is_none());

        let value = cache
            .refresh(|| async { Ok::<_, ()>("two".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, "two");
        assert_eq!(cache.get().await.as_deref(), Some("two"));
    }

    #[test]
    fn test_cache_debug_redacts() {
        assert_eq!(format!("{:?}", CredentialCache::new()), "CredentialCache([REDACTED])");
    }
}
