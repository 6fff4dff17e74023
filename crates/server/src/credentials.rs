//! Credential authority: issues, rotates and validates recipient bearer tokens.
//!
//! Secrets are 256-bit random values. Only their bcrypt hash and an 8
//! character hint are persisted. Every write is followed by a re-read of the
//! stored row and a re-verification of the plaintext against it; a row that
//! does not verify is deactivated before the error is returned.

use crate::metrics;
use sharegate_core::{
    CredentialProfile, IssuedCredential, RecipientId, TokenId, ValidatedRecipient, token_hint,
};
use sharegate_crypto::{CryptoError, generate_token_secret, hash_secret, verify_secret};
use sharegate_metadata::models::RecipientTokenRow;
use sharegate_metadata::{MetadataError, MetadataStore};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Credential authority errors.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("recipient not found: {0}")]
    CredentialNotFound(RecipientId),

    /// `issue` on a recipient that still holds an active credential.
    #[error("recipient {0} already has an active credential; rotate it instead")]
    CredentialAlreadyIssued(RecipientId),

    /// The stored hash did not verify against the secret just written.
    #[error("credential integrity check failed for token {0}")]
    CredentialIntegrityError(TokenId),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

#[derive(Clone, Copy, Debug)]
enum IssueKind {
    Issue,
    Rotate,
}

impl IssueKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Issue => "issue",
            Self::Rotate => "rotate",
        }
    }
}

/// Issues and validates recipient credentials.
pub struct CredentialAuthority {
    metadata: Arc<dyn MetadataStore>,
    hash_cost: u32,
    validity: Option<Duration>,
    endpoint: String,
}

impl CredentialAuthority {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        hash_cost: u32,
        validity: Option<Duration>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            metadata,
            hash_cost,
            validity,
            endpoint: endpoint.into(),
        }
    }

    /// Issue the first credential of a recipient.
    ///
    /// Fails with `CredentialAlreadyIssued` while an active credential
    /// exists; use [`rotate`](Self::rotate) to replace it.
    pub async fn issue(&self, recipient_id: RecipientId) -> CredentialResult<IssuedCredential> {
        self.write_credential(recipient_id, IssueKind::Issue).await
    }

    /// Replace every credential of a recipient with a fresh one.
    ///
    /// Deactivation of the old rows and insertion of the new row happen in
    /// one transaction.
    pub async fn rotate(&self, recipient_id: RecipientId) -> CredentialResult<IssuedCredential> {
        self.write_credential(recipient_id, IssueKind::Rotate).await
    }

    async fn write_credential(
        &self,
        recipient_id: RecipientId,
        kind: IssueKind,
    ) -> CredentialResult<IssuedCredential> {
        if self
            .metadata
            .get_recipient(*recipient_id.as_uuid())
            .await?
            .is_none()
        {
            return Err(CredentialError::CredentialNotFound(recipient_id));
        }
        if matches!(kind, IssueKind::Issue)
            && self
                .metadata
                .list_tokens_for_recipient(*recipient_id.as_uuid())
                .await?
                .iter()
                .any(|t| t.active)
        {
            return Err(CredentialError::CredentialAlreadyIssued(recipient_id));
        }

        let secret = generate_token_secret();
        let token_hash = hash_secret(&secret, self.hash_cost).await?;
        let now = OffsetDateTime::now_utc();
        let token_id = TokenId::new();
        let hint = token_hint(&secret);

        let row = RecipientTokenRow {
            token_id: *token_id.as_uuid(),
            recipient_id: *recipient_id.as_uuid(),
            token_hash,
            token_hint: hint.clone(),
            created_at: now,
            expires_at: self.validity.map(|validity| now + validity),
            active: true,
            last_used_at: None,
        };

        match kind {
            IssueKind::Issue => self.metadata.create_token(&row).await?,
            IssueKind::Rotate => {
                let deactivated = self.metadata.rotate_token(&row).await?;
                tracing::info!(
                    recipient_id = %recipient_id,
                    deactivated,
                    "Rotated recipient credential"
                );
            }
        }

        self.verify_written(token_id, &secret).await?;

        metrics::CREDENTIALS_ISSUED
            .with_label_values(&[kind.as_str()])
            .inc();
        tracing::info!(
            recipient_id = %recipient_id,
            token_id = %token_id,
            hint = %hint,
            kind = kind.as_str(),
            "Issued recipient credential"
        );

        Ok(IssuedCredential {
            token_id,
            recipient_id,
            secret,
            hint,
            expires_at: row.expires_at,
        })
    }

    /// Re-read the stored row and check the plaintext against it.
    async fn verify_written(&self, token_id: TokenId, secret: &str) -> CredentialResult<()> {
        let verified = match self.metadata.get_token(*token_id.as_uuid()).await? {
            Some(stored) => stored.active && verify_secret(secret, &stored.token_hash).await?,
            None => false,
        };
        if verified {
            return Ok(());
        }

        metrics::CREDENTIAL_INTEGRITY_FAILURES.inc();
        tracing::error!(token_id = %token_id, "Stored credential failed re-verification");
        if let Err(e) = self.metadata.deactivate_token(*token_id.as_uuid()).await {
            tracing::error!(
                token_id = %token_id,
                error = %e,
                "Failed to deactivate unverifiable credential"
            );
        }
        Err(CredentialError::CredentialIntegrityError(token_id))
    }

    /// Resolve a presented secret to its recipient.
    ///
    /// Hint-matching candidates are tried first, then every other usable
    /// token. Returns `None` when nothing verifies.
    pub async fn validate(&self, secret: &str) -> CredentialResult<Option<ValidatedRecipient>> {
        if secret.is_empty() {
            metrics::CREDENTIAL_VALIDATIONS
                .with_label_values(&["rejected"])
                .inc();
            return Ok(None);
        }

        let now = OffsetDateTime::now_utc();
        let hint = token_hint(secret);
        let (matching, others): (Vec<_>, Vec<_>) = self
            .metadata
            .list_active_tokens()
            .await?
            .into_iter()
            .filter(|token| token.is_usable(now))
            .partition(|token| token.token_hint == hint);

        for token in matching.iter().chain(others.iter()) {
            if verify_secret(secret, &token.token_hash).await? {
                self.touch(token.token_id);
                metrics::CREDENTIAL_VALIDATIONS
                    .with_label_values(&["accepted"])
                    .inc();
                return Ok(Some(ValidatedRecipient {
                    recipient_id: RecipientId::from(token.recipient_id),
                    token_id: TokenId::from(token.token_id),
                }));
            }
        }

        metrics::CREDENTIAL_VALIDATIONS
            .with_label_values(&["rejected"])
            .inc();
        Ok(None)
    }

    /// Record `last_used_at` without holding up the request.
    fn touch(&self, token_id: Uuid) {
        let metadata = self.metadata.clone();
        tokio::spawn(async move {
            if let Err(e) = metadata
                .touch_token(token_id, OffsetDateTime::now_utc())
                .await
            {
                tracing::debug!(token_id = %token_id, error = %e, "Failed to touch token");
            }
        });
    }

    /// Recipient-facing profile for a freshly issued credential.
    pub fn credential_profile(&self, issued: &IssuedCredential) -> CredentialProfile {
        CredentialProfile::for_credential(&self.endpoint, issued)
    }
}

impl std::fmt::Debug for CredentialAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialAuthority")
            .field("hash_cost", &self.hash_cost)
            .field("validity", &self.validity)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}
