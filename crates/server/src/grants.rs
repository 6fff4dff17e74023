//! Access grant ledger: which recipients may reach which shares, and how.

use crate::metrics;
use sharegate_core::{Authorization, DenyReason, GrantAction, GrantOptions, RecipientId, ShareRef};
use sharegate_metadata::models::{AccessGrantRow, ShareRow};
use sharegate_metadata::{MetadataError, MetadataStore};
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// Grant ledger errors.
#[derive(Debug, thiserror::Error)]
pub enum GrantError {
    #[error("no grant for recipient {recipient_id} on share {share}")]
    GrantNotFound {
        recipient_id: RecipientId,
        share: ShareRef,
    },

    #[error("share not found: {0}")]
    ShareNotFound(ShareRef),

    #[error("recipient not found: {0}")]
    RecipientNotFound(RecipientId),

    #[error("invalid grant options: {0}")]
    InvalidArgument(String),

    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),
}

pub type GrantResult<T> = std::result::Result<T, GrantError>;

/// Grants and checks recipient access to shares.
pub struct GrantLedger {
    metadata: Arc<dyn MetadataStore>,
}

impl GrantLedger {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    /// Look up a share by ID or name.
    pub async fn resolve_share(&self, share: &ShareRef) -> GrantResult<ShareRow> {
        let row = match share {
            ShareRef::Id(id) => self.metadata.get_share(*id).await?,
            ShareRef::Name(name) => self.metadata.get_share_by_name(name).await?,
        };
        row.ok_or_else(|| GrantError::ShareNotFound(share.clone()))
    }

    async fn require_recipient(&self, recipient_id: RecipientId) -> GrantResult<()> {
        match self.metadata.get_recipient(*recipient_id.as_uuid()).await? {
            Some(_) => Ok(()),
            None => Err(GrantError::RecipientNotFound(recipient_id)),
        }
    }

    /// Create a grant, or overlay the supplied options on an existing one.
    pub async fn grant(
        &self,
        recipient_id: RecipientId,
        share: &ShareRef,
        options: &GrantOptions,
    ) -> GrantResult<AccessGrantRow> {
        options
            .validate()
            .map_err(|e| GrantError::InvalidArgument(e.to_string()))?;
        self.require_recipient(recipient_id).await?;
        let share_row = self.resolve_share(share).await?;

        let row = self
            .metadata
            .upsert_grant(
                *recipient_id.as_uuid(),
                share_row.share_id,
                options,
                OffsetDateTime::now_utc(),
            )
            .await?;
        tracing::info!(
            recipient_id = %recipient_id,
            share = %share_row.name,
            can_download = row.can_download,
            can_query = row.can_query,
            "Granted share access"
        );
        Ok(row)
    }

    /// Remove a grant. Unknown shares and missing grants are no-ops.
    pub async fn revoke(&self, recipient_id: RecipientId, share: &ShareRef) -> GrantResult<bool> {
        let share_row = match self.resolve_share(share).await {
            Ok(row) => row,
            Err(GrantError::ShareNotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        let removed = self
            .metadata
            .delete_grant(*recipient_id.as_uuid(), share_row.share_id)
            .await?;
        if removed {
            tracing::info!(recipient_id = %recipient_id, share = %share_row.name, "Revoked share access");
        }
        Ok(removed)
    }

    /// Overlay the supplied options on an existing grant.
    pub async fn update(
        &self,
        recipient_id: RecipientId,
        share: &ShareRef,
        options: &GrantOptions,
    ) -> GrantResult<AccessGrantRow> {
        options
            .validate()
            .map_err(|e| GrantError::InvalidArgument(e.to_string()))?;
        let share_row = self.resolve_share(share).await?;

        self.metadata
            .update_grant(
                *recipient_id.as_uuid(),
                share_row.share_id,
                options,
                OffsetDateTime::now_utc(),
            )
            .await?
            .ok_or_else(|| GrantError::GrantNotFound {
                recipient_id,
                share: share.clone(),
            })
    }

    /// Replace every grant of the recipient with default grants on `shares`.
    ///
    /// All references are resolved before anything is written; the
    /// replacement itself is one transaction.
    pub async fn replace_all(
        &self,
        recipient_id: RecipientId,
        shares: &[ShareRef],
        granted_by: Option<&str>,
    ) -> GrantResult<u64> {
        self.require_recipient(recipient_id).await?;

        let mut share_ids = Vec::with_capacity(shares.len());
        for share in shares {
            share_ids.push(self.resolve_share(share).await?.share_id);
        }

        let inserted = self
            .metadata
            .replace_grants(
                *recipient_id.as_uuid(),
                &share_ids,
                granted_by,
                OffsetDateTime::now_utc(),
            )
            .await?;
        tracing::info!(recipient_id = %recipient_id, grants = inserted, "Replaced share grants");
        Ok(inserted)
    }

    /// Check whether a recipient may perform `action` on a share.
    pub async fn is_authorized(
        &self,
        recipient_id: RecipientId,
        share_id: Uuid,
        action: GrantAction,
    ) -> GrantResult<Authorization> {
        let authorization = match self
            .metadata
            .get_grant(*recipient_id.as_uuid(), share_id)
            .await?
        {
            Some(row) => Authorization::evaluate(&row.settings(), action, OffsetDateTime::now_utc()),
            None => Authorization::deny(DenyReason::NoGrant),
        };

        if let Some(reason) = authorization.deny_reason {
            metrics::ACCESS_DENIED
                .with_label_values(&[deny_label(reason)])
                .inc();
            tracing::debug!(
                recipient_id = %recipient_id,
                share_id = %share_id,
                action = action.as_str(),
                reason = ?reason,
                "Access denied"
            );
        }
        Ok(authorization)
    }

    /// Whether the recipient holds any grant on the share, regardless of capabilities.
    pub async fn has_grant(&self, recipient_id: RecipientId, share_id: Uuid) -> GrantResult<bool> {
        let now = OffsetDateTime::now_utc();
        Ok(self
            .metadata
            .get_grant(*recipient_id.as_uuid(), share_id)
            .await?
            .is_some_and(|row| row.expires_at.is_none_or(|exp| exp > now)))
    }

    /// Shares the recipient currently holds an unexpired grant on, ordered by name.
    pub async fn granted_shares(&self, recipient_id: RecipientId) -> GrantResult<Vec<ShareRow>> {
        let now = OffsetDateTime::now_utc();
        let mut shares = Vec::new();
        for grant in self
            .metadata
            .list_grants_for_recipient(*recipient_id.as_uuid())
            .await?
        {
            if grant.expires_at.is_some_and(|exp| exp <= now) {
                continue;
            }
            if let Some(share) = self.metadata.get_share(grant.share_id).await? {
                shares.push(share);
            }
        }
        shares.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(shares)
    }
}

pub(crate) fn deny_label(reason: DenyReason) -> &'static str {
    match reason {
        DenyReason::NoGrant => "no_grant",
        DenyReason::Expired => "expired",
        DenyReason::CapabilityDisabled => "capability_disabled",
    }
}
