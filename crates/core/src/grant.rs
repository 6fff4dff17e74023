//! Access grant options and authorization outcomes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;

/// A field in a partial update.
///
/// `Absent` leaves the stored value alone, `Clear` resets it to "none", and
/// `Set` writes a new value. In JSON a missing key is `Absent` (use
/// `#[serde(default)]`), `null` is `Clear`, and any other value is `Set`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Patch<T> {
    #[default]
    Absent,
    Clear,
    Set(T),
}

impl<T> Patch<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Resolve against the current value.
    pub fn apply(self, current: Option<T>) -> Option<T> {
        match self {
            Self::Absent => current,
            Self::Clear => None,
            Self::Set(v) => Some(v),
        }
    }

    pub fn as_set(&self) -> Option<&T> {
        match self {
            Self::Set(v) => Some(v),
            _ => None,
        }
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Set(v),
            None => Self::Clear,
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Patch::from)
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Set(v) => v.serialize(serializer),
            Self::Absent | Self::Clear => serializer.serialize_none(),
        }
    }
}

/// RFC 3339 encoding for `Patch<OffsetDateTime>` fields.
pub mod rfc3339_patch {
    use super::Patch;
    use serde::{Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;

    pub fn serialize<S: Serializer>(
        value: &Patch<OffsetDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Patch::Set(ts) => time::serde::rfc3339::serialize(ts, serializer),
            Patch::Absent | Patch::Clear => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Patch<OffsetDateTime>, D::Error> {
        #[derive(Deserialize)]
        struct Wrapped(#[serde(with = "time::serde::rfc3339")] OffsetDateTime);

        Option::<Wrapped>::deserialize(deserializer).map(|v| Patch::from(v.map(|w| w.0)))
    }
}

/// Settings supplied when granting or updating access to a share.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GrantOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub granted_by: Option<String>,
    #[serde(default, with = "rfc3339_patch", skip_serializing_if = "Patch::is_absent")]
    pub expires_at: Patch<OffsetDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_download: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_query: Option<bool>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub max_rows_per_query: Patch<i64>,
}

impl GrantOptions {
    /// Reject values that cannot be stored.
    pub fn validate(&self) -> crate::Result<()> {
        if let Patch::Set(rows) = self.max_rows_per_query
            && rows <= 0
        {
            return Err(crate::Error::InvalidArgument(format!(
                "max_rows_per_query must be positive, got {rows}"
            )));
        }
        if let Some(granted_by) = &self.granted_by
            && granted_by.trim().is_empty()
        {
            return Err(crate::Error::InvalidArgument(
                "granted_by must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Settings a new grant ends up with.
    pub fn resolve_new(&self) -> GrantSettings {
        self.apply_to(GrantSettings::default())
    }

    /// Overlay the supplied fields on existing settings.
    pub fn apply_to(&self, current: GrantSettings) -> GrantSettings {
        GrantSettings {
            granted_by: self.granted_by.clone().or(current.granted_by),
            expires_at: self.expires_at.apply(current.expires_at),
            can_download: self.can_download.unwrap_or(current.can_download),
            can_query: self.can_query.unwrap_or(current.can_query),
            max_rows_per_query: self.max_rows_per_query.apply(current.max_rows_per_query),
        }
    }
}

/// Fully resolved grant settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrantSettings {
    pub granted_by: Option<String>,
    pub expires_at: Option<OffsetDateTime>,
    pub can_download: bool,
    pub can_query: bool,
    pub max_rows_per_query: Option<i64>,
}

impl Default for GrantSettings {
    fn default() -> Self {
        Self {
            granted_by: None,
            expires_at: None,
            can_download: true,
            can_query: true,
            max_rows_per_query: None,
        }
    }
}

/// Data-access action checked against a grant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantAction {
    /// Fetch file actions (pre-signed URLs) for a table.
    Download,
    /// Read decoded rows through the proxy.
    Query,
}

impl GrantAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Download => "download",
            Self::Query => "query",
        }
    }
}

/// Why an authorization check failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    NoGrant,
    Expired,
    CapabilityDisabled,
}

/// Outcome of an authorization check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Authorization {
    pub allowed: bool,
    pub max_rows: Option<i64>,
    pub deny_reason: Option<DenyReason>,
}

impl Authorization {
    pub fn allow(max_rows: Option<i64>) -> Self {
        Self {
            allowed: true,
            max_rows,
            deny_reason: None,
        }
    }

    pub fn deny(reason: DenyReason) -> Self {
        Self {
            allowed: false,
            max_rows: None,
            deny_reason: Some(reason),
        }
    }

    /// Evaluate stored settings for an action at a point in time.
    pub fn evaluate(settings: &GrantSettings, action: GrantAction, now: OffsetDateTime) -> Self {
        if let Some(expires_at) = settings.expires_at
            && expires_at <= now
        {
            return Self::deny(DenyReason::Expired);
        }
        let enabled = match action {
            GrantAction::Download => settings.can_download,
            GrantAction::Query => settings.can_query,
        };
        if !enabled {
            return Self::deny(DenyReason::CapabilityDisabled);
        }
        Self::allow(settings.max_rows_per_query)
    }

    /// Clamp a requested row count to the grant's ceiling.
    pub fn clamp_rows(&self, requested: Option<i64>) -> Option<i64> {
        match (requested, self.max_rows) {
            (Some(r), Some(max)) => Some(r.min(max)),
            (None, Some(max)) => Some(max),
            (r, None) => r,
        }
    }
}
