//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Externally reachable Delta Sharing endpoint written into credential profiles.
    #[serde(default = "default_public_endpoint")]
    pub public_endpoint: String,
    /// Upper bound for `maxResults` on list endpoints.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    /// SECURITY: When enabled, ensure this endpoint is network-restricted
    /// to authorized Prometheus scraper IPs only at the infrastructure level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_public_endpoint() -> String {
    "http://127.0.0.1:8080/delta-sharing".to_string()
}

fn default_max_page_size() -> u32 {
    1000
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            public_endpoint: default_public_endpoint(),
            max_page_size: default_max_page_size(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_page_size == 0 {
            return Err("server.max_page_size must be at least 1".to_string());
        }
        if !(self.public_endpoint.starts_with("http://")
            || self.public_endpoint.starts_with("https://"))
        {
            return Err(format!(
                "server.public_endpoint must be an http(s) URL, got '{}'",
                self.public_endpoint
            ));
        }
        Ok(())
    }
}

/// Admin token configuration.
///
/// The admin token guards the `/v1/admin` surface. Only its hash is configured.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Pre-computed hash of the admin token (SHA256 hex, 64 characters).
    /// Generate with: `echo -n "your-secret-token" | sha256sum`
    pub token_hash: String,
}

impl AdminConfig {
    /// Create a test configuration with a dummy token hash.
    ///
    /// **For testing only.** The hash is deterministic but not a real token.
    pub fn for_testing() -> Self {
        Self {
            // SHA256 of "test-admin-token"
            token_hash: "17d6bfe05d1b1fb7bc499f8e3f639c7b3eda4c40f321eef8887a0c04c89a99c5"
                .to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.token_hash.len() != 64 || !self.token_hash.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err("admin.token_hash must be a 64-character SHA256 hex string".to_string());
        }
        Ok(())
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database.
    Sqlite {
        /// Database file path.
        path: PathBuf,
    },
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/sharegate.db"),
        }
    }
}

/// Secret handling configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Passphrase the service-account credential is encrypted with.
    /// WARNING: Prefer SHAREGATE_SECRETS__PASSPHRASE over storing it in config.
    #[serde(default)]
    pub passphrase: Option<String>,
    /// bcrypt work factor for recipient token hashes.
    #[serde(default = "default_hash_cost")]
    pub hash_cost: u32,
}

fn default_hash_cost() -> u32 {
    10
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            passphrase: None,
            hash_cost: default_hash_cost(),
        }
    }
}

impl std::fmt::Debug for SecretsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretsConfig")
            .field("passphrase", &self.passphrase.as_ref().map(|_| "[REDACTED]"))
            .field("hash_cost", &self.hash_cost)
            .finish()
    }
}

impl SecretsConfig {
    pub fn validate(&self) -> Result<(), String> {
        // bcrypt accepts 4..=31
        if !(4..=31).contains(&self.hash_cost) {
            return Err(format!(
                "secrets.hash_cost must be between 4 and 31, got {}",
                self.hash_cost
            ));
        }
        if let Some(passphrase) = &self.passphrase
            && passphrase.len() < 8
        {
            return Err("secrets.passphrase must be at least 8 characters".to_string());
        }
        Ok(())
    }
}

/// Recipient credential configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialConfig {
    /// Validity of newly issued credentials in days. 0 means no expiry.
    #[serde(default = "default_validity_days")]
    pub validity_days: u32,
}

fn default_validity_days() -> u32 {
    365
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            validity_days: default_validity_days(),
        }
    }
}

impl CredentialConfig {
    /// Validity as a Duration, or `None` for credentials that never expire.
    pub fn validity(&self) -> Option<Duration> {
        (self.validity_days > 0).then(|| Duration::days(i64::from(self.validity_days)))
    }
}

/// How data-access requests are served.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ProxyConfig {
    /// Read Delta tables from local storage.
    #[default]
    Standalone,
    /// Forward to an upstream Delta Sharing server.
    Hybrid {
        /// Upstream Delta Sharing endpoint (e.g., "https://upstream/delta-sharing").
        endpoint: String,
        /// Timeout for each upstream request in seconds.
        #[serde(default = "default_request_timeout_secs")]
        request_timeout_secs: u64,
    },
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl ProxyConfig {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::Standalone => Ok(()),
            Self::Hybrid {
                endpoint,
                request_timeout_secs,
            } => {
                if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                    return Err(format!(
                        "proxy.endpoint must be an http(s) URL, got '{endpoint}'"
                    ));
                }
                if *request_timeout_secs == 0 {
                    return Err("proxy.request_timeout_secs cannot be 0".to_string());
                }
                Ok(())
            }
        }
    }

    pub fn is_hybrid(&self) -> bool {
        matches!(self, Self::Hybrid { .. })
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Admin token configuration (required).
    pub admin: AdminConfig,
    #[serde(default)]
    pub secrets: SecretsConfig,
    #[serde(default)]
    pub credentials: CredentialConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses standalone mode, SQLite metadata, a dummy
    /// admin token and the cheapest bcrypt cost.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            metadata: MetadataConfig::default(),
            admin: AdminConfig::for_testing(),
            secrets: SecretsConfig {
                passphrase: Some("test-passphrase".to_string()),
                hash_cost: 4,
            },
            credentials: CredentialConfig::default(),
            proxy: ProxyConfig::Standalone,
        }
    }

    /// Validate the whole configuration.
    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.admin.validate()?;
        self.secrets.validate()?;
        self.proxy.validate()?;
        if self.proxy.is_hybrid() && self.secrets.passphrase.is_none() {
            return Err(
                "secrets.passphrase is required in hybrid mode to store the service account credential"
                    .to_string(),
            );
        }
        Ok(())
    }
}
