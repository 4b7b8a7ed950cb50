use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::SerializableSecretString;
use crate::shared::{KubeConfig, ValidationError};

/// Default bound on the wait for a tunnel to become ready.
pub const DEFAULT_TUNNEL_READY_TIMEOUT_MS: u64 = 10_000;

/// Provider level configuration, built once and handed to every resource operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProviderConfig {
    /// User the provider connects to CockroachDB as.
    pub username: String,
    /// Password of [`ProviderConfig::username`].
    pub password: SerializableSecretString,
    /// Full connection string used when no tunnel is configured.
    ///
    /// Optional when [`ProviderConfig::kube_config`] is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<SerializableSecretString>,
    /// Port-forward settings. When absent, [`ProviderConfig::dns`] is used directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kube_config: Option<KubeConfig>,
    /// How long to wait for a tunnel to accept connections, in milliseconds.
    #[serde(default = "default_tunnel_ready_timeout_ms")]
    pub tunnel_ready_timeout_ms: u64,
}

fn default_tunnel_ready_timeout_ms() -> u64 {
    DEFAULT_TUNNEL_READY_TIMEOUT_MS
}

impl ProviderConfig {
    /// Validates credentials and the connection mode.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.username.is_empty() {
            return Err(ValidationError::EmptyUsername);
        }

        if self.password.is_empty() {
            return Err(ValidationError::EmptyPassword);
        }

        match &self.kube_config {
            Some(kube_config) => kube_config.validate(),
            None => match &self.dns {
                Some(dns) if !dns.expose_secret().is_empty() => Ok(()),
                _ => Err(ValidationError::MissingDns),
            },
        }
    }

    pub fn tunnel_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.tunnel_ready_timeout_ms)
    }
}
