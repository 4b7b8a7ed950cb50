use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

use crdb_config::shared::ProviderConfig;

use crate::bail;
use crate::error::{CrdbResult, ErrorKind};

/// Placeholder replaced by the resource's local port when the endpoint is resolved.
pub const LOCAL_PORT_PLACEHOLDER: &str = "<local_port>";

/// Characters kept verbatim in the user info part of a connection URL.
const USERINFO: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Connection string template shared by every resource operation.
///
/// Tunnelled endpoints point at `localhost:<local_port>` and are resolved per
/// operation with the resource's local port. Direct endpoints are used as-is,
/// apart from the same placeholder substitution.
#[derive(Clone)]
pub struct ConnectionEndpoint {
    template: SecretString,
}

impl ConnectionEndpoint {
    /// Endpoint reaching the `system` database through a local tunnel.
    pub fn tunnel(username: &str, password: &SecretString) -> Self {
        let template = format!(
            "postgresql://{}:{}@localhost:{LOCAL_PORT_PLACEHOLDER}/system?sslmode=disable",
            utf8_percent_encode(username, USERINFO),
            utf8_percent_encode(password.expose_secret(), USERINFO),
        );

        Self {
            template: template.into(),
        }
    }

    pub fn direct(dns: SecretString) -> Self {
        Self { template: dns }
    }

    /// Picks the tunnel template when a kube config is present, the direct one otherwise.
    pub fn from_config(config: &ProviderConfig) -> CrdbResult<Self> {
        if config.kube_config.is_some() {
            return Ok(Self::tunnel(&config.username, &config.password));
        }

        match &config.dns {
            Some(dns) if !dns.is_empty() => Ok(Self::direct(SecretString::clone(dns))),
            _ => bail!(
                ErrorKind::ConfigurationError,
                "A connection string is required when no kube config is set"
            ),
        }
    }

    /// Returns the connection string for an operation on `local_port`.
    pub fn resolve(&self, local_port: &str) -> SecretString {
        self.template
            .expose_secret()
            .replacen(LOCAL_PORT_PLACEHOLDER, local_port, 1)
            .into()
    }
}

impl fmt::Debug for ConnectionEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionEndpoint")
            .field("template", &"[REDACTED]")
            .finish()
    }
}
