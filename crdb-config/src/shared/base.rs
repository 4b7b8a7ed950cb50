use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The database username is empty.
    #[error("database username can't be an empty string")]
    EmptyUsername,
    /// The database password is empty.
    #[error("database password can't be an empty string")]
    EmptyPassword,
    /// Neither `dns` nor `kube_config` was supplied.
    #[error("argument `dns` is required when `kube_config` is not set")]
    MissingDns,
    /// `kube_config` is present but its namespace is empty.
    #[error("cockroachdb namespace is not specified")]
    EmptyNamespace,
    /// `kube_config` is present but its service name is empty.
    #[error("cockroachdb service name is not specified")]
    EmptyServiceName,
    /// A port field does not hold a port in `1..=65535`.
    #[error("`{field}` must be a port between 1 and 65535, got `{value}`")]
    InvalidPort { field: &'static str, value: String },
    /// `~` could not be expanded because the home directory is unknown.
    #[error("unable to determine the home directory to expand `{0}`")]
    HomeDirUnavailable(String),
}

/// Parses a port given as a string, as ports are configured in the provider.
///
/// Only plain digits are accepted, since the value ends up verbatim in the
/// connection string. `field` names the offending setting in the returned error.
pub fn parse_port(field: &'static str, value: &str) -> Result<u16, ValidationError> {
    if value.is_empty() || !value.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(ValidationError::InvalidPort {
            field,
            value: value.to_owned(),
        });
    }

    match value.parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ValidationError::InvalidPort {
            field,
            value: value.to_owned(),
        }),
    }
}
