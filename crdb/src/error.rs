use std::error;
use std::fmt;

use crdb_config::shared::ValidationError;

use crate::k8s::K8sError;

/// Result type used by provider operations.
pub type CrdbResult<T> = Result<T, CrdbError>;

/// Error returned by provider operations.
///
/// Every error carries an [`ErrorKind`] describing the failure category, a
/// static description and, optionally, a dynamic detail such as the message of
/// the underlying driver error.
#[derive(Debug, Clone)]
pub struct CrdbError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    WithDescription(ErrorKind, &'static str),
    WithDescriptionAndDetail(ErrorKind, &'static str, String),
}

/// Categories of failures surfaced by the provider.
#[derive(PartialEq, Eq, Copy, Clone, Debug)]
#[non_exhaustive]
pub enum ErrorKind {
    // Configuration
    ConfigurationError,
    ValidationError,

    // Tunnel
    TunnelStartError,
    TunnelTimeoutError,
    RemoteUnreachableError,
    KubernetesError,

    // Database
    DatabaseConnectionFailed,
    DatabaseQueryFailed,
    AuthenticationError,
    PermissionDenied,
    NotFound,
    AlreadyExists,

    // Runtime
    IoError,
    TaskFailed,

    Unknown,
}

impl CrdbError {
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::WithDescription(kind, _)
            | ErrorRepr::WithDescriptionAndDetail(kind, _, _) => kind,
        }
    }

    pub fn description(&self) -> &'static str {
        match self.repr {
            ErrorRepr::WithDescription(_, desc)
            | ErrorRepr::WithDescriptionAndDetail(_, desc, _) => desc,
        }
    }

    /// Returns the dynamic detail attached to this error, if any.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::WithDescriptionAndDetail(_, _, ref detail) => Some(detail.as_str()),
            ErrorRepr::WithDescription(_, _) => None,
        }
    }

    /// Returns `true` when the error comes from the tunnel rather than the database.
    pub fn is_tunnel_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::TunnelStartError
                | ErrorKind::TunnelTimeoutError
                | ErrorKind::RemoteUnreachableError
                | ErrorKind::KubernetesError
        )
    }
}

impl PartialEq for CrdbError {
    fn eq(&self, other: &CrdbError) -> bool {
        self.kind() == other.kind()
    }
}

impl fmt::Display for CrdbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self.repr {
            ErrorRepr::WithDescription(kind, desc) => {
                fmt::Debug::fmt(&kind, f)?;
                f.write_str(": ")?;
                desc.fmt(f)
            }
            ErrorRepr::WithDescriptionAndDetail(kind, desc, ref detail) => {
                fmt::Debug::fmt(&kind, f)?;
                f.write_str(": ")?;
                desc.fmt(f)?;
                f.write_str(" -> ")?;
                detail.fmt(f)
            }
        }
    }
}

impl error::Error for CrdbError {}

impl From<(ErrorKind, &'static str)> for CrdbError {
    fn from((kind, desc): (ErrorKind, &'static str)) -> CrdbError {
        CrdbError {
            repr: ErrorRepr::WithDescription(kind, desc),
        }
    }
}

impl From<(ErrorKind, &'static str, String)> for CrdbError {
    fn from((kind, desc, detail): (ErrorKind, &'static str, String)) -> CrdbError {
        CrdbError {
            repr: ErrorRepr::WithDescriptionAndDetail(kind, desc, detail),
        }
    }
}

impl From<std::io::Error> for CrdbError {
    fn from(err: std::io::Error) -> CrdbError {
        CrdbError::from((ErrorKind::IoError, "I/O error occurred", err.to_string()))
    }
}

/// Invalid provider or tunnel settings are configuration errors.
impl From<ValidationError> for CrdbError {
    fn from(err: ValidationError) -> CrdbError {
        CrdbError::from((
            ErrorKind::ConfigurationError,
            "Invalid provider configuration",
            err.to_string(),
        ))
    }
}

impl From<K8sError> for CrdbError {
    fn from(err: K8sError) -> CrdbError {
        CrdbError::from((
            ErrorKind::KubernetesError,
            "Kubernetes request failed",
            err.to_string(),
        ))
    }
}

impl From<tokio::task::JoinError> for CrdbError {
    fn from(err: tokio::task::JoinError) -> CrdbError {
        let description = if err.is_panic() {
            "Background task panicked"
        } else {
            "Background task was cancelled"
        };

        CrdbError::from((ErrorKind::TaskFailed, description, err.to_string()))
    }
}

/// Maps driver errors by SQLSTATE. Errors without a code happened while talking
/// to the server rather than inside it, so they count as connection failures.
impl From<tokio_postgres::Error> for CrdbError {
    fn from(err: tokio_postgres::Error) -> CrdbError {
        let (kind, description) = match err.code() {
            Some(sqlstate) => {
                use tokio_postgres::error::SqlState;

                match *sqlstate {
                    // 08xxx
                    SqlState::CONNECTION_EXCEPTION
                    | SqlState::CONNECTION_DOES_NOT_EXIST
                    | SqlState::CONNECTION_FAILURE
                    | SqlState::SQLCLIENT_UNABLE_TO_ESTABLISH_SQLCONNECTION
                    | SqlState::SQLSERVER_REJECTED_ESTABLISHMENT_OF_SQLCONNECTION
                    | SqlState::CANNOT_CONNECT_NOW
                    | SqlState::ADMIN_SHUTDOWN
                    | SqlState::TOO_MANY_CONNECTIONS => (
                        ErrorKind::DatabaseConnectionFailed,
                        "CockroachDB connection error",
                    ),

                    // 28xxx
                    SqlState::INVALID_AUTHORIZATION_SPECIFICATION | SqlState::INVALID_PASSWORD => (
                        ErrorKind::AuthenticationError,
                        "CockroachDB authentication failed",
                    ),

                    SqlState::INSUFFICIENT_PRIVILEGE => (
                        ErrorKind::PermissionDenied,
                        "CockroachDB denied the operation",
                    ),

                    SqlState::UNDEFINED_OBJECT
                    | SqlState::UNDEFINED_TABLE
                    | SqlState::UNDEFINED_SCHEMA
                    | SqlState::INVALID_CATALOG_NAME => (
                        ErrorKind::NotFound,
                        "CockroachDB object not found",
                    ),

                    SqlState::DUPLICATE_DATABASE
                    | SqlState::DUPLICATE_OBJECT
                    | SqlState::DUPLICATE_SCHEMA => (
                        ErrorKind::AlreadyExists,
                        "CockroachDB object already exists",
                    ),

                    SqlState::INVALID_PARAMETER_VALUE
                    | SqlState::INVALID_NAME
                    | SqlState::FEATURE_NOT_SUPPORTED => (
                        ErrorKind::ValidationError,
                        "CockroachDB rejected a value",
                    ),

                    _ => (ErrorKind::DatabaseQueryFailed, "CockroachDB statement failed"),
                }
            }
            None => (
                ErrorKind::DatabaseConnectionFailed,
                "CockroachDB connection failed",
            ),
        };

        CrdbError::from((kind, description, err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{bail, crdb_error};

    #[test]
    fn test_simple_error_creation() {
        let err = CrdbError::from((ErrorKind::TunnelStartError, "Port already bound"));
        assert_eq!(err.kind(), ErrorKind::TunnelStartError);
        assert_eq!(err.description(), "Port already bound");
        assert_eq!(err.detail(), None);
        assert!(err.is_tunnel_error());
    }

    #[test]
    fn test_error_with_detail() {
        let err = CrdbError::from((
            ErrorKind::DatabaseQueryFailed,
            "Statement failed",
            "relation \"t\" does not exist".to_string(),
        ));
        assert_eq!(err.kind(), ErrorKind::DatabaseQueryFailed);
        assert_eq!(err.detail(), Some("relation \"t\" does not exist"));
        assert!(!err.is_tunnel_error());
    }

    #[test]
    fn test_display_includes_kind_description_and_detail() {
        let err = crdb_error!(
            ErrorKind::TunnelTimeoutError,
            "Tunnel did not become ready",
            "10s"
        );
        assert_eq!(
            err.to_string(),
            "TunnelTimeoutError: Tunnel did not become ready -> 10s"
        );

        let err = crdb_error!(ErrorKind::NotFound, "Database not found");
        assert_eq!(err.to_string(), "NotFound: Database not found");
    }

    #[test]
    fn test_errors_compare_by_kind() {
        let a = crdb_error!(ErrorKind::NotFound, "a");
        let b = crdb_error!(ErrorKind::NotFound, "b", "detail");
        let c = crdb_error!(ErrorKind::Unknown, "a");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_validation_error_is_configuration_error() {
        let err = CrdbError::from(ValidationError::EmptyNamespace);
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);
        assert!(err.detail().is_some());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use");
        let err = CrdbError::from(io_err);
        assert_eq!(err.kind(), ErrorKind::IoError);
        assert_eq!(err.detail(), Some("address in use"));
    }

    #[test]
    fn test_bail_macro() {
        fn fails() -> CrdbResult<()> {
            bail!(ErrorKind::ValidationError, "Name must not be empty");
        }

        fn fails_with_detail() -> CrdbResult<()> {
            bail!(ErrorKind::ValidationError, "Name must not be empty", "name");
        }

        assert_eq!(fails().unwrap_err().kind(), ErrorKind::ValidationError);
        assert_eq!(fails_with_detail().unwrap_err().detail(), Some("name"));
    }

    #[tokio::test]
    async fn test_join_error_conversion() {
        let handle = tokio::spawn(async {
            if true {
                panic!("boom");
            }
        });
        let join_err = handle.await.unwrap_err();
        let err = CrdbError::from(join_err);
        assert_eq!(err.kind(), ErrorKind::TaskFailed);
        assert_eq!(err.description(), "Background task panicked");
    }
}
