use pg_escape::{quote_identifier, quote_literal};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;

use crate::bail;
use crate::client::PgClient;
use crate::crdb_error;
use crate::error::{CrdbResult, ErrorKind};
use crate::provider::Provider;
use crate::resources::require_non_empty;

pub const DEFAULT_USER_LOCAL_PORT: &str = "26257";

/// Role granted when a user is marked as admin.
const ADMIN_ROLE: &str = "admin";

const SELECT_USER: &str = "SELECT username, member_of FROM [SHOW USERS] WHERE username = $1";

/// Desired configuration of a SQL user.
#[derive(Debug, Clone, Default)]
pub struct UserSpec {
    /// Cannot change after creation.
    pub username: String,
    /// `None` creates a user that cannot log in with a password.
    pub password: Option<SecretString>,
    /// Role options appended verbatim, e.g. `CREATEDB CREATEROLE`.
    pub options: String,
    pub is_admin: bool,
}

impl UserSpec {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Default::default()
        }
    }

    fn validate(&self) -> CrdbResult<()> {
        require_non_empty(&self.username, "Username must not be empty")?;

        if let Some(password) = &self.password
            && password.expose_secret().is_empty()
        {
            bail!(ErrorKind::ValidationError, "Password must not be empty");
        }

        Ok(())
    }
}

/// A user as reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserState {
    pub username: String,
    pub is_admin: bool,
    pub member_of: Vec<String>,
}

/// Manages SQL users.
pub struct UserResource<'a> {
    provider: &'a Provider,
    local_port: String,
}

impl<'a> UserResource<'a> {
    pub fn new(provider: &'a Provider) -> Self {
        Self::with_local_port(provider, DEFAULT_USER_LOCAL_PORT)
    }

    pub fn with_local_port(provider: &'a Provider, local_port: impl Into<String>) -> Self {
        Self {
            provider,
            local_port: local_port.into(),
        }
    }

    fn check_local_port(&self) -> CrdbResult<()> {
        require_non_empty(&self.local_port, "Local port must not be empty")
    }

    #[tracing::instrument(skip_all, fields(user = %spec.username, local_port = %self.local_port))]
    pub async fn create(&self, spec: &UserSpec) -> CrdbResult<UserState> {
        self.check_local_port()?;
        spec.validate()?;

        let create = user_statement("CREATE", spec);
        let grant = spec.is_admin.then(|| grant_admin_statement(&spec.username));

        self.provider
            .run(&self.local_port, async |client: &PgClient| {
                client.execute(&create).await?;
                if let Some(grant) = &grant {
                    client.execute(grant).await?;
                }

                read_user(client, &spec.username)
                    .await?
                    .ok_or_else(|| crdb_error!(ErrorKind::NotFound, "User not found after creation"))
            })
            .await
    }

    /// Returns `None` when the user does not exist.
    #[tracing::instrument(skip(self), fields(local_port = %self.local_port))]
    pub async fn read(&self, username: &str) -> CrdbResult<Option<UserState>> {
        self.check_local_port()?;
        require_non_empty(username, "Username must not be empty")?;

        self.provider
            .run(&self.local_port, async |client: &PgClient| {
                read_user(client, username).await
            })
            .await
    }

    /// Moves a user from `prior` to `desired`. Renaming is not supported.
    #[tracing::instrument(skip_all, fields(user = %prior.username, local_port = %self.local_port))]
    pub async fn update(&self, prior: &UserSpec, desired: &UserSpec) -> CrdbResult<UserState> {
        self.check_local_port()?;
        desired.validate()?;

        if prior.username != desired.username {
            bail!(
                ErrorKind::ValidationError,
                "Username cannot change, the user must be replaced",
                format!("{} -> {}", prior.username, desired.username)
            );
        }

        let statements = update_user_statements(prior, desired);

        self.provider
            .run(&self.local_port, async |client: &PgClient| {
                for statement in &statements {
                    client.execute(statement).await?;
                }

                read_user(client, &desired.username)
                    .await?
                    .ok_or_else(|| crdb_error!(ErrorKind::NotFound, "User not found"))
            })
            .await
    }

    #[tracing::instrument(skip(self), fields(local_port = %self.local_port))]
    pub async fn delete(&self, username: &str) -> CrdbResult<()> {
        self.check_local_port()?;
        require_non_empty(username, "Username must not be empty")?;

        let statement = format!("DROP USER {}", quote_identifier(username));
        self.provider
            .run(&self.local_port, async |client: &PgClient| {
                client.execute(&statement).await
            })
            .await
    }

    /// Adopts an existing user, failing with [`ErrorKind::NotFound`] when it is absent.
    pub async fn import(&self, username: &str) -> CrdbResult<UserState> {
        self.read(username)
            .await?
            .ok_or_else(|| crdb_error!(ErrorKind::NotFound, "User not found", username))
    }
}

async fn read_user(client: &PgClient, username: &str) -> CrdbResult<Option<UserState>> {
    let Some(row) = client.query_opt(SELECT_USER, &[&username]).await? else {
        return Ok(None);
    };

    let member_of: Vec<String> = row
        .try_get::<_, Option<Vec<String>>>("member_of")?
        .unwrap_or_default();

    Ok(Some(UserState {
        username: row.try_get("username")?,
        is_admin: member_of.iter().any(|role| role == ADMIN_ROLE),
        member_of,
    }))
}

/// Builds `CREATE USER` or `ALTER USER` for `spec`.
fn user_statement(verb: &str, spec: &UserSpec) -> String {
    let password = match &spec.password {
        Some(password) => quote_literal(password.expose_secret()),
        None => "NULL".to_owned(),
    };

    let mut statement = format!(
        "{verb} USER {} WITH PASSWORD {password}",
        quote_identifier(&spec.username)
    );

    let options = spec.options.trim();
    if !options.is_empty() {
        statement.push(' ');
        statement.push_str(options);
    }

    statement
}

fn grant_admin_statement(username: &str) -> String {
    format!(
        "GRANT {ADMIN_ROLE} TO {} WITH ADMIN OPTION",
        quote_identifier(username)
    )
}

fn revoke_admin_statement(username: &str) -> String {
    format!("REVOKE {ADMIN_ROLE} FROM {}", quote_identifier(username))
}

fn update_user_statements(prior: &UserSpec, desired: &UserSpec) -> Vec<String> {
    let mut statements = Vec::new();

    let password_changed = match (&prior.password, &desired.password) {
        (Some(a), Some(b)) => a.expose_secret() != b.expose_secret(),
        (None, None) => false,
        _ => true,
    };

    if password_changed || prior.options.trim() != desired.options.trim() {
        statements.push(user_statement("ALTER", desired));
    }

    match (prior.is_admin, desired.is_admin) {
        (false, true) => statements.push(grant_admin_statement(&desired.username)),
        (true, false) => statements.push(revoke_admin_statement(&desired.username)),
        _ => {}
    }

    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(password: Option<&str>) -> UserSpec {
        UserSpec {
            password: password.map(Into::into),
            ..UserSpec::new("app_user")
        }
    }

    #[test]
    fn create_with_password_and_options() {
        let spec = UserSpec {
            options: "CREATEDB CREATEROLE".to_owned(),
            ..spec(Some("it's secret"))
        };

        assert_eq!(
            user_statement("CREATE", &spec),
            "CREATE USER app_user WITH PASSWORD 'it''s secret' CREATEDB CREATEROLE"
        );
    }

    #[test]
    fn missing_password_is_null() {
        assert_eq!(
            user_statement("CREATE", &spec(None)),
            "CREATE USER app_user WITH PASSWORD NULL"
        );
    }

    #[test]
    fn empty_password_is_rejected() {
        let err = spec(Some("")).validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn empty_username_is_rejected() {
        let err = UserSpec::new("").validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[test]
    fn unchanged_user_needs_no_statements() {
        assert!(update_user_statements(&spec(Some("a")), &spec(Some("a"))).is_empty());
    }

    #[test]
    fn password_change_alters_user() {
        assert_eq!(
            update_user_statements(&spec(Some("a")), &spec(Some("b"))),
            vec!["ALTER USER app_user WITH PASSWORD 'b'".to_owned()]
        );
    }

    #[test]
    fn admin_toggle_grants_and_revokes() {
        let user = spec(Some("a"));
        let admin = UserSpec {
            is_admin: true,
            ..spec(Some("a"))
        };

        assert_eq!(
            update_user_statements(&user, &admin),
            vec!["GRANT admin TO app_user WITH ADMIN OPTION".to_owned()]
        );
        assert_eq!(
            update_user_statements(&admin, &user),
            vec!["REVOKE admin FROM app_user".to_owned()]
        );
    }
}
