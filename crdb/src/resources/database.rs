use pg_escape::{quote_identifier, quote_literal};
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;

use crate::client::PgClient;
use crate::error::CrdbResult;
use crate::provider::Provider;
use crate::resources::{non_empty, require_non_empty};

pub const DEFAULT_DATABASE_LOCAL_PORT: &str = "26258";

const SELECT_DATABASE: &str = "SELECT id, name, owner, primary_region, regions \
     FROM crdb_internal.databases WHERE name = $1";

/// Desired configuration of a database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSpec {
    pub name: String,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
    #[serde(default)]
    pub primary_region: Option<String>,
    #[serde(default)]
    pub regions: Vec<String>,
}

impl DatabaseSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// A database as reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseState {
    pub id: i64,
    pub name: String,
    pub owner: String,
    pub primary_region: Option<String>,
    pub regions: Vec<String>,
}

impl DatabaseState {
    fn from_row(row: &Row) -> CrdbResult<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            owner: row.try_get("owner")?,
            primary_region: row.try_get("primary_region")?,
            regions: row.try_get::<_, Option<Vec<String>>>("regions")?.unwrap_or_default(),
        })
    }
}

/// Manages databases.
pub struct DatabaseResource<'a> {
    provider: &'a Provider,
    local_port: String,
}

impl<'a> DatabaseResource<'a> {
    pub fn new(provider: &'a Provider) -> Self {
        Self::with_local_port(provider, DEFAULT_DATABASE_LOCAL_PORT)
    }

    pub fn with_local_port(provider: &'a Provider, local_port: impl Into<String>) -> Self {
        Self {
            provider,
            local_port: local_port.into(),
        }
    }

    #[tracing::instrument(skip_all, fields(database = %spec.name, local_port = %self.local_port))]
    pub async fn create(&self, spec: &DatabaseSpec) -> CrdbResult<DatabaseState> {
        require_non_empty(&spec.name, "Database name must not be empty")?;

        let create = create_database_statement(spec);
        let alter_owner = non_empty(&spec.owner).map(|owner| alter_owner_statement(&spec.name, owner));

        self.provider
            .run(&self.local_port, async |client: &PgClient| {
                client.execute(&create).await?;
                if let Some(alter_owner) = &alter_owner {
                    client.execute(alter_owner).await?;
                }

                read_database(client, &spec.name).await
            })
            .await
    }

    #[tracing::instrument(skip(self), fields(local_port = %self.local_port))]
    pub async fn read(&self, name: &str) -> CrdbResult<DatabaseState> {
        require_non_empty(name, "Database name must not be empty")?;

        self.provider
            .run(&self.local_port, async |client: &PgClient| {
                read_database(client, name).await
            })
            .await
    }

    /// Moves a database from `prior` to `desired`.
    ///
    /// Encoding cannot be changed after creation and is ignored here.
    #[tracing::instrument(skip_all, fields(database = %prior.name, local_port = %self.local_port))]
    pub async fn update(
        &self,
        prior: &DatabaseSpec,
        desired: &DatabaseSpec,
    ) -> CrdbResult<DatabaseState> {
        require_non_empty(&prior.name, "Database name must not be empty")?;
        require_non_empty(&desired.name, "Database name must not be empty")?;

        let statements = update_database_statements(prior, desired);

        self.provider
            .run(&self.local_port, async |client: &PgClient| {
                for statement in &statements {
                    client.execute(statement).await?;
                }

                read_database(client, &desired.name).await
            })
            .await
    }

    #[tracing::instrument(skip(self), fields(local_port = %self.local_port))]
    pub async fn delete(&self, name: &str) -> CrdbResult<()> {
        require_non_empty(name, "Database name must not be empty")?;

        let statement = format!("DROP DATABASE {}", quote_identifier(name));
        self.provider
            .run(&self.local_port, async |client: &PgClient| {
                client.execute(&statement).await
            })
            .await
    }

    /// Adopts an existing database by name.
    pub async fn import(&self, name: &str) -> CrdbResult<DatabaseState> {
        self.read(name).await
    }
}

pub(crate) async fn read_database(client: &PgClient, name: &str) -> CrdbResult<DatabaseState> {
    let row = client
        .query_one(SELECT_DATABASE, &[&name], "Database not found")
        .await?;

    DatabaseState::from_row(&row)
}

pub fn create_database_statement(spec: &DatabaseSpec) -> String {
    let mut statement = format!("CREATE DATABASE {}", quote_identifier(&spec.name));

    if let Some(encoding) = non_empty(&spec.encoding) {
        statement.push_str(" ENCODING = ");
        statement.push_str(&quote_literal(encoding));
    }

    if let Some(primary_region) = non_empty(&spec.primary_region) {
        statement.push_str(" PRIMARY REGION ");
        statement.push_str(&quote_identifier(primary_region));
    }

    if !spec.regions.is_empty() {
        statement.push_str(" REGIONS ");
        statement.push_str(&quote_identifiers(&spec.regions));
    }

    statement
}

pub fn alter_owner_statement(name: &str, owner: &str) -> String {
    format!(
        "ALTER DATABASE {} OWNER TO {}",
        quote_identifier(name),
        quote_identifier(owner)
    )
}

/// Returns the statements moving a database from `prior` to `desired`, in the
/// order they must run: rename, owner, primary region, dropped then added regions.
pub fn update_database_statements(prior: &DatabaseSpec, desired: &DatabaseSpec) -> Vec<String> {
    let mut statements = Vec::new();

    if prior.name != desired.name {
        statements.push(format!(
            "ALTER DATABASE {} RENAME TO {}",
            quote_identifier(&prior.name),
            quote_identifier(&desired.name)
        ));
    }
    let name = quote_identifier(&desired.name);

    if let Some(owner) = non_empty(&desired.owner)
        && non_empty(&prior.owner) != Some(owner)
    {
        statements.push(alter_owner_statement(&desired.name, owner));
    }

    if let Some(primary_region) = non_empty(&desired.primary_region)
        && non_empty(&prior.primary_region) != Some(primary_region)
    {
        statements.push(format!(
            "ALTER DATABASE {name} SET PRIMARY REGION {}",
            quote_identifier(primary_region)
        ));
    }

    for region in prior.regions.iter().filter(|r| !desired.regions.contains(r)) {
        statements.push(format!(
            "ALTER DATABASE {name} DROP REGION {}",
            quote_identifier(region)
        ));
    }

    for region in desired.regions.iter().filter(|r| !prior.regions.contains(r)) {
        statements.push(format!(
            "ALTER DATABASE {name} ADD REGION {}",
            quote_identifier(region)
        ));
    }

    statements
}

fn quote_identifiers(identifiers: &[String]) -> String {
    identifiers
        .iter()
        .map(|identifier| quote_identifier(identifier))
        .collect::<Vec<_>>()
        .join(", ")
}
