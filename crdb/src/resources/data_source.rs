use serde::Serialize;

use crate::client::PgClient;
use crate::error::CrdbResult;
use crate::provider::Provider;
use crate::resources::require_non_empty;

pub const DEFAULT_DATA_SOURCE_LOCAL_PORT: &str = "26259";

const SELECT_DATABASE_INFO: &str = "SELECT id, owner FROM crdb_internal.databases WHERE name = $1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseInfo {
    pub id: i64,
    pub name: String,
    pub owner: String,
}

/// Read-only lookup of an existing database.
pub struct DatabaseDataSource<'a> {
    provider: &'a Provider,
    local_port: String,
}

impl<'a> DatabaseDataSource<'a> {
    pub fn new(provider: &'a Provider) -> Self {
        Self::with_local_port(provider, DEFAULT_DATA_SOURCE_LOCAL_PORT)
    }

    pub fn with_local_port(provider: &'a Provider, local_port: impl Into<String>) -> Self {
        Self {
            provider,
            local_port: local_port.into(),
        }
    }

    #[tracing::instrument(skip(self), fields(local_port = %self.local_port))]
    pub async fn read(&self, name: &str) -> CrdbResult<DatabaseInfo> {
        require_non_empty(name, "Database name must not be empty")?;

        self.provider
            .run(&self.local_port, async |client: &PgClient| {
                let row = client
                    .query_one(SELECT_DATABASE_INFO, &[&name], "Database not found")
                    .await?;

                Ok(DatabaseInfo {
                    id: row.try_get("id")?,
                    name: name.to_owned(),
                    owner: row.try_get("owner")?,
                })
            })
            .await
    }
}
