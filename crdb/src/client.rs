use secrecy::{ExposeSecret, SecretString};
use tokio_postgres::tls::NoTlsStream;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, Config, Connection, NoTls, Row, Socket};
use tracing::{Instrument, debug, error, info};

use crate::error::{CrdbResult, ErrorKind};
use crate::{bail, crdb_error};

/// Spawns a background task driving `connection` until it terminates.
fn spawn_postgres_connection(connection: Connection<Socket, NoTlsStream>) {
    let span = tracing::Span::current();
    let task = async move {
        if let Err(e) = connection.await {
            error!("an error occurred during the CockroachDB connection: {}", e);
            return;
        }

        debug!("cockroachdb connection terminated successfully")
    }
    .instrument(span);

    tokio::spawn(task);
}

/// A single CockroachDB session opened for one resource operation.
///
/// The session is closed when the client is dropped.
pub struct PgClient {
    client: Client,
}

impl PgClient {
    /// Connects with `connection_string` and checks the session with a ping.
    pub async fn connect(connection_string: &SecretString) -> CrdbResult<PgClient> {
        let config: Config = match connection_string.expose_secret().parse() {
            Ok(config) => config,
            Err(err) => bail!(
                ErrorKind::ConfigurationError,
                "Invalid CockroachDB connection string",
                err
            ),
        };

        let (client, connection) = config.connect(NoTls).await?;
        spawn_postgres_connection(connection);

        let client = PgClient { client };
        client.ping().await?;

        info!("successfully connected to cockroachdb");

        Ok(client)
    }

    pub async fn ping(&self) -> CrdbResult<()> {
        self.client.simple_query("SELECT 1").await?;

        Ok(())
    }

    /// Runs one or more statements without parameters.
    ///
    /// Statement text is never logged since it may carry credentials.
    pub async fn execute(&self, statement: &str) -> CrdbResult<()> {
        self.client.batch_execute(statement).await?;

        Ok(())
    }

    pub async fn query(
        &self,
        statement: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> CrdbResult<Vec<Row>> {
        Ok(self.client.query(statement, params).await?)
    }

    pub async fn query_opt(
        &self,
        statement: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> CrdbResult<Option<Row>> {
        Ok(self.client.query_opt(statement, params).await?)
    }

    /// Like [`PgClient::query_opt`], failing with [`ErrorKind::NotFound`] when no row matches.
    pub async fn query_one(
        &self,
        statement: &str,
        params: &[&(dyn ToSql + Sync)],
        what: &'static str,
    ) -> CrdbResult<Row> {
        self.query_opt(statement, params)
            .await?
            .ok_or_else(|| crdb_error!(ErrorKind::NotFound, what))
    }

    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }
}
