use pg_escape::{quote_identifier, quote_literal};
use serde::{Deserialize, Serialize};

use crate::client::PgClient;
use crate::error::CrdbResult;
use crate::provider::Provider;
use crate::resources::require_non_empty;

pub const DEFAULT_BACKUP_LOCAL_PORT: &str = "26260";
pub const DEFAULT_RECURRING: &str = "@daily";
pub const DEFAULT_FULL_BACKUP: &str = "ALWAYS";

const SELECT_SCHEDULE_ID: &str = "SELECT schedule_id FROM system.scheduled_jobs \
     WHERE schedule_name = $1 ORDER BY schedule_id DESC LIMIT 1";

const SELECT_SCHEDULE: &str = "SELECT schedule_id, schedule_name, schedule_expr \
     FROM system.scheduled_jobs WHERE schedule_id = $1";

/// A recurring backup of one database.
///
/// Schedules are never altered in place: any change means dropping the
/// schedule and creating a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupScheduleSpec {
    /// Label of the schedule.
    pub name: String,
    pub database_name: String,
    /// Collection URI, e.g. `s3://bucket/path?AUTH=implicit`.
    pub backup_path: String,
    /// `ALWAYS` or a cron expression for full backups.
    #[serde(default = "default_full_backup")]
    pub full_backup: String,
    /// Cron expression for incremental backups.
    #[serde(default = "default_recurring")]
    pub recurring: String,
    /// Backup options such as `revision_history`.
    #[serde(default)]
    pub options: Vec<String>,
}

fn default_full_backup() -> String {
    DEFAULT_FULL_BACKUP.to_owned()
}

fn default_recurring() -> String {
    DEFAULT_RECURRING.to_owned()
}

impl BackupScheduleSpec {
    pub fn new(
        name: impl Into<String>,
        database_name: impl Into<String>,
        backup_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            database_name: database_name.into(),
            backup_path: backup_path.into(),
            full_backup: default_full_backup(),
            recurring: default_recurring(),
            options: Vec::new(),
        }
    }

    fn validate(&self) -> CrdbResult<()> {
        require_non_empty(&self.name, "Schedule name must not be empty")?;
        require_non_empty(&self.database_name, "Database name must not be empty")?;
        require_non_empty(&self.backup_path, "Backup path must not be empty")?;
        require_non_empty(&self.recurring, "Recurrence must not be empty")?;
        require_non_empty(&self.full_backup, "Full backup recurrence must not be empty")
    }
}

/// A backup schedule as reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupScheduleState {
    pub id: i64,
    pub name: String,
    pub recurring: Option<String>,
}

/// Manages backup schedules.
pub struct BackupScheduleResource<'a> {
    provider: &'a Provider,
    local_port: String,
}

impl<'a> BackupScheduleResource<'a> {
    pub fn new(provider: &'a Provider) -> Self {
        Self::with_local_port(provider, DEFAULT_BACKUP_LOCAL_PORT)
    }

    pub fn with_local_port(provider: &'a Provider, local_port: impl Into<String>) -> Self {
        Self {
            provider,
            local_port: local_port.into(),
        }
    }

    #[tracing::instrument(skip_all, fields(schedule = %spec.name, local_port = %self.local_port))]
    pub async fn create(&self, spec: &BackupScheduleSpec) -> CrdbResult<BackupScheduleState> {
        spec.validate()?;

        let create = create_schedule_statement(spec);

        self.provider
            .run(&self.local_port, async |client: &PgClient| {
                client.execute(&create).await?;

                let row = client
                    .query_one(SELECT_SCHEDULE_ID, &[&spec.name], "Backup schedule not found")
                    .await?;
                let id: i64 = row.try_get("schedule_id")?;

                read_schedule(client, id).await
            })
            .await
    }

    #[tracing::instrument(skip(self), fields(local_port = %self.local_port))]
    pub async fn read(&self, id: i64) -> CrdbResult<BackupScheduleState> {
        self.provider
            .run(&self.local_port, async |client: &PgClient| {
                read_schedule(client, id).await
            })
            .await
    }

    #[tracing::instrument(skip(self), fields(local_port = %self.local_port))]
    pub async fn delete(&self, id: i64) -> CrdbResult<()> {
        let statement = format!("DROP SCHEDULE {id}");
        self.provider
            .run(&self.local_port, async |client: &PgClient| {
                client.execute(&statement).await
            })
            .await
    }
}

async fn read_schedule(client: &PgClient, id: i64) -> CrdbResult<BackupScheduleState> {
    let row = client
        .query_one(SELECT_SCHEDULE, &[&id], "Backup schedule not found")
        .await?;

    Ok(BackupScheduleState {
        id: row.try_get("schedule_id")?,
        name: row.try_get("schedule_name")?,
        recurring: row.try_get("schedule_expr")?,
    })
}

pub fn create_schedule_statement(spec: &BackupScheduleSpec) -> String {
    let mut statement = format!(
        "CREATE SCHEDULE {} FOR BACKUP DATABASE {} INTO {}",
        quote_literal(&spec.name),
        quote_identifier(&spec.database_name),
        quote_literal(&spec.backup_path)
    );

    let options = spec
        .options
        .iter()
        .map(|option| option.trim())
        .filter(|option| !option.is_empty())
        .collect::<Vec<_>>();
    if !options.is_empty() {
        statement.push_str(" WITH ");
        statement.push_str(&options.join(", "));
    }

    statement.push_str(" RECURRING ");
    statement.push_str(&quote_literal(&spec.recurring));

    statement.push_str(" FULL BACKUP ");
    if spec.full_backup.eq_ignore_ascii_case(DEFAULT_FULL_BACKUP) {
        statement.push_str(DEFAULT_FULL_BACKUP);
    } else {
        statement.push_str(&quote_literal(&spec.full_backup));
    }

    statement
}
