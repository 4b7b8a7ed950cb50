use clap::{Args, Parser, Subcommand};
use crdb::resources::{
    BackupScheduleSpec, DEFAULT_BACKUP_LOCAL_PORT, DEFAULT_DATA_SOURCE_LOCAL_PORT,
    DEFAULT_DATABASE_LOCAL_PORT, DEFAULT_FULL_BACKUP, DEFAULT_RECURRING, DEFAULT_USER_LOCAL_PORT,
    DatabaseSpec, UserSpec,
};

// Provider settings come from `configuration/` and `APP_*` variables, the
// command line only selects the resource operation.
#[derive(Debug, Parser)]
#[command(name = "crdb-provider", version, about, arg_required_else_help = true)]
pub struct AppArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage databases
    #[command(subcommand)]
    Database(DatabaseCommand),
    /// Manage SQL users
    #[command(subcommand)]
    User(UserCommand),
    /// Manage backup schedules
    #[command(subcommand)]
    Backup(BackupCommand),
    /// Look up an existing database
    #[command(name = "data-database", subcommand)]
    DataDatabase(DataDatabaseCommand),
}

#[derive(Debug, Subcommand)]
pub enum DatabaseCommand {
    Create {
        #[command(flatten)]
        database: DatabaseArgs,
        #[arg(long, default_value = DEFAULT_DATABASE_LOCAL_PORT)]
        local_port: String,
    },
    Read {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = DEFAULT_DATABASE_LOCAL_PORT)]
        local_port: String,
    },
    /// Move a database from one configuration to another, both given as JSON
    Update {
        /// Current configuration, e.g. '{"name":"analytics","regions":["us-east1"]}'
        #[arg(long, value_parser = parse_database_spec)]
        prior: DatabaseSpec,
        /// Desired configuration
        #[arg(long, value_parser = parse_database_spec)]
        desired: DatabaseSpec,
        #[arg(long, default_value = DEFAULT_DATABASE_LOCAL_PORT)]
        local_port: String,
    },
    Delete {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = DEFAULT_DATABASE_LOCAL_PORT)]
        local_port: String,
    },
    Import {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = DEFAULT_DATABASE_LOCAL_PORT)]
        local_port: String,
    },
}

#[derive(Debug, Args)]
pub struct DatabaseArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub owner: Option<String>,
    /// Character encoding, e.g. UTF8
    #[arg(long)]
    pub encoding: Option<String>,
    #[arg(long)]
    pub primary_region: Option<String>,
    /// Additional regions, repeat for several
    #[arg(long = "region")]
    pub regions: Vec<String>,
}

impl From<DatabaseArgs> for DatabaseSpec {
    fn from(args: DatabaseArgs) -> Self {
        DatabaseSpec {
            name: args.name,
            owner: args.owner,
            encoding: args.encoding,
            primary_region: args.primary_region,
            regions: args.regions,
        }
    }
}

fn parse_database_spec(value: &str) -> Result<DatabaseSpec, String> {
    serde_json::from_str(value).map_err(|err| format!("invalid database JSON: {err}"))
}

#[derive(Debug, Subcommand)]
pub enum UserCommand {
    Create {
        #[command(flatten)]
        user: UserArgs,
        #[arg(long, default_value = DEFAULT_USER_LOCAL_PORT)]
        local_port: String,
    },
    Read {
        #[arg(long)]
        username: String,
        #[arg(long, default_value = DEFAULT_USER_LOCAL_PORT)]
        local_port: String,
    },
    Update {
        #[command(flatten)]
        user: UserArgs,
        /// Password currently set, to detect a change
        #[arg(long, env = "CRDB_USER_PRIOR_PASSWORD", hide_env_values = true)]
        prior_password: Option<String>,
        /// Role options currently set
        #[arg(long, default_value = "")]
        prior_options: String,
        /// Whether the user is currently an admin
        #[arg(long)]
        prior_admin: bool,
        #[arg(long, default_value = DEFAULT_USER_LOCAL_PORT)]
        local_port: String,
    },
    Delete {
        #[arg(long)]
        username: String,
        #[arg(long, default_value = DEFAULT_USER_LOCAL_PORT)]
        local_port: String,
    },
    Import {
        #[arg(long)]
        username: String,
        #[arg(long, default_value = DEFAULT_USER_LOCAL_PORT)]
        local_port: String,
    },
}

#[derive(Debug, Args)]
pub struct UserArgs {
    #[arg(long)]
    pub username: String,
    /// Password of the user, omit to create a user without one
    #[arg(long, env = "CRDB_USER_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
    /// Role options appended verbatim, e.g. "CREATEDB CREATEROLE"
    #[arg(long, default_value = "")]
    pub options: String,
    /// Grant the admin role
    #[arg(long)]
    pub admin: bool,
}

impl UserArgs {
    pub fn into_spec(self) -> UserSpec {
        UserSpec {
            username: self.username,
            password: self.password.map(Into::into),
            options: self.options,
            is_admin: self.admin,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum BackupCommand {
    Create {
        #[command(flatten)]
        schedule: BackupArgs,
        #[arg(long, default_value = DEFAULT_BACKUP_LOCAL_PORT)]
        local_port: String,
    },
    Read {
        #[arg(long)]
        id: i64,
        #[arg(long, default_value = DEFAULT_BACKUP_LOCAL_PORT)]
        local_port: String,
    },
    Delete {
        #[arg(long)]
        id: i64,
        #[arg(long, default_value = DEFAULT_BACKUP_LOCAL_PORT)]
        local_port: String,
    },
}

#[derive(Debug, Args)]
pub struct BackupArgs {
    /// Label of the schedule
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub database_name: String,
    /// Collection URI, e.g. s3://bucket/path?AUTH=implicit
    #[arg(long)]
    pub backup_path: String,
    #[arg(long, default_value = DEFAULT_FULL_BACKUP)]
    pub full_backup: String,
    #[arg(long, default_value = DEFAULT_RECURRING)]
    pub recurring: String,
    /// Backup option, repeat for several
    #[arg(long = "option")]
    pub options: Vec<String>,
}

impl From<BackupArgs> for BackupScheduleSpec {
    fn from(args: BackupArgs) -> Self {
        BackupScheduleSpec {
            name: args.name,
            database_name: args.database_name,
            backup_path: args.backup_path,
            full_backup: args.full_backup,
            recurring: args.recurring,
            options: args.options,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum DataDatabaseCommand {
    Read {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = DEFAULT_DATA_SOURCE_LOCAL_PORT)]
        local_port: String,
    },
}
