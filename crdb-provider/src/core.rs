use crdb::provider::Provider;
use crdb::resources::{
    BackupScheduleResource, DatabaseDataSource, DatabaseResource, DatabaseSpec, UserResource,
    UserSpec,
};
use crdb_config::shared::{KubeConfig, ProviderConfig};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::cli::{
    BackupCommand, Command, DataDatabaseCommand, DatabaseCommand, UserArgs, UserCommand,
};

/// Builds the provider once and runs `command` against it.
///
/// Returns the resulting state, or `null` for deletions.
pub async fn run_command(provider_config: ProviderConfig, command: Command) -> anyhow::Result<Value> {
    log_config(&provider_config);

    let provider = Provider::new(&provider_config).await?;

    let state = match command {
        Command::Database(command) => run_database_command(&provider, command).await?,
        Command::User(command) => run_user_command(&provider, command).await?,
        Command::Backup(command) => run_backup_command(&provider, command).await?,
        Command::DataDatabase(DataDatabaseCommand::Read { name, local_port }) => to_value(
            DatabaseDataSource::with_local_port(&provider, local_port)
                .read(&name)
                .await?,
        )?,
    };

    info!("command completed");

    Ok(state)
}

async fn run_database_command(provider: &Provider, command: DatabaseCommand) -> anyhow::Result<Value> {
    match command {
        DatabaseCommand::Create {
            database,
            local_port,
        } => {
            let spec = DatabaseSpec::from(database);
            to_value(
                DatabaseResource::with_local_port(provider, local_port)
                    .create(&spec)
                    .await?,
            )
        }
        DatabaseCommand::Read { name, local_port } => to_value(
            DatabaseResource::with_local_port(provider, local_port)
                .read(&name)
                .await?,
        ),
        DatabaseCommand::Update {
            prior,
            desired,
            local_port,
        } => to_value(
            DatabaseResource::with_local_port(provider, local_port)
                .update(&prior, &desired)
                .await?,
        ),
        DatabaseCommand::Delete { name, local_port } => {
            DatabaseResource::with_local_port(provider, local_port)
                .delete(&name)
                .await?;
            Ok(Value::Null)
        }
        DatabaseCommand::Import { name, local_port } => to_value(
            DatabaseResource::with_local_port(provider, local_port)
                .import(&name)
                .await?,
        ),
    }
}

async fn run_user_command(provider: &Provider, command: UserCommand) -> anyhow::Result<Value> {
    match command {
        UserCommand::Create { user, local_port } => to_value(
            UserResource::with_local_port(provider, local_port)
                .create(&user.into_spec())
                .await?,
        ),
        UserCommand::Read {
            username,
            local_port,
        } => to_value(
            UserResource::with_local_port(provider, local_port)
                .read(&username)
                .await?,
        ),
        UserCommand::Update {
            user,
            prior_password,
            prior_options,
            prior_admin,
            local_port,
        } => {
            let prior = prior_user(&user, prior_password, prior_options, prior_admin);
            to_value(
                UserResource::with_local_port(provider, local_port)
                    .update(&prior, &user.into_spec())
                    .await?,
            )
        }
        UserCommand::Delete {
            username,
            local_port,
        } => {
            UserResource::with_local_port(provider, local_port)
                .delete(&username)
                .await?;
            Ok(Value::Null)
        }
        UserCommand::Import {
            username,
            local_port,
        } => to_value(
            UserResource::with_local_port(provider, local_port)
                .import(&username)
                .await?,
        ),
    }
}

fn prior_user(
    desired: &UserArgs,
    prior_password: Option<String>,
    prior_options: String,
    prior_admin: bool,
) -> UserSpec {
    UserSpec {
        username: desired.username.clone(),
        password: prior_password.map(Into::into),
        options: prior_options,
        is_admin: prior_admin,
    }
}

async fn run_backup_command(provider: &Provider, command: BackupCommand) -> anyhow::Result<Value> {
    match command {
        BackupCommand::Create {
            schedule,
            local_port,
        } => to_value(
            BackupScheduleResource::with_local_port(provider, local_port)
                .create(&schedule.into())
                .await?,
        ),
        BackupCommand::Read { id, local_port } => to_value(
            BackupScheduleResource::with_local_port(provider, local_port)
                .read(id)
                .await?,
        ),
        BackupCommand::Delete { id, local_port } => {
            BackupScheduleResource::with_local_port(provider, local_port)
                .delete(id)
                .await?;
            Ok(Value::Null)
        }
    }
}

fn to_value<T: Serialize>(state: T) -> anyhow::Result<Value> {
    Ok(serde_json::to_value(state)?)
}

fn log_config(config: &ProviderConfig) {
    debug!(
        username = %config.username,
        direct = config.dns.is_some() && config.kube_config.is_none(),
        tunnel_ready_timeout_ms = config.tunnel_ready_timeout_ms,
        "provider config"
    );

    if let Some(kube_config) = &config.kube_config {
        log_kube_config(kube_config);
    }
}

fn log_kube_config(config: &KubeConfig) {
    debug!(
        kube_config_path = %config.kube_config_path,
        namespace = %config.namespace,
        service_name = %config.service_name,
        remote_port = %config.remote_port,
        "kube config"
    );
}
