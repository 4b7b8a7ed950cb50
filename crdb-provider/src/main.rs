use clap::Parser;
use crdb_config::shared::ProviderConfig;
use crdb_telemetry::init_tracing;
use tracing::error;

use crate::cli::{AppArgs, Command};
use crate::config::load_provider_config;
use crate::core::run_command;

mod cli;
mod config;
mod core;

fn main() -> anyhow::Result<()> {
    let args = AppArgs::parse();

    let provider_config = load_provider_config()?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"))?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(provider_config, args.command))?;

    Ok(())
}

async fn async_main(provider_config: ProviderConfig, command: Command) -> anyhow::Result<()> {
    let state = match run_command(provider_config, command).await {
        Ok(state) => state,
        Err(err) => {
            error!("an error occurred in the provider: {err}");
            return Err(err);
        }
    };

    println!("{}", serde_json::to_string_pretty(&state)?);

    Ok(())
}
