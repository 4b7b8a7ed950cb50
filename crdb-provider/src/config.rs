use crdb_config::load_config;
use crdb_config::shared::ProviderConfig;

/// Loads the [`ProviderConfig`] and validates it.
pub fn load_provider_config() -> anyhow::Result<ProviderConfig> {
    let config = load_config::<ProviderConfig>()?;
    config.validate()?;

    Ok(config)
}
