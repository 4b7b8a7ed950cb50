use std::path::Path;

use serde::de::DeserializeOwned;

use crate::environment::Environment;

/// Directory containing configuration files relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Base configuration file loaded for all environments.
const BASE_CONFIG_FILE: &str = "base.yaml";

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "APP";

/// Separator between environment variable prefix and key segments.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested configuration keys in environment variables.
///
/// Example: `APP_KUBE_CONFIG__NAMESPACE` sets the `kube_config.namespace` field.
const ENV_SEPARATOR: &str = "__";

/// Loads configuration from `./configuration` and the environment.
///
/// See [`load_config_from_dir`] for the layering rules.
pub fn load_config<T>() -> Result<T, config::ConfigError>
where
    T: DeserializeOwned,
{
    let base_path = std::env::current_dir().map_err(|err| {
        config::ConfigError::Message(format!("failed to determine the current directory: {err}"))
    })?;

    load_config_from_dir(base_path.join(CONFIGURATION_DIR))
}

/// Loads hierarchical configuration from `configuration_directory`.
///
/// Sources are applied in this order, later ones overriding earlier ones:
/// 1. `base.yaml`
/// 2. `{environment}.yaml`, where the environment comes from `APP_ENVIRONMENT`
/// 3. environment variables prefixed with `APP`, nested keys separated by `__`
///
/// Both files are optional so a provider can be configured from the
/// environment alone.
pub fn load_config_from_dir<T>(configuration_directory: impl AsRef<Path>) -> Result<T, config::ConfigError>
where
    T: DeserializeOwned,
{
    let configuration_directory = configuration_directory.as_ref();

    let environment = Environment::load()
        .map_err(|err| config::ConfigError::Message(format!("failed to parse APP_ENVIRONMENT: {err}")))?;
    let environment_filename = format!("{environment}.yaml");

    let environment_source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR);

    let settings = config::Config::builder()
        .add_source(config::File::from(configuration_directory.join(BASE_CONFIG_FILE)).required(false))
        .add_source(
            config::File::from(configuration_directory.join(environment_filename)).required(false),
        )
        .add_source(environment_source)
        .build()?;

    settings.try_deserialize::<T>()
}
