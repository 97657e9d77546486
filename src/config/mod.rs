mod settings;

use config::{Config, ConfigError, Environment, File};

use crate::config::settings::PartialSettings;

pub use settings::{
    AuthSettings, LoggingSettings, ProtocolSettings, SchedulerSettings, ServerSettings, SessionSettings, Settings,
};

/// Prefix for environment overrides. Sections are split by `__`, so
/// `CHATWIRE_SERVER__MAX_CONNECTIONS=50` sets `server.max_connections`.
pub const ENV_PREFIX: &str = "CHATWIRE";

/// Loads the configuration from `config/default.*` and environment variables
/// Merges the configuration with default values
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from("config/default")
}

/// Like [`load_config`], reading the optional file at `path` (extension optional).
///
/// A `.env` file in the working directory is loaded into the environment first.
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    dotenvy::dotenv().ok();

    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX).prefix_separator("_").separator("__"));

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge_over(Settings::default()))
}

#[cfg(test)]
mod tests;
