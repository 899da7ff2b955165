use anyhow::Context;
use config::{Config, Environment, File};
use pcmkit_audio::config::EngineConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

const CONFIG_DIR: &str = "pcmkit";

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn parse() -> anyhow::Result<Self> {
        let config = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?)
            .add_source(File::with_name(config_file_path("config.toml")?.as_str()).required(false))
            .add_source(File::with_name("config.toml").required(false))
            .add_source(
                Environment::with_prefix("pcmkit")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build config")?
            .try_deserialize::<Self>()
            .context("Failed to deserialize config")?;

        if config.engine.worker.max_in_flight_rounds == 0 {
            anyhow::bail!("Max in-flight rounds must be at least 1");
        }

        Ok(config)
    }
}

pub fn config_file_path(file_name: impl AsRef<Path>) -> anyhow::Result<String> {
    Ok(Path::new("/etc")
        .join(CONFIG_DIR)
        .join(file_name)
        .to_str()
        .context("Failed to build config file path")?
        .to_string())
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Default `tracing` filter directives, overridden by `RUST_LOG`.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: format!("{}=info,pcmkit_audio=info", env!("CARGO_CRATE_NAME")),
        }
    }
}
