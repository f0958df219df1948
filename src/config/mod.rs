use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::error::ConfigError;

pub const ENV_PREFIX: &str = "ETA";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub model_path: PathBuf,
    pub preprocessor_path: PathBuf,
    pub log_format: LogFormat,
}

impl Config {
    /// Defaults overlaid with `ETA_*` environment variables, e.g. `ETA_PORT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let settings = config::Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 8000)?
            .set_default("model_path", "models/delivery_time_pred_model.json")?
            .set_default("preprocessor_path", "models/preprocessor.json")?
            .set_default("log_format", "pretty")?
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be non-zero".to_string()));
        }
        self.host
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::Invalid(format!("host {:?}: {}", self.host, e)))?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("host {:?}: {}", self.host, e)))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}
