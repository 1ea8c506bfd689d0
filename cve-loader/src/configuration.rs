use std::path::PathBuf;

use config::{Config, Environment};
use domain_db::pipeline::PipelineSettings;
use serde::Deserialize;

#[derive(Deserialize, Clone, Debug)]
pub struct EtlSettings {
    pub data_dir: PathBuf,
    pub checkpoint_path: PathBuf,
    pub batch_size: usize,
    pub workers: usize,
    pub channel_capacity: usize,
}

impl EtlSettings {
    pub fn try_from_env() -> Result<Self, config::ConfigError> {
        Config::builder()
            .set_default("data_dir", "./cve_data")?
            .set_default("checkpoint_path", "./processed_data.bin")?
            .set_default("batch_size", 10_000)?
            .set_default("workers", 0)?
            .set_default("channel_capacity", 256)?
            .add_source(Environment::with_prefix("CVE").prefix_separator("_"))
            .build()?
            .try_deserialize::<Self>()
    }

    pub fn pipeline(&self) -> PipelineSettings {
        PipelineSettings {
            workers: self.workers,
            channel_capacity: self.channel_capacity,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    host: String,
    port: u16,
    user: String,
    password: String,
    database: String,
}

impl DatabaseSettings {
    pub fn try_from_env() -> Result<Self, config::ConfigError> {
        Config::builder()
            .set_default("port", 5432)?
            .add_source(Environment::with_prefix("DB").prefix_separator("_"))
            .build()?
            .try_deserialize::<Self>()
    }

    pub fn connection_string(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}
