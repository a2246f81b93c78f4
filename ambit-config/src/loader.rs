use std::path::{Path, PathBuf};

use config::{Config, Environment, File, FileFormat};
use thiserror::Error;

use crate::models::PipelineConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Read(#[from] config::ConfigError),
}

/// Layers configuration sources: defaults, then an optional TOML file, then
/// `AMBIT__`-prefixed environment variables (`AMBIT__SCOPE__CONFIDENCE_THRESHOLD`).
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    file: PathBuf,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new("ambit.toml")
    }
}

impl ConfigLoader {
    pub fn new(file: impl AsRef<Path>) -> Self {
        Self {
            file: file.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self) -> Result<PipelineConfig, ConfigError> {
        let settings = Config::builder()
            .add_source(
                File::from(self.file.as_path())
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(Environment::with_prefix("AMBIT").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
