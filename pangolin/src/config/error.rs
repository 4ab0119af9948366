use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read file {0}: {1}")]
    FileRead(PathBuf, std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Could not determine pangolin home directory: {0}")]
    Home(std::io::Error),

    #[error("{0} is required")]
    MissingRequired(&'static str),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
