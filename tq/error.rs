use std::io::Error as IoError;
use thiserror::Error;
use zbus::Error as ZbusError;

#[derive(Error, Debug)]
pub enum App {
    #[error("I/O operation failed: {0}")]
    Io(#[from] IoError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Environment variable error")]
    EnvVar(#[from] std::env::VarError),
    #[error("Player list is corrupt: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Preferences are corrupt: {0}")]
    TomlDe(#[from] toml::de::Error),
    #[error("Failed to write preferences: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Zbus error: {0}")]
    Zbus(#[from] ZbusError),
}
