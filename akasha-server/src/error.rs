//! Error types for AkashaServer

use akasha_map::MapIoError;
use thiserror::Error;

/// AkashaServer error type
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Map file error: {0}")]
    MapIo(#[from] MapIoError),

    #[error("Thread error: {0}")]
    Thread(String),
}

impl From<toml::de::Error> for ServerError {
    fn from(e: toml::de::Error) -> Self {
        ServerError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
