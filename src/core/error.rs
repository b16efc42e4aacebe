//! Error types for voxpage

use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Pager error: {0}")]
    Pager(String),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid volume slot: {0}")]
    InvalidSlot(usize),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}
