use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown provider strategy '{0}' (expected fallback, roundrobin or no-fallback)")]
    InvalidStrategy(String),

    #[error("Invalid SMTP port '{0}' (expected a number between 1 and 65535)")]
    InvalidSmtpPort(String),

    #[error("Failed to load env file {path}: {message}")]
    Dotenv { path: PathBuf, message: String },
}
