//! Error types

use std::io;
use std::sync::Arc;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while configuring, dialing, or building the pool
#[derive(Debug, Error)]
pub enum Error {
    /// A required environment variable is missing or empty
    #[error("Fatal error. {0} env var not set.")]
    MissingEnv(&'static str),

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Instance connection name is not `project:region:instance`
    #[error("invalid instance connection name '{0}': expected PROJECT:REGION:INSTANCE")]
    InvalidInstanceName(String),

    /// Cloud SQL Admin API rejected a request or returned unusable data
    #[error("admin API error: {0}")]
    AdminApi(String),

    /// HTTP transport failure talking to the Admin API or metadata server
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// TLS configuration or handshake failure
    #[error("TLS error: {0}")]
    Tls(String),

    /// Tunnel could not be established
    #[error("dial error: {0}")]
    Dial(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Postgres startup or connection error
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// Pool could not be built
    #[error("pool error: {0}")]
    Pool(String),

    /// The one-time initialization failed; carries the original cause
    #[error("Could not connect: {0}")]
    Init(Arc<Error>),
}

impl Error {
    /// Whether this error (or the initialization failure it wraps) is a configuration problem
    pub fn is_config(&self) -> bool {
        match self {
            Error::MissingEnv(_) | Error::Config(_) | Error::InvalidInstanceName(_) => true,
            Error::Init(inner) => inner.is_config(),
            _ => false,
        }
    }
}
