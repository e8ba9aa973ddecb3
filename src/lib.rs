//! dataconnect: a process-wide Postgres connection pool for Cloud SQL
//!
//! The pool is built once, from environment variables, using one of two strategies:
//!
//! * **Connector**: when `INSTANCE_CONNECTION_NAME` is set, every connection is dialed
//!   through a TLS tunnel to the instance's server-side proxy, authenticated with an
//!   ephemeral client certificate from the Cloud SQL Admin API.
//! * **Direct TCP**: otherwise, connections go to `INSTANCE_HOST:DB_PORT` over plain TCP.
//!
//! # Examples
//!
//! ```no_run
//! # async fn example() -> dataconnect::Result<()> {
//! use dataconnect::ConnectionProvider;
//!
//! let provider = ConnectionProvider::from_env();
//! let pool = provider.get().await?;
//!
//! // Every later call hands out the same pool.
//! let again = provider.get().await?;
//! assert!(std::sync::Arc::ptr_eq(&pool, &again));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod connection;
pub mod connector;
pub mod error;
pub mod metrics;
pub mod pool;
pub mod provider;

pub use config::{ConnectionDetails, EnvSource, ProcessEnv};
pub use error::{Error, Result};
pub use pool::{Pool, PoolOptions};
pub use provider::{ConnectionProvider, PgPoolFactory, PoolFactory, Strategy};
