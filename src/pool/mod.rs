//! Connection pool
//!
//! Building a pool never touches the network: connections are dialed on first
//! checkout, the same way `database/sql`-style pools behave.

mod manager;

pub use manager::PgManager;

use crate::{Error, Result};
use deadpool::Runtime;
use std::time::Duration;

/// Shared pool of `tokio_postgres::Client`s
pub type Pool = deadpool::managed::Pool<PgManager>;

/// A checked-out client; returns to the pool on drop
pub type Object = deadpool::managed::Object<PgManager>;

/// Error from checking out a client
pub type PoolError = deadpool::managed::PoolError<Error>;

/// Pool sizing and timeouts
///
/// Timeouts are enforced with tokio timers; `None` waits indefinitely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolOptions {
    /// Maximum number of connections (deadpool's default when `None`)
    pub max_size: Option<usize>,
    /// How long a checkout waits for a free slot
    pub wait_timeout: Option<Duration>,
    /// How long dialing plus startup may take
    pub create_timeout: Option<Duration>,
    /// How long recycling a returned client may take
    pub recycle_timeout: Option<Duration>,
}

impl PoolOptions {
    /// Set the maximum pool size
    pub fn max_size(mut self, max_size: usize) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// Set the checkout wait timeout
    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = Some(timeout);
        self
    }

    /// Set the connection create timeout
    pub fn create_timeout(mut self, timeout: Duration) -> Self {
        self.create_timeout = Some(timeout);
        self
    }

    /// Set the recycle timeout
    pub fn recycle_timeout(mut self, timeout: Duration) -> Self {
        self.recycle_timeout = Some(timeout);
        self
    }
}

/// Build a pool around `manager`
pub fn build(manager: PgManager, options: &PoolOptions) -> Result<Pool> {
    let mut builder = Pool::builder(manager)
        .runtime(Runtime::Tokio1)
        .wait_timeout(options.wait_timeout)
        .create_timeout(options.create_timeout)
        .recycle_timeout(options.recycle_timeout);
    if let Some(max_size) = options.max_size {
        builder = builder.max_size(max_size);
    }
    builder.build().map_err(|e| Error::Pool(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::TcpDial;
    use std::sync::Arc;

    fn manager() -> PgManager {
        PgManager::new(
            tokio_postgres::Config::new(),
            Arc::new(TcpDial::new("127.0.0.1", 1)),
        )
    }

    #[test]
    fn test_build_is_lazy() {
        let pool = build(manager(), &PoolOptions::default().max_size(4)).unwrap();
        let status = pool.status();
        assert_eq!(status.max_size, 4);
        assert_eq!(status.size, 0);
    }

    #[tokio::test]
    async fn test_checkout_surfaces_dial_error() {
        let pool = build(
            manager(),
            &PoolOptions::default().create_timeout(Duration::from_secs(5)),
        )
        .unwrap();
        let err = pool.get().await.err().unwrap();
        assert!(matches!(err, PoolError::Backend(Error::Io(_))));
    }
}
