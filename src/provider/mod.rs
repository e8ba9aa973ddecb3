//! The connection provider
//!
//! Owns the single pool for the process. The first call to
//! [`ConnectionProvider::get`] reads the configuration, picks a strategy and
//! builds the pool; concurrent first callers wait for that one attempt, and every
//! later caller gets the same handle. A failed attempt is remembered: it is never
//! retried, so all callers see the same error.

mod factory;

pub use factory::{build_dialer, default_dial_options, PgPoolFactory, PoolFactory, Strategy};

use crate::config::{ConnectionDetails, EnvSource, ProcessEnv};
use crate::pool::Pool;
use crate::{Error, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, OnceLock};
use tracing::Instrument;

type InitResult = std::result::Result<Arc<Pool>, Arc<Error>>;

/// The one initialization attempt, runnable to completion by any waiter
type SharedInit = Shared<BoxFuture<'static, InitResult>>;

/// Lazily builds, then hands out, the shared pool
pub struct ConnectionProvider<F = PgPoolFactory> {
    env: Arc<dyn EnvSource>,
    factory: Arc<F>,
    init: OnceLock<SharedInit>,
}

impl ConnectionProvider<PgPoolFactory> {
    /// Provider reading the process environment and building real pools
    pub fn from_env() -> Self {
        Self::new(ProcessEnv, PgPoolFactory::default())
    }
}

impl<F> ConnectionProvider<F> {
    /// The pool factory
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Whether a caller has seen initialization finish (successfully or not)
    pub fn is_initialized(&self) -> bool {
        self.init.get().and_then(|init| init.peek()).is_some()
    }
}

impl<F: PoolFactory + 'static> ConnectionProvider<F> {
    /// Provider with an explicit variable source and pool factory
    pub fn new(env: impl EnvSource + 'static, factory: F) -> Self {
        Self {
            env: Arc::new(env),
            factory: Arc::new(factory),
            init: OnceLock::new(),
        }
    }

    /// Return the shared pool, building it on first use
    ///
    /// The build runs on its own task, so a caller that is cancelled while waiting
    /// does not abandon it; later callers wait for that same attempt.
    ///
    /// # Errors
    ///
    /// Returns `Error::Init` wrapping the original cause if initialization failed,
    /// on this call or any earlier one.
    pub async fn get(&self) -> Result<Arc<Pool>> {
        let init = self.init.get_or_init(|| self.start()).clone();
        init.await.map_err(Error::Init)
    }

    fn start(&self) -> SharedInit {
        let attempt = initialize(self.env.clone(), self.factory.clone());
        let task = tokio::spawn(attempt.in_current_span());
        async move {
            task.await.unwrap_or_else(|e| {
                tracing::error!(error = %e, "connection pool initialization task failed");
                Err(Arc::new(Error::Pool(format!("initialization task failed: {}", e))))
            })
        }
        .boxed()
        .shared()
    }
}

async fn initialize<F: PoolFactory>(env: Arc<dyn EnvSource>, factory: Arc<F>) -> InitResult {
    let span = tracing::info_span!("initialize_pool", strategy = tracing::field::Empty);
    async {
        let details = ConnectionDetails::from_source(env.as_ref())?;
        let strategy = Strategy::select(&details);
        tracing::Span::current().record("strategy", strategy.as_str());

        let result = match strategy {
            Strategy::Connector => factory.connect_with_connector(&details).await,
            Strategy::DirectTcp => factory.connect_tcp_socket(&details).await,
        };
        crate::metrics::counters::pool_initialized(strategy.as_str(), result.is_ok());

        let pool = result?;
        tracing::info!(max_size = pool.status().max_size, "connection pool ready");
        Ok::<_, Error>(Arc::new(pool))
    }
    .instrument(span)
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "connection pool initialization failed");
        Arc::new(e)
    })
}

impl<F> std::fmt::Debug for ConnectionProvider<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionProvider")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
