//! deadpool manager for Postgres clients over a pluggable dial function

use crate::connection::Dial;
use crate::{Error, Result};
use deadpool::managed::{self, Metrics, RecycleError, RecycleResult};
use std::sync::Arc;
use tokio_postgres::{Client, NoTls};
use tracing::Instrument;

/// Creates pooled clients by dialing a stream and running the Postgres startup over it
#[derive(Debug)]
pub struct PgManager {
    pg_config: tokio_postgres::Config,
    dial: Arc<dyn Dial>,
}

impl PgManager {
    /// Manager that authenticates with `pg_config` over streams from `dial`
    pub fn new(pg_config: tokio_postgres::Config, dial: Arc<dyn Dial>) -> Self {
        Self { pg_config, dial }
    }

    /// Driver configuration used for startup
    pub fn pg_config(&self) -> &tokio_postgres::Config {
        &self.pg_config
    }

    /// Dial function used for every new connection
    pub fn dial(&self) -> &Arc<dyn Dial> {
        &self.dial
    }

    async fn connect(&self) -> Result<Client> {
        let stream = self.dial.dial().await?;
        let (client, connection) = self.pg_config.connect_raw(stream, NoTls).await?;

        tokio::spawn(
            async move {
                if let Err(e) = connection.await {
                    tracing::warn!(error = %e, "connection closed with error");
                }
            }
            .in_current_span(),
        );

        Ok(client)
    }
}

impl managed::Manager for PgManager {
    type Type = Client;
    type Error = Error;

    async fn create(&self) -> Result<Client> {
        let result = self
            .connect()
            .instrument(tracing::debug_span!(
                "create_connection",
                user = self.pg_config.get_user().unwrap_or_default(),
                database = self.pg_config.get_dbname().unwrap_or_default()
            ))
            .await;

        crate::metrics::counters::connection_created(result.is_ok());
        if let Err(ref e) = result {
            tracing::warn!(error = %e, "failed to open connection");
        }
        result
    }

    async fn recycle(&self, client: &mut Client, _: &Metrics) -> RecycleResult<Error> {
        if client.is_closed() {
            return Err(RecycleError::Message("connection closed".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{TcpDial, Transport};
    use async_trait::async_trait;
    use deadpool::managed::Manager;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct CountingDial {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Dial for CountingDial {
        async fn dial(&self) -> Result<Transport> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::Dial("no route to instance".into()))
        }
    }

    #[tokio::test]
    async fn test_create_uses_dial_function() {
        let dial = Arc::new(CountingDial::default());
        let manager = PgManager::new(tokio_postgres::Config::new(), dial.clone());

        let err = manager.create().await.err().unwrap();
        assert!(matches!(err, Error::Dial(_)));
        assert_eq!(dial.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_create_refused() {
        let manager = PgManager::new(
            tokio_postgres::Config::new(),
            Arc::new(TcpDial::new("127.0.0.1", 1)),
        );
        let err = manager.create().await.err().unwrap();
        assert!(matches!(err, Error::Io(_)));
    }
}
