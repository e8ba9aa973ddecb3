//! Pool construction strategies

use crate::config::ConnectionDetails;
use crate::connection::{dsn, ConnectionInfo, TcpDial, TunnelDial};
use crate::connector::{DialOptions, Dialer, InstanceConnectionName, StaticToken};
use crate::pool::{self, PgManager, Pool, PoolOptions};
use crate::Result;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// How the pool reaches the database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// TLS tunnel through the Cloud SQL connector
    Connector,
    /// Plain TCP to host and port
    DirectTcp,
}

impl Strategy {
    /// Connector when an instance connection name is set, direct TCP otherwise
    pub fn select(details: &ConnectionDetails) -> Self {
        if details.uses_connector() {
            Self::Connector
        } else {
            Self::DirectTcp
        }
    }

    /// Label used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connector => crate::metrics::labels::STRATEGY_CONNECTOR,
            Self::DirectTcp => crate::metrics::labels::STRATEGY_TCP,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Builds the pool for each strategy
///
/// The provider only decides which method to call; swapping the factory is how
/// tests observe that decision without touching the network.
#[async_trait]
pub trait PoolFactory: Send + Sync {
    /// Build a pool whose connections go through the tunnel dialer
    async fn connect_with_connector(&self, details: &ConnectionDetails) -> Result<Pool>;

    /// Build a pool whose connections use plain TCP
    async fn connect_tcp_socket(&self, details: &ConnectionDetails) -> Result<Pool>;
}

/// The production factory
#[derive(Debug, Clone, Default)]
pub struct PgPoolFactory {
    options: PoolOptions,
}

impl PgPoolFactory {
    /// Factory applying `options` to every pool it builds
    pub fn new(options: PoolOptions) -> Self {
        Self { options }
    }

    /// Pool options in use
    pub fn options(&self) -> &PoolOptions {
        &self.options
    }
}

/// Dial options the tunnel dialer gets by default
pub fn default_dial_options(details: &ConnectionDetails) -> DialOptions {
    if details.uses_private_ip() {
        DialOptions::default().private_ip()
    } else {
        DialOptions::default()
    }
}

/// Tunnel dialer configured from the connection details
pub fn build_dialer(details: &ConnectionDetails) -> Result<Dialer> {
    let mut builder = Dialer::builder().default_dial_options(default_dial_options(details));
    if let Some(ref token) = details.access_token {
        builder = builder.token_source(Arc::new(StaticToken::new(token.clone())));
    }
    builder.build()
}

#[async_trait]
impl PoolFactory for PgPoolFactory {
    async fn connect_with_connector(&self, details: &ConnectionDetails) -> Result<Pool> {
        let info = ConnectionInfo::parse(&dsn::connector_dsn(details))?;
        let instance = InstanceConnectionName::parse(&details.instance_connection_name)?;
        let dialer = Arc::new(build_dialer(details)?);

        tracing::debug!(
            ip_type = %dialer.default_dial_options().ip_type,
            "tunnel dialer ready"
        );
        let dial = TunnelDial::new(dialer, instance);
        pool::build(
            PgManager::new(info.to_pg_config(), Arc::new(dial)),
            &self.options,
        )
    }

    async fn connect_tcp_socket(&self, details: &ConnectionDetails) -> Result<Pool> {
        let info = ConnectionInfo::parse(&dsn::tcp_dsn(details))?;
        let dial = TcpDial::new(info.host_or_default(), info.port_or_default());

        tracing::debug!(host = dial.host(), port = dial.port(), "tcp dial ready");
        pool::build(
            PgManager::new(info.to_pg_config(), Arc::new(dial)),
            &self.options,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::IpType;
    use crate::Error;

    fn details() -> ConnectionDetails {
        ConnectionDetails {
            user: "u".into(),
            password: "p".into(),
            database: "d".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_select_direct_tcp() {
        assert_eq!(Strategy::select(&details()), Strategy::DirectTcp);
    }

    #[test]
    fn test_select_connector() {
        let details = ConnectionDetails {
            instance_connection_name: "proj:us-central1:inst".into(),
            ..details()
        };
        assert_eq!(Strategy::select(&details), Strategy::Connector);
    }

    #[test]
    fn test_private_ip_dial_options() {
        let details = ConnectionDetails {
            private_ip: "1".into(),
            ..details()
        };
        assert_eq!(default_dial_options(&details).ip_type, IpType::Private);
        assert_eq!(default_dial_options(&self::details()).ip_type, IpType::Public);
    }

    #[test]
    fn test_build_dialer_carries_private_ip() {
        let details = ConnectionDetails {
            private_ip: "true".into(),
            access_token: Some("t".into()),
            ..details()
        };
        let dialer = build_dialer(&details).unwrap();
        assert_eq!(dialer.default_dial_options().ip_type, IpType::Private);
    }

    #[tokio::test]
    async fn test_tcp_socket_pool() {
        let details = ConnectionDetails {
            host: "127.0.0.1".into(),
            port: "5432".into(),
            ..details()
        };
        let pool = PgPoolFactory::default()
            .connect_tcp_socket(&details)
            .await
            .unwrap();

        let manager = pool.manager();
        assert_eq!(manager.pg_config().get_user(), Some("u"));
        assert_eq!(manager.pg_config().get_dbname(), Some("d"));
        assert_eq!(manager.pg_config().get_password(), Some(&b"p"[..]));
        assert_eq!(pool.status().size, 0);
    }

    #[tokio::test]
    async fn test_tcp_socket_invalid_port() {
        let details = ConnectionDetails {
            port: "not-a-port".into(),
            ..details()
        };
        let err = PgPoolFactory::default()
            .connect_tcp_socket(&details)
            .await
            .err()
            .unwrap();
        assert!(err.is_config());
    }

    #[tokio::test]
    async fn test_connector_rejects_bad_instance_name() {
        let details = ConnectionDetails {
            instance_connection_name: "just-an-instance".into(),
            access_token: Some("t".into()),
            ..details()
        };
        let err = PgPoolFactory::default()
            .connect_with_connector(&details)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidInstanceName(_)));
    }

    #[tokio::test]
    async fn test_connector_pool_is_lazy() {
        let details = ConnectionDetails {
            instance_connection_name: "proj:us-central1:inst".into(),
            access_token: Some("t".into()),
            ..details()
        };
        let pool = PgPoolFactory::new(PoolOptions::default().max_size(2))
            .connect_with_connector(&details)
            .await
            .unwrap();
        assert_eq!(pool.status().max_size, 2);
        assert_eq!(pool.status().size, 0);
    }

    #[tokio::test]
    async fn test_connector_pool_dials_private_ip() {
        let details = ConnectionDetails {
            instance_connection_name: "proj:us-central1:inst".into(),
            private_ip: "yes".into(),
            access_token: Some("t".into()),
            ..details()
        };
        let pool = PgPoolFactory::default()
            .connect_with_connector(&details)
            .await
            .unwrap();
        let opts = pool.manager().dial().dial_options().unwrap();
        assert_eq!(opts.ip_type, IpType::Private);
    }

    #[tokio::test]
    async fn test_tcp_pool_has_no_tunnel_options() {
        let pool = PgPoolFactory::default()
            .connect_tcp_socket(&details())
            .await
            .unwrap();
        assert!(pool.manager().dial().dial_options().is_none());
    }
}
