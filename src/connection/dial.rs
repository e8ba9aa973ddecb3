//! Dial functions used by the pool in place of a raw socket

use super::Transport;
use crate::connector::{DialOptions, Dialer, InstanceConnectionName};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Opens the byte stream for one new database connection
#[async_trait]
pub trait Dial: Send + Sync + std::fmt::Debug {
    /// Open a stream ready for the Postgres startup message
    async fn dial(&self) -> Result<Transport>;

    /// Tunnel options applied to each dial; `None` for plain sockets
    fn dial_options(&self) -> Option<DialOptions> {
        None
    }
}

/// Plain TCP to a fixed host and port
#[derive(Debug, Clone)]
pub struct TcpDial {
    host: String,
    port: u16,
}

impl TcpDial {
    /// Dial `host:port` for every connection
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Target host
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Target port
    pub fn port(&self) -> u16 {
        self.port
    }
}

#[async_trait]
impl Dial for TcpDial {
    async fn dial(&self) -> Result<Transport> {
        Transport::connect_tcp(&self.host, self.port).await
    }
}

/// Routes every connection through the instance tunnel
///
/// Whatever host the driver configuration names is ignored; the dialer resolves the
/// instance's address itself.
#[derive(Debug, Clone)]
pub struct TunnelDial {
    dialer: Arc<Dialer>,
    instance: InstanceConnectionName,
}

impl TunnelDial {
    /// Dial `instance` through `dialer` for every connection
    pub fn new(dialer: Arc<Dialer>, instance: InstanceConnectionName) -> Self {
        Self { dialer, instance }
    }

    /// The instance this dial targets
    pub fn instance(&self) -> &InstanceConnectionName {
        &self.instance
    }

    /// The underlying tunnel dialer
    pub fn dialer(&self) -> &Arc<Dialer> {
        &self.dialer
    }
}

#[async_trait]
impl Dial for TunnelDial {
    async fn dial(&self) -> Result<Transport> {
        self.dialer.dial(&self.instance).await
    }

    fn dial_options(&self) -> Option<DialOptions> {
        Some(self.dialer.default_dial_options())
    }
}
