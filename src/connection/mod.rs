//! Connection plumbing
//!
//! This module handles:
//! * Connection strings (render and parse)
//! * Transport abstraction (plain TCP vs TLS tunnel)
//! * TLS configuration for the tunnel
//! * Dial functions the pool uses to open each connection

mod dial;
pub mod dsn;
mod tls;
mod transport;

pub use dial::{Dial, TcpDial, TunnelDial};
pub use dsn::ConnectionInfo;
pub use tls::{TlsConfig, TlsConfigBuilder};
pub use transport::Transport;
