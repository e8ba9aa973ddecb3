//! Secure tunnel connector for Cloud SQL
//!
//! This module handles:
//! * Instance connection names (`project:region:instance`)
//! * Dial options (public vs private IP)
//! * Admin API access (connect settings, ephemeral certificates) and its tokens
//! * The `Dialer`, which turns all of that into a TLS stream

mod admin;
mod dialer;
mod instance;
mod options;
mod token;

pub use admin::{AdminApi, ConnectSettings, IpMapping, SqlAdminClient, SslCert, DEFAULT_ENDPOINT};
pub use dialer::{Dialer, DialerBuilder, SERVER_PROXY_PORT};
pub use instance::InstanceConnectionName;
pub use options::{DialOptions, IpType};
pub use token::{MetadataServerToken, StaticToken, TokenSource, METADATA_TOKEN_URL};
