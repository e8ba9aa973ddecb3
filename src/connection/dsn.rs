//! Key/value connection strings
//!
//! Supports the libpq keyword format used by both strategies:
//! * `host=127.0.0.1 user=u password=p port=5432 database=d` (direct TCP)
//! * `user=u password=p database=d` (connector; the tunnel supplies the socket)
//!
//! Values containing whitespace, quotes or backslashes are single-quoted with
//! backslash escapes.

use crate::config::ConnectionDetails;
use crate::{Error, Result};

/// Default host when none is given
pub const DEFAULT_HOST: &str = "localhost";

/// Default Postgres port
pub const DEFAULT_PORT: u16 = 5432;

/// Parsed connection string
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionInfo {
    /// Host (direct TCP only)
    pub host: Option<String>,
    /// Port (direct TCP only)
    pub port: Option<u16>,
    /// Database name
    pub database: Option<String>,
    /// Username
    pub user: Option<String>,
    /// Password
    pub password: Option<String>,
}

/// Render the direct TCP connection string
pub fn tcp_dsn(details: &ConnectionDetails) -> String {
    render(&[
        ("host", &details.host),
        ("user", &details.user),
        ("password", &details.password),
        ("port", &details.port),
        ("database", &details.database),
    ])
}

/// Render the connector connection string (no host or port)
pub fn connector_dsn(details: &ConnectionDetails) -> String {
    render(&[
        ("user", &details.user),
        ("password", &details.password),
        ("database", &details.database),
    ])
}

fn render(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(key, value)| format!("{}={}", key, quote(value)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn quote(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || c == '\'' || c == '\\');
    if !needs_quotes {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\'' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// Split a connection string into key/value pairs
fn tokenize(s: &str) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::new();
    let mut chars = s.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        while let Some(c) = chars.next_if(|c| *c != '=' && !c.is_whitespace()) {
            key.push(c);
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}
        if chars.next() != Some('=') {
            return Err(Error::Config(format!(
                "missing \"=\" after \"{}\" in connection string",
                key
            )));
        }
        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'\'').is_some() {
            loop {
                match chars.next() {
                    Some('\'') => break,
                    Some('\\') => match chars.next() {
                        Some(c) => value.push(c),
                        None => {
                            return Err(Error::Config(
                                "unterminated quoted value in connection string".into(),
                            ))
                        }
                    },
                    Some(c) => value.push(c),
                    None => {
                        return Err(Error::Config(
                            "unterminated quoted value in connection string".into(),
                        ))
                    }
                }
            }
        } else {
            while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        value.push(escaped);
                    }
                } else {
                    value.push(c);
                }
            }
        }

        pairs.push((key, value));
    }

    Ok(pairs)
}

impl ConnectionInfo {
    /// Parse a key/value connection string
    ///
    /// Empty values are treated as unset. `database` and `dbname` are synonyms.
    pub fn parse(s: &str) -> Result<Self> {
        let mut info = Self::default();

        for (key, value) in tokenize(s)? {
            let value = if value.is_empty() { None } else { Some(value) };
            match key.as_str() {
                "host" => info.host = value,
                "port" => {
                    info.port = value
                        .map(|p| {
                            p.parse::<u16>()
                                .map_err(|_| Error::Config(format!("invalid port '{}'", p)))
                        })
                        .transpose()?
                }
                "database" | "dbname" => info.database = value,
                "user" => info.user = value,
                "password" => info.password = value,
                other => {
                    return Err(Error::Config(format!(
                        "unrecognized connection string parameter '{}'",
                        other
                    )))
                }
            }
        }

        Ok(info)
    }

    /// Host to dial, falling back to `localhost`
    pub fn host_or_default(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    /// Port to dial, falling back to 5432
    pub fn port_or_default(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    /// Convert to a driver configuration
    ///
    /// SSL negotiation is disabled: the pool supplies its own stream, which is either
    /// plain TCP or already inside the TLS tunnel.
    pub fn to_pg_config(&self) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config.ssl_mode(tokio_postgres::config::SslMode::Disable);
        config.host(self.host_or_default());
        config.port(self.port_or_default());
        if let Some(ref user) = self.user {
            config.user(user);
        }
        if let Some(ref password) = self.password {
            config.password(password);
        }
        if let Some(ref database) = self.database {
            config.dbname(database);
        }
        config
    }
}

impl std::fmt::Debug for ConnectionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionInfo")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
