//! Connection details read from the environment

use crate::{Error, Result};
use std::collections::HashMap;

/// Database username (required)
pub const DB_USER: &str = "DB_USER";
/// Database password (required)
pub const DB_PASS: &str = "DB_PASS";
/// Database name (required)
pub const DB_NAME: &str = "DB_NAME";
/// `project:region:instance`; selects the connector strategy when set
pub const INSTANCE_CONNECTION_NAME: &str = "INSTANCE_CONNECTION_NAME";
/// Any non-empty value makes the tunnel prefer the instance's private IP
pub const PRIVATE_IP: &str = "PRIVATE_IP";
/// TCP host for the direct strategy
pub const INSTANCE_HOST: &str = "INSTANCE_HOST";
/// TCP port for the direct strategy
pub const DB_PORT: &str = "DB_PORT";
/// OAuth2 access token for the Cloud SQL Admin API (otherwise the metadata server is used)
pub const GOOGLE_OAUTH_ACCESS_TOKEN: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Source of configuration variables
///
/// Implemented for the process environment and for plain maps, so tests never
/// have to mutate global state.
pub trait EnvSource: Send + Sync {
    /// Look up a variable; `None` if it is not set
    fn var(&self, key: &str) -> Option<String>;
}

/// Reads from `std::env`
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl EnvSource for HashMap<&'static str, &'static str> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }
}

/// Everything needed to open the pool, captured once
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ConnectionDetails {
    /// Database username
    pub user: String,
    /// Database password
    pub password: String,
    /// Database name
    pub database: String,
    /// Instance connection name; empty selects the direct TCP strategy
    pub instance_connection_name: String,
    /// Raw `PRIVATE_IP` value; set means non-empty
    pub private_ip: String,
    /// TCP host for the direct strategy
    pub host: String,
    /// Raw TCP port for the direct strategy
    pub port: String,
    /// Optional Admin API access token
    pub access_token: Option<String>,
}

impl ConnectionDetails {
    /// Read details from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_source(&ProcessEnv)
    }

    /// Read details from any variable source
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingEnv` for the first of `DB_USER`, `DB_PASS`, `DB_NAME`
    /// that is unset or empty.
    pub fn from_source(env: &dyn EnvSource) -> Result<Self> {
        let user = required(env, DB_USER)?;
        let password = required(env, DB_PASS)?;
        let database = required(env, DB_NAME)?;

        Ok(Self {
            user,
            password,
            database,
            instance_connection_name: optional(env, INSTANCE_CONNECTION_NAME),
            private_ip: optional(env, PRIVATE_IP),
            host: optional(env, INSTANCE_HOST),
            port: optional(env, DB_PORT),
            access_token: env.var(GOOGLE_OAUTH_ACCESS_TOKEN).filter(|v| !v.is_empty()),
        })
    }

    /// Whether the secure connector should be used
    pub fn uses_connector(&self) -> bool {
        !self.instance_connection_name.is_empty()
    }

    /// Whether the tunnel should prefer the private address
    pub fn uses_private_ip(&self) -> bool {
        !self.private_ip.is_empty()
    }
}

impl std::fmt::Debug for ConnectionDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionDetails")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .field("instance_connection_name", &self.instance_connection_name)
            .field("private_ip", &self.private_ip)
            .field("host", &self.host)
            .field("port", &self.port)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

fn required(env: &dyn EnvSource, key: &'static str) -> Result<String> {
    match env.var(key) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(Error::MissingEnv(key)),
    }
}

fn optional(env: &dyn EnvSource, key: &str) -> String {
    env.var(key).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&'static str, &'static str)]) -> HashMap<&'static str, &'static str> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_required_vars() {
        let details = ConnectionDetails::from_source(&env(&[
            (DB_USER, "u"),
            (DB_PASS, "p"),
            (DB_NAME, "d"),
        ]))
        .unwrap();

        assert_eq!(details.user, "u");
        assert_eq!(details.password, "p");
        assert_eq!(details.database, "d");
        assert!(!details.uses_connector());
        assert!(!details.uses_private_ip());
        assert_eq!(details.host, "");
        assert_eq!(details.port, "");
        assert!(details.access_token.is_none());
    }

    #[test]
    fn test_missing_user_reported_first() {
        let err = ConnectionDetails::from_source(&env(&[])).unwrap_err();
        assert!(matches!(err, Error::MissingEnv(DB_USER)));
    }

    #[test]
    fn test_empty_counts_as_missing() {
        let err =
            ConnectionDetails::from_source(&env(&[(DB_USER, "u"), (DB_PASS, ""), (DB_NAME, "d")]))
                .unwrap_err();
        assert!(matches!(err, Error::MissingEnv(DB_PASS)));
    }

    #[test]
    fn test_missing_database_name() {
        let err = ConnectionDetails::from_source(&env(&[(DB_USER, "u"), (DB_PASS, "p")]))
            .unwrap_err();
        assert_eq!(err.to_string(), "Fatal error. DB_NAME env var not set.");
    }

    #[test]
    fn test_optional_vars() {
        let details = ConnectionDetails::from_source(&env(&[
            (DB_USER, "u"),
            (DB_PASS, "p"),
            (DB_NAME, "d"),
            (INSTANCE_CONNECTION_NAME, "proj:us-central1:inst"),
            (PRIVATE_IP, "true"),
            (INSTANCE_HOST, "10.0.0.5"),
            (DB_PORT, "6432"),
            (GOOGLE_OAUTH_ACCESS_TOKEN, "ya29.token"),
        ]))
        .unwrap();

        assert!(details.uses_connector());
        assert!(details.uses_private_ip());
        assert_eq!(details.host, "10.0.0.5");
        assert_eq!(details.port, "6432");
        assert_eq!(details.access_token.as_deref(), Some("ya29.token"));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let details = ConnectionDetails {
            password: "hunter2".into(),
            access_token: Some("ya29.secret".into()),
            ..Default::default()
        };
        let debug_str = format!("{:?}", details);
        assert!(!debug_str.contains("hunter2"));
        assert!(!debug_str.contains("ya29.secret"));
        assert!(debug_str.contains("<redacted>"));
    }
}
