//! Cloud SQL Admin API client
//!
//! Two calls are needed to open a tunnel:
//! * `connectSettings`: instance addresses, server CA, region, backend type
//! * `generateEphemeralCert`: a short-lived client certificate for our public key

use super::instance::InstanceConnectionName;
use super::options::IpType;
use super::token::TokenSource;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;

/// Production Admin API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://sqladmin.googleapis.com";

/// Certificate as returned by the API
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SslCert {
    /// PEM-encoded certificate
    #[serde(default)]
    pub cert: String,
}

/// One address of an instance
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpMapping {
    /// `PRIMARY`, `PRIVATE`, `OUTGOING`, ...
    #[serde(rename = "type")]
    pub kind: String,
    /// Address literal
    pub ip_address: String,
}

/// Response of `connectSettings`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectSettings {
    /// Server CA for the instance
    #[serde(default)]
    pub server_ca_cert: SslCert,
    /// Instance addresses
    #[serde(default)]
    pub ip_addresses: Vec<IpMapping>,
    /// Region the instance lives in
    #[serde(default)]
    pub region: String,
    /// e.g. `POSTGRES_15`
    #[serde(default)]
    pub database_version: String,
    /// e.g. `SECOND_GEN`
    #[serde(default)]
    pub backend_type: String,
}

impl ConnectSettings {
    /// Address of the given type, if the instance has one
    pub fn address(&self, ip_type: IpType) -> Result<Option<IpAddr>> {
        let Some(mapping) = self
            .ip_addresses
            .iter()
            .find(|m| IpType::from_api(&m.kind) == Some(ip_type))
        else {
            return Ok(None);
        };

        let addr = mapping.ip_address.parse().map_err(|_| {
            Error::AdminApi(format!("invalid IP address '{}'", mapping.ip_address))
        })?;
        Ok(Some(addr))
    }

    /// Check the settings describe the instance we asked for and one we can tunnel to
    pub fn validate(&self, instance: &InstanceConnectionName) -> Result<()> {
        if !self.region.is_empty() && self.region != instance.region() {
            return Err(Error::AdminApi(format!(
                "provided region was mismatched: got {}, want {}",
                instance.region(),
                self.region
            )));
        }
        if !self.backend_type.is_empty() && self.backend_type != "SECOND_GEN" {
            return Err(Error::AdminApi(format!(
                "unsupported instance backend type '{}'",
                self.backend_type
            )));
        }
        if self.server_ca_cert.cert.is_empty() {
            return Err(Error::AdminApi(format!(
                "instance {} has no server CA certificate",
                instance
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateEphemeralCertRequest<'a> {
    public_key: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateEphemeralCertResponse {
    ephemeral_cert: SslCert,
}

/// The Admin API calls the dialer depends on
#[async_trait]
pub trait AdminApi: Send + Sync + std::fmt::Debug {
    /// Fetch the instance's connection settings
    async fn connect_settings(&self, instance: &InstanceConnectionName) -> Result<ConnectSettings>;

    /// Sign `public_key_pem` and return the client certificate (PEM)
    async fn ephemeral_cert(
        &self,
        instance: &InstanceConnectionName,
        public_key_pem: &str,
    ) -> Result<String>;
}

/// reqwest-backed Admin API client
#[derive(Debug)]
pub struct SqlAdminClient {
    http: reqwest::Client,
    endpoint: String,
    tokens: Arc<dyn TokenSource>,
}

impl SqlAdminClient {
    /// Talk to the production endpoint
    pub fn new(http: reqwest::Client, tokens: Arc<dyn TokenSource>) -> Self {
        Self::with_endpoint(http, tokens, DEFAULT_ENDPOINT)
    }

    /// Talk to a custom endpoint
    pub fn with_endpoint(
        http: reqwest::Client,
        tokens: Arc<dyn TokenSource>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            http,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn instance_url(&self, instance: &InstanceConnectionName) -> String {
        format!(
            "{}/sql/v1beta4/projects/{}/instances/{}",
            self.endpoint,
            instance.project(),
            instance.name()
        )
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::AdminApi(format!("{}: {}", status, body)))
    }
}

#[async_trait]
impl AdminApi for SqlAdminClient {
    async fn connect_settings(&self, instance: &InstanceConnectionName) -> Result<ConnectSettings> {
        let token = self.tokens.token().await?;
        let response = self
            .http
            .get(format!("{}/connectSettings", self.instance_url(instance)))
            .bearer_auth(token)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn ephemeral_cert(
        &self,
        instance: &InstanceConnectionName,
        public_key_pem: &str,
    ) -> Result<String> {
        let token = self.tokens.token().await?;
        let response = self
            .http
            .post(format!(
                "{}:generateEphemeralCert",
                self.instance_url(instance)
            ))
            .bearer_auth(token)
            .json(&GenerateEphemeralCertRequest {
                public_key: public_key_pem,
            })
            .send()
            .await?;
        let body: GenerateEphemeralCertResponse = Self::check(response).await?.json().await?;

        if body.ephemeral_cert.cert.is_empty() {
            return Err(Error::AdminApi("empty ephemeral certificate".into()));
        }
        Ok(body.ephemeral_cert.cert)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::token::StaticToken;

    fn icn() -> InstanceConnectionName {
        InstanceConnectionName::parse("proj:us-central1:inst").unwrap()
    }

    fn settings() -> ConnectSettings {
        serde_json::from_str(
            r#"{
                "kind": "sql#connectSettings",
                "serverCaCert": {"cert": "-----BEGIN CERTIFICATE-----"},
                "ipAddresses": [
                    {"type": "PRIMARY", "ipAddress": "34.1.2.3"},
                    {"type": "OUTGOING", "ipAddress": "34.9.9.9"}
                ],
                "region": "us-central1",
                "databaseVersion": "POSTGRES_15",
                "backendType": "SECOND_GEN"
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_connect_settings() {
        let s = settings();
        assert_eq!(s.region, "us-central1");
        assert_eq!(s.database_version, "POSTGRES_15");
        assert_eq!(s.ip_addresses.len(), 2);
        assert!(s.validate(&icn()).is_ok());
    }

    #[test]
    fn test_address_by_type() {
        let s = settings();
        assert_eq!(
            s.address(IpType::Public).unwrap(),
            Some("34.1.2.3".parse().unwrap())
        );
        assert_eq!(s.address(IpType::Private).unwrap(), None);
    }

    #[test]
    fn test_private_address() {
        let mut s = settings();
        s.ip_addresses.push(IpMapping {
            kind: "PRIVATE".into(),
            ip_address: "10.20.0.3".into(),
        });
        assert_eq!(
            s.address(IpType::Private).unwrap(),
            Some("10.20.0.3".parse().unwrap())
        );
    }

    #[test]
    fn test_invalid_address() {
        let mut s = settings();
        s.ip_addresses[0].ip_address = "not-an-ip".into();
        assert!(s.address(IpType::Public).is_err());
    }

    #[test]
    fn test_region_mismatch() {
        let mut s = settings();
        s.region = "europe-west1".into();
        let err = s.validate(&icn()).unwrap_err();
        assert!(err.to_string().contains("region was mismatched"));
    }

    #[test]
    fn test_unsupported_backend() {
        let mut s = settings();
        s.backend_type = "FIRST_GEN".into();
        assert!(s.validate(&icn()).is_err());
    }

    #[test]
    fn test_missing_server_ca() {
        let mut s = settings();
        s.server_ca_cert = SslCert::default();
        assert!(s.validate(&icn()).is_err());
    }

    #[test]
    fn test_instance_url_domain_scoped() {
        let client = SqlAdminClient::with_endpoint(
            reqwest::Client::new(),
            Arc::new(StaticToken::new("t")),
            "http://localhost:8080/",
        );
        let icn = InstanceConnectionName::parse("example.com:proj:us-east1:db").unwrap();
        assert_eq!(
            client.instance_url(&icn),
            "http://localhost:8080/sql/v1beta4/projects/example.com:proj/instances/db"
        );
    }

    #[test]
    fn test_ephemeral_cert_request_shape() {
        let body = serde_json::to_value(GenerateEphemeralCertRequest { public_key: "PEM" }).unwrap();
        assert_eq!(body, serde_json::json!({"publicKey": "PEM"}));
    }
}
