//! TLS configuration for the instance tunnel.
//!
//! The server side of a Cloud SQL tunnel presents a certificate signed by a
//! per-instance CA, and the client must present an ephemeral certificate issued
//! by the Admin API. This module turns that PEM material into a rustls
//! `ClientConfig`.

use crate::{Error, Result};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName, UnixTime};
use std::sync::Arc;

/// TLS configuration for tunnel connections.
///
/// # Examples
///
/// ```ignore
/// use dataconnect::connection::TlsConfig;
///
/// let tls = TlsConfig::builder()
///     .ca_cert_pem(server_ca_pem)
///     .client_cert_pem(ephemeral_cert_pem)
///     .client_key_der(pkcs8_der)
///     .build()?;
/// ```
#[derive(Clone)]
pub struct TlsConfig {
    /// Whether a name mismatch is tolerated once the chain verifies
    accept_name_mismatch: bool,
    /// Compiled rustls ClientConfig
    client_config: Arc<ClientConfig>,
}

impl TlsConfig {
    /// Create a new TLS configuration builder.
    pub fn builder() -> TlsConfigBuilder {
        TlsConfigBuilder::default()
    }

    /// Get the rustls ClientConfig for this TLS configuration.
    pub fn client_config(&self) -> Arc<ClientConfig> {
        self.client_config.clone()
    }

    /// Check if a certificate name mismatch is accepted.
    pub fn accept_name_mismatch(&self) -> bool {
        self.accept_name_mismatch
    }
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("accept_name_mismatch", &self.accept_name_mismatch)
            .field("client_config", &"<ClientConfig>")
            .finish()
    }
}

/// Builder for TLS configuration.
pub struct TlsConfigBuilder {
    ca_cert_pem: Option<String>,
    client_cert_pem: Option<String>,
    client_key_der: Option<Vec<u8>>,
    accept_name_mismatch: bool,
}

impl Default for TlsConfigBuilder {
    fn default() -> Self {
        Self {
            ca_cert_pem: None,
            client_cert_pem: None,
            client_key_der: None,
            accept_name_mismatch: true,
        }
    }
}

impl TlsConfigBuilder {
    /// Set the CA certificate(s) that must sign the server certificate (PEM).
    pub fn ca_cert_pem(mut self, pem: impl Into<String>) -> Self {
        self.ca_cert_pem = Some(pem.into());
        self
    }

    /// Set the client certificate chain (PEM).
    pub fn client_cert_pem(mut self, pem: impl Into<String>) -> Self {
        self.client_cert_pem = Some(pem.into());
        self
    }

    /// Set the client private key (PKCS#8 DER).
    pub fn client_key_der(mut self, der: Vec<u8>) -> Self {
        self.client_key_der = Some(der);
        self
    }

    /// Accept a server certificate whose names do not match the dialed address,
    /// provided its chain verifies against the configured CA (default: enabled).
    ///
    /// Legacy instance certificates carry `project:instance` as their common name,
    /// which can never match an IP address.
    pub fn accept_name_mismatch(mut self, accept: bool) -> Self {
        self.accept_name_mismatch = accept;
        self
    }

    /// Build the TLS configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - no CA certificate was set, or it contains no valid certificate
    /// - only one of client certificate and key was set
    /// - rustls rejects the client key
    pub fn build(self) -> Result<TlsConfig> {
        let ca_pem = self
            .ca_cert_pem
            .as_deref()
            .ok_or_else(|| Error::Tls("server CA certificate is required".into()))?;
        let root_store = Arc::new(load_roots(ca_pem)?);

        let webpki = WebPkiServerVerifier::builder(root_store)
            .build()
            .map_err(|e| Error::Tls(format!("failed to build certificate verifier: {}", e)))?;
        let verifier = Arc::new(InstanceCertVerifier {
            inner: webpki,
            accept_name_mismatch: self.accept_name_mismatch,
        });

        let builder = ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(verifier);

        let client_config = match (self.client_cert_pem, self.client_key_der) {
            (Some(cert_pem), Some(key_der)) => {
                let chain = load_certs(&cert_pem)?;
                let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_der));
                builder
                    .with_client_auth_cert(chain, key)
                    .map_err(|e| Error::Tls(format!("invalid client certificate: {}", e)))?
            }
            (None, None) => builder.with_no_client_auth(),
            _ => {
                return Err(Error::Tls(
                    "client certificate and key must be set together".into(),
                ))
            }
        };

        Ok(TlsConfig {
            accept_name_mismatch: self.accept_name_mismatch,
            client_config: Arc::new(client_config),
        })
    }
}

/// Parse every certificate in a PEM bundle.
fn load_certs(pem: &str) -> Result<Vec<CertificateDer<'static>>> {
    let certs = rustls_pemfile::certs(&mut pem.as_bytes())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Tls(format!("failed to parse PEM certificate: {}", e)))?;

    if certs.is_empty() {
        return Err(Error::Tls("no valid certificates found in PEM".into()));
    }
    Ok(certs)
}

fn load_roots(pem: &str) -> Result<RootCertStore> {
    let mut root_store = RootCertStore::empty();
    let (added, _ignored) = root_store.add_parsable_certificates(load_certs(pem)?);
    if added == 0 {
        return Err(Error::Tls("server CA certificate could not be parsed".into()));
    }
    Ok(root_store)
}

/// Chain verification against the instance CA, optionally tolerating name mismatches.
#[derive(Debug)]
struct InstanceCertVerifier {
    inner: Arc<WebPkiServerVerifier>,
    accept_name_mismatch: bool,
}

impl ServerCertVerifier for InstanceCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        match self
            .inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
        {
            // webpki checks the chain before the name, so a name error means the chain is good
            Err(rustls::Error::InvalidCertificate(ref err))
                if self.accept_name_mismatch && is_name_mismatch(err) =>
            {
                tracing::debug!("server certificate chain verified; ignoring name mismatch");
                Ok(ServerCertVerified::assertion())
            }
            other => other,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

fn is_name_mismatch(err: &CertificateError) -> bool {
    matches!(
        err,
        CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. }
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tls_config_builder_defaults() {
        let tls = TlsConfigBuilder::default();
        assert!(tls.accept_name_mismatch);
        assert!(tls.ca_cert_pem.is_none());
        assert!(tls.client_cert_pem.is_none());
        assert!(tls.client_key_der.is_none());
    }

    #[test]
    fn test_build_requires_ca() {
        let err = TlsConfig::builder().build().unwrap_err();
        assert!(err.to_string().contains("server CA certificate is required"));
    }

    #[test]
    fn test_build_rejects_garbage_ca() {
        let err = TlsConfig::builder()
            .ca_cert_pem("not a certificate")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Tls(_)));
    }

    #[test]
    fn test_load_certs_empty() {
        assert!(load_certs("").is_err());
    }

    #[test]
    fn test_name_mismatch_detection() {
        assert!(is_name_mismatch(&CertificateError::NotValidForName));
        assert!(!is_name_mismatch(&CertificateError::Expired));
        assert!(!is_name_mismatch(&CertificateError::UnknownIssuer));
    }
}
