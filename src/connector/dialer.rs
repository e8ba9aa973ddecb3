//! Tunnel dialer

use super::admin::{AdminApi, ConnectSettings, SqlAdminClient, DEFAULT_ENDPOINT};
use super::instance::InstanceConnectionName;
use super::options::DialOptions;
use super::token::{MetadataServerToken, TokenSource};
use crate::connection::{TlsConfig, Transport};
use crate::{Error, Result};
use rand::rngs::OsRng;
use rsa::pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use rustls_pki_types::ServerName;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OnceCell};
use tracing::Instrument;

/// Port of the instance's server-side proxy
pub const SERVER_PROXY_PORT: u16 = 3307;

/// Connect info older than this is refreshed before the next dial.
const REFRESH_AFTER: Duration = Duration::from_secs(55 * 60);

/// Ephemeral certificates are valid for one hour; until then a failed refresh
/// falls back to the cached entry.
const CERT_LIFETIME: Duration = Duration::from_secs(60 * 60);

const RSA_KEY_BITS: usize = 2048;

/// Key pair whose public half the Admin API signs
struct ClientKey {
    pkcs8_der: Vec<u8>,
    public_pem: String,
}

impl ClientKey {
    fn generate() -> Result<Self> {
        let private = RsaPrivateKey::new(&mut OsRng, RSA_KEY_BITS)
            .map_err(|e| Error::Tls(format!("failed to generate RSA key: {}", e)))?;
        let pkcs8 = private
            .to_pkcs8_der()
            .map_err(|e| Error::Tls(format!("failed to encode RSA key: {}", e)))?;
        let public_pem = RsaPublicKey::from(&private)
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| Error::Tls(format!("failed to encode RSA public key: {}", e)))?;

        Ok(Self {
            pkcs8_der: pkcs8.as_bytes().to_vec(),
            public_pem,
        })
    }
}

/// Everything needed to dial one instance
struct InstanceInfo {
    settings: ConnectSettings,
    tls: TlsConfig,
    fetched_at: Instant,
}

impl InstanceInfo {
    fn is_fresh(&self) -> bool {
        is_fresh(self.fetched_at.elapsed())
    }

    fn is_usable(&self) -> bool {
        is_usable(self.fetched_at.elapsed())
    }
}

fn is_fresh(age: Duration) -> bool {
    age < REFRESH_AFTER
}

fn is_usable(age: Duration) -> bool {
    age < CERT_LIFETIME
}

/// Opens TLS tunnels to Cloud SQL instances
///
/// One dialer serves any number of instances; connect info is cached per instance.
pub struct Dialer {
    admin: Arc<dyn AdminApi>,
    default_opts: DialOptions,
    key: OnceCell<Arc<ClientKey>>,
    cache: Mutex<HashMap<InstanceConnectionName, Arc<InstanceInfo>>>,
    // serializes Admin API refreshes; never held while `cache` is locked
    refreshing: Mutex<()>,
}

impl std::fmt::Debug for Dialer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dialer")
            .field("admin", &self.admin)
            .field("default_opts", &self.default_opts)
            .finish()
    }
}

impl Dialer {
    /// Create a dialer builder
    pub fn builder() -> DialerBuilder {
        DialerBuilder::default()
    }

    /// Options applied by [`Dialer::dial`]
    pub fn default_dial_options(&self) -> DialOptions {
        self.default_opts
    }

    /// Dial an instance with the default options
    pub async fn dial(&self, instance: &InstanceConnectionName) -> Result<Transport> {
        self.dial_with(instance, self.default_opts).await
    }

    /// Dial an instance with explicit options
    pub async fn dial_with(
        &self,
        instance: &InstanceConnectionName,
        opts: DialOptions,
    ) -> Result<Transport> {
        async {
            let ip_label = opts.ip_type.as_str();
            crate::metrics::counters::dial_attempted(ip_label);
            let start = Instant::now();

            let info = self.instance_info(instance).await.map_err(|e| {
                crate::metrics::counters::dial_failed(crate::metrics::labels::REASON_REFRESH);
                e
            })?;

            let ip = match info.settings.address(opts.ip_type)? {
                Some(ip) => ip,
                None => {
                    crate::metrics::counters::dial_failed(crate::metrics::labels::REASON_NO_ADDRESS);
                    return Err(Error::Dial(format!(
                        "instance {} does not have an IP address of type {}",
                        instance, opts.ip_type
                    )));
                }
            };

            let addr = SocketAddr::new(ip, SERVER_PROXY_PORT);
            match Transport::connect_tcp_tls(addr, ServerName::from(ip), info.tls.client_config())
                .await
            {
                Ok(transport) => {
                    crate::metrics::histograms::dial_duration(
                        ip_label,
                        start.elapsed().as_millis() as u64,
                    );
                    tracing::debug!(%addr, "tunnel established");
                    Ok(transport)
                }
                Err(e) => {
                    let reason = if matches!(e, Error::Tls(_)) {
                        // stale certificate or rotated CA: fetch fresh info next time
                        self.invalidate(instance).await;
                        crate::metrics::labels::REASON_TLS
                    } else {
                        crate::metrics::labels::REASON_TCP
                    };
                    crate::metrics::counters::dial_failed(reason);
                    tracing::warn!(%addr, error = %e, "tunnel dial failed");
                    Err(e)
                }
            }
        }
        .instrument(tracing::info_span!(
            "dial",
            instance = %instance,
            ip_type = %opts.ip_type
        ))
        .await
    }

    /// Drop cached connect info for an instance
    pub async fn invalidate(&self, instance: &InstanceConnectionName) {
        self.cache.lock().await.remove(instance);
    }

    async fn cached(&self, instance: &InstanceConnectionName) -> Option<Arc<InstanceInfo>> {
        self.cache.lock().await.get(instance).cloned()
    }

    async fn instance_info(&self, instance: &InstanceConnectionName) -> Result<Arc<InstanceInfo>> {
        if let Some(info) = self.cached(instance).await.filter(|i| i.is_fresh()) {
            return Ok(info);
        }

        let _refreshing = self.refreshing.lock().await;
        // another caller may have refreshed while we waited
        let stale = self.cached(instance).await;
        if let Some(info) = stale.as_ref().filter(|i| i.is_fresh()) {
            return Ok(info.clone());
        }

        let result = self.refresh(instance).await;
        crate::metrics::counters::refresh(result.is_ok());
        match result {
            Ok(info) => {
                let info = Arc::new(info);
                self.cache.lock().await.insert(instance.clone(), info.clone());
                Ok(info)
            }
            Err(e) => match stale.filter(|i| i.is_usable()) {
                Some(info) => {
                    tracing::warn!(error = %e, "refresh failed; using cached connect info");
                    Ok(info)
                }
                None => Err(e),
            },
        }
    }

    async fn refresh(&self, instance: &InstanceConnectionName) -> Result<InstanceInfo> {
        let settings = self.admin.connect_settings(instance).await?;
        settings.validate(instance)?;

        let key = self.client_key().await?;
        let client_cert = self.admin.ephemeral_cert(instance, &key.public_pem).await?;

        let tls = TlsConfig::builder()
            .ca_cert_pem(settings.server_ca_cert.cert.clone())
            .client_cert_pem(client_cert)
            .client_key_der(key.pkcs8_der.clone())
            .build()?;

        tracing::info!(
            database_version = %settings.database_version,
            "refreshed connect info"
        );
        Ok(InstanceInfo {
            settings,
            tls,
            fetched_at: Instant::now(),
        })
    }

    async fn client_key(&self) -> Result<Arc<ClientKey>> {
        self.key
            .get_or_try_init(|| async {
                let key = tokio::task::spawn_blocking(ClientKey::generate)
                    .await
                    .map_err(|e| Error::Tls(format!("key generation task failed: {}", e)))??;
                Ok::<_, Error>(Arc::new(key))
            })
            .await
            .cloned()
    }
}

/// Builder for [`Dialer`]
#[derive(Default)]
pub struct DialerBuilder {
    default_opts: DialOptions,
    admin: Option<Arc<dyn AdminApi>>,
    tokens: Option<Arc<dyn TokenSource>>,
    endpoint: Option<String>,
}

impl DialerBuilder {
    /// Options applied to every dial that does not override them
    pub fn default_dial_options(mut self, opts: DialOptions) -> Self {
        self.default_opts = opts;
        self
    }

    /// Token source for Admin API calls (default: metadata server)
    pub fn token_source(mut self, tokens: Arc<dyn TokenSource>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Admin API endpoint (default: production)
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Replace the Admin API client entirely
    pub fn admin_api(mut self, admin: Arc<dyn AdminApi>) -> Self {
        self.admin = Some(admin);
        self
    }

    /// Build the dialer
    ///
    /// No network traffic happens here; the first dial fetches connect info.
    pub fn build(self) -> Result<Dialer> {
        let admin = match self.admin {
            Some(admin) => admin,
            None => {
                let http = reqwest::Client::builder()
                    .user_agent(concat!("dataconnect/", env!("CARGO_PKG_VERSION")))
                    .build()?;
                let tokens = self
                    .tokens
                    .unwrap_or_else(|| Arc::new(MetadataServerToken::new(http.clone())));
                let endpoint = self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT);
                Arc::new(SqlAdminClient::with_endpoint(http, tokens, endpoint))
            }
        };

        Ok(Dialer {
            admin,
            default_opts: self.default_opts,
            key: OnceCell::new(),
            cache: Mutex::new(HashMap::new()),
            refreshing: Mutex::new(()),
        })
    }
}
