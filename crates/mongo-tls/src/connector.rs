//! TLS connector for establishing encrypted connections.

use std::sync::Arc;

use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_rustls::TlsConnector as TokioTlsConnector;
use tokio_rustls::client::TlsStream;

use crate::config::TlsConfig;
use crate::error::TlsError;

// =============================================================================
// Hostname-tolerant verifier (verify_hostname = false)
// =============================================================================

/// A verifier that validates the chain but ignores a server name mismatch.
///
/// Signatures, validity periods and trust anchors are still checked by the
/// wrapped webpki verifier.
#[derive(Debug)]
struct NoHostnameVerifier {
    inner: Arc<WebPkiServerVerifier>,
}

fn is_name_mismatch(err: &rustls::Error) -> bool {
    match err {
        rustls::Error::InvalidCertificate(
            CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. },
        ) => true,
        _ => false,
    }
}

impl ServerCertVerifier for NoHostnameVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        match self
            .inner
            .verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now)
        {
            Err(err) if is_name_mismatch(&err) => {
                tracing::debug!(server_name = ?server_name, "accepting certificate despite name mismatch");
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
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}

// =============================================================================
// TLS Connector
// =============================================================================

/// TLS connector wrapping a tokio-rustls connector built from [`TlsConfig`].
#[derive(Clone)]
pub struct TlsConnector {
    config: TlsConfig,
    inner: TokioTlsConnector,
}

impl TlsConnector {
    /// Create a new TLS connector with the given configuration.
    pub fn new(config: TlsConfig) -> Result<Self, TlsError> {
        let client_config = Self::build_client_config(&config)?;
        let inner = TokioTlsConnector::from(Arc::new(client_config));

        Ok(Self { config, inner })
    }

    fn build_client_config(config: &TlsConfig) -> Result<ClientConfig, TlsError> {
        let versions = config.protocol_versions();
        let root_store = Self::build_root_store(config)?;
        let builder = ClientConfig::builder_with_protocol_versions(&versions);

        if config.verify_hostname {
            return Ok(builder
                .with_root_certificates(root_store)
                .with_no_client_auth());
        }

        tracing::warn!(
            "TLS hostname verification is disabled; certificates valid for any name are accepted"
        );
        let inner = WebPkiServerVerifier::builder(Arc::new(root_store))
            .build()
            .map_err(|e| TlsError::Configuration(e.to_string()))?;

        Ok(builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoHostnameVerifier { inner }))
            .with_no_client_auth())
    }

    fn build_root_store(config: &TlsConfig) -> Result<RootCertStore, TlsError> {
        let mut root_store = RootCertStore::empty();

        if config.root_certificates.is_empty() {
            root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        } else {
            for cert in &config.root_certificates {
                root_store
                    .add(cert.clone())
                    .map_err(|e| TlsError::InvalidCertificate(e.to_string()))?;
            }
        }

        Ok(root_store)
    }

    /// Perform the TLS handshake over `stream`.
    ///
    /// `host` is used for SNI and validation unless the configuration
    /// overrides the server name.
    pub async fn connect<S>(&self, stream: S, host: &str) -> Result<TlsStream<S>, TlsError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let server_name = self.config.server_name.as_deref().unwrap_or(host);

        let dns_name = ServerName::try_from(server_name.to_string())
            .map_err(|_| TlsError::InvalidServerName(server_name.to_string()))?;

        tracing::debug!(
            server_name = %server_name,
            verify_hostname = self.config.verify_hostname,
            "performing TLS handshake"
        );

        let tls_stream = self
            .inner
            .connect(dns_name, stream)
            .await
            .map_err(|e| TlsError::HandshakeFailed(e.to_string()))?;

        tracing::debug!("TLS handshake completed successfully");

        Ok(tls_stream)
    }

    /// Get the underlying configuration.
    #[must_use]
    pub fn config(&self) -> &TlsConfig {
        &self.config
    }
}

impl std::fmt::Debug for TlsConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConnector")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn setup_crypto_provider() {
        let _ = rustls::crypto::ring::default_provider().install_default();
    }

    #[test]
    fn test_default_config() {
        setup_crypto_provider();
        let connector = TlsConnector::new(TlsConfig::default()).unwrap();
        assert!(connector.config().verify_hostname);
    }

    #[test]
    fn test_hostname_verification_disabled() {
        setup_crypto_provider();
        let connector = TlsConnector::new(TlsConfig::new().verify_hostname(false)).unwrap();
        assert!(!connector.config().verify_hostname);
    }

    #[test]
    fn test_invalid_root_certificate() {
        setup_crypto_provider();
        let config = TlsConfig::new().add_root_certificate(CertificateDer::from(vec![1, 2, 3]));
        assert!(matches!(
            TlsConnector::new(config),
            Err(TlsError::InvalidCertificate(_))
        ));
    }

    #[test]
    fn test_name_mismatch_detection() {
        assert!(is_name_mismatch(&rustls::Error::InvalidCertificate(
            CertificateError::NotValidForName
        )));
        assert!(!is_name_mismatch(&rustls::Error::InvalidCertificate(
            CertificateError::Expired
        )));
        assert!(!is_name_mismatch(&rustls::Error::HandshakeNotComplete));
    }

    #[test]
    fn test_handshake_fails_when_peer_hangs_up() {
        setup_crypto_provider();
        let connector = TlsConnector::new(TlsConfig::default()).unwrap();
        let (client, server) = tokio::io::duplex(1024);
        drop(server);

        let result = tokio_test::block_on(connector.connect(client, "db.example.com"));
        assert!(matches!(result, Err(TlsError::HandshakeFailed(_))));
    }

    #[test]
    fn test_server_name_override() {
        setup_crypto_provider();
        let connector =
            TlsConnector::new(TlsConfig::new().with_server_name("not a dns name")).unwrap();
        let (client, _server) = tokio::io::duplex(1024);

        let result = tokio_test::block_on(connector.connect(client, "db.example.com"));
        assert!(matches!(result, Err(TlsError::InvalidServerName(name)) if name == "not a dns name"));
    }
}
