//! Handshakes against a server whose certificate names a different host.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use mongo_tls::{TlsConfig, TlsConnector, TlsError};
use rcgen::{CertificateParams, KeyPair};
use rustls::ServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_rustls::TlsAcceptor;

/// Self-signed certificate for `localhost` and a server config presenting it.
fn localhost_server() -> (CertificateDer<'static>, TlsAcceptor) {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let key_pair = KeyPair::generate().unwrap();
    let params = CertificateParams::new(vec!["localhost".to_owned()]).unwrap();
    let cert = params.self_signed(&key_pair).unwrap();

    let cert_der = CertificateDer::from(cert.der().to_vec());
    let key_der = PrivateKeyDer::try_from(key_pair.serialize_der()).unwrap();
    let server_config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(vec![cert_der.clone()], key_der)
        .unwrap();

    (cert_der, TlsAcceptor::from(Arc::new(server_config)))
}

/// Handshake as `host`; on success, echo one message to prove the session works.
async fn handshake(config: TlsConfig, acceptor: TlsAcceptor, host: &str) -> Result<(), TlsError> {
    let connector = TlsConnector::new(config)?;
    let (client, server) = tokio::io::duplex(16 * 1024);

    let server = tokio::spawn(async move {
        let Ok(mut stream) = acceptor.accept(server).await else {
            return;
        };
        let mut buf = [0u8; 4];
        if stream.read_exact(&mut buf).await.is_ok() {
            let _ = stream.write_all(&buf).await;
            let _ = stream.flush().await;
        }
    });

    let result = async {
        let mut stream = connector.connect(client, host).await?;
        stream.write_all(b"ping").await?;
        stream.flush().await?;
        let mut buf = [0u8; 4];
        stream.read_exact(&mut buf).await?;
        assert_eq!(&buf, b"ping");
        Ok::<(), TlsError>(())
    }
    .await;

    let _ = server.await;
    result
}

#[tokio::test]
async fn test_matching_name_is_accepted() {
    let (cert, acceptor) = localhost_server();
    let config = TlsConfig::new().add_root_certificate(cert);
    handshake(config, acceptor, "localhost").await.unwrap();
}

#[tokio::test]
async fn test_name_mismatch_rejected_by_default() {
    let (cert, acceptor) = localhost_server();
    let config = TlsConfig::new().add_root_certificate(cert);
    let err = handshake(config, acceptor, "db.example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, TlsError::HandshakeFailed(_)), "{err}");
}

#[tokio::test]
async fn test_name_mismatch_accepted_without_hostname_verification() {
    let (cert, acceptor) = localhost_server();
    let config = TlsConfig::new()
        .add_root_certificate(cert)
        .verify_hostname(false);
    handshake(config, acceptor, "db.example.com").await.unwrap();
}

#[tokio::test]
async fn test_untrusted_chain_rejected_without_hostname_verification() {
    let (_, acceptor) = localhost_server();
    // webpki roots only: the self-signed certificate has no trusted issuer
    let config = TlsConfig::new().verify_hostname(false);
    let err = handshake(config, acceptor, "localhost").await.unwrap_err();
    assert!(matches!(err, TlsError::HandshakeFailed(_)), "{err}");
}
