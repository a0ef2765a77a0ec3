//! The `sslMode` connection option and the rustls connector behind it.
//!
//! MySQL maps the mode onto SQLx's own TLS settings; PostgreSQL gets a
//! connector from [`postgres_connector`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::ring;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio_postgres_rustls::MakeRustlsConnect;
use tracing::{debug, warn};

use crate::error::{DbError, Result};

/// Transport security requested by a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SslMode {
    /// Plain TCP.
    #[default]
    Disable,
    /// Encrypted, server certificate not checked.
    Require,
    /// Encrypted, certificate checked against the web PKI roots.
    VerifyCa,
    /// Encrypted, certificate and host name checked.
    VerifyFull,
}

const SSL_MODES: [(&str, SslMode); 4] = [
    ("disable", SslMode::Disable),
    ("require", SslMode::Require),
    ("verify-ca", SslMode::VerifyCa),
    ("verify-full", SslMode::VerifyFull),
];

impl SslMode {
    /// Parse an `sslMode` value; empty means `disable`.
    pub fn parse(value: &str) -> Result<Self> {
        let value = value.trim().to_lowercase();
        if value.is_empty() {
            return Ok(SslMode::Disable);
        }
        SSL_MODES
            .iter()
            .find(|(name, _)| *name == value)
            .map(|(_, mode)| *mode)
            .ok_or_else(|| {
                DbError::Config(format!(
                    "sslMode '{}' is not one of disable, require, verify-ca, verify-full",
                    value
                ))
            })
    }

    pub fn as_str(&self) -> &'static str {
        SSL_MODES
            .iter()
            .find(|(_, mode)| mode == self)
            .map(|(name, _)| *name)
            .unwrap_or("disable")
    }

    pub fn is_encrypted(&self) -> bool {
        *self != SslMode::Disable
    }
}

impl fmt::Display for SslMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SslMode {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        SslMode::parse(s)
    }
}

/// Connector for `tokio_postgres::Config::connect`, or `None` for plain TCP.
pub fn postgres_connector(mode: SslMode) -> Result<Option<MakeRustlsConnect>> {
    Ok(client_config(mode)?.map(MakeRustlsConnect::new))
}

/// rustls client settings for `mode`.
///
/// Uses the ring provider; no process-level default is installed.
pub fn client_config(mode: SslMode) -> Result<Option<ClientConfig>> {
    if mode == SslMode::Disable {
        return Ok(None);
    }

    let builder = ClientConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| DbError::Config(format!("TLS setup failed: {}", e)))?;

    let config = if mode == SslMode::Require {
        warn!("sslMode=require does not verify the server certificate");
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate))
            .with_no_client_auth()
    } else {
        if mode == SslMode::VerifyCa {
            warn!("sslMode=verify-ca checks the host name too");
        }
        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        debug!("TLS with {} trusted roots", roots.len());
        builder.with_root_certificates(roots).with_no_client_auth()
    };
    Ok(Some(config))
}

/// Verifier for `sslMode=require`.
#[derive(Debug)]
struct AcceptAnyCertificate;

impl ServerCertVerifier for AcceptAnyCertificate {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        use SignatureScheme::*;
        vec![
            ECDSA_NISTP256_SHA256,
            ECDSA_NISTP384_SHA384,
            ECDSA_NISTP521_SHA512,
            ED25519,
            RSA_PSS_SHA256,
            RSA_PSS_SHA384,
            RSA_PSS_SHA512,
            RSA_PKCS1_SHA256,
            RSA_PKCS1_SHA384,
            RSA_PKCS1_SHA512,
        ]
    }
}
