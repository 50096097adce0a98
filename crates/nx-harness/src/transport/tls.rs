//! TLS client configuration for the daemon's RPC listener.
//!
//! Two verifiers are provided:
//!
//! - [`SkipServerVerification`] accepts any chain. It is used only to harvest
//!   the certificate a freshly generated daemon presents.
//! - [`PinnedServerVerifier`] trusts exactly the certificates of a harvested
//!   bundle. The daemon's self-signed certificate carries `CA:true`, which
//!   webpki refuses as an end-entity certificate, so chain building is
//!   replaced by byte-exact pinning. Handshake signatures are still checked.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::CryptoProvider;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, SignatureScheme};
use thiserror::Error;

use crate::domain::CertificateBundle;

/// Errors building a TLS client configuration.
#[derive(Debug, Error)]
pub enum TlsError {
    /// rustls rejected the configuration.
    #[error("TLS configuration error: {0}")]
    Config(#[from] rustls::Error),

    /// Bundle bytes are not valid PEM.
    #[error("malformed certificate bundle: {0}")]
    Pem(String),

    /// Bundle holds no certificate to trust.
    #[error("certificate bundle is empty")]
    EmptyBundle,
}

/// Crypto provider used by every harness TLS config.
///
/// aws-lc-rs, because the daemon signs with an ECDSA P-521 key. Passed
/// explicitly so the process-wide default never has to be installed.
pub fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::aws_lc_rs::default_provider())
}

/// Client config that accepts any server certificate.
pub fn insecure_client_config() -> Result<Arc<ClientConfig>, TlsError> {
    let provider = crypto_provider();
    let config = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(SkipServerVerification::new(provider)))
        .with_no_client_auth();
    Ok(Arc::new(config))
}

/// Client config that trusts only the certificates in `bundle`.
pub fn pinned_client_config(bundle: &CertificateBundle) -> Result<Arc<ClientConfig>, TlsError> {
    let provider = crypto_provider();
    let verifier = PinnedServerVerifier::from_bundle(bundle, provider.clone())?;
    let config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();
    Ok(Arc::new(config))
}

// =============================================================================
// VERIFIERS
// =============================================================================

/// Accepts any server certificate.
///
/// Only for reading the peer chain out of a handshake; never for a session
/// that carries credentials.
#[derive(Debug)]
pub struct SkipServerVerification {
    provider: Arc<CryptoProvider>,
}

impl SkipServerVerification {
    pub fn new(provider: Arc<CryptoProvider>) -> Self {
        Self { provider }
    }
}

impl ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Trusts a server only if its end-entity certificate is byte-identical to
/// one of the pinned certificates.
#[derive(Debug)]
pub struct PinnedServerVerifier {
    pinned: Vec<CertificateDer<'static>>,
    provider: Arc<CryptoProvider>,
}

impl PinnedServerVerifier {
    /// Pin every certificate in a PEM bundle.
    pub fn from_bundle(
        bundle: &CertificateBundle,
        provider: Arc<CryptoProvider>,
    ) -> Result<Self, TlsError> {
        let pinned = rustls_pemfile::certs(&mut bundle.as_bytes())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| TlsError::Pem(e.to_string()))?;
        if pinned.is_empty() {
            return Err(TlsError::EmptyBundle);
        }
        Ok(Self { pinned, provider })
    }

    /// Number of pinned certificates.
    pub fn pinned(&self) -> usize {
        self.pinned.len()
    }
}

impl ServerCertVerifier for PinnedServerVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        if self
            .pinned
            .iter()
            .any(|cert| cert.as_ref() == end_entity.as_ref())
        {
            Ok(ServerCertVerified::assertion())
        } else {
            Err(rustls::Error::InvalidCertificate(
                CertificateError::ApplicationVerificationFailure,
            ))
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}
