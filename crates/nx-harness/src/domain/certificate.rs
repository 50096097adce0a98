//! PEM bundle built from a harvested TLS peer chain.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

/// PEM body line width.
const PEM_LINE_WIDTH: usize = 64;

/// Concatenated PEM encoding of one handshake's peer certificate chain.
///
/// Built once per scenario from a live handshake and handed to exactly one
/// [`ConnectionConfig`](super::ConnectionConfig). Never cached.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CertificateBundle {
    pem: Vec<u8>,
    count: usize,
}

impl CertificateBundle {
    /// Re-encode a chain of DER certificates, leaf first, as one PEM bundle.
    pub fn from_der_chain<'a, I>(chain: I) -> Self
    where
        I: IntoIterator<Item = &'a [u8]>,
    {
        let mut pem = Vec::new();
        let mut count = 0;
        for der in chain {
            encode_certificate(&mut pem, der);
            count += 1;
        }
        Self { pem, count }
    }

    /// Number of certificates in the bundle.
    pub fn len(&self) -> usize {
        self.count
    }

    /// `true` if the bundle holds no certificate.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// PEM bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.pem
    }
}

/// Append one `CERTIFICATE` block to `out`.
fn encode_certificate(out: &mut Vec<u8>, der: &[u8]) {
    let body = STANDARD.encode(der);
    out.extend_from_slice(b"-----BEGIN CERTIFICATE-----\n");
    for line in body.as_bytes().chunks(PEM_LINE_WIDTH) {
        out.extend_from_slice(line);
        out.push(b'\n');
    }
    out.extend_from_slice(b"-----END CERTIFICATE-----\n");
}

impl fmt::Debug for CertificateBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateBundle")
            .field("certificates", &self.count)
            .field("pem_bytes", &self.pem.len())
            .finish()
    }
}
