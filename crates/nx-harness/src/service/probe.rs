//! One-shot dials against daemon ports.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rustls::pki_types::ServerName;
use rustls::ClientConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

use crate::domain::{Credentials, HarnessError};

/// Upper bound for a single TCP connect or TLS handshake.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Time allowed for the daemon to answer a plaintext request.
const PLAINTEXT_READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a TCP connection.
pub async fn dial_tcp(addr: SocketAddr) -> io::Result<TcpStream> {
    timeout(DIAL_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))?
}

/// Open a TCP connection and complete a TLS handshake over it.
pub async fn dial_tls(
    addr: SocketAddr,
    config: Arc<ClientConfig>,
) -> io::Result<TlsStream<TcpStream>> {
    let tcp = dial_tcp(addr).await?;
    let connector = TlsConnector::from(config);
    timeout(DIAL_TIMEOUT, connector.connect(ServerName::from(addr.ip()), tcp))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "TLS handshake timed out"))?
}

/// Dial `addr` exactly once and expect the attempt to fail.
///
/// No retry: a refused or timed-out dial is the expected outcome.
pub async fn assert_closed(addr: SocketAddr) -> Result<(), HarnessError> {
    match dial_tcp(addr).await {
        Ok(_) => Err(HarnessError::UnexpectedlyOpen {
            target: addr.to_string(),
        }),
        Err(e) => {
            debug!(addr = %addr, error = %e, "port is closed as expected");
            Ok(())
        }
    }
}

/// Send a plaintext HTTP JSON-RPC request and report whether it was refused.
///
/// Refused means no `2xx` plaintext HTTP answer came back: a TLS alert, a
/// closed connection, silence, or an error status such as the `400` a TLS
/// listener returns to plaintext clients.
pub async fn plaintext_rejected(
    addr: SocketAddr,
    credentials: &Credentials,
) -> Result<bool, HarnessError> {
    let mut stream = dial_tcp(addr).await.map_err(|e| HarnessError::Probe {
        target: addr.to_string(),
        reason: e.to_string(),
    })?;

    let request = plaintext_request(addr, credentials);
    if let Err(e) = stream.write_all(request.as_bytes()).await {
        debug!(addr = %addr, error = %e, "plaintext write refused");
        return Ok(true);
    }

    let mut buf = vec![0u8; 1024];
    let read = match timeout(PLAINTEXT_READ_TIMEOUT, stream.read(&mut buf)).await {
        Ok(Ok(n)) => n,
        Ok(Err(e)) => {
            debug!(addr = %addr, error = %e, "plaintext read failed");
            0
        }
        Err(_) => 0,
    };

    let status = plaintext_status(&buf[..read]);
    debug!(addr = %addr, ?status, "plaintext probe answered");
    Ok(!matches!(status, Some(200..=299)))
}

fn plaintext_request(addr: SocketAddr, credentials: &Credentials) -> String {
    let body = r#"{"jsonrpc":"1.0","method":"getblockcount","params":[],"id":1}"#;
    let token = STANDARD.encode(format!("{}:{}", credentials.user(), credentials.password()));
    format!(
        concat!(
            "POST / HTTP/1.1\r\n",
            "Host: {}\r\n",
            "Authorization: Basic {}\r\n",
            "Content-Type: application/json\r\n",
            "Content-Length: {}\r\n",
            "Connection: close\r\n\r\n{}",
        ),
        addr,
        token,
        body.len(),
        body
    )
}

/// Status code of a plaintext HTTP response, if `response` is one.
fn plaintext_status(response: &[u8]) -> Option<u16> {
    let line = response.split(|b| *b == b'\n').next()?;
    let line = std::str::from_utf8(line).ok()?;
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}
