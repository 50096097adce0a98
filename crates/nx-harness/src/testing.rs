//! Local stand-ins for the daemon's listeners, used by unit tests.
//!
//! Every listener binds `127.0.0.1:0` and serves a fresh certificate shaped
//! like the one a daemon generates on first start: self-signed, ECDSA P-521,
//! with `CA:true`.

use std::net::SocketAddr;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::{SinkExt, StreamExt};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::ServerConfig;
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

use crate::domain::{CertificateBundle, Credentials};
use crate::transport::crypto_provider;

/// An address nothing listens on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Self-signed P-521 certificate with `CA:true` for `127.0.0.1`.
pub fn daemon_certificate() -> rcgen::CertifiedKey {
    let key_pair = rcgen::KeyPair::generate_for(&rcgen::PKCS_ECDSA_P521_SHA512).unwrap();
    let mut params = rcgen::CertificateParams::new(vec!["127.0.0.1".to_string()]).unwrap();
    params.is_ca = rcgen::IsCa::Ca(rcgen::BasicConstraints::Unconstrained);
    let cert = params.self_signed(&key_pair).unwrap();
    rcgen::CertifiedKey { cert, key_pair }
}

fn self_signed_server() -> (TlsAcceptor, CertificateDer<'static>) {
    let key = daemon_certificate();
    let cert = key.cert.der().clone();
    let private = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.key_pair.serialize_der()));
    let config = ServerConfig::builder_with_provider(crypto_provider())
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert.clone()], private)
        .unwrap();
    (TlsAcceptor::from(Arc::new(config)), cert)
}

/// TLS-only listener that completes handshakes and holds connections open
/// until the client hangs up.
pub struct TlsListener {
    addr: SocketAddr,
    cert: CertificateDer<'static>,
    task: JoinHandle<()>,
}

impl TlsListener {
    pub async fn spawn() -> Self {
        let (acceptor, cert) = self_signed_server();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                tokio::spawn(async move {
                    if let Ok(mut tls) = acceptor.accept(stream).await {
                        let mut buf = [0u8; 512];
                        while matches!(tls.read(&mut buf).await, Ok(n) if n > 0) {}
                    }
                });
            }
        });

        Self { addr, cert, task }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Bundle a client would harvest from this listener.
    pub fn bundle(&self) -> CertificateBundle {
        CertificateBundle::from_der_chain([self.cert.as_ref()])
    }
}

impl Drop for TlsListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Plaintext HTTP listener that answers every request with a fixed status line.
pub struct PlainHttpServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl PlainHttpServer {
    pub async fn spawn(status_line: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let task = tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    let _ = stream.read(&mut buf).await;
                    let response = format!(
                        concat!(
                            "{}\r\n",
                            "Content-Type: application/json\r\n",
                            "Content-Length: 2\r\n",
                            "Connection: close\r\n\r\n{{}}",
                        ),
                        status_line
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        Self { addr, task }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Drop for PlainHttpServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Plays the daemon's `wss://…/ws` endpoint: TLS with a self-signed
/// certificate, basic auth checked on the upgrade, JSON-RPC 1.0 over text
/// frames. Answers `getblockcount`; every other method gets `-32601`.
pub struct FakeRpcDaemon {
    addr: SocketAddr,
    cert: CertificateDer<'static>,
    task: JoinHandle<()>,
}

impl FakeRpcDaemon {
    pub async fn spawn(credentials: Credentials, block_count: i64) -> Self {
        let (acceptor, cert) = self_signed_server();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let expected = format!(
            "Basic {}",
            STANDARD.encode(format!("{}:{}", credentials.user(), credentials.password()))
        );

        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let acceptor = acceptor.clone();
                let expected = expected.clone();
                tokio::spawn(serve_session(acceptor, stream, expected, block_count));
            }
        });

        Self { addr, cert, task }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn bundle(&self) -> CertificateBundle {
        CertificateBundle::from_der_chain([self.cert.as_ref()])
    }
}

impl Drop for FakeRpcDaemon {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_session(
    acceptor: TlsAcceptor,
    stream: TcpStream,
    expected: String,
    block_count: i64,
) {
    let Ok(tls) = acceptor.accept(stream).await else {
        return;
    };

    let check_auth = move |request: &Request, response: Response| {
        let authorized = request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value == expected);
        if authorized {
            Ok(response)
        } else {
            let mut refused = ErrorResponse::new(Some("unauthorized".to_string()));
            *refused.status_mut() = StatusCode::UNAUTHORIZED;
            Err(refused)
        }
    };

    let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(tls, check_auth).await else {
        return;
    };

    while let Some(Ok(message)) = ws.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let Ok(request) = serde_json::from_str::<serde_json::Value>(text.as_str()) else {
            continue;
        };
        let id = request["id"].clone();
        let reply = match request["method"].as_str() {
            Some("getblockcount") => json!({"result": block_count, "error": null, "id": id}),
            _ => json!({
                "result": null,
                "error": {"code": -32601, "message": "Method not found"},
                "id": id,
            }),
        };
        if ws.send(Message::text(reply.to_string())).await.is_err() {
            break;
        }
    }
}
