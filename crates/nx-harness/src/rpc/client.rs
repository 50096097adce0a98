//! Websocket JSON-RPC client for the daemon's authenticated RPC endpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use futures::{SinkExt, StreamExt};
use rustls::ClientConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use super::RpcError;
use crate::domain::{ConnectionConfig, Credentials};
use crate::transport::pinned_client_config;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Base delay between connection attempts.
const CONNECT_BASE_DELAY_MS: u64 = 500;

/// Maximum delay between connection attempts.
const MAX_CONNECT_DELAY_MS: u64 = 8_000;

/// Time allowed for one call's response.
const CALL_TIMEOUT_SECS: u64 = 30;

/// Time allowed for the close handshake on shutdown.
const CLOSE_TIMEOUT_SECS: u64 = 2;

/// JSON-RPC 1.0 request, as the daemon expects it.
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a, T: Serialize> {
    jsonrpc: &'static str,
    method: &'a str,
    params: T,
    id: u64,
}

/// JSON-RPC response. Notifications arrive with a null id.
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

/// Authenticated websocket RPC session.
///
/// Trusts only the certificates of its [`ConnectionConfig`] and sends the
/// configured credentials as HTTP basic auth on the upgrade request.
pub struct RpcClient {
    config: ConnectionConfig,
    tls: Arc<ClientConfig>,
    request_id: AtomicU64,
    socket: Mutex<Option<WsStream>>,
}

impl RpcClient {
    /// Build a client from `config`.
    ///
    /// Connects once immediately unless the config disables connect-on-new.
    pub async fn new(config: ConnectionConfig) -> Result<Self, RpcError> {
        let tls = pinned_client_config(config.certificates())?;
        let client = Self {
            config,
            tls,
            request_id: AtomicU64::new(1),
            socket: Mutex::new(None),
        };

        if client.config.connects_on_new() {
            client.connect(1).await?;
        }
        Ok(client)
    }

    /// Endpoint this client talks to.
    pub fn url(&self) -> String {
        self.config.url()
    }

    /// Open the websocket session, trying at most `tries` times.
    ///
    /// `tries` must be at least 1. An already open session is replaced.
    pub async fn connect(&self, tries: u32) -> Result<(), RpcError> {
        if tries == 0 {
            return Err(RpcError::InvalidConfig(
                "connect tries must be at least 1".to_string(),
            ));
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.open().await {
                Ok(stream) => {
                    *self.socket.lock().await = Some(stream);
                    info!(url = %self.config.url(), attempt, "RPC session established");
                    return Ok(());
                }
                Err(e) if attempt >= tries => return Err(e),
                Err(e) => {
                    let delay = connect_delay(attempt);
                    debug!(
                        url = %self.config.url(),
                        attempt,
                        error = %e,
                        ?delay,
                        "RPC connect failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Whether a session is currently open.
    pub async fn is_connected(&self) -> bool {
        self.socket.lock().await.is_some()
    }

    /// Issue one JSON-RPC call and wait for its response.
    pub async fn call<P, R>(&self, method: &str, params: P) -> Result<R, RpcError>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let payload = serde_json::to_string(&JsonRpcRequest {
            jsonrpc: "1.0",
            method,
            params,
            id,
        })?;

        let mut guard = self.socket.lock().await;
        let socket = guard.as_mut().ok_or(RpcError::NotConnected)?;

        socket
            .send(Message::text(payload))
            .await
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let response = tokio::time::timeout(
            Duration::from_secs(CALL_TIMEOUT_SECS),
            read_response(socket, id),
        )
        .await
        .map_err(|_| RpcError::Timeout {
            method: method.to_string(),
            timeout_secs: CALL_TIMEOUT_SECS,
        })??;

        if let Some(error) = response.error {
            return Err(RpcError::Server {
                code: error.code,
                message: error.message,
            });
        }

        let result = response
            .result
            .ok_or_else(|| RpcError::MissingResult(method.to_string()))?;
        Ok(serde_json::from_value(result)?)
    }

    /// `getblockcount`: height of the daemon's best chain.
    pub async fn get_block_count(&self) -> Result<i64, RpcError> {
        self.call("getblockcount", Vec::<()>::new()).await
    }

    /// Close the session. A client that never connected shuts down trivially.
    pub async fn shutdown(self) -> Result<(), RpcError> {
        let Some(mut socket) = self.socket.into_inner() else {
            debug!(url = %self.config.url(), "RPC client shut down without a session");
            return Ok(());
        };

        match socket.close(None).await {
            Ok(()) => {}
            Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)
            | Err(tokio_tungstenite::tungstenite::Error::AlreadyClosed) => return Ok(()),
            Err(e) => return Err(RpcError::Transport(e.to_string())),
        }

        // Drain until the peer acknowledges the close frame.
        let _ = tokio::time::timeout(Duration::from_secs(CLOSE_TIMEOUT_SECS), async {
            while let Some(Ok(_)) = socket.next().await {}
        })
        .await;

        info!(url = %self.config.url(), "RPC session closed");
        Ok(())
    }

    async fn open(&self) -> Result<WsStream, RpcError> {
        let url = self.config.url();
        let connect_err = |reason: String| RpcError::Connect {
            url: url.clone(),
            reason,
        };

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| connect_err(e.to_string()))?;
        request
            .headers_mut()
            .insert(AUTHORIZATION, basic_auth(self.config.credentials())?);

        let (stream, _response) = connect_async_tls_with_config(
            request,
            None,
            false,
            Some(Connector::Rustls(self.tls.clone())),
        )
        .await
        .map_err(|e| connect_err(e.to_string()))?;

        Ok(stream)
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("url", &self.config.url())
            .field("credentials", self.config.credentials())
            .finish_non_exhaustive()
    }
}

/// Read frames until the response carrying `id` arrives.
async fn read_response(socket: &mut WsStream, id: u64) -> Result<JsonRpcResponse, RpcError> {
    loop {
        let message = socket
            .next()
            .await
            .ok_or(RpcError::Closed)?
            .map_err(|e| RpcError::Transport(e.to_string()))?;

        let response: JsonRpcResponse = match message {
            Message::Text(text) => serde_json::from_str(text.as_str())?,
            Message::Binary(bytes) => serde_json::from_slice(&bytes)?,
            Message::Close(_) => return Err(RpcError::Closed),
            _ => continue,
        };

        if response.id == Some(id) {
            return Ok(response);
        }
    }
}

/// `Authorization: Basic base64(user:password)`
fn basic_auth(credentials: &Credentials) -> Result<HeaderValue, RpcError> {
    let token = STANDARD.encode(format!("{}:{}", credentials.user(), credentials.password()));
    HeaderValue::from_str(&format!("Basic {}", token))
        .map_err(|e| RpcError::InvalidConfig(format!("credentials not usable in a header: {}", e)))
}

/// Exponential backoff between connection attempts.
fn connect_delay(attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    let delay = CONNECT_BASE_DELAY_MS.saturating_mul(1u64 << exp);
    Duration::from_millis(delay.min(MAX_CONNECT_DELAY_MS))
}
