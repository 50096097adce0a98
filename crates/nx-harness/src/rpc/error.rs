use thiserror::Error;

use crate::transport::TlsError;

/// Errors raised by [`RpcClient`](super::RpcClient).
#[derive(Debug, Error)]
pub enum RpcError {
    /// Client was configured with values it cannot use.
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),

    /// Trust store could not be built from the certificate bundle.
    #[error(transparent)]
    Tls(#[from] TlsError),

    /// Websocket upgrade failed (TCP, TLS, or HTTP auth).
    #[error("could not connect to {url}: {reason}")]
    Connect {
        /// Endpoint URL.
        url: String,
        /// Underlying error.
        reason: String,
    },

    /// A call was made before `connect` succeeded.
    #[error("client is not connected")]
    NotConnected,

    /// Server closed the session.
    #[error("connection closed by server")]
    Closed,

    /// Reading or writing the websocket failed.
    #[error("websocket transport error: {0}")]
    Transport(String),

    /// No response within the call timeout.
    #[error("no response to {method} within {timeout_secs}s")]
    Timeout {
        /// Method name.
        method: String,
        /// Timeout applied.
        timeout_secs: u64,
    },

    /// Request or response was not valid JSON-RPC.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Server answered with a JSON-RPC error object.
    #[error("server error {code}: {message}")]
    Server {
        /// JSON-RPC error code.
        code: i64,
        /// Server message.
        message: String,
    },

    /// Response carried neither a result nor an error.
    #[error("response to {0} has no result")]
    MissingResult(String),
}
