//! Public types shared between the client and its consumers.

use artisync_types::ArtifactChangeNotification;

/// Why the server connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerStopReason {
    Exited,
    Failed(String),
}

/// An event emitted by the client's reader task.
#[derive(Debug)]
pub enum LspEvent {
    /// The server pushed incremental artifact changes.
    ArtifactsChanged(ArtifactChangeNotification),
    ServerStopped { reason: ServerStopReason },
}

/// Failure of a single JSON-RPC request.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("server returned error {code}: {message}")]
    Server { code: i64, message: String },
    #[error("request {method} timed out")]
    Timeout { method: &'static str },
    #[error("connection to the language server is closed")]
    ChannelClosed,
    #[error("invalid payload for {method}: {source}")]
    Payload {
        method: &'static str,
        source: serde_json::Error,
    },
}
