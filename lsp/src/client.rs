//! Language-server connection: process lifecycle, request correlation and
//! push-notification dispatch.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use artisync_types::{ArtifactChangeNotification, ProjectArtifacts, ServerConfig};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::codec::{FrameReader, FrameWriter};
use crate::protocol::{
    self, GeneratedModules, IncomingFrame, Notification, ProjectPathParams, Request,
};
use crate::types::{LspEvent, RpcError, ServerStopReason};

const SHUTDOWN_TIMEOUT_SECS: u64 = 2;

const WRITER_CHANNEL_CAPACITY: usize = 64;

const EVENT_CHANNEL_CAPACITY: usize = 256;

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<serde_json::Value>>>>;

enum WriterCommand {
    Send(serde_json::Value),
    Shutdown,
}

/// A live JSON-RPC connection to a language server.
///
/// Requests take `&self`, so one client can be shared (behind an `Arc`) by
/// the structure builder and the capability negotiator at the same time.
pub struct LanguageClient {
    writer_tx: mpsc::Sender<WriterCommand>,
    next_id: AtomicU64,
    pending: PendingMap,
    request_timeout: Duration,
    child: Option<Child>,
    #[allow(dead_code)]
    reader_handle: JoinHandle<()>,
    #[allow(dead_code)]
    writer_handle: JoinHandle<()>,
}

impl LanguageClient {
    /// Spawn the configured server, run the `initialize` handshake and return
    /// the client together with its event stream.
    pub async fn start(
        config: &ServerConfig,
        workspace_root: &Path,
    ) -> Result<(Self, mpsc::Receiver<LspEvent>)> {
        let resolved_cmd = which::which(config.command())
            .with_context(|| format!("{} not found in PATH", config.command()))?;
        let mut child = Command::new(&resolved_cmd)
            .args(config.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning {}", config.command()))?;

        let stdout = child.stdout.take().context("no stdout from child")?;
        let stdin = child.stdin.take().context("no stdin from child")?;

        let (mut client, events) = Self::connect(stdout, stdin, config.request_timeout());
        client.child = Some(child);
        client.initialize(workspace_root).await?;

        Ok((client, events))
    }

    /// Wire a client over an arbitrary byte stream pair.
    ///
    /// No handshake is performed; `start` does that for spawned servers.
    pub fn connect<R, W>(
        reader: R,
        writer: W,
        request_timeout: Duration,
    ) -> (Self, mpsc::Receiver<LspEvent>)
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let (writer_tx, mut writer_rx) = mpsc::channel::<WriterCommand>(WRITER_CHANNEL_CAPACITY);
        let writer_handle = tokio::spawn(async move {
            let mut writer = FrameWriter::new(writer);
            while let Some(cmd) = writer_rx.recv().await {
                match cmd {
                    WriterCommand::Send(frame) => {
                        if let Err(e) = writer.write_frame(&frame).await {
                            tracing::warn!("LSP write error: {e}");
                            break;
                        }
                    }
                    WriterCommand::Shutdown => break,
                }
            }
        });

        let reader_pending = pending.clone();
        let reader_writer_tx = writer_tx.clone();
        let reader_handle = tokio::spawn(async move {
            let mut reader = FrameReader::new(reader);
            let reason = loop {
                match reader.read_frame().await {
                    Ok(Some(frame)) => {
                        Self::dispatch_frame(&frame, &reader_pending, &event_tx, &reader_writer_tx)
                            .await;
                    }
                    Ok(None) => {
                        tracing::info!("language server closed its output");
                        break ServerStopReason::Exited;
                    }
                    Err(e) => {
                        tracing::warn!("LSP reader error: {e}");
                        break ServerStopReason::Failed(e.to_string());
                    }
                }
            };
            // Waiters see a dropped sender rather than hanging until timeout.
            reader_pending.lock().await.clear();
            let _ = event_tx.send(LspEvent::ServerStopped { reason }).await;
        });

        let client = Self {
            writer_tx,
            next_id: AtomicU64::new(1),
            pending,
            request_timeout,
            child: None,
            reader_handle,
            writer_handle,
        };
        (client, event_rx)
    }

    async fn dispatch_frame(
        frame: &serde_json::Value,
        pending: &Mutex<HashMap<u64, oneshot::Sender<serde_json::Value>>>,
        event_tx: &mpsc::Sender<LspEvent>,
        writer_tx: &mpsc::Sender<WriterCommand>,
    ) {
        let Some(incoming) = protocol::parse_incoming(frame) else {
            tracing::trace!("Ignoring malformed JSON-RPC frame");
            return;
        };

        match incoming {
            IncomingFrame::Response { id, body } => {
                let sender = pending.lock().await.remove(&id);
                if let Some(tx) = sender {
                    let _ = tx.send(body);
                }
            }
            IncomingFrame::ServerRequest { id, method } => {
                // The server blocks on some of these; answer so it can go on.
                tracing::debug!("server sent request {method}, replying method not found");
                let _ = writer_tx
                    .send(WriterCommand::Send(protocol::method_not_found(id, &method)))
                    .await;
            }
            IncomingFrame::Notification { method, params } => {
                Self::handle_notification(&method, params, event_tx).await;
            }
        }
    }

    async fn handle_notification(
        method: &str,
        params: Option<serde_json::Value>,
        event_tx: &mpsc::Sender<LspEvent>,
    ) {
        if method != protocol::PUBLISH_ARTIFACTS {
            tracing::trace!("Ignoring notification: {method}");
            return;
        }
        let Some(params) = params.filter(|p| !p.is_null()) else {
            return;
        };
        let uri = params
            .get("uri")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();
        let notification = match serde_json::from_value::<ArtifactChangeNotification>(params) {
            Ok(notification) => {
                tracing::debug!(uri = %notification.uri, "artifacts published");
                notification
            }
            Err(e) => {
                // Still forwarded so subscribers get their (empty) update.
                tracing::warn!(uri = %uri, "Failed to parse {method} payload: {e}");
                ArtifactChangeNotification::empty(uri)
            }
        };
        let _ = event_tx
            .send(LspEvent::ArtifactsChanged(notification))
            .await;
    }

    /// Standard LSP `initialize` / `initialized` exchange.
    pub async fn initialize(&self, workspace_root: &Path) -> Result<()> {
        let root_uri = protocol::path_to_file_uri(workspace_root)
            .context("converting workspace root to URI")?;

        let params = protocol::initialize_params(root_uri.as_str());
        self.send_request(protocol::INITIALIZE, Some(params))
            .await
            .context("LSP initialize failed")?;

        self.send_notification(protocol::INITIALIZED, Some(serde_json::json!({})))
            .await
            .context("sending initialized")?;

        Ok(())
    }

    /// Typed request: serialize `params`, await the response, decode `result`.
    pub async fn request<P, R>(&self, method: &'static str, params: &P) -> Result<R, RpcError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let params = serde_json::to_value(params)
            .map_err(|source| RpcError::Payload { method, source })?;
        let result = self.send_request(method, Some(params)).await?;
        serde_json::from_value(result).map_err(|source| RpcError::Payload { method, source })
    }

    async fn send_request(
        &self,
        method: &'static str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let request = Request::new(id, method, params);
        let frame = serde_json::to_value(&request)
            .map_err(|source| RpcError::Payload { method, source })?;
        if self
            .writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .is_err()
        {
            self.pending.lock().await.remove(&id);
            return Err(RpcError::ChannelClosed);
        }

        let response = match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                self.pending.lock().await.remove(&id);
                return Err(RpcError::ChannelClosed);
            }
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(RpcError::Timeout { method });
            }
        };

        protocol::into_result(response)
    }

    async fn send_notification(
        &self,
        method: &'static str,
        params: Option<serde_json::Value>,
    ) -> Result<(), RpcError> {
        let notification = Notification::new(method, params);
        let frame = serde_json::to_value(&notification)
            .map_err(|source| RpcError::Payload { method, source })?;
        self.writer_tx
            .send(WriterCommand::Send(frame))
            .await
            .map_err(|_| RpcError::ChannelClosed)
    }

    /// Full artifact snapshot of one package.
    pub async fn project_artifacts(&self, project_path: &Path) -> Result<ProjectArtifacts, RpcError> {
        self.request(protocol::PROJECT_ARTIFACTS, &ProjectPathParams { project_path })
            .await
    }

    /// Names of the modules generated into a package (local connectors).
    pub async fn generated_modules(&self, project_path: &Path) -> Result<Vec<String>, RpcError> {
        let response: GeneratedModules = self
            .request(protocol::GENERATED_MODULES, &ProjectPathParams { project_path })
            .await?;
        Ok(response.modules)
    }

    /// Gracefully shut down the server. Consumes self.
    pub async fn shutdown(mut self) {
        if self.send_request(protocol::SHUTDOWN, None).await.is_ok() {
            let _ = self.send_notification(protocol::EXIT, None).await;
        }

        let _ = self.writer_tx.send(WriterCommand::Shutdown).await;

        let Some(mut child) = self.child.take() else {
            return;
        };
        let waited = tokio::time::timeout(
            Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
            child.wait(),
        )
        .await;

        if waited.is_err() {
            tracing::debug!("language server didn't exit in time, killing");
            let _ = child.kill().await;
        }
    }
}
