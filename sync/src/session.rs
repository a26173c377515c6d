//! Session facade: owns the store, drives reconciliation from the server's
//! push channel and publishes [`ArtifactsUpdated`] events.

use std::path::{Path, PathBuf};

use artisync_lsp::{LspEvent, ServerStopReason, file_uri_to_path};
use artisync_types::{
    ArtifactChangeNotification, ArtifactNode, ArtifactsUpdated, ProjectInfo,
    ProjectStructureResponse,
};
use tokio::sync::{broadcast, mpsc};

use crate::builder::StructureBuilder;
use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::reconciler::{DiffReconciler, Reconciled, SkipReason};
use crate::source::ArtifactSource;
use crate::store::SessionStore;

pub struct SyncSession<S> {
    source: S,
    store: SessionStore,
    builder: StructureBuilder,
    reconciler: DiffReconciler,
    events_tx: broadcast::Sender<ArtifactsUpdated>,
    incoming: Option<mpsc::Receiver<LspEvent>>,
    stopped: Option<ServerStopReason>,
}

impl<S: ArtifactSource> SyncSession<S> {
    pub fn new(source: S, config: &SyncConfig) -> Self {
        let (events_tx, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            source,
            store: SessionStore::new(),
            builder: StructureBuilder::new(config),
            reconciler: DiffReconciler::new(config),
            events_tx,
            incoming: None,
            stopped: None,
        }
    }

    /// Take server pushes from `events` from now on.
    pub fn attach(&mut self, events: mpsc::Receiver<LspEvent>) {
        self.incoming = Some(events);
        self.stopped = None;
    }

    /// Build the tree of `info` and install it under its path.
    ///
    /// Nothing is installed when the build fails.
    pub async fn open_workspace(
        &mut self,
        info: &ProjectInfo,
    ) -> Result<&ProjectStructureResponse, SyncError> {
        let response = self.builder.build(info, &self.source).await?;
        tracing::info!(
            root = %info.project_path.display(),
            packages = response.projects.len(),
            "workspace opened"
        );
        let tree: &ProjectStructureResponse =
            self.store.install(info.project_path.clone(), response);
        Ok(tree)
    }

    /// Forget the tree of `root` and hand it back.
    pub fn close_workspace(&mut self, root: &Path) -> Result<ProjectStructureResponse, SyncError> {
        let removed = self
            .store
            .remove(root)
            .ok_or_else(|| SyncError::UnknownWorkspace(root.to_path_buf()))?;
        tracing::info!(root = %root.display(), "workspace closed");
        Ok(removed)
    }

    #[must_use]
    pub fn snapshot(&self, root: &Path) -> Option<&ProjectStructureResponse> {
        self.store.get(root)
    }

    pub fn roots(&self) -> impl Iterator<Item = &Path> {
        self.store.roots()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ArtifactsUpdated> {
        self.events_tx.subscribe()
    }

    /// Node of the open workspace `root` addressed by id or name, searching
    /// nested resources too.
    #[must_use]
    pub fn find_artifact(&self, root: &Path, identifier: &str) -> Option<&ArtifactNode> {
        self.store
            .get(root)?
            .projects
            .iter()
            .find_map(|project| project.find(identifier))
    }

    /// Apply one notification and publish the resulting event.
    ///
    /// An event is published even when nothing changed.
    pub fn apply(&mut self, notification: ArtifactChangeNotification) -> ArtifactsUpdated {
        let reconciled = match self.owner_root(&notification.uri) {
            Some(root) => match self.store.get_mut(&root) {
                Some(tree) => self.reconciler.reconcile(notification, tree),
                None => Reconciled {
                    skipped: Some(SkipReason::OutsideProject),
                    ..Reconciled::default()
                },
            },
            None => {
                tracing::debug!(uri = %notification.uri, "no open workspace owns notification");
                Reconciled {
                    skipped: Some(SkipReason::OutsideProject),
                    ..Reconciled::default()
                }
            }
        };

        let event = ArtifactsUpdated {
            data: reconciled.nodes,
            timestamp: chrono::Utc::now().timestamp_millis(),
        };
        // No subscribers is fine.
        let _ = self.events_tx.send(event.clone());
        event
    }

    fn owner_root(&self, uri: &str) -> Option<PathBuf> {
        let file = file_uri_to_path(uri)?;
        self.store.owner_of(&file).map(Path::to_path_buf)
    }

    /// Handle up to `budget` queued server events without waiting.
    /// Returns how many were handled.
    pub fn poll_events(&mut self, budget: usize) -> usize {
        let mut count = 0;
        while count < budget {
            let Some(incoming) = self.incoming.as_mut() else {
                break;
            };
            match incoming.try_recv() {
                Ok(event) => {
                    self.handle_event(event);
                    count += 1;
                }
                Err(mpsc::error::TryRecvError::Empty | mpsc::error::TryRecvError::Disconnected) => {
                    break;
                }
            }
        }
        count
    }

    /// Wait for the next server event and handle it.
    ///
    /// Returns `false` once the channel is closed or was never attached.
    pub async fn process_next(&mut self) -> bool {
        let Some(incoming) = self.incoming.as_mut() else {
            return false;
        };
        match incoming.recv().await {
            Some(event) => {
                self.handle_event(event);
                true
            }
            None => {
                self.incoming = None;
                false
            }
        }
    }

    fn handle_event(&mut self, event: LspEvent) {
        match event {
            LspEvent::ArtifactsChanged(notification) => {
                self.apply(notification);
            }
            LspEvent::ServerStopped { reason } => {
                match &reason {
                    ServerStopReason::Exited => {
                        tracing::info!("language server exited");
                    }
                    ServerStopReason::Failed(msg) => {
                        tracing::warn!(error = %msg, "language server failed");
                    }
                }
                self.stopped = Some(reason);
            }
        }
    }

    /// Why the attached server stopped, once it has.
    #[must_use]
    pub fn server_stopped(&self) -> Option<&ServerStopReason> {
        self.stopped.as_ref()
    }

    #[must_use]
    pub fn source(&self) -> &S {
        &self.source
    }
}
