use std::path::PathBuf;

use artisync_lsp::RpcError;

/// Failure of the remote artifact source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("artifact source unavailable: {0}")]
    Unavailable(String),
}

/// A single artifact that could not be turned into a node.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MapError {
    #[error("ai service {id} has no resource child to position on")]
    MissingAiResource { id: String },
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("fetching artifacts for {}: {source}", path.display())]
    Snapshot {
        path: PathBuf,
        #[source]
        source: SourceError,
    },
    #[error("no open workspace at {}", .0.display())]
    UnknownWorkspace(PathBuf),
}
