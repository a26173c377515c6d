//! Core domain types for artisync.
//!
//! Pure data: artifacts as the language server reports them, the display tree
//! built from them, and the settings needed to reach the server. No IO, no
//! async.

mod artifact;
mod node;
mod project;
mod settings;

pub use artifact::{
    Artifact, ArtifactChangeNotification, ArtifactKind, ArtifactLocation, ArtifactMap, Category,
    CategoryChanges, ChangeSet, LinePosition, ProjectArtifacts, RawArtifactMap, RejectedArtifact,
    ValidatedChanges,
};
pub use node::{
    ArtifactNode, ArtifactsUpdated, DirectoryKey, DirectoryMap, NodePosition, ProjectStructure,
    ProjectStructureResponse, compare_names,
};
pub use project::ProjectInfo;
pub use settings::{DEFAULT_REQUEST_TIMEOUT_SECS, ServerConfig, ServerConfigError};
