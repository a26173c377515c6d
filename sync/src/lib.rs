//! Keeps a materialized project tree in step with a language server.
//!
//! [`StructureBuilder`] produces the initial tree from full snapshots,
//! [`DiffReconciler`] applies pushed diffs, and [`SyncSession`] ties both to
//! an [`ArtifactSource`] and an event channel.

pub mod builder;
pub mod config;
pub mod error;
pub mod mapper;
pub mod reconciler;
pub mod session;
pub mod source;
pub mod store;

pub use builder::StructureBuilder;
pub use config::{ConfigError, SyncConfig, config_path};
pub use error::{MapError, SourceError, SyncError};
pub use mapper::{map_artifact, module_icon};
pub use reconciler::{CATEGORY_RULES, CategoryRule, DiffReconciler, Reconciled, SkipReason, rule_for};
pub use session::SyncSession;
pub use source::{ArtifactSource, SourceFut};
pub use store::SessionStore;
