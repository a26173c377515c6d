//! Where full artifact snapshots come from.

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use artisync_lsp::LanguageClient;
use artisync_types::ProjectArtifacts;

use crate::error::SourceError;

pub type SourceFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Remote provider of per-package artifact snapshots.
pub trait ArtifactSource: Send + Sync {
    /// Every artifact of the package rooted at `project_path`.
    fn project_artifacts<'a>(&'a self, project_path: &'a Path) -> SourceFut<'a, ProjectArtifacts>;

    /// Names of the client modules generated into the package.
    fn generated_modules<'a>(&'a self, project_path: &'a Path) -> SourceFut<'a, Vec<String>>;
}

impl ArtifactSource for LanguageClient {
    fn project_artifacts<'a>(&'a self, project_path: &'a Path) -> SourceFut<'a, ProjectArtifacts> {
        Box::pin(async move { Ok(LanguageClient::project_artifacts(self, project_path).await?) })
    }

    fn generated_modules<'a>(&'a self, project_path: &'a Path) -> SourceFut<'a, Vec<String>> {
        Box::pin(async move { Ok(LanguageClient::generated_modules(self, project_path).await?) })
    }
}

impl<T: ArtifactSource + ?Sized> ArtifactSource for Arc<T> {
    fn project_artifacts<'a>(&'a self, project_path: &'a Path) -> SourceFut<'a, ProjectArtifacts> {
        (**self).project_artifacts(project_path)
    }

    fn generated_modules<'a>(&'a self, project_path: &'a Path) -> SourceFut<'a, Vec<String>> {
        (**self).generated_modules(project_path)
    }
}
