//! Package / workspace metadata handed to the structure builder.
//!
//! Produced by whatever reads the package manifests; this crate only
//! describes the shape.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub project_name: String,
    pub project_path: PathBuf,
    #[serde(default)]
    pub project_title: String,
    #[serde(default)]
    pub is_library: bool,
    /// Member packages; non-empty only for a workspace.
    #[serde(default)]
    pub children: Vec<ProjectInfo>,
}

impl ProjectInfo {
    /// A single package rooted at `path`.
    pub fn package(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let name = name.into();
        Self {
            project_title: name.clone(),
            project_name: name,
            project_path: path.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_workspace(&self) -> bool {
        !self.children.is_empty()
    }

    /// The packages to build: the children of a workspace, or `self`.
    #[must_use]
    pub fn packages(&self) -> Vec<&ProjectInfo> {
        if self.is_workspace() {
            self.children.iter().collect()
        } else {
            vec![self]
        }
    }
}
