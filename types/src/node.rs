//! Display tree built from artifacts.
//!
//! A [`ProjectStructureResponse`] is the synchronized state of one open
//! workspace. It is created by the structure builder and afterwards only
//! mutated by the diff reconciler.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactLocation;

/// Four-corner source position of a node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodePosition {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl From<&ArtifactLocation> for NodePosition {
    fn from(location: &ArtifactLocation) -> Self {
        Self {
            start_line: location.start_line.line,
            start_column: location.start_line.offset,
            end_line: location.end_line.line,
            end_column: location.end_line.offset,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A single entry of the project tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactNode {
    pub id: String,
    pub name: String,
    /// Absolute path of the file that declares the artifact.
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub kind: String,
    pub icon: String,
    /// Grouping hint used by views to address the artifact.
    pub context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
    #[serde(default)]
    pub resources: Vec<ArtifactNode>,
    pub position: NodePosition,
    /// Set on nodes produced by an addition; a full rebuild clears it.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_new: bool,
}

impl ArtifactNode {
    /// This node, or one of its nested resources, addressed by id or name.
    #[must_use]
    pub fn find(&self, identifier: &str) -> Option<&ArtifactNode> {
        if self.id == identifier || self.name == identifier {
            return Some(self);
        }
        self.resources.iter().find_map(|r| r.find(identifier))
    }
}

/// Bucket key of a [`DirectoryMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DirectoryKey {
    Automation,
    Service,
    Listener,
    Function,
    Connection,
    Type,
    Configurable,
    DataMapper,
    NpFunction,
    Agents,
    LocalConnectors,
    Variable,
}

impl DirectoryKey {
    /// Buckets present in every freshly built map.
    pub const FIXED: [DirectoryKey; 11] = [
        DirectoryKey::Automation,
        DirectoryKey::Service,
        DirectoryKey::Listener,
        DirectoryKey::Function,
        DirectoryKey::Connection,
        DirectoryKey::Type,
        DirectoryKey::Configurable,
        DirectoryKey::DataMapper,
        DirectoryKey::NpFunction,
        DirectoryKey::Agents,
        DirectoryKey::LocalConnectors,
    ];
}

/// Ordering used for every bucket: case-insensitive, ties broken by the
/// exact spelling so the order is total.
#[must_use]
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Artifact nodes grouped by [`DirectoryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectoryMap(BTreeMap<DirectoryKey, Vec<ArtifactNode>>);

impl Default for DirectoryMap {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryMap {
    /// A map holding the fixed buckets, all empty.
    #[must_use]
    pub fn new() -> Self {
        Self(
            DirectoryKey::FIXED
                .into_iter()
                .map(|key| (key, Vec::new()))
                .collect(),
        )
    }

    /// Entries of `key`; empty when the bucket was never created.
    #[must_use]
    pub fn bucket(&self, key: DirectoryKey) -> &[ArtifactNode] {
        self.0.get(&key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Mutable bucket, created on demand.
    pub fn bucket_mut(&mut self, key: DirectoryKey) -> &mut Vec<ArtifactNode> {
        self.0.entry(key).or_default()
    }

    pub fn push(&mut self, key: DirectoryKey, node: ArtifactNode) {
        self.bucket_mut(key).push(node);
    }

    /// Remove every entry of `key` whose id equals `id`. Returns how many went.
    pub fn remove_by_id(&mut self, key: DirectoryKey, id: &str) -> usize {
        let bucket = self.bucket_mut(key);
        let before = bucket.len();
        bucket.retain(|node| node.id != id);
        before - bucket.len()
    }

    /// Replace the entry sharing `node.id` in place.
    ///
    /// Hands the node back when no entry matched.
    pub fn replace_by_id(&mut self, key: DirectoryKey, node: ArtifactNode) -> Result<(), ArtifactNode> {
        let bucket = self.bucket_mut(key);
        match bucket.iter_mut().find(|existing| existing.id == node.id) {
            Some(slot) => {
                *slot = node;
                Ok(())
            }
            None => Err(node),
        }
    }

    /// Stable sort of every bucket by [`compare_names`].
    pub fn sort_buckets(&mut self) {
        for bucket in self.0.values_mut() {
            bucket.sort_by(|a, b| compare_names(&a.name, &b.name));
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (DirectoryKey, &[ArtifactNode])> {
        self.0.iter().map(|(key, nodes)| (*key, nodes.as_slice()))
    }

    /// Total number of top-level entries across buckets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tree of one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStructure {
    pub project_name: String,
    pub project_path: PathBuf,
    pub project_title: String,
    pub is_library: bool,
    pub directory_map: DirectoryMap,
}

impl ProjectStructure {
    /// First node, in bucket order, addressed by id or name.
    #[must_use]
    pub fn find(&self, identifier: &str) -> Option<&ArtifactNode> {
        self.directory_map
            .iter()
            .flat_map(|(_, nodes)| nodes)
            .find_map(|node| node.find(identifier))
    }
}

/// Synchronized state of one open workspace (or single package).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStructureResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace_title: Option<String>,
    pub projects: Vec<ProjectStructure>,
}

impl ProjectStructureResponse {
    /// The package whose root contains `path`; the deepest root wins.
    #[must_use]
    pub fn package_index_for(&self, path: &Path) -> Option<usize> {
        self.projects
            .iter()
            .enumerate()
            .filter(|(_, project)| path.starts_with(&project.project_path))
            .max_by_key(|(_, project)| project.project_path.components().count())
            .map(|(index, _)| index)
    }

    #[must_use]
    pub fn project(&self, project_path: &Path) -> Option<&ProjectStructure> {
        self.projects
            .iter()
            .find(|project| project.project_path == project_path)
    }
}

/// Event published after every reconciliation, including no-op ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactsUpdated {
    pub data: Vec<ArtifactNode>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}
