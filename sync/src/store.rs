//! Owner of every open workspace tree.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::{Path, PathBuf};

use artisync_types::ProjectStructureResponse;

/// One [`ProjectStructureResponse`] per open workspace root.
#[derive(Debug, Default)]
pub struct SessionStore {
    trees: BTreeMap<PathBuf, ProjectStructureResponse>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) the tree of `root`.
    pub fn install(
        &mut self,
        root: PathBuf,
        response: ProjectStructureResponse,
    ) -> &mut ProjectStructureResponse {
        match self.trees.entry(root) {
            Entry::Occupied(mut entry) => {
                entry.insert(response);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(response),
        }
    }

    #[must_use]
    pub fn get(&self, root: &Path) -> Option<&ProjectStructureResponse> {
        self.trees.get(root)
    }

    pub fn get_mut(&mut self, root: &Path) -> Option<&mut ProjectStructureResponse> {
        self.trees.get_mut(root)
    }

    pub fn remove(&mut self, root: &Path) -> Option<ProjectStructureResponse> {
        self.trees.remove(root)
    }

    pub fn roots(&self) -> impl Iterator<Item = &Path> {
        self.trees.keys().map(PathBuf::as_path)
    }

    /// Root of the tree with a package containing `file`.
    ///
    /// With nested roots open, the tree whose matching package root is
    /// deepest owns the file.
    #[must_use]
    pub fn owner_of(&self, file: &Path) -> Option<&Path> {
        self.trees
            .iter()
            .filter_map(|(root, tree)| {
                let index = tree.package_index_for(file)?;
                let depth = tree.projects[index].project_path.components().count();
                Some((root, depth))
            })
            .max_by_key(|(_, depth)| *depth)
            .map(|(root, _)| root.as_path())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.trees.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}
