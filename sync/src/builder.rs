//! Full tree construction from artifact snapshots.

use std::path::Path;

use artisync_types::{
    ArtifactKind, ArtifactNode, Category, DirectoryKey, DirectoryMap, NodePosition,
    ProjectArtifacts, ProjectInfo, ProjectStructure, ProjectStructureResponse,
};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::mapper::map_artifact;
use crate::source::ArtifactSource;

/// One category pass over a snapshot.
struct BuildPass {
    category: Category,
    kind: ArtifactKind,
    key: DirectoryKey,
    icon: &'static str,
}

const BUILD_PASSES: [BuildPass; 9] = [
    BuildPass {
        category: Category::EntryPoints,
        kind: ArtifactKind::Automation,
        key: DirectoryKey::Automation,
        icon: "task",
    },
    BuildPass {
        category: Category::EntryPoints,
        kind: ArtifactKind::Service,
        key: DirectoryKey::Service,
        icon: "http-service",
    },
    BuildPass {
        category: Category::Listeners,
        kind: ArtifactKind::Listener,
        key: DirectoryKey::Listener,
        icon: "http-service",
    },
    BuildPass {
        category: Category::Functions,
        kind: ArtifactKind::Function,
        key: DirectoryKey::Function,
        icon: "function",
    },
    BuildPass {
        category: Category::DataMappers,
        kind: ArtifactKind::DataMapper,
        key: DirectoryKey::DataMapper,
        icon: "dataMapper",
    },
    BuildPass {
        category: Category::Connections,
        kind: ArtifactKind::Connection,
        key: DirectoryKey::Connection,
        icon: "connection",
    },
    BuildPass {
        category: Category::Types,
        kind: ArtifactKind::Type,
        key: DirectoryKey::Type,
        icon: "type",
    },
    BuildPass {
        category: Category::Configurations,
        kind: ArtifactKind::Configurable,
        key: DirectoryKey::Configurable,
        icon: "config",
    },
    BuildPass {
        category: Category::NaturalFunctions,
        kind: ArtifactKind::NpFunction,
        key: DirectoryKey::NpFunction,
        icon: "function",
    },
];

/// Placeholder range of a generated connector inside the manifest.
const LOCAL_CONNECTOR_POSITION: NodePosition = NodePosition {
    start_line: 5,
    start_column: 0,
    end_line: 8,
    end_column: 61,
};

#[derive(Debug, Clone)]
pub struct StructureBuilder {
    sort_on_build: bool,
    manifest_file: String,
}

impl Default for StructureBuilder {
    fn default() -> Self {
        Self::new(&SyncConfig::default())
    }
}

impl StructureBuilder {
    #[must_use]
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            sort_on_build: config.sort_on_build,
            manifest_file: config.manifest_file.clone(),
        }
    }

    /// Build the tree of a package or of every package in a workspace.
    ///
    /// Any snapshot failure aborts the whole build.
    pub async fn build<S>(
        &self,
        info: &ProjectInfo,
        source: &S,
    ) -> Result<ProjectStructureResponse, SyncError>
    where
        S: ArtifactSource + ?Sized,
    {
        let mut projects = Vec::new();
        for package in info.packages() {
            projects.push(self.build_package(package, source).await?);
        }

        let mut response = ProjectStructureResponse {
            projects,
            ..ProjectStructureResponse::default()
        };
        if info.is_workspace() {
            response.workspace_name = Some(info.project_name.clone());
            response.workspace_path = Some(info.project_path.clone());
            response.workspace_title = Some(info.project_title.clone());
        }
        Ok(response)
    }

    async fn build_package<S>(
        &self,
        package: &ProjectInfo,
        source: &S,
    ) -> Result<ProjectStructure, SyncError>
    where
        S: ArtifactSource + ?Sized,
    {
        let path = &package.project_path;
        let snapshot = source
            .project_artifacts(path)
            .await
            .map_err(|source| SyncError::Snapshot {
                path: path.clone(),
                source,
            })?;

        let mut directory_map = DirectoryMap::new();
        populate(&mut directory_map, &snapshot, path);

        match source.generated_modules(path).await {
            Ok(modules) => {
                let manifest = path.join(&self.manifest_file);
                for module in modules {
                    directory_map.push(
                        DirectoryKey::LocalConnectors,
                        local_connector(module, &manifest),
                    );
                }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "listing generated modules failed: {e}");
            }
        }

        if self.sort_on_build {
            directory_map.sort_buckets();
        }

        tracing::debug!(
            project = %package.project_name,
            entries = directory_map.len(),
            "project structure built"
        );

        Ok(ProjectStructure {
            project_name: package.project_name.clone(),
            project_path: path.clone(),
            project_title: package.project_title.clone(),
            is_library: package.is_library,
            directory_map,
        })
    }
}

fn populate(directory_map: &mut DirectoryMap, snapshot: &ProjectArtifacts, project_path: &Path) {
    for pass in &BUILD_PASSES {
        let Some(artifacts) = snapshot.category(pass.category) else {
            continue;
        };
        for artifact in artifacts.values().filter(|a| a.kind == pass.kind) {
            match map_artifact(artifact, project_path, pass.icon, None) {
                Ok(node) => directory_map.push(pass.key, node),
                Err(e) => {
                    tracing::error!(id = %artifact.id, category = %pass.category, "dropping artifact: {e}");
                }
            }
        }
    }
}

fn local_connector(module: String, manifest: &Path) -> ArtifactNode {
    ArtifactNode {
        id: module.clone(),
        name: module.clone(),
        path: manifest.to_path_buf(),
        kind: "HTTP".to_string(),
        icon: "connection".to_string(),
        context: module,
        module_name: None,
        resources: Vec::new(),
        position: LOCAL_CONNECTOR_POSITION,
        is_new: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::source::SourceFut;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSource {
        snapshots: HashMap<PathBuf, serde_json::Value>,
        modules: Vec<String>,
        calls: Mutex<Vec<PathBuf>>,
    }

    impl FakeSource {
        fn with(mut self, path: &str, snapshot: serde_json::Value) -> Self {
            self.snapshots.insert(PathBuf::from(path), snapshot);
            self
        }
    }

    impl ArtifactSource for FakeSource {
        fn project_artifacts<'a>(&'a self, project_path: &'a Path) -> SourceFut<'a, ProjectArtifacts> {
            Box::pin(async move {
                self.calls.lock().unwrap().push(project_path.to_path_buf());
                let value = self
                    .snapshots
                    .get(project_path)
                    .cloned()
                    .ok_or_else(|| SourceError::Unavailable("no snapshot".to_string()))?;
                Ok(serde_json::from_value(value).unwrap())
            })
        }

        fn generated_modules<'a>(&'a self, _project_path: &'a Path) -> SourceFut<'a, Vec<String>> {
            Box::pin(async move { Ok(self.modules.clone()) })
        }
    }

    fn snapshot() -> serde_json::Value {
        serde_json::json!({
            "artifacts": {
                "Entry Points": {
                    "automation": { "id": "automation", "type": "AUTOMATION", "name": "automation" },
                    "s2": { "id": "s2", "type": "SERVICE", "name": "Orders", "module": "http" },
                    "s1": { "id": "s1", "type": "SERVICE", "name": "Billing", "module": "kafka" }
                },
                "Listeners": {
                    "l": { "id": "l", "type": "LISTENER", "name": "kl", "module": "kafka:Listener" }
                },
                "Functions": {
                    "f": { "id": "f", "type": "FUNCTION", "name": "helper" },
                    "odd": { "id": "odd", "type": "LISTENER", "name": "misplaced" }
                },
                "Types": {
                    "t": { "id": "t", "type": "TYPE", "name": "Order" }
                },
                "Natural Functions": {
                    "np": { "id": "np", "type": "NP_FUNCTION", "name": "summarize" }
                }
            }
        })
    }

    #[tokio::test]
    async fn test_build_single_package() {
        let source = FakeSource::default().with("/proj", snapshot());
        let info = ProjectInfo::package("orders", "/proj");

        let response = StructureBuilder::default().build(&info, &source).await.unwrap();
        assert!(response.workspace_name.is_none());
        assert_eq!(response.projects.len(), 1);

        let map = &response.projects[0].directory_map;
        assert_eq!(map.bucket(DirectoryKey::Automation)[0].name, "Automation");
        let services: Vec<&str> = map
            .bucket(DirectoryKey::Service)
            .iter()
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(services, ["Billing", "Orders"]);
        assert_eq!(map.bucket(DirectoryKey::Listener)[0].icon, "bi-kafka");
        // Kind must match the pass exactly.
        assert_eq!(map.bucket(DirectoryKey::Function).len(), 1);
        assert_eq!(map.bucket(DirectoryKey::NpFunction)[0].icon, "function");
        assert_eq!(map.bucket(DirectoryKey::Type)[0].icon, "type");
        assert!(map.bucket(DirectoryKey::Agents).is_empty());
    }

    #[tokio::test]
    async fn test_unsorted_build_keeps_snapshot_order() {
        let source = FakeSource::default().with("/proj", snapshot());
        let config = SyncConfig {
            sort_on_build: false,
            ..SyncConfig::default()
        };
        let response = StructureBuilder::new(&config)
            .build(&ProjectInfo::package("orders", "/proj"), &source)
            .await
            .unwrap();
        let services: Vec<&str> = response.projects[0]
            .directory_map
            .bucket(DirectoryKey::Service)
            .iter()
            .map(|n| n.name.as_str())
            .collect();
        assert_eq!(services, ["Orders", "Billing"]);
    }

    #[tokio::test]
    async fn test_build_is_idempotent() {
        let source = FakeSource::default().with("/proj", snapshot());
        let info = ProjectInfo::package("orders", "/proj");
        let builder = StructureBuilder::default();

        let first = builder.build(&info, &source).await.unwrap();
        let second = builder.build(&info, &source).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_local_connectors_point_at_manifest() {
        let source = FakeSource {
            modules: vec!["petstore".to_string()],
            ..FakeSource::default()
        }
        .with("/proj", serde_json::json!({ "artifacts": {} }));

        let response = StructureBuilder::default()
            .build(&ProjectInfo::package("orders", "/proj"), &source)
            .await
            .unwrap();
        let connectors = response.projects[0]
            .directory_map
            .bucket(DirectoryKey::LocalConnectors);
        assert_eq!(connectors.len(), 1);
        let node = &connectors[0];
        assert_eq!(node.id, "petstore");
        assert_eq!(node.context, "petstore");
        assert_eq!(node.kind, "HTTP");
        assert_eq!(node.icon, "connection");
        assert_eq!(node.path, PathBuf::from("/proj/Ballerina.toml"));
        assert_eq!(node.position, LOCAL_CONNECTOR_POSITION);
    }

    #[tokio::test]
    async fn test_workspace_builds_each_package() {
        let source = FakeSource::default()
            .with("/ws/a", serde_json::json!({ "artifacts": {} }))
            .with("/ws/b", snapshot());
        let mut info = ProjectInfo::package("ws", "/ws");
        info.children = vec![
            ProjectInfo::package("a", "/ws/a"),
            ProjectInfo::package("b", "/ws/b"),
        ];

        let response = StructureBuilder::default().build(&info, &source).await.unwrap();
        assert_eq!(response.workspace_name.as_deref(), Some("ws"));
        assert_eq!(response.projects.len(), 2);
        assert_eq!(response.projects[1].project_name, "b");
        assert_eq!(
            *source.calls.lock().unwrap(),
            vec![PathBuf::from("/ws/a"), PathBuf::from("/ws/b")]
        );
    }

    #[tokio::test]
    async fn test_snapshot_failure_aborts_build() {
        let source = FakeSource::default().with("/ws/a", serde_json::json!({ "artifacts": {} }));
        let mut info = ProjectInfo::package("ws", "/ws");
        info.children = vec![
            ProjectInfo::package("a", "/ws/a"),
            ProjectInfo::package("missing", "/ws/missing"),
        ];

        let err = StructureBuilder::default().build(&info, &source).await.unwrap_err();
        assert!(matches!(err, SyncError::Snapshot { path, .. } if path == Path::new("/ws/missing")));
    }
}
