//! Incremental application of server-pushed artifact changes.
//!
//! Per notification: guard, then every deletion, then additions and updates
//! as one mapped batch, then a resort of every bucket of the package.

use std::path::{Path, PathBuf};

use artisync_lsp::file_uri_to_path;
use artisync_types::{
    Artifact, ArtifactChangeNotification, ArtifactNode, Category, DirectoryKey, DirectoryMap,
    ProjectStructureResponse,
};

use crate::config::SyncConfig;
use crate::error::MapError;
use crate::mapper::map_artifact;

/// Where artifacts of a category land and the icon they get by default.
#[derive(Debug, Clone, Copy)]
pub struct CategoryRule {
    pub category: Category,
    pub key: DirectoryKey,
    pub icon: &'static str,
    applies: fn(&Artifact) -> bool,
}

fn is_automation(artifact: &Artifact) -> bool {
    artifact.id == "automation"
}

fn always(_: &Artifact) -> bool {
    true
}

/// First matching rule wins.
pub static CATEGORY_RULES: [CategoryRule; 10] = [
    CategoryRule {
        category: Category::EntryPoints,
        key: DirectoryKey::Automation,
        icon: "task",
        applies: is_automation,
    },
    CategoryRule {
        category: Category::EntryPoints,
        key: DirectoryKey::Service,
        icon: "http-service",
        applies: always,
    },
    CategoryRule {
        category: Category::Listeners,
        key: DirectoryKey::Listener,
        icon: "http-service",
        applies: always,
    },
    CategoryRule {
        category: Category::Functions,
        key: DirectoryKey::Function,
        icon: "function",
        applies: always,
    },
    CategoryRule {
        category: Category::DataMappers,
        key: DirectoryKey::DataMapper,
        icon: "dataMapper",
        applies: always,
    },
    CategoryRule {
        category: Category::Connections,
        key: DirectoryKey::Connection,
        icon: "connection",
        applies: always,
    },
    CategoryRule {
        category: Category::Types,
        key: DirectoryKey::Type,
        icon: "type",
        applies: always,
    },
    CategoryRule {
        category: Category::Configurations,
        key: DirectoryKey::Configurable,
        icon: "config",
        applies: always,
    },
    CategoryRule {
        category: Category::NaturalFunctions,
        key: DirectoryKey::NpFunction,
        icon: "function",
        applies: always,
    },
    CategoryRule {
        category: Category::Variables,
        key: DirectoryKey::Variable,
        icon: "variable",
        applies: always,
    },
];

/// Resolve the bucket and default icon of `artifact` reported under `category`.
#[must_use]
pub fn rule_for(category: Category, artifact: &Artifact) -> Option<&'static CategoryRule> {
    CATEGORY_RULES
        .iter()
        .find(|rule| rule.category == category && (rule.applies)(artifact))
}

/// Why a notification left the tree untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The URI is not a local file.
    NotAFile,
    /// No tracked package contains the file.
    OutsideProject,
    /// The change is scoped to a submodule.
    Submodule(String),
    /// The file lives under an ignored directory such as `persist`.
    IgnoredDirectory(String),
    /// The file lives in the system temporary directory.
    TempDirectory,
}

/// Outcome of one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciled {
    /// Added and updated nodes, in notification order.
    pub nodes: Vec<ArtifactNode>,
    pub skipped: Option<SkipReason>,
    /// Artifacts lost to mapping failures.
    pub dropped: usize,
}

impl Reconciled {
    fn skipped(reason: SkipReason) -> Self {
        Self {
            skipped: Some(reason),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Add,
    Update,
}

/// Applies change notifications to a tree.
#[derive(Debug, Clone)]
pub struct DiffReconciler {
    ignored_dirs: Vec<String>,
    temp_dir: Option<PathBuf>,
}

impl Default for DiffReconciler {
    fn default() -> Self {
        Self::new(&SyncConfig::default())
    }
}

impl DiffReconciler {
    #[must_use]
    pub fn new(config: &SyncConfig) -> Self {
        Self {
            ignored_dirs: config.ignored_dirs.clone(),
            temp_dir: config.skip_temp_dir.then(std::env::temp_dir),
        }
    }

    pub fn reconcile(
        &self,
        notification: ArtifactChangeNotification,
        tree: &mut ProjectStructureResponse,
    ) -> Reconciled {
        let uri = notification.uri.clone();
        let (index, project_path) = match self.guard(&notification, tree) {
            Ok(found) => found,
            Err(reason) => {
                tracing::debug!(uri = %uri, ?reason, "notification skipped");
                return Reconciled::skipped(reason);
            }
        };

        let validated = notification.validate();
        for key in &validated.unknown_categories {
            tracing::warn!(category = %key, "unknown artifact category, skipping");
        }
        for rejected in &validated.rejected {
            tracing::error!(
                key = %rejected.key,
                category = %rejected.category,
                "dropping malformed artifact: {}",
                rejected.error
            );
        }

        let directory_map = &mut tree.projects[index].directory_map;

        for changes in &validated.changes {
            for artifact in &changes.deletions {
                if let Some(rule) = rule_for(changes.category, artifact) {
                    directory_map.remove_by_id(rule.key, &artifact.id);
                }
            }
        }

        // Map every addition and update before touching the tree.
        let batch: Vec<_> = validated
            .changes
            .iter()
            .flat_map(|changes| {
                let additions = changes.additions.iter().map(|a| (Action::Add, a));
                let updates = changes.updates.iter().map(|a| (Action::Update, a));
                additions
                    .chain(updates)
                    .map(move |(action, artifact)| (changes.category, action, artifact))
            })
            .map(|(category, action, artifact)| {
                let outcome = map_change(category, artifact, &project_path);
                (category, action, artifact, outcome)
            })
            .collect();

        let mut reconciled = Reconciled {
            dropped: validated.rejected.len(),
            ..Reconciled::default()
        };
        for (category, action, artifact, outcome) in batch {
            match outcome {
                Ok((key, node)) => {
                    reconciled
                        .nodes
                        .push(apply(directory_map, key, action, node));
                }
                Err(e) => {
                    tracing::error!(id = %artifact.id, %category, "dropping artifact: {e}");
                    reconciled.dropped += 1;
                }
            }
        }

        directory_map.sort_buckets();

        tracing::debug!(
            uri = %uri,
            changed = reconciled.nodes.len(),
            dropped = reconciled.dropped,
            "notification reconciled"
        );
        reconciled
    }

    fn guard(
        &self,
        notification: &ArtifactChangeNotification,
        tree: &ProjectStructureResponse,
    ) -> Result<(usize, PathBuf), SkipReason> {
        let file = file_uri_to_path(&notification.uri).ok_or(SkipReason::NotAFile)?;

        if let Some(temp_dir) = &self.temp_dir
            && file.starts_with(temp_dir)
        {
            return Err(SkipReason::TempDirectory);
        }

        if let Some(module) = &notification.module_name {
            return Err(SkipReason::Submodule(module.clone()));
        }

        let index = tree
            .package_index_for(&file)
            .ok_or(SkipReason::OutsideProject)?;
        let project_path = tree.projects[index].project_path.clone();

        if let Some(dir) = self.ignored_component(&file, &project_path) {
            return Err(SkipReason::IgnoredDirectory(dir));
        }

        Ok((index, project_path))
    }

    fn ignored_component(&self, file: &Path, project_path: &Path) -> Option<String> {
        let relative = file.strip_prefix(project_path).ok()?;
        relative
            .parent()?
            .components()
            .filter_map(|c| c.as_os_str().to_str())
            .find(|name| self.ignored_dirs.iter().any(|ignored| ignored == name))
            .map(String::from)
    }
}

#[derive(Debug, thiserror::Error)]
enum ChangeError {
    #[error("no directory for category {0}")]
    NoRule(Category),
    #[error(transparent)]
    Map(#[from] MapError),
}

fn map_change(
    category: Category,
    artifact: &Artifact,
    project_path: &Path,
) -> Result<(DirectoryKey, ArtifactNode), ChangeError> {
    let rule = rule_for(category, artifact).ok_or(ChangeError::NoRule(category))?;
    let node = map_artifact(artifact, project_path, rule.icon, None)?;
    Ok((rule.key, node))
}

fn apply(
    directory_map: &mut DirectoryMap,
    key: DirectoryKey,
    action: Action,
    mut node: ArtifactNode,
) -> ArtifactNode {
    match action {
        Action::Add => {
            node.is_new = true;
            directory_map.push(key, node.clone());
        }
        Action::Update => {
            if let Err(missing) = directory_map.replace_by_id(key, node.clone()) {
                tracing::warn!(id = %missing.id, ?key, "update target not found, adding instead");
                directory_map.push(key, missing);
            }
        }
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use artisync_types::{NodePosition, ProjectStructure};

    fn node(id: &str, name: &str) -> ArtifactNode {
        ArtifactNode {
            id: id.to_string(),
            name: name.to_string(),
            path: PathBuf::from("/proj/main.bal"),
            kind: "SERVICE".to_string(),
            icon: "bi-globe".to_string(),
            context: name.to_string(),
            module_name: Some("http".to_string()),
            resources: Vec::new(),
            position: NodePosition::default(),
            is_new: false,
        }
    }

    fn tree() -> ProjectStructureResponse {
        let mut directory_map = DirectoryMap::new();
        directory_map.push(DirectoryKey::Service, node("s1", "Orders"));
        ProjectStructureResponse {
            projects: vec![ProjectStructure {
                project_name: "orders".to_string(),
                project_path: PathBuf::from("/proj"),
                project_title: "Orders".to_string(),
                is_library: false,
                directory_map,
            }],
            ..ProjectStructureResponse::default()
        }
    }

    fn notification(value: serde_json::Value) -> ArtifactChangeNotification {
        serde_json::from_value(value).unwrap()
    }

    fn names(tree: &ProjectStructureResponse, key: DirectoryKey) -> Vec<String> {
        tree.projects[0]
            .directory_map
            .bucket(key)
            .iter()
            .map(|n| n.name.clone())
            .collect()
    }

    #[test]
    fn test_category_table() {
        let automation: Artifact = serde_json::from_value(serde_json::json!({
            "id": "automation", "type": "AUTOMATION", "name": "automation"
        }))
        .unwrap();
        let service: Artifact = serde_json::from_value(serde_json::json!({
            "id": "s", "type": "SERVICE", "name": "x"
        }))
        .unwrap();

        let rule = rule_for(Category::EntryPoints, &automation).unwrap();
        assert_eq!((rule.key, rule.icon), (DirectoryKey::Automation, "task"));
        let rule = rule_for(Category::EntryPoints, &service).unwrap();
        assert_eq!((rule.key, rule.icon), (DirectoryKey::Service, "http-service"));
        let rule = rule_for(Category::DataMappers, &service).unwrap();
        assert_eq!((rule.key, rule.icon), (DirectoryKey::DataMapper, "dataMapper"));
        let rule = rule_for(Category::Variables, &service).unwrap();
        assert_eq!((rule.key, rule.icon), (DirectoryKey::Variable, "variable"));
        for category in Category::ALL {
            assert!(rule_for(category, &service).is_some(), "{category} has no rule");
        }
    }

    #[test]
    fn test_addition_marks_new_and_sorts() {
        let mut tree = tree();
        let result = DiffReconciler::default().reconcile(
            notification(serde_json::json!({
                "uri": "file:///proj/main.bal",
                "artifacts": {
                    "Entry Points": {
                        "additions": {
                            "s0": { "id": "s0", "type": "SERVICE", "name": "Accounts", "module": "http" }
                        }
                    }
                }
            })),
            &mut tree,
        );
        assert_eq!(result.nodes.len(), 1);
        assert!(result.nodes[0].is_new);
        assert_eq!(names(&tree, DirectoryKey::Service), ["Accounts", "Orders"]);
        assert!(tree.projects[0].directory_map.bucket(DirectoryKey::Service)[0].is_new);
    }

    #[test]
    fn test_update_replaces_in_place() {
        let mut tree = tree();
        let result = DiffReconciler::default().reconcile(
            notification(serde_json::json!({
                "uri": "file:///proj/main.bal",
                "artifacts": {
                    "Entry Points": {
                        "updates": {
                            "s1": { "id": "s1", "type": "SERVICE", "name": "Purchases", "module": "kafka" }
                        }
                    }
                }
            })),
            &mut tree,
        );
        assert_eq!(result.nodes[0].name, "Purchases");
        assert!(!result.nodes[0].is_new);
        let bucket = tree.projects[0].directory_map.bucket(DirectoryKey::Service);
        assert_eq!(bucket.len(), 1);
        assert_eq!(bucket[0].icon, "bi-kafka");
    }

    #[test]
    fn test_update_miss_adds() {
        let mut tree = tree();
        let result = DiffReconciler::default().reconcile(
            notification(serde_json::json!({
                "uri": "file:///proj/main.bal",
                "artifacts": {
                    "Functions": {
                        "updates": { "f9": { "id": "f9", "type": "FUNCTION", "name": "late" } }
                    }
                }
            })),
            &mut tree,
        );
        assert_eq!(result.nodes.len(), 1);
        assert_eq!(names(&tree, DirectoryKey::Function), ["late"]);
    }

    #[test]
    fn test_delete_then_add_same_id() {
        let mut tree = tree();
        DiffReconciler::default().reconcile(
            notification(serde_json::json!({
                "uri": "file:///proj/main.bal",
                "artifacts": {
                    "Entry Points": {
                        "additions": {
                            "s1": { "id": "s1", "type": "SERVICE", "name": "Orders v2", "module": "http" }
                        },
                        "deletions": {
                            "s1": { "id": "s1", "type": "SERVICE", "name": "Orders" }
                        }
                    }
                }
            })),
            &mut tree,
        );
        assert_eq!(names(&tree, DirectoryKey::Service), ["Orders v2"]);
    }

    #[test]
    fn test_variables_bucket_created_on_demand() {
        let mut tree = tree();
        DiffReconciler::default().reconcile(
            notification(serde_json::json!({
                "uri": "file:///proj/main.bal",
                "artifacts": {
                    "Variables": {
                        "additions": { "v": { "id": "v", "type": "VARIABLE", "name": "counter" } }
                    }
                }
            })),
            &mut tree,
        );
        let bucket = tree.projects[0].directory_map.bucket(DirectoryKey::Variable);
        assert_eq!(bucket.len(), 1);
        assert_eq!(bucket[0].icon, "variable");
    }

    #[test]
    fn test_failed_mapping_drops_only_that_artifact() {
        let mut tree = tree();
        let result = DiffReconciler::default().reconcile(
            notification(serde_json::json!({
                "uri": "file:///proj/main.bal",
                "artifacts": {
                    "Entry Points": {
                        "additions": {
                            "agent": { "id": "agent", "type": "SERVICE", "name": "/chat", "module": "ai" },
                            "s3": { "id": "s3", "type": "SERVICE", "name": "Shipping", "module": "http" }
                        }
                    }
                }
            })),
            &mut tree,
        );
        assert_eq!(result.dropped, 1);
        assert_eq!(result.nodes.len(), 1);
        assert_eq!(names(&tree, DirectoryKey::Service), ["Orders", "Shipping"]);
    }

    #[test]
    fn test_malformed_artifact_counts_as_dropped() {
        let mut tree = tree();
        let result = DiffReconciler::default().reconcile(
            notification(serde_json::json!({
                "uri": "file:///proj/functions.bal",
                "artifacts": {
                    "Functions": {
                        "additions": {
                            "good": { "id": "good", "type": "FUNCTION", "name": "transform" },
                            "bad": { "id": "bad", "type": "FUNCTION", "name": "x", "location": null }
                        }
                    }
                }
            })),
            &mut tree,
        );
        assert_eq!(result.dropped, 1);
        assert_eq!(result.nodes.len(), 1);
        assert_eq!(result.nodes[0].id, "good");
        assert_eq!(names(&tree, DirectoryKey::Function), ["transform"]);
    }

    #[test]
    fn test_unknown_category_is_skipped() {
        let mut tree = tree();
        let before = tree.clone();
        let result = DiffReconciler::default().reconcile(
            notification(serde_json::json!({
                "uri": "file:///proj/main.bal",
                "artifacts": {
                    "Gizmos": {
                        "additions": { "g": { "id": "g", "type": "FUNCTION", "name": "g" } }
                    }
                }
            })),
            &mut tree,
        );
        assert!(result.nodes.is_empty());
        assert!(result.skipped.is_none());
        assert_eq!(tree, before);
    }

    #[test]
    fn test_guards() {
        let reconciler = DiffReconciler::default();
        let cases = [
            (
                serde_json::json!({ "uri": "file:///other/project/x.bal", "artifacts": {} }),
                SkipReason::OutsideProject,
            ),
            (
                serde_json::json!({ "uri": "file:///proj/modules/db/db.bal", "moduleName": "db", "artifacts": {} }),
                SkipReason::Submodule("db".to_string()),
            ),
            (
                serde_json::json!({ "uri": "file:///proj/generated/persist/model.bal", "artifacts": {} }),
                SkipReason::IgnoredDirectory("persist".to_string()),
            ),
            (
                serde_json::json!({ "uri": "untitled:Untitled-1", "artifacts": {} }),
                SkipReason::NotAFile,
            ),
        ];

        for (value, expected) in cases {
            let mut tree = tree();
            let before = tree.clone();
            let result = reconciler.reconcile(notification(value), &mut tree);
            assert_eq!(result.skipped, Some(expected));
            assert!(result.nodes.is_empty());
            assert_eq!(tree, before);
        }
    }

    #[test]
    fn test_temp_dir_guard() {
        let temp_file = std::env::temp_dir().join("scratch").join("main.bal");
        let uri = artisync_lsp::path_to_file_uri(&temp_file).unwrap();

        let mut tree = tree();
        let result = DiffReconciler::default().reconcile(
            notification(serde_json::json!({ "uri": uri.as_str(), "artifacts": {} })),
            &mut tree,
        );
        assert_eq!(result.skipped, Some(SkipReason::TempDirectory));
    }

    #[test]
    fn test_resort_touches_every_bucket() {
        let mut tree = tree();
        tree.projects[0]
            .directory_map
            .push(DirectoryKey::Type, node("t2", "Zeta"));
        tree.projects[0]
            .directory_map
            .push(DirectoryKey::Type, node("t1", "alpha"));

        DiffReconciler::default().reconcile(
            notification(serde_json::json!({ "uri": "file:///proj/main.bal", "artifacts": {} })),
            &mut tree,
        );
        assert_eq!(names(&tree, DirectoryKey::Type), ["alpha", "Zeta"]);
    }
}
