//! Artifact → display node conversion.
//!
//! Pure: the same artifact, project path and hints always yield the same
//! node, so the builder and the reconciler share it.

use std::path::{Component, Path, PathBuf};

use artisync_types::{Artifact, ArtifactKind, ArtifactNode, NodePosition};

use crate::error::MapError;

/// Icon for a module-backed entry point or listener.
#[must_use]
pub fn module_icon(module: &str) -> &'static str {
    match module {
        "tcp" => "bi-tcp",
        "ai" => "bi-ai-agent",
        "kafka" => "bi-kafka",
        "rabbitmq" => "bi-rabbitmq",
        "nats" => "bi-nats",
        "mqtt" => "bi-mqtt",
        "grpc" => "bi-grpc",
        "graphql" => "bi-graphql",
        "java.jms" => "bi-java",
        "github" => "bi-github",
        "salesforce" => "bi-salesforce",
        "asb" => "bi-asb",
        "ftp" => "bi-ftp",
        "file" => "bi-file",
        "mcp" => "bi-mcp",
        "solace" => "bi-solace",
        "mssql" => "bi-mssql",
        "postgresql" => "bi-postgresql",
        _ => "bi-globe",
    }
}

/// `"kafka:Listener"` → `"kafka"`; identifiers without a `:` are returned whole.
fn type_prefix(module: &str) -> &str {
    module.split_once(':').map_or(module, |(prefix, _)| prefix)
}

/// `file_name` below `project_path`, even when the server sends it rooted.
fn file_path(project_path: &Path, file_name: &str) -> PathBuf {
    let relative: PathBuf = Path::new(file_name)
        .components()
        .filter(|c| !matches!(c, Component::Prefix(_) | Component::RootDir))
        .collect();
    project_path.join(relative)
}

const NESTED_KINDS: [ArtifactKind; 3] = [
    ArtifactKind::Resource,
    ArtifactKind::Remote,
    ArtifactKind::Function,
];

/// Map one artifact.
///
/// `default_icon` comes from the category table; `module_hint` is the module
/// of the owning service when mapping nested functions.
pub fn map_artifact(
    artifact: &Artifact,
    project_path: &Path,
    default_icon: &str,
    module_hint: Option<&str>,
) -> Result<ArtifactNode, MapError> {
    let module = artifact.module.as_deref().filter(|m| !m.is_empty());

    let mut node = ArtifactNode {
        id: artifact.id.clone(),
        name: artifact.name.clone(),
        path: file_path(project_path, &artifact.location.file_name),
        kind: artifact.kind.as_str().to_string(),
        icon: module.map_or_else(|| default_icon.to_string(), |m| format!("bi-{m}")),
        context: if artifact.name == "automation" {
            "main".to_string()
        } else {
            artifact.name.clone()
        },
        module_name: artifact.module.clone(),
        resources: Vec::new(),
        position: NodePosition::from(&artifact.location),
        is_new: false,
    };

    match artifact.kind {
        ArtifactKind::Automation => {
            node.name = "Automation".to_string();
        }
        ArtifactKind::Service => {
            node.name = service_display_name(artifact, module);
            node.icon = module_icon(module.unwrap_or_default()).to_string();
            if module == Some("ai") {
                let resource = artifact
                    .children_of(ArtifactKind::Resource)
                    .next()
                    .ok_or_else(|| MapError::MissingAiResource {
                        id: artifact.id.clone(),
                    })?;
                node.position = NodePosition::from(&resource.location);
            } else {
                node.resources = map_nested(artifact, project_path, default_icon, module)?;
            }
        }
        ArtifactKind::Type if !artifact.children.is_empty() => {
            node.resources = map_nested(artifact, project_path, default_icon, module)?;
        }
        ArtifactKind::Listener => {
            node.icon = module_icon(type_prefix(module.unwrap_or_default())).to_string();
        }
        ArtifactKind::Connection => {
            node.icon = if artifact.metadata_str("connectorType") == Some("persist") {
                "bi-db".to_string()
            } else {
                default_icon.to_string()
            };
        }
        ArtifactKind::Resource => {
            node.icon = match (module_hint, artifact.accessor.as_deref()) {
                (Some("graphql"), _) | (_, None) => String::new(),
                (_, Some(accessor)) => format!("{accessor}-api"),
            };
        }
        ArtifactKind::Remote => {
            node.icon = String::new();
        }
        _ => {}
    }

    Ok(node)
}

fn service_display_name(artifact: &Artifact, module: Option<&str>) -> String {
    match (module, artifact.accessor.as_deref()) {
        (Some("ftp"), Some(accessor)) if !accessor.is_empty() => {
            let suffix = format!(" - {accessor}");
            if artifact.name.contains(&suffix) {
                artifact.name.clone()
            } else {
                format!("{}{suffix}", artifact.name)
            }
        }
        _ => artifact.name.clone(),
    }
}

/// Resources, then remotes, then functions, each in server order.
fn map_nested(
    parent: &Artifact,
    project_path: &Path,
    default_icon: &str,
    module: Option<&str>,
) -> Result<Vec<ArtifactNode>, MapError> {
    NESTED_KINDS
        .into_iter()
        .flat_map(|kind| parent.children_of(kind))
        .map(|child| map_artifact(child, project_path, default_icon, module))
        .collect()
}
