//! Artifact records as reported by the language server.
//!
//! These are the raw, server-shaped inputs. They are converted into
//! [`ArtifactNode`](crate::ArtifactNode)s by the mapper in `artisync-sync`.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};

/// Type tag of a single artifact.
///
/// Unknown tags deserialize to [`ArtifactKind::Other`] so a new server-side
/// kind never poisons a whole snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactKind {
    Automation,
    Service,
    Listener,
    Function,
    DataMapper,
    Connection,
    Type,
    Configurable,
    NpFunction,
    Resource,
    Remote,
    Variable,
    #[serde(other)]
    Other,
}

impl ArtifactKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Automation => "AUTOMATION",
            Self::Service => "SERVICE",
            Self::Listener => "LISTENER",
            Self::Function => "FUNCTION",
            Self::DataMapper => "DATA_MAPPER",
            Self::Connection => "CONNECTION",
            Self::Type => "TYPE",
            Self::Configurable => "CONFIGURABLE",
            Self::NpFunction => "NP_FUNCTION",
            Self::Resource => "RESOURCE",
            Self::Remote => "REMOTE",
            Self::Variable => "VARIABLE",
            Self::Other => "OTHER",
        }
    }
}

/// Top-level classification used as the key of snapshots and change
/// notifications ("Entry Points", "Listeners", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    EntryPoints,
    Listeners,
    Functions,
    DataMappers,
    Connections,
    Types,
    Configurations,
    NaturalFunctions,
    Variables,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::EntryPoints,
        Category::Listeners,
        Category::Functions,
        Category::DataMappers,
        Category::Connections,
        Category::Types,
        Category::Configurations,
        Category::NaturalFunctions,
        Category::Variables,
    ];

    /// Key as the server spells it on the wire.
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::EntryPoints => "Entry Points",
            Self::Listeners => "Listeners",
            Self::Functions => "Functions",
            Self::DataMappers => "Data Mappers",
            Self::Connections => "Connections",
            Self::Types => "Types",
            Self::Configurations => "Configurations",
            Self::NaturalFunctions => "Natural Functions",
            Self::Variables => "Variables",
        }
    }

    /// Resolve a wire key. Accepts both `"Entry Points"` and `"EntryPoints"`.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        let compact: String = key.chars().filter(|c| !c.is_whitespace()).collect();
        Self::ALL
            .into_iter()
            .find(|c| c.wire_name().replace(' ', "") == compact)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePosition {
    pub line: u32,
    pub offset: u32,
}

/// File-relative source range of an artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactLocation {
    pub file_name: String,
    pub start_line: LinePosition,
    pub end_line: LinePosition,
}

/// A semantic unit discovered by the compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// HTTP accessor on resources (`get`, `post`, ...) and the accessor
    /// suffix on some entry points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessor: Option<String>,
    #[serde(default)]
    pub location: ArtifactLocation,
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "IndexMap::is_empty"
    )]
    pub children: IndexMap<String, Artifact>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

impl Artifact {
    /// Children of the given kind, in server order.
    pub fn children_of(&self, kind: ArtifactKind) -> impl Iterator<Item = &Artifact> {
        self.children.values().filter(move |child| child.kind == kind)
    }

    /// String-valued metadata field, if present.
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(serde_json::Value::as_str)
    }
}

/// Artifacts of one category, keyed by id in server order.
pub type ArtifactMap = IndexMap<String, Artifact>;

/// Full artifact snapshot of one package.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectArtifacts {
    #[serde(default, deserialize_with = "null_as_default")]
    pub artifacts: IndexMap<String, ArtifactMap>,
}

impl ProjectArtifacts {
    /// Artifacts of `category`, whichever spelling the server used for the key.
    #[must_use]
    pub fn category(&self, category: Category) -> Option<&ArtifactMap> {
        self.artifacts
            .iter()
            .find(|(key, _)| Category::from_key(key) == Some(category))
            .map(|(_, map)| map)
    }
}

/// Raw action map of a notification; entries are validated one by one.
pub type RawArtifactMap = IndexMap<String, serde_json::Value>;

/// Per-category action maps of a change notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    #[serde(default, deserialize_with = "null_as_default")]
    pub additions: RawArtifactMap,
    #[serde(default, deserialize_with = "null_as_default")]
    pub updates: RawArtifactMap,
    #[serde(default, deserialize_with = "null_as_default")]
    pub deletions: RawArtifactMap,
}

/// Server push carrying incremental artifact changes for one file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactChangeNotification {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub artifacts: IndexMap<String, ChangeSet>,
}

/// Changes of a single, known category.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryChanges {
    pub category: Category,
    pub additions: Vec<Artifact>,
    pub updates: Vec<Artifact>,
    pub deletions: Vec<Artifact>,
}

/// An entry of a known category that did not parse as an [`Artifact`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedArtifact {
    pub category: Category,
    /// Key of the entry in its action map.
    pub key: String,
    pub error: String,
}

/// A notification after boundary validation: typed categories, the raw
/// keys that did not resolve and the entries that did not parse.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedChanges {
    pub changes: Vec<CategoryChanges>,
    pub unknown_categories: Vec<String>,
    pub rejected: Vec<RejectedArtifact>,
}

impl ValidatedChanges {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.iter().all(|c| {
            c.additions.is_empty() && c.updates.is_empty() && c.deletions.is_empty()
        })
    }
}

impl ArtifactChangeNotification {
    /// A notification for `uri` that carries no changes.
    pub fn empty(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Split the duck-typed payload into known categories and unknown keys.
    ///
    /// Each artifact is parsed on its own; one that fails is recorded in
    /// `rejected` and its siblings are kept.
    #[must_use]
    pub fn validate(self) -> ValidatedChanges {
        let mut validated = ValidatedChanges::default();
        for (key, set) in self.artifacts {
            let Some(category) = Category::from_key(&key) else {
                validated.unknown_categories.push(key);
                continue;
            };
            let rejected = &mut validated.rejected;
            let mut parse = |map: RawArtifactMap| -> Vec<Artifact> {
                map.into_iter()
                    .filter_map(|(key, value)| match serde_json::from_value(value) {
                        Ok(artifact) => Some(artifact),
                        Err(e) => {
                            rejected.push(RejectedArtifact {
                                category,
                                key,
                                error: e.to_string(),
                            });
                            None
                        }
                    })
                    .collect()
            };
            let deletions = parse(set.deletions);
            let additions = parse(set.additions);
            let updates = parse(set.updates);
            validated.changes.push(CategoryChanges {
                category,
                additions,
                updates,
                deletions,
            });
        }
        validated
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
