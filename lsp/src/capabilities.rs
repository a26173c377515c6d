//! One-time negotiation of the server's extended service groups.
//!
//! The client declares every group it can use in a single `initBalServices`
//! request. The server answers with the groups and operations it actually
//! serves, flattened here into `"<group>/<operation>"` strings. The handshake
//! runs at most once per negotiator; concurrent callers await the same
//! in-flight request.

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use crate::client::LanguageClient;
use crate::protocol;
use crate::types::RpcError;

/// A group of extended operations the client knows how to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityGroup {
    pub name: &'static str,
    pub operations: &'static [&'static str],
}

/// Everything declared in the handshake, in declaration order.
pub const DECLARED_GROUPS: &[CapabilityGroup] = &[
    CapabilityGroup {
        name: "ballerinaDocument",
        operations: &[
            "syntaxTreeNode",
            "executorPositions",
            "syntaxTreeModify",
            "diagnostics",
            "syntaxTree",
            "astModify",
            "triggerModify",
            "resolveMissingDependencies",
        ],
    },
    CapabilityGroup {
        name: "ballerinaPackage",
        operations: &["components", "metadata", "configSchema"],
    },
    CapabilityGroup {
        name: "ballerinaSymbol",
        operations: &[
            "type",
            "getSymbol",
            "getTypeFromExpression",
            "getTypeFromSymbol",
            "getTypesFromFnDefinition",
        ],
    },
    CapabilityGroup {
        name: "ballerinaConnector",
        operations: &["connectors", "connector", "record"],
    },
    CapabilityGroup {
        name: "ballerinaTrigger",
        operations: &["triggers", "trigger"],
    },
    CapabilityGroup {
        name: "ballerinaRunner",
        operations: &["diagnostics", "mainFunctionParams"],
    },
    CapabilityGroup {
        name: "ballerinaExample",
        operations: &["list"],
    },
    CapabilityGroup {
        name: "jsonToRecord",
        operations: &["convert"],
    },
    CapabilityGroup {
        name: "xmlToRecord",
        operations: &["convert"],
    },
    CapabilityGroup {
        name: "performanceAnalyzer",
        operations: &["getResourcesWithEndpoints"],
    },
    CapabilityGroup {
        name: "partialParser",
        operations: &[
            "getSTForSingleStatement",
            "getSTForExpression",
            "getSTForResource",
        ],
    },
    CapabilityGroup {
        name: "openAPILSExtension",
        operations: &["generateOpenAPI"],
    },
    CapabilityGroup {
        name: "graphqlDesignService",
        operations: &["getGraphqlModel"],
    },
    CapabilityGroup {
        name: "sequenceModelGeneratorService",
        operations: &["getSequenceDiagramModel"],
    },
    CapabilityGroup {
        name: "balShell",
        operations: &[
            "getResult",
            "getShellFileSource",
            "getVariableValues",
            "deleteDeclarations",
            "restartNotebook",
        ],
    },
];

/// One `{name, <operation>: bool, ...}` entry on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityEntry {
    pub name: String,
    #[serde(flatten)]
    pub flags: serde_json::Map<String, serde_json::Value>,
}

impl From<&CapabilityGroup> for CapabilityEntry {
    fn from(group: &CapabilityGroup) -> Self {
        Self {
            name: group.name.to_string(),
            flags: group
                .operations
                .iter()
                .map(|op| ((*op).to_string(), serde_json::Value::Bool(true)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeExtendedParams {
    pub ballerina_client_capabilities: Vec<CapabilityEntry>,
}

impl InitializeExtendedParams {
    #[must_use]
    pub fn declared() -> Self {
        Self {
            ballerina_client_capabilities: DECLARED_GROUPS.iter().map(CapabilityEntry::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeExtendedResult {
    #[serde(default)]
    pub ballerina_server_capabilities: Vec<CapabilityEntry>,
}

fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
    }
}

/// Flat, immutable set of `"<group>/<operation>"` names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet(BTreeSet<String>);

impl CapabilitySet {
    #[must_use]
    pub fn from_server(result: &InitializeExtendedResult) -> Self {
        let mut set = BTreeSet::new();
        for entry in &result.ballerina_server_capabilities {
            for (flag, value) in &entry.flags {
                if flag != "name" && is_truthy(value) {
                    set.insert(format!("{}/{flag}", entry.name));
                }
            }
        }
        Self(set)
    }

    #[must_use]
    pub fn contains(&self, operation: &str) -> bool {
        self.0.contains(operation)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

pub type HandshakeFut<'a> =
    Pin<Box<dyn Future<Output = Result<InitializeExtendedResult, RpcError>> + Send + 'a>>;

/// Whatever can carry the `initBalServices` request.
pub trait CapabilityTransport: Send + Sync {
    fn init_extended_services<'a>(&'a self, params: &'a InitializeExtendedParams) -> HandshakeFut<'a>;
}

impl CapabilityTransport for LanguageClient {
    fn init_extended_services<'a>(&'a self, params: &'a InitializeExtendedParams) -> HandshakeFut<'a> {
        Box::pin(self.request(protocol::INIT_EXTENDED_SERVICES, params))
    }
}

/// Caches the outcome of the extended-services handshake.
pub struct CapabilityNegotiator<T> {
    transport: Arc<T>,
    negotiated: OnceCell<CapabilitySet>,
    /// Set once the server is known not to take part in negotiation.
    optimistic: AtomicBool,
}

impl<T: CapabilityTransport> CapabilityNegotiator<T> {
    pub fn new(transport: Arc<T>) -> Self {
        Self {
            transport,
            negotiated: OnceCell::new(),
            optimistic: AtomicBool::new(false),
        }
    }

    /// Supported operations. Issues the handshake on first use only.
    ///
    /// A failed handshake caches an empty set and switches the negotiator to
    /// optimistic mode; it is never retried.
    pub async fn negotiate(&self) -> &CapabilitySet {
        self.negotiated
            .get_or_init(|| async {
                let params = InitializeExtendedParams::declared();
                match self.transport.init_extended_services(&params).await {
                    Ok(result) => {
                        let set = CapabilitySet::from_server(&result);
                        tracing::debug!(count = set.len(), "extended services negotiated");
                        set
                    }
                    Err(e) => {
                        tracing::warn!("extended services handshake failed, assuming support: {e}");
                        self.optimistic.store(true, Ordering::Release);
                        CapabilitySet::default()
                    }
                }
            })
            .await
    }

    pub async fn is_supported(&self, operation: &str) -> bool {
        if self.is_optimistic() {
            return true;
        }
        let set = self.negotiate().await;
        self.is_optimistic() || set.contains(operation)
    }

    /// Out-of-band signal that the server cannot register services dynamically.
    pub fn mark_dynamic_registration_unsupported(&self) {
        self.optimistic.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_optimistic(&self) -> bool {
        self.optimistic.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }
}
