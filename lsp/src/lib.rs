//! JSON-RPC client for the language server's artifact services.

pub mod capabilities;
pub mod codec;
pub mod types;

pub(crate) mod protocol;

mod client;

pub use capabilities::{
    CapabilityEntry, CapabilityGroup, CapabilityNegotiator, CapabilitySet, CapabilityTransport,
    DECLARED_GROUPS, HandshakeFut, InitializeExtendedParams, InitializeExtendedResult,
};
pub use client::LanguageClient;
pub use protocol::{PathToUriError, file_uri_to_path, path_to_file_uri};
pub use types::{LspEvent, RpcError, ServerStopReason};
