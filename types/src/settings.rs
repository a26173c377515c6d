//! Resolved language-server settings shared across crates.
//!
//! Raw deserialization structs stay private; the parse boundary resolves
//! them into the validated types below.

use serde::Deserialize;

/// Default timeout for a single JSON-RPC request.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ServerConfigError {
    #[error("server command must not be empty")]
    EmptyCommand,
    #[error("request_timeout_secs must be greater than zero")]
    ZeroTimeout,
}

#[derive(Deserialize)]
struct RawServerConfig {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

/// Validated command line of the language server that publishes artifacts.
///
/// Invariant: `command` is non-empty and the timeout is positive (enforced
/// via `#[serde(try_from)]`).
#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawServerConfig")]
pub struct ServerConfig {
    command: String,
    args: Vec<String>,
    request_timeout_secs: u64,
}

impl TryFrom<RawServerConfig> for ServerConfig {
    type Error = ServerConfigError;

    fn try_from(raw: RawServerConfig) -> Result<Self, Self::Error> {
        if raw.command.trim().is_empty() {
            return Err(ServerConfigError::EmptyCommand);
        }
        if raw.request_timeout_secs == 0 {
            return Err(ServerConfigError::ZeroTimeout);
        }
        Ok(Self {
            command: raw.command,
            args: raw.args,
            request_timeout_secs: raw.request_timeout_secs,
        })
    }
}

impl ServerConfig {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Result<Self, ServerConfigError> {
        RawServerConfig {
            command: command.into(),
            args,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
        .try_into()
    }

    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    #[must_use]
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}
