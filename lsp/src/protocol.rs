//! JSON-RPC message shapes and the method names the artifact service speaks.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::types::RpcError;

pub const INITIALIZE: &str = "initialize";
pub const INITIALIZED: &str = "initialized";
pub const SHUTDOWN: &str = "shutdown";
pub const EXIT: &str = "exit";
/// One-time capability handshake for the extended service groups.
pub const INIT_EXTENDED_SERVICES: &str = "initBalServices";
pub const PROJECT_ARTIFACTS: &str = "designModelService/artifacts";
/// Server push carrying incremental artifact changes.
pub const PUBLISH_ARTIFACTS: &str = "designModelService/publishArtifacts";
pub const GENERATED_MODULES: &str = "openAPIService/getModules";

/// JSON-RPC code returned for server-initiated requests we do not serve.
pub const METHOD_NOT_FOUND: i64 = -32601;

#[derive(Debug, thiserror::Error)]
#[error("cannot convert path to file URI: {}", path.display())]
pub struct PathToUriError {
    path: PathBuf,
}

#[derive(Debug, Serialize)]
pub(crate) struct Request {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Request {
    pub fn new(id: u64, method: &'static str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct Notification {
    pub jsonrpc: &'static str,
    pub method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl Notification {
    pub fn new(method: &'static str, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
            params,
        }
    }
}

/// A decoded frame coming from the server.
#[derive(Debug)]
pub(crate) enum IncomingFrame {
    Response {
        id: u64,
        body: serde_json::Value,
    },
    ServerRequest {
        id: serde_json::Value,
        method: String,
    },
    Notification {
        method: String,
        params: Option<serde_json::Value>,
    },
}

pub(crate) fn parse_incoming(frame: &serde_json::Value) -> Option<IncomingFrame> {
    let id = frame.get("id");
    let method = frame
        .get("method")
        .and_then(serde_json::Value::as_str)
        .map(String::from);
    let has_result_or_error = frame.get("result").is_some() || frame.get("error").is_some();

    match (id, method, has_result_or_error) {
        (Some(id_val), None, true) => Some(IncomingFrame::Response {
            id: id_val.as_u64()?,
            body: frame.clone(),
        }),
        (Some(id_val), Some(method), _) => Some(IncomingFrame::ServerRequest {
            id: id_val.clone(),
            method,
        }),
        (None, Some(method), _) => Some(IncomingFrame::Notification {
            method,
            params: frame.get("params").cloned(),
        }),
        _ => None,
    }
}

pub(crate) fn method_not_found(id: serde_json::Value, method: &str) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": METHOD_NOT_FOUND,
            "message": format!("Method not found: {method}")
        }
    })
}

/// Split a response frame into its `result` or a typed error.
pub(crate) fn into_result(mut body: serde_json::Value) -> Result<serde_json::Value, RpcError> {
    if let Some(error) = body.get("error") {
        return Err(RpcError::Server {
            code: error["code"].as_i64().unwrap_or_default(),
            message: error["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string(),
        });
    }
    Ok(body
        .get_mut("result")
        .map(serde_json::Value::take)
        .unwrap_or_default())
}

pub(crate) fn initialize_params(root_uri: &str) -> serde_json::Value {
    serde_json::json!({
        "processId": std::process::id(),
        "rootUri": root_uri,
        "capabilities": {
            "textDocument": {
                "synchronization": {
                    "dynamicRegistration": false,
                    "didSave": true
                }
            },
            "workspace": {
                "workspaceFolders": true
            }
        },
        "workspaceFolders": [{
            "uri": root_uri,
            "name": "workspace"
        }]
    })
}

/// Parameter object shared by the per-package queries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ProjectPathParams<'a> {
    pub project_path: &'a Path,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct GeneratedModules {
    #[serde(default)]
    pub modules: Vec<String>,
}

pub fn path_to_file_uri(path: &Path) -> Result<url::Url, PathToUriError> {
    url::Url::from_file_path(path).map_err(|()| PathToUriError {
        path: path.to_path_buf(),
    })
}

/// Local path of a `file:` URI; `None` for other schemes or garbage.
#[must_use]
pub fn file_uri_to_path(uri: &str) -> Option<PathBuf> {
    url::Url::parse(uri)
        .ok()
        .and_then(|u| u.to_file_path().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_params_has_required_fields() {
        let params = initialize_params("file:///workspace");
        assert!(params["processId"].is_number());
        assert_eq!(params["rootUri"], "file:///workspace");
        assert_eq!(params["workspaceFolders"][0]["uri"], "file:///workspace");
    }

    #[test]
    fn test_project_path_params_are_camel_case() {
        let json = serde_json::to_value(ProjectPathParams {
            project_path: Path::new("/proj"),
        })
        .unwrap();
        assert_eq!(json["projectPath"], "/proj");
    }

    #[test]
    fn test_request_omits_missing_params() {
        let json = serde_json::to_value(Request::new(1, SHUTDOWN, None)).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["id"], 1);
        assert!(json.get("params").is_none(), "params must be omitted, not null");
    }

    #[test]
    fn test_notification_has_no_id() {
        let json =
            serde_json::to_value(Notification::new(INITIALIZED, Some(serde_json::json!({}))))
                .unwrap();
        assert_eq!(json["method"], INITIALIZED);
        assert!(json.get("id").is_none());
    }

    #[test]
    fn test_parse_incoming_classifies_frames() {
        let response = serde_json::json!({"jsonrpc": "2.0", "id": 3, "result": {}});
        assert!(matches!(
            parse_incoming(&response),
            Some(IncomingFrame::Response { id: 3, .. })
        ));

        let request = serde_json::json!({
            "jsonrpc": "2.0", "id": "abc", "method": "workspace/configuration"
        });
        assert!(matches!(
            parse_incoming(&request),
            Some(IncomingFrame::ServerRequest { method, .. }) if method == "workspace/configuration"
        ));

        let push = serde_json::json!({
            "jsonrpc": "2.0", "method": PUBLISH_ARTIFACTS, "params": {"uri": "file:///p"}
        });
        assert!(matches!(
            parse_incoming(&push),
            Some(IncomingFrame::Notification { params: Some(_), .. })
        ));

        assert!(parse_incoming(&serde_json::json!({"jsonrpc": "2.0"})).is_none());
    }

    #[test]
    fn test_into_result_extracts_result() {
        let body = serde_json::json!({"jsonrpc": "2.0", "id": 1, "result": {"modules": ["a"]}});
        let result = into_result(body).unwrap();
        assert_eq!(result["modules"][0], "a");
    }

    #[test]
    fn test_into_result_maps_error() {
        let body = serde_json::json!({
            "jsonrpc": "2.0", "id": 1,
            "error": { "code": -32601, "message": "Unhandled method initBalServices" }
        });
        match into_result(body) {
            Err(RpcError::Server { code, message }) => {
                assert_eq!(code, METHOD_NOT_FOUND);
                assert!(message.contains("initBalServices"));
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[test]
    fn test_method_not_found_echoes_id() {
        let reply = method_not_found(serde_json::json!(5), "client/registerCapability");
        assert_eq!(reply["id"], 5);
        assert_eq!(reply["error"]["code"], METHOD_NOT_FOUND);
    }

    #[test]
    fn test_path_to_file_uri_and_back() {
        #[cfg(windows)]
        let path = PathBuf::from(r"C:\proj\main.bal");
        #[cfg(not(windows))]
        let path = PathBuf::from("/proj/main.bal");

        let uri = path_to_file_uri(&path).expect("should create URI");
        assert_eq!(file_uri_to_path(uri.as_str()), Some(path));
    }

    #[test]
    fn test_file_uri_to_path_rejects_other_schemes() {
        assert!(file_uri_to_path("not-a-uri").is_none());
        assert!(file_uri_to_path("https://example.com/main.bal").is_none());
    }
}
