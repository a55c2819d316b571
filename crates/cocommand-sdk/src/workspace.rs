//! Workspace resources: extensions, applications and tool invocation.

use cocommand_core::{ClientError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::abort::RequestOptions;
use crate::transport::{RequestSpec, Transport, extract_error};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub tools: Vec<ToolInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationInfo {
    pub id: String,
    pub name: String,
    #[serde(default, alias = "bundleId")]
    pub bundle_id: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

/// `{ok, data, error}` envelope returned by tool invocation.
#[derive(Debug, Clone, Deserialize)]
struct ToolEnvelope {
    ok: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl ToolEnvelope {
    fn into_result(self, origin: &str) -> Result<Value> {
        if self.ok {
            return Ok(self.data.unwrap_or(Value::Null));
        }
        let details = self.error.unwrap_or(Value::Null);
        let (code, message) = extract_error(&details)
            .unwrap_or((None, "Tool invocation failed".to_string()));
        let mut error = ClientError::tool(message).with_origin(origin);
        error.details = Some(json!({ "code": code, "error": details }));
        Err(error)
    }
}

pub struct WorkspaceApi<'a> {
    transport: &'a Transport,
}

impl<'a> WorkspaceApi<'a> {
    pub fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    pub async fn info(&self, options: &RequestOptions) -> Result<WorkspaceInfo> {
        self.transport
            .request_json(RequestSpec::get("/workspace", "workspace.info"), options)
            .await
    }

    pub async fn extensions(&self, options: &RequestOptions) -> Result<Vec<ExtensionInfo>> {
        self.transport
            .request_json(
                RequestSpec::get("/workspace/extensions", "workspace.extensions"),
                options,
            )
            .await
    }

    pub async fn applications(&self, options: &RequestOptions) -> Result<Vec<ApplicationInfo>> {
        self.transport
            .request_json(
                RequestSpec::get("/workspace/applications", "workspace.applications"),
                options,
            )
            .await
    }

    /// Asks the backend to launch an application. No payload on success.
    pub async fn open_application(&self, id: &str, options: &RequestOptions) -> Result<()> {
        let spec = RequestSpec::post("/workspace/applications/open", "workspace.open_application")
            .json(&json!({ "id": id }))?;
        self.transport.request_empty(spec, options).await
    }

    /// URL of an extension asset, for loaders that fetch it themselves.
    pub fn asset_url(&self, extension_id: &str, path: &str) -> String {
        self.transport.url(&format!(
            "/extension/{}/assets/{}",
            extension_id,
            path.trim_start_matches('/')
        ))
    }

    /// Invokes an extension tool and unwraps its envelope.
    pub async fn invoke_tool(
        &self,
        extension_id: &str,
        tool_id: &str,
        args: &Value,
        options: &RequestOptions,
    ) -> Result<Value> {
        let origin = "extension.invoke_tool";
        let path = format!("/extension/{extension_id}/tools/{tool_id}");
        let spec = RequestSpec::post(&path, origin).json(args)?;
        let envelope: ToolEnvelope = self.transport.request_json(spec, options).await?;
        tracing::debug!(
            "[WorkspaceApi] Tool {}/{} returned ok={}",
            extension_id,
            tool_id,
            envelope.ok
        );
        envelope.into_result(origin)
    }

    /// Full-text note search. The backend does not ship it yet.
    pub async fn search_notes(&self, _query: &str) -> Result<Vec<Value>> {
        Err(ClientError::not_implemented("Note search").with_origin("notes.search"))
    }
}
