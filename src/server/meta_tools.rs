//! Meta-tool server — the transport bridge (§4.H).
//!
//! Exposes a fixed catalogue of meta-tools over stdio, each following the
//! same forward pipeline: extract arguments, forward to the aggregator,
//! classify token-expired errors into a re-auth sub-state-machine, else
//! wrap the result with the auth-required advisory.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{info, warn};

use crate::auth::{AuthStatusPoller, OAuthClientConfig, OAuthManager};
use crate::config;
use crate::integration::Session;
use crate::protocol::{CallToolResponse, Content};
use crate::server::args::{normalize_arguments, ArgsExt};
use crate::server::advisory::wrap_with_advisory;
use crate::server::error::{ServerError, ServerResult};
use crate::server::filter::{filter_tools, list_core_tools, FilterOptions};

/// The fixed meta-tool catalogue (§4.H table).
pub const META_TOOLS: &[&str] = &[
    "list_tools",
    "list_resources",
    "list_prompts",
    "list_core_tools",
    "describe_tool",
    "describe_prompt",
    "describe_resource",
    "call_tool",
    "get_resource",
    "get_prompt",
    "filter_tools",
];

/// Context carried by an in-flight re-auth attempt (§3): at most one
/// may run at a time, enforced by `reauth_in_progress`.
pub struct ReauthContext {
    pub auth_manager: Option<Arc<OAuthManager>>,
    pub client_config: Option<OAuthClientConfig>,
    reauth_in_progress: AtomicBool,
}

impl ReauthContext {
    pub fn new(auth_manager: Option<Arc<OAuthManager>>, client_config: Option<OAuthClientConfig>) -> Self {
        Self {
            auth_manager,
            client_config,
            reauth_in_progress: AtomicBool::new(false),
        }
    }

    fn try_begin(&self) -> bool {
        self.reauth_in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn finish(&self) {
        self.reauth_in_progress.store(false, Ordering::SeqCst);
    }
}

pub struct MetaToolServer {
    session: Arc<Session>,
    poller: Arc<AuthStatusPoller>,
    reauth: Arc<ReauthContext>,
}

impl MetaToolServer {
    pub fn new(session: Arc<Session>, poller: Arc<AuthStatusPoller>, reauth: Arc<ReauthContext>) -> Self {
        Self {
            session,
            poller,
            reauth,
        }
    }

    /// Dispatches one inbound meta-tool call through the forward pipeline.
    pub async fn handle(&self, tool_name: &str, arguments: Option<Value>) -> ServerResult<CallToolResponse> {
        let arguments = normalize_arguments(arguments);

        let result = self.forward(tool_name, &arguments).await;

        match result {
            Ok(response) => Ok(response),
            Err(ServerError::Integration(crate::integration::IntegrationError::Transport(ref e)))
                if e.is_token_expired() =>
            {
                self.run_reauth_sub_state_machine().await
            }
            Err(e) => Err(e),
        }
    }

    async fn forward(&self, tool_name: &str, arguments: &Value) -> ServerResult<CallToolResponse> {
        match tool_name {
            "list_tools" => self.list_tools(arguments).await,
            "list_resources" => self.list_resources(arguments).await,
            "list_prompts" => self.list_prompts(arguments).await,
            "list_core_tools" => self.list_core_tools_handler(arguments).await,
            "describe_tool" => self.describe_tool(arguments).await,
            "describe_prompt" => self.describe_prompt(arguments).await,
            "describe_resource" => self.describe_resource(arguments).await,
            "call_tool" => self.call_tool(arguments).await,
            "get_resource" => self.get_resource(arguments).await,
            "get_prompt" => self.get_prompt(arguments).await,
            "filter_tools" => self.filter_tools_handler(arguments).await,
            other => Err(ServerError::UnknownTool(other.to_string())),
        }
    }

    async fn wrap(&self, content: Vec<Content>) -> CallToolResponse {
        let cache = self.poller.snapshot().await;
        let (content, metadata) = wrap_with_advisory(content, &cache);
        let mut response = CallToolResponse::success(content);
        if let Some(metadata) = metadata {
            response.meta = Some(json!({ config::AUTH_METADATA_KEY: metadata }));
        }
        response
    }

    async fn list_tools(&self, arguments: &Value) -> ServerResult<CallToolResponse> {
        let include_schema = arguments.optional_bool("include_schema", false);
        let tools = self.session.list_tools(false).await?;
        Ok(self.wrap(tools_to_content(&tools, include_schema)).await)
    }

    async fn list_resources(&self, _arguments: &Value) -> ServerResult<CallToolResponse> {
        let resources = self.session.list_resources(false).await?;
        let text = serde_json::to_string_pretty(&resources).unwrap_or_default();
        Ok(self.wrap(vec![Content::text(text)]).await)
    }

    async fn list_prompts(&self, _arguments: &Value) -> ServerResult<CallToolResponse> {
        let prompts = self.session.list_prompts(false).await?;
        let text = serde_json::to_string_pretty(&prompts).unwrap_or_default();
        Ok(self.wrap(vec![Content::text(text)]).await)
    }

    async fn list_core_tools_handler(&self, arguments: &Value) -> ServerResult<CallToolResponse> {
        let include_schema = arguments.optional_bool("include_schema", false);
        let tools = self.session.tools_snapshot().await;
        let core = list_core_tools(&tools);
        Ok(self.wrap(tools_to_content(&core, include_schema)).await)
    }

    async fn describe_tool(&self, arguments: &Value) -> ServerResult<CallToolResponse> {
        let name = arguments.require_str("name")?;
        let tool = self
            .session
            .get_tool_by_id(&name)
            .await
            .ok_or_else(|| ServerError::Advisory(format!("unknown tool: {name}")))?;
        let text = serde_json::to_string_pretty(&tool).unwrap_or_default();
        Ok(self.wrap(vec![Content::text(text)]).await)
    }

    async fn describe_prompt(&self, arguments: &Value) -> ServerResult<CallToolResponse> {
        let name = arguments.require_str("name")?;
        let prompt = self
            .session
            .get_prompt_by_id(&name)
            .await
            .ok_or_else(|| ServerError::Advisory(format!("unknown prompt: {name}")))?;
        let text = serde_json::to_string_pretty(&prompt).unwrap_or_default();
        Ok(self.wrap(vec![Content::text(text)]).await)
    }

    async fn describe_resource(&self, arguments: &Value) -> ServerResult<CallToolResponse> {
        let uri = arguments.require_str("uri")?;
        let resource = self
            .session
            .get_resource_by_id(&uri)
            .await
            .ok_or_else(|| ServerError::Advisory(format!("unknown resource: {uri}")))?;
        let text = serde_json::to_string_pretty(&resource).unwrap_or_default();
        Ok(self.wrap(vec![Content::text(text)]).await)
    }

    async fn call_tool(&self, arguments: &Value) -> ServerResult<CallToolResponse> {
        let name = arguments.require_str("name")?;
        let tool_arguments = arguments.get("arguments").cloned();
        let content = self.session.call_tool(name, tool_arguments, None).await?;
        Ok(self.wrap(content).await)
    }

    async fn get_resource(&self, arguments: &Value) -> ServerResult<CallToolResponse> {
        let uri = arguments.require_str("uri")?;
        let content = self.session.get_resource(uri).await?;
        Ok(self.wrap(content).await)
    }

    async fn get_prompt(&self, arguments: &Value) -> ServerResult<CallToolResponse> {
        let name = arguments.require_str("name")?;
        let prompt_arguments = arguments.optional_string_map("arguments");
        let messages = self.session.get_prompt(name, prompt_arguments).await?;
        let text = serde_json::to_string_pretty(&messages).unwrap_or_default();
        Ok(self.wrap(vec![Content::text(text)]).await)
    }

    async fn filter_tools_handler(&self, arguments: &Value) -> ServerResult<CallToolResponse> {
        let pattern = arguments.optional_str("pattern");
        let description_filter = arguments.optional_str("description_filter");
        let case_sensitive = arguments.optional_bool("case_sensitive", false);
        let include_schema = arguments.optional_bool("include_schema", false);

        let tools = self.session.tools_snapshot().await;
        let options = FilterOptions {
            pattern: pattern.as_deref(),
            description_filter: description_filter.as_deref(),
            case_sensitive,
        };
        let matched = filter_tools(&tools, &options);
        Ok(self.wrap(tools_to_content(&matched, include_schema)).await)
    }

    /// Spec §4.H step 3: entered when the aggregator's error classifies
    /// as token-expired.
    async fn run_reauth_sub_state_machine(&self) -> ServerResult<CallToolResponse> {
        let Some(auth_manager) = self.reauth.auth_manager.clone() else {
            return Err(ServerError::Auth(crate::auth::AuthError::NoManagerRegistered));
        };

        if !self.reauth.try_begin() {
            return Err(ServerError::Auth(crate::auth::AuthError::ReauthInProgress));
        }

        let client_config = self.reauth.client_config.clone();
        let reauth = Arc::clone(&self.reauth);
        let issuer = client_config.as_ref().map(|c| c.issuer.clone());

        let start_result = async {
            if let Some(issuer) = &issuer {
                auth_manager.clear_token(issuer).await;
            }
            let client_config = client_config.ok_or(crate::auth::AuthError::NoManagerRegistered)?;
            auth_manager.start_flow(client_config).await
        }
        .await;

        let auth_url = match start_result {
            Ok(url) => url,
            Err(e) => {
                reauth.finish();
                return Err(ServerError::Auth(e));
            }
        };

        if webbrowser::open(&auth_url).is_err() {
            warn!(url = %auth_url, "failed to open system browser for re-auth");
        }

        let manager_for_task = Arc::clone(&auth_manager);
        let reauth_for_task = Arc::clone(&reauth);
        tokio::spawn(async move {
            let outcome = tokio::time::timeout(
                config::REAUTH_WAIT_TIMEOUT,
                manager_for_task.wait_for_auth(),
            )
            .await;
            match outcome {
                Ok(Ok(())) => info!("re-auth flow completed"),
                Ok(Err(e)) => warn!(error = %e, "re-auth flow failed"),
                Err(_) => warn!("re-auth flow timed out after 5 minutes"),
            }
            reauth_for_task.finish();
        });

        let text = format!(
            "Authentication token expired. Sign in again to continue: {auth_url}"
        );
        Ok(CallToolResponse::error_text(text))
    }
}

fn tools_to_content(tools: &[crate::protocol::Tool], include_schema: bool) -> Vec<Content> {
    let value: Vec<Value> = tools
        .iter()
        .map(|t| {
            if include_schema {
                json!({"name": t.name, "description": t.description, "input_schema": t.input_schema})
            } else {
                json!({"name": t.name, "description": t.description})
            }
        })
        .collect();
    vec![Content::text(
        serde_json::to_string_pretty(&value).unwrap_or_default(),
    )]
}
