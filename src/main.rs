//! Process entry point.
//!
//! Parses the CLI surface, opens a session against the aggregator, and
//! runs the stdio-facing supervisor that owns either the pending-auth
//! bootstrap server (module G) or the full meta-tool server (module H) —
//! the two never run at once (§9's "stdio server bootstrap swap" note).
//! The interactive REPL that would otherwise drive context switching and
//! the auth-watcher is out of scope here; this binary is the core alone.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use muster_agent::auth::{
    AuthState, AuthStatusPoller, InMemoryTokenStore, OAuthClientConfig, OAuthManager, TokenStore,
};
use muster_agent::config;
use muster_agent::integration::{
    CacheKind, CacheObserver, Diff, IntegrationError, IntegrationResult, Session, SessionConfig,
};
use muster_agent::protocol::constants::{error_codes, methods};
use muster_agent::protocol::{
    InitializeResponse, JsonRpcRequest, JsonRpcResponse, LoggingCapabilities, PromptCapabilities,
    ResourceCapabilities, ServerCapabilities, ServerInfo, Tool, ToolCapabilities,
};
use muster_agent::server::{MetaToolServer, PendingAuthServer, ReauthContext};
use muster_agent::transport::{Endpoint, HeaderMap, TransportKind};
use muster_agent::{AgentError, AgentResult};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TransportArg {
    Sse,
    StreamableHttp,
}

impl From<TransportArg> for TransportKind {
    fn from(value: TransportArg) -> Self {
        match value {
            TransportArg::Sse => TransportKind::Sse,
            TransportArg::StreamableHttp => TransportKind::StreamableHttp,
        }
    }
}

/// CLI surface (§9 ambient stack): just enough to construct an `Endpoint`
/// and hand off to the supervisor. Not the REPL.
#[derive(Debug, Parser)]
#[command(name = "muster-agent", version, about = "MCP agent-broker: stdio meta-tool bridge to a remote MCP aggregator")]
struct Args {
    /// URL of the MCP aggregator to connect to.
    #[arg(long)]
    endpoint: String,

    /// Wire flavour the aggregator speaks.
    #[arg(long, value_enum, default_value_t = TransportArg::Sse)]
    transport: TransportArg,

    /// Overrides `RUST_LOG` when set.
    #[arg(long)]
    log_level: Option<String>,

    /// Suppresses the tracing subscriber and sends `"muster-cli"` as the
    /// client name on handshake, matching a non-logging caller.
    #[arg(long)]
    non_interactive: bool,
}

impl std::fmt::Display for TransportArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransportArg::Sse => "sse",
            TransportArg::StreamableHttp => "streamable-http",
        };
        write!(f, "{s}")
    }
}

fn init_tracing(log_level: Option<&str>) {
    let filter = log_level
        .map(str::to_string)
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| "muster_agent=info".to_string());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Reads a per-issuer OAuth client registration from the environment.
/// The CLI surface is deliberately minimal (§9); a missing registration
/// just means re-auth attempts fail gracefully through the existing
/// `ReauthContext`/`PendingAuthServer` error paths rather than panicking.
fn oauth_config_from_env(server_url: &str) -> Option<OAuthClientConfig> {
    let client_id = std::env::var("MUSTER_OAUTH_CLIENT_ID").ok()?;
    let auth_url = std::env::var("MUSTER_OAUTH_AUTH_URL").ok()?;
    let token_url = std::env::var("MUSTER_OAUTH_TOKEN_URL").ok()?;
    let issuer = std::env::var("MUSTER_OAUTH_ISSUER").unwrap_or_else(|_| auth_url.clone());
    let client_secret = std::env::var("MUSTER_OAUTH_CLIENT_SECRET").ok();
    let scopes = std::env::var("MUSTER_OAUTH_SCOPES")
        .map(|s| s.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();

    Some(OAuthClientConfig {
        issuer,
        server_url: server_url.to_string(),
        client_id,
        client_secret,
        auth_url,
        token_url,
        scopes,
    })
}

/// Which server the supervisor is currently speaking through. The two
/// variants never coexist (§9).
enum Mode {
    PendingAuth(PendingAuthServer),
    Active {
        meta: MetaToolServer,
        poller_cancel: CancellationToken,
    },
}

/// Re-polls `auth://status` whenever the resources catalogue changes
/// (§4.C: "Resources list changes additionally trigger a re-poll of
/// `auth://status`"), since a newly (dis)appeared resource can mean a
/// downstream server's auth requirement just changed too.
struct ResourceChangeAuthRepoll {
    poller: Arc<AuthStatusPoller>,
}

#[async_trait::async_trait]
impl CacheObserver for ResourceChangeAuthRepoll {
    async fn on_cache_updated(&self, kind: CacheKind, _diff: Diff) {
        if kind == CacheKind::Resources {
            self.poller.poll_once().await;
        }
    }
}

/// Runs `initialize` (unless `already_initialized`), the three initial
/// list operations, and starts the auth-status poller, then wraps it all
/// as an active `Mode` (§4.B, §4.E).
async fn build_active_mode(
    session: &Arc<Session>,
    reauth: Arc<ReauthContext>,
    already_initialized: bool,
) -> IntegrationResult<Mode> {
    if !already_initialized {
        session.initialize().await?;
    }
    session.list_tools(true).await?;
    session.list_resources(true).await?;
    session.list_prompts(true).await?;

    let poller = Arc::new(AuthStatusPoller::new(Arc::clone(session)));
    session
        .set_observer(Arc::new(ResourceChangeAuthRepoll {
            poller: Arc::clone(&poller),
        }))
        .await;
    let poller_cancel = CancellationToken::new();
    tokio::spawn(Arc::clone(&poller).run(poller_cancel.clone()));

    Ok(Mode::Active {
        meta: MetaToolServer::new(Arc::clone(session), poller, reauth),
        poller_cancel,
    })
}

/// Polls `auth.state()` until the pending-auth flow completes, then
/// swaps the supervisor's active mode in place (§4.G's "swap ... without
/// renegotiation").
async fn run_swap_watcher(
    mode: Arc<RwLock<Mode>>,
    auth: Arc<OAuthManager>,
    session: Arc<Session>,
    reauth: Arc<ReauthContext>,
) {
    loop {
        if auth.state().await == AuthState::Authenticated {
            match build_active_mode(&session, reauth, false).await {
                Ok(active) => {
                    *mode.write().await = active;
                    info!("authentication complete; now serving the full meta-tool catalogue");
                }
                Err(e) => {
                    warn!(error = %e, "post-auth initialize failed; staying in pending-auth mode");
                }
                // A stuck supervisor here would never retry; the user's only
                // recourse today is to restart the agent.
            }
            return;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}

fn server_info() -> ServerInfo {
    ServerInfo {
        name: config::client_info::AGENT_NAME.to_string(),
        version: config::client_info::VERSION.to_string(),
    }
}

fn server_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        experimental: None,
        logging: Some(LoggingCapabilities {}),
        prompts: Some(PromptCapabilities { list_changed: Some(false) }),
        resources: Some(ResourceCapabilities {
            subscribe: Some(false),
            list_changed: Some(false),
        }),
        tools: Some(ToolCapabilities { list_changed: Some(false) }),
    }
}

/// Descriptor + input schema for the one tool the pending-auth bootstrap
/// server exposes.
fn pending_auth_tool(name: &str) -> Tool {
    Tool {
        name: name.to_string(),
        description: Some(
            "Start (or resume) the OAuth sign-in flow against the aggregator.".to_string(),
        ),
        input_schema: json!({"type": "object", "properties": {}}),
    }
}

/// Descriptor + input schema for each of the fixed meta-tools (§4.H table).
fn meta_tool(name: &str) -> Tool {
    let (description, input_schema) = match name {
        "list_tools" => (
            "List every tool the aggregator exposes.",
            json!({"type": "object", "properties": {"include_schema": {"type": "boolean"}}}),
        ),
        "list_resources" => (
            "List every resource the aggregator exposes.",
            json!({"type": "object", "properties": {}}),
        ),
        "list_prompts" => (
            "List every prompt the aggregator exposes.",
            json!({"type": "object", "properties": {}}),
        ),
        "list_core_tools" => (
            "List tools named `core*` (a shorthand for filter_tools).",
            json!({"type": "object", "properties": {"include_schema": {"type": "boolean"}}}),
        ),
        "describe_tool" => (
            "Fetch one tool's full descriptor by name.",
            json!({"type": "object", "properties": {"name": {"type": "string"}}, "required": ["name"]}),
        ),
        "describe_prompt" => (
            "Fetch one prompt's full descriptor by name.",
            json!({"type": "object", "properties": {"name": {"type": "string"}}, "required": ["name"]}),
        ),
        "describe_resource" => (
            "Fetch one resource's full descriptor by URI.",
            json!({"type": "object", "properties": {"uri": {"type": "string"}}, "required": ["uri"]}),
        ),
        "call_tool" => (
            "Forward a tool call to the aggregator.",
            json!({
                "type": "object",
                "properties": {"name": {"type": "string"}, "arguments": {"type": "object"}},
                "required": ["name"],
            }),
        ),
        "get_resource" => (
            "Forward a resource read to the aggregator.",
            json!({"type": "object", "properties": {"uri": {"type": "string"}}, "required": ["uri"]}),
        ),
        "get_prompt" => (
            "Forward a prompt fetch to the aggregator.",
            json!({
                "type": "object",
                "properties": {"name": {"type": "string"}, "arguments": {"type": "object"}},
                "required": ["name"],
            }),
        ),
        "filter_tools" => (
            "List tools whose name and/or description match a wildcard pattern.",
            json!({
                "type": "object",
                "properties": {
                    "pattern": {"type": "string"},
                    "description_filter": {"type": "string"},
                    "case_sensitive": {"type": "boolean"},
                    "include_schema": {"type": "boolean"},
                },
            }),
        ),
        other => (other, json!({"type": "object", "properties": {}})),
    };

    Tool {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema,
    }
}

fn tools_list_response(tools: Vec<Tool>) -> Value {
    serde_json::to_value(
        tools
            .into_iter()
            .map(|t| json!({"name": t.name, "description": t.description, "inputSchema": t.input_schema}))
            .collect::<Vec<_>>(),
    )
    .unwrap_or_else(|_| json!([]))
}

fn method_not_found(id: Option<muster_agent::RequestId>, method: &str) -> JsonRpcResponse {
    JsonRpcResponse::error(
        json!({"code": error_codes::METHOD_NOT_FOUND, "message": format!("method not found: {method}")}),
        id,
    )
}

fn invalid_params(id: Option<muster_agent::RequestId>, detail: &str) -> JsonRpcResponse {
    JsonRpcResponse::error(
        json!({"code": error_codes::INVALID_PARAMS, "message": detail}),
        id,
    )
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("muster-agent: fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> AgentResult<()> {
    if !args.non_interactive {
        init_tracing(args.log_level.as_deref());
    }

    let endpoint = Endpoint::parse(&args.endpoint, args.transport.into())
        .map_err(|e| AgentError::Configuration(format!("invalid endpoint: {e}")))?;

    let session_config = if args.non_interactive {
        SessionConfig::non_interactive()
    } else {
        SessionConfig::default()
    };

    let token_store: Arc<dyn TokenStore> = Arc::new(InMemoryTokenStore::new());
    let auth = Arc::new(OAuthManager::new(token_store));
    let client_config = oauth_config_from_env(&args.endpoint);
    let reauth = Arc::new(ReauthContext::new(Some(Arc::clone(&auth)), client_config.clone()));

    let session = Session::connect(endpoint, HeaderMap::new(), session_config)
        .await
        .map_err(|e| AgentError::Startup(format!("connect failed: {e}")))?;

    let mode = match session.initialize().await {
        Ok(_) => {
            auth.check_connection(false).await;
            let active = build_active_mode(&session, Arc::clone(&reauth), true)
                .await
                .map_err(|e| AgentError::Startup(format!("post-connect initialize failed: {e}")))?;
            Arc::new(RwLock::new(active))
        }
        Err(IntegrationError::Transport(ref e)) if e.is_token_expired() => {
            auth.check_connection(true).await;
            info!("aggregator requires authentication; exposing the bootstrap tool only");
            let m = Arc::new(RwLock::new(Mode::PendingAuth(PendingAuthServer::new(Arc::clone(&auth)))));
            tokio::spawn(run_swap_watcher(
                Arc::clone(&m),
                Arc::clone(&auth),
                Arc::clone(&session),
                Arc::clone(&reauth),
            ));
            m
        }
        Err(e) => return Err(AgentError::Startup(format!("initialize failed: {e}"))),
    };

    let result = serve_stdio(Arc::clone(&mode), client_config).await;

    if let Mode::Active { poller_cancel, .. } = &*mode.read().await {
        poller_cancel.cancel();
    }

    result
}

async fn serve_stdio(mode: Arc<RwLock<Mode>>, client_config: Option<OAuthClientConfig>) -> AgentResult<()> {
    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(stdin).lines();
    let mut host_handshake_done = false;

    loop {
        let line = lines
            .next_line()
            .await
            .map_err(|e| AgentError::Startup(format!("stdin read error: {e}")))?;

        let Some(line) = line else {
            return if host_handshake_done {
                Ok(())
            } else {
                Err(AgentError::Startup("stdio closed before handshake".to_string()))
            };
        };

        if line.trim().is_empty() {
            continue;
        }

        // Parsed as a raw value first: a notification carries no `id` key,
        // and `JsonRpcRequest::id` is non-optional, so a direct typed parse
        // would reject every well-formed notification as malformed JSON.
        let raw: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                let response = JsonRpcResponse::error(
                    json!({"code": error_codes::PARSE_ERROR, "message": e.to_string()}),
                    None,
                );
                write_response(&mut stdout, &response).await?;
                continue;
            }
        };

        if raw.get("id").is_none() {
            if raw.get("method").and_then(Value::as_str) == Some(methods::INITIALIZED) {
                host_handshake_done = true;
            }
            continue;
        }

        let request: JsonRpcRequest = match serde_json::from_value(raw) {
            Ok(r) => r,
            Err(e) => {
                let response = JsonRpcResponse::error(
                    json!({"code": error_codes::INVALID_REQUEST, "message": e.to_string()}),
                    None,
                );
                write_response(&mut stdout, &response).await?;
                continue;
            }
        };

        let response = dispatch(&mode, &request, client_config.clone()).await;
        write_response(&mut stdout, &response).await?;
    }
}

async fn write_response(
    stdout: &mut tokio::io::Stdout,
    response: &JsonRpcResponse,
) -> AgentResult<()> {
    let mut line = serde_json::to_string(response)
        .map_err(|e| AgentError::Startup(format!("failed to serialize response: {e}")))?;
    line.push('\n');
    stdout
        .write_all(line.as_bytes())
        .await
        .map_err(|e| AgentError::Startup(format!("stdout write error: {e}")))?;
    stdout
        .flush()
        .await
        .map_err(|e| AgentError::Startup(format!("stdout flush error: {e}")))?;
    Ok(())
}

async fn dispatch(
    mode: &Arc<RwLock<Mode>>,
    request: &JsonRpcRequest,
    client_config: Option<OAuthClientConfig>,
) -> JsonRpcResponse {
    let id = Some(request.id.clone());

    match request.method.as_str() {
        methods::INITIALIZE => {
            let capabilities = match serde_json::to_value(server_capabilities()) {
                Ok(v) => v,
                Err(e) => {
                    return JsonRpcResponse::error(
                        json!({"code": error_codes::INTERNAL_ERROR, "message": e.to_string()}),
                        id,
                    )
                }
            };
            let response = InitializeResponse::new(capabilities, server_info(), None);
            match serde_json::to_value(response) {
                Ok(v) => JsonRpcResponse::success(v, request.id.clone()),
                Err(e) => JsonRpcResponse::error(
                    json!({"code": error_codes::INTERNAL_ERROR, "message": e.to_string()}),
                    id,
                ),
            }
        }

        methods::TOOLS_LIST => {
            let guard = mode.read().await;
            let tools = match &*guard {
                Mode::PendingAuth(server) => vec![pending_auth_tool(server.tool_name())],
                Mode::Active { .. } => muster_agent::server::META_TOOLS
                    .iter()
                    .map(|name| meta_tool(name))
                    .collect(),
            };
            JsonRpcResponse::success(json!({"tools": tools_list_response(tools)}), request.id.clone())
        }

        methods::TOOLS_CALL => {
            let Some(params) = &request.params else {
                return invalid_params(id, "tools/call requires params");
            };
            let guard = mode.read().await;
            let name = params.get("name").and_then(Value::as_str).map(str::to_string);
            let arguments = params.get("arguments").cloned();

            let outcome: Result<Value, String> = match (&*guard, name) {
                (Mode::PendingAuth(server), Some(ref n)) if n == server.tool_name() => {
                    match client_config {
                        Some(cfg) => server
                            .authenticate_muster(cfg)
                            .await
                            .map_err(|e| e.to_string()),
                        None => Err(
                            "authenticate_muster is not configured: no OAuth client registration was supplied"
                                .to_string(),
                        ),
                    }
                }
                (Mode::PendingAuth(server), Some(n)) => Err(format!(
                    "unknown tool '{n}'; only '{}' is available until authentication completes",
                    server.tool_name()
                )),
                (Mode::Active { meta, .. }, Some(n)) => meta
                    .handle(&n, arguments)
                    .await
                    .and_then(|r| serde_json::to_value(r).map_err(|e| {
                        muster_agent::server::ServerError::Advisory(e.to_string())
                    }))
                    .map_err(|e| e.to_string()),
                (_, None) => Err("tools/call requires a string 'name'".to_string()),
            };

            match outcome {
                Ok(value) => JsonRpcResponse::success(value, request.id.clone()),
                Err(message) => JsonRpcResponse::error(
                    json!({"code": error_codes::SERVER_ERROR, "message": message}),
                    id,
                ),
            }
        }

        methods::RESOURCES_LIST | methods::PROMPTS_LIST => {
            // The host only ever sees meta-tools; it has no direct view of
            // the aggregator's resources/prompts (those are reached through
            // get_resource/get_prompt), so these report empty catalogues.
            JsonRpcResponse::success(json!({"resources": [], "prompts": []}), request.id.clone())
        }

        other => method_not_found(id, other),
    }
}
