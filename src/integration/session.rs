//! Session — §4.B.
//!
//! A session exclusively owns one transport and one catalogue-cache
//! triple, built on this crate's own [`Transport`] trait and
//! [`CatalogueCache`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::config;
use crate::integration::cache::{CacheKind, CacheObserver, CatalogueCache, Diff};
use crate::integration::error::{IntegrationError, IntegrationResult};
use crate::protocol::constants::methods;
use crate::protocol::{
    CallToolRequest, CallToolResponse, ClientCapabilities, ClientInfo, Content, GetPromptRequest,
    GetPromptResponse, InitializeRequest, InitializeResponse, ListPromptsRequest,
    ListPromptsResponse, ListResourcesRequest, ListResourcesResponse, ListToolsRequest,
    ListToolsResponse, Prompt, PromptMessage, ProtocolVersion, ReadResourceRequest,
    ReadResourceResponse, Resource, ServerCapabilities, ServerInfo, Tool,
};
use crate::transport::{AnyTransport, Endpoint, HeaderMap, Transport, TransportError};

/// Configuration for a session's handshake and default timeouts.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub client_info: ClientInfo,
    pub capabilities: ClientCapabilities,
    pub protocol_version: ProtocolVersion,
    pub default_timeout: Duration,
    pub long_op_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            client_info: ClientInfo {
                name: config::client_info::AGENT_NAME.to_string(),
                version: config::client_info::VERSION.to_string(),
            },
            capabilities: ClientCapabilities::default(),
            protocol_version: ProtocolVersion::new(config::PROTOCOL_VERSION)
                .unwrap_or_else(|_| ProtocolVersion::current()),
            default_timeout: config::DEFAULT_TIMEOUT,
            long_op_timeout: config::LONG_OP_TIMEOUT,
        }
    }
}

impl SessionConfig {
    /// The non-logging, `"muster-cli"` client info variant (§6).
    pub fn non_interactive() -> Self {
        Self {
            client_info: ClientInfo {
                name: config::client_info::CLI_NAME.to_string(),
                version: config::client_info::VERSION.to_string(),
            },
            ..Self::default()
        }
    }
}

/// A session's lifecycle stage, separate from transport connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotInitialized,
    Initializing,
    Ready,
    Failed,
}

/// Owns exactly one transport and one catalogue-cache triple (§3).
pub struct Session {
    endpoint: RwLock<Endpoint>,
    transport: RwLock<AnyTransport>,
    config: SessionConfig,
    headers: RwLock<HeaderMap>,
    state: RwLock<SessionState>,
    server_info: RwLock<Option<ServerInfo>>,
    server_capabilities: RwLock<Option<ServerCapabilities>>,
    tools: CatalogueCache<Tool>,
    resources: CatalogueCache<Resource>,
    prompts: CatalogueCache<Prompt>,
    cache_enabled: std::sync::atomic::AtomicBool,
    observer: RwLock<Option<Arc<dyn CacheObserver>>>,
    notification_task: RwLock<Option<tokio::task::JoinHandle<()>>>,
    /// Set by `reconnect` when the new transport supports notifications;
    /// drained by `rewatch`, which needs a live `Arc<Self>` that `reconnect`
    /// (taking only `&self`) cannot produce itself.
    pending_notification_rx:
        RwLock<Option<mpsc::Receiver<crate::protocol::JsonRpcNotification>>>,
}

impl Session {
    /// Open a transport for `endpoint` and start it with `headers`. Does
    /// not perform the MCP handshake — call `initialize` next.
    pub async fn connect(
        endpoint: Endpoint,
        headers: HeaderMap,
        config: SessionConfig,
    ) -> IntegrationResult<Arc<Self>> {
        let mut transport = AnyTransport::new(endpoint.clone());
        let supports_notifications = transport.supports_notifications();

        let (notification_tx, notification_rx) =
            mpsc::channel(config::NOTIFICATION_QUEUE_CAPACITY);
        if supports_notifications {
            transport.on_notification(notification_tx)?;
        }

        transport.start(headers.clone()).await?;

        let session = Arc::new(Self {
            endpoint: RwLock::new(endpoint),
            transport: RwLock::new(transport),
            config,
            headers: RwLock::new(headers),
            state: RwLock::new(SessionState::NotInitialized),
            server_info: RwLock::new(None),
            server_capabilities: RwLock::new(None),
            tools: CatalogueCache::new(),
            resources: CatalogueCache::new(),
            prompts: CatalogueCache::new(),
            cache_enabled: std::sync::atomic::AtomicBool::new(true),
            observer: RwLock::new(None),
            notification_task: RwLock::new(None),
            pending_notification_rx: RwLock::new(None),
        });

        if supports_notifications {
            let handle = tokio::spawn(Self::run_notification_loop(
                Arc::downgrade(&session),
                notification_rx,
            ));
            *session.notification_task.write().await = Some(handle);
        }

        Ok(session)
    }

    pub async fn set_observer(&self, observer: Arc<dyn CacheObserver>) {
        *self.observer.write().await = Some(observer);
    }

    pub fn set_cache_enabled(&self, enabled: bool) {
        self.cache_enabled
            .store(enabled, std::sync::atomic::Ordering::SeqCst);
    }

    /// Header changes never retroactively apply to the open transport
    /// (§4.A): callers must follow this with `reconnect`.
    pub async fn set_header(&self, key: impl Into<String>, value: impl Into<String>) {
        self.headers.write().await.insert(key.into(), value.into());
    }

    /// Destroys and recreates the transport, preserving the header map
    /// (§3). A `reconnect` to the same endpoint is a documented no-op
    /// that leaves caches untouched (§8).
    pub async fn reconnect(&self, endpoint: Endpoint) -> IntegrationResult<()> {
        if *self.endpoint.read().await == endpoint {
            debug!(%endpoint, "reconnect no-op: endpoint unchanged");
            return Ok(());
        }

        let headers = self.headers.read().await.clone();
        let mut old_transport = self.transport.write().await;
        old_transport.close().await?;

        let mut new_transport = AnyTransport::new(endpoint.clone());
        let supports_notifications = new_transport.supports_notifications();
        if supports_notifications {
            let (notification_tx, notification_rx) =
                mpsc::channel(config::NOTIFICATION_QUEUE_CAPACITY);
            new_transport.on_notification(notification_tx)?;
            // The previous notification loop (if any) exits once its
            // sender side is dropped along with `old_transport`.
            if let Some(handle) = self.notification_task.write().await.take() {
                handle.abort();
            }
            new_transport.start(headers).await?;
            *old_transport = new_transport;
            drop(old_transport);
            *self.endpoint.write().await = endpoint;
            *self.state.write().await = SessionState::NotInitialized;
            *self.pending_notification_rx.write().await = Some(notification_rx);
        } else {
            new_transport.start(headers).await?;
            *old_transport = new_transport;
            drop(old_transport);
            *self.endpoint.write().await = endpoint;
            *self.state.write().await = SessionState::NotInitialized;
        }

        Ok(())
    }

    /// Spawns the notification-dispatch loop for the receiver a prior
    /// `reconnect` stashed. A no-op if the transport does not support
    /// notifications, or if `rewatch` has already drained the receiver.
    /// Callers (the context switcher) call this right after `reconnect`.
    pub async fn rewatch(self: &Arc<Self>) {
        let Some(rx) = self.pending_notification_rx.write().await.take() else {
            return;
        };
        let handle = tokio::spawn(Self::run_notification_loop(Arc::downgrade(self), rx));
        *self.notification_task.write().await = Some(handle);
    }

    pub async fn close(&self) -> IntegrationResult<()> {
        if let Some(handle) = self.notification_task.write().await.take() {
            handle.abort();
        }
        self.transport.write().await.close().await?;
        *self.state.write().await = SessionState::NotInitialized;
        Ok(())
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    pub async fn server_info(&self) -> Option<ServerInfo> {
        self.server_info.read().await.clone()
    }

    pub async fn endpoint(&self) -> Endpoint {
        self.endpoint.read().await.clone()
    }

    fn ensure_ready_sync(state: SessionState) -> IntegrationResult<()> {
        match state {
            SessionState::Ready => Ok(()),
            _ => Err(IntegrationError::NotInitialized),
        }
    }

    /// Sends the protocol-version handshake. Single invocation per session.
    pub async fn initialize(&self) -> IntegrationResult<ServerInfo> {
        {
            let state = self.state.read().await;
            if *state == SessionState::Ready {
                return Err(IntegrationError::AlreadyInitialized);
            }
        }
        *self.state.write().await = SessionState::Initializing;

        let capabilities = serde_json::to_value(&self.config.capabilities)
            .map_err(|e| IntegrationError::InvalidRequest(e.to_string()))?;
        let request = InitializeRequest::with_version(
            self.config.protocol_version.clone(),
            capabilities,
            self.config.client_info.clone(),
        );

        let result = self.invoke(methods::INITIALIZE, &request, self.config.default_timeout).await;
        let result = match result {
            Ok(value) => value,
            Err(e) => {
                *self.state.write().await = SessionState::Failed;
                return Err(e);
            }
        };

        let response: InitializeResponse = serde_json::from_value(result)
            .map_err(|e| IntegrationError::InvalidResponse(e.to_string()))?;
        let server_capabilities: ServerCapabilities =
            serde_json::from_value(response.capabilities)
                .map_err(|e| IntegrationError::InvalidResponse(e.to_string()))?;

        *self.server_info.write().await = Some(response.server_info.clone());
        *self.server_capabilities.write().await = Some(server_capabilities);
        *self.state.write().await = SessionState::Ready;

        info!(server = %response.server_info.name, "session initialized");
        Ok(response.server_info)
    }

    /// Forwards to the aggregator; returns the raw result, which may carry
    /// a tool-level error (not a transport error, §7 kind 5).
    pub async fn call_tool(
        &self,
        name: impl Into<String>,
        arguments: Option<Value>,
        timeout: Option<Duration>,
    ) -> IntegrationResult<Vec<Content>> {
        Self::ensure_ready_sync(self.state().await)?;
        let name = name.into();
        let request = CallToolRequest::new(name.clone(), arguments.unwrap_or(Value::Null));
        let deadline = timeout.unwrap_or(self.config.default_timeout);
        let value = self.invoke(methods::TOOLS_CALL, &request, deadline).await?;
        let response: CallToolResponse = serde_json::from_value(value)
            .map_err(|e| IntegrationError::InvalidResponse(e.to_string()))?;
        Ok(response.content)
    }

    pub async fn get_resource(&self, uri: impl Into<String>) -> IntegrationResult<Vec<Content>> {
        Self::ensure_ready_sync(self.state().await)?;
        let request = ReadResourceRequest::new(uri.into());
        let value = self
            .invoke(methods::RESOURCES_READ, &request, self.config.default_timeout)
            .await?;
        let response: ReadResourceResponse = serde_json::from_value(value)
            .map_err(|e| IntegrationError::InvalidResponse(e.to_string()))?;
        Ok(response.contents)
    }

    pub async fn get_prompt(
        &self,
        name: impl Into<String>,
        arguments: HashMap<String, String>,
    ) -> IntegrationResult<Vec<PromptMessage>> {
        Self::ensure_ready_sync(self.state().await)?;
        let request = GetPromptRequest::new(name.into(), arguments);
        let value = self
            .invoke(methods::PROMPTS_GET, &request, self.config.default_timeout)
            .await?;
        let response: GetPromptResponse = serde_json::from_value(value)
            .map_err(|e| IntegrationError::InvalidResponse(e.to_string()))?;
        Ok(response.messages)
    }

    pub async fn list_tools(&self, initial: bool) -> IntegrationResult<Vec<Tool>> {
        Self::ensure_ready_sync(self.state().await)?;
        let request = ListToolsRequest::new();
        let value = self
            .invoke(methods::TOOLS_LIST, &request, self.config.default_timeout)
            .await?;
        let response: ListToolsResponse = serde_json::from_value(value)
            .map_err(|e| IntegrationError::InvalidResponse(e.to_string()))?;

        let diff = self
            .tools
            .replace(
                response
                    .tools
                    .iter()
                    .map(|t| (t.name.clone(), t.clone()))
                    .collect(),
            )
            .await;
        if !initial {
            self.notify_observer(CacheKind::Tools, diff).await;
        }
        Ok(response.tools)
    }

    pub async fn list_resources(&self, initial: bool) -> IntegrationResult<Vec<Resource>> {
        Self::ensure_ready_sync(self.state().await)?;
        let request = ListResourcesRequest::new();
        let value = self
            .invoke(methods::RESOURCES_LIST, &request, self.config.default_timeout)
            .await?;
        let response: ListResourcesResponse = serde_json::from_value(value)
            .map_err(|e| IntegrationError::InvalidResponse(e.to_string()))?;

        let diff = self
            .resources
            .replace(
                response
                    .resources
                    .iter()
                    .map(|r| (r.uri.as_str().to_string(), r.clone()))
                    .collect(),
            )
            .await;
        if !initial {
            self.notify_observer(CacheKind::Resources, diff).await;
        }
        Ok(response.resources)
    }

    pub async fn list_prompts(&self, initial: bool) -> IntegrationResult<Vec<Prompt>> {
        Self::ensure_ready_sync(self.state().await)?;
        let request = ListPromptsRequest::new();
        let value = self
            .invoke(methods::PROMPTS_LIST, &request, self.config.default_timeout)
            .await?;
        let response: ListPromptsResponse = serde_json::from_value(value)
            .map_err(|e| IntegrationError::InvalidResponse(e.to_string()))?;

        let diff = self
            .prompts
            .replace(
                response
                    .prompts
                    .iter()
                    .map(|p| (p.name.clone(), p.clone()))
                    .collect(),
            )
            .await;
        if !initial {
            self.notify_observer(CacheKind::Prompts, diff).await;
        }
        Ok(response.prompts)
    }

    pub async fn refresh_tools(&self) -> IntegrationResult<()> {
        self.list_tools(false).await.map(|_| ())
    }

    pub async fn refresh_resources(&self) -> IntegrationResult<()> {
        self.list_resources(false).await.map(|_| ())
    }

    pub async fn refresh_prompts(&self) -> IntegrationResult<()> {
        self.list_prompts(false).await.map(|_| ())
    }

    pub async fn get_tool_by_id(&self, name: &str) -> Option<Tool> {
        self.tools.get_by_id(name).await
    }

    pub async fn get_resource_by_id(&self, uri: &str) -> Option<Resource> {
        self.resources.get_by_id(uri).await
    }

    pub async fn get_prompt_by_id(&self, name: &str) -> Option<Prompt> {
        self.prompts.get_by_id(name).await
    }

    pub async fn tools_snapshot(&self) -> Vec<Tool> {
        self.tools.snapshot().await
    }

    pub async fn resources_snapshot(&self) -> Vec<Resource> {
        self.resources.snapshot().await
    }

    pub async fn prompts_snapshot(&self) -> Vec<Prompt> {
        self.prompts.snapshot().await
    }

    async fn notify_observer(&self, kind: CacheKind, diff: Diff) {
        if diff.is_empty() {
            return;
        }
        if let Some(observer) = self.observer.read().await.clone() {
            observer.on_cache_updated(kind, diff).await;
        }
    }

    async fn invoke<P: serde::Serialize>(
        &self,
        method: &str,
        params: &P,
        deadline: Duration,
    ) -> IntegrationResult<Value> {
        let params_value =
            serde_json::to_value(params).map_err(|e| IntegrationError::InvalidRequest(e.to_string()))?;
        let transport = self.transport.read().await;
        let value = transport.invoke(method, Some(params_value), deadline).await?;
        Ok(value)
    }

    /// Drains notifications, refreshing the matching cache and forwarding
    /// the diff to the registered observer. Runs for the session's
    /// lifetime; holds only a weak reference so it never keeps the
    /// session alive past its last strong reference.
    async fn run_notification_loop(
        session: std::sync::Weak<Session>,
        mut rx: mpsc::Receiver<crate::protocol::JsonRpcNotification>,
    ) {
        while let Some(notification) = rx.recv().await {
            let Some(session) = session.upgrade() else {
                break;
            };
            if !session.cache_enabled.load(std::sync::atomic::Ordering::SeqCst) {
                continue;
            }

            let outcome = match notification.method.as_str() {
                methods::NOTIFICATIONS_TOOLS_LIST_CHANGED => session.refresh_tools().await,
                methods::NOTIFICATIONS_RESOURCES_LIST_CHANGED => {
                    session.refresh_resources().await
                }
                methods::NOTIFICATIONS_PROMPTS_LIST_CHANGED => session.refresh_prompts().await,
                other => {
                    debug!(method = other, "ignoring unrecognized notification");
                    continue;
                }
            };

            if let Err(e) = outcome {
                // §7: notification-handler errors are logged and dropped;
                // the listener never terminates over one bad notification.
                warn!(error = %e, "failed to refresh cache after notification");
            }
        }
    }
}
