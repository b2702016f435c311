//! OAuth manager — §4.D's state machine, backed by the `oauth2`
//! crate for PKCE and an `axum` loopback server for the redirect callback:
//! bind an ephemeral port, wait on a oneshot for the redirect, tear the
//! listener down once the code arrives.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, PkceCodeChallenge,
    PkceCodeVerifier, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, Mutex, RwLock};
use tracing::{info, warn};

use crate::auth::error::{AuthError, AuthResult};
use crate::auth::store::TokenStore;
use crate::auth::types::{AuthState, OAuthToken};
use crate::config;

/// Static per-issuer OAuth client configuration. One of these exists per
/// downstream aggregator/issuer pair the agent has been told about.
#[derive(Debug, Clone)]
pub struct OAuthClientConfig {
    pub issuer: String,
    pub server_url: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub auth_url: String,
    pub token_url: String,
    pub scopes: Vec<String>,
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

enum CallbackOutcome {
    Success { code: String, state: String },
    Error(String),
}

struct ActiveFlow {
    auth_url: String,
    redirect_uri: String,
    csrf_token: CsrfToken,
    pkce_verifier: PkceCodeVerifier,
    client_config: OAuthClientConfig,
    callback_rx: Mutex<Option<oneshot::Receiver<CallbackOutcome>>>,
    _shutdown: oneshot::Sender<()>,
}

async fn callback_handler(
    Query(params): Query<CallbackQuery>,
    State(tx): State<Arc<Mutex<Option<oneshot::Sender<CallbackOutcome>>>>>,
) -> Html<&'static str> {
    let outcome = match (params.code, params.state) {
        (Some(code), Some(state)) => CallbackOutcome::Success { code, state },
        _ => {
            let description = params
                .error_description
                .or(params.error)
                .unwrap_or_else(|| "missing code/state".to_string());
            CallbackOutcome::Error(description)
        }
    };

    if let Some(sender) = tx.lock().await.take() {
        let _ = sender.send(outcome);
    }

    Html("<html><body>Authentication complete. You may close this window.</body></html>")
}

async fn spawn_callback_server() -> AuthResult<(String, oneshot::Receiver<CallbackOutcome>, oneshot::Sender<()>)> {
    let listener = TcpListener::bind(("127.0.0.1", 0))
        .await
        .map_err(|e| AuthError::CallbackPortCollision(e.to_string()))?;
    let addr: SocketAddr = listener
        .local_addr()
        .map_err(|e| AuthError::CallbackPortCollision(e.to_string()))?;

    let (callback_tx, callback_rx) = oneshot::channel();
    let state = Arc::new(Mutex::new(Some(callback_tx)));
    let router = Router::new()
        .route("/callback", get(callback_handler))
        .with_state(state);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let server = axum::serve(listener, router).with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        });
        if let Err(e) = server.await {
            warn!(error = %e, "OAuth callback server exited with an error");
        }
    });

    Ok((format!("http://127.0.0.1:{}/callback", addr.port()), callback_rx, shutdown_tx))
}

fn build_client(config: &OAuthClientConfig, redirect_uri: &str) -> AuthResult<BasicClient> {
    let auth_url = AuthUrl::new(config.auth_url.clone())?;
    let token_url = TokenUrl::new(config.token_url.clone())?;
    let redirect_url = RedirectUrl::new(redirect_uri.to_string())?;

    Ok(BasicClient::new(
        ClientId::new(config.client_id.clone()),
        config.client_secret.clone().map(ClientSecret::new),
        auth_url,
        Some(token_url),
    )
    .set_redirect_uri(redirect_url))
}

/// Drives §4.D's state machine for a single issuer/endpoint pair at
/// a time. H holds one of these per session.
pub struct OAuthManager {
    store: Arc<dyn TokenStore>,
    state: RwLock<AuthState>,
    flow: Mutex<Option<ActiveFlow>>,
}

impl OAuthManager {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            store,
            state: RwLock::new(AuthState::Unauthenticated),
            flow: Mutex::new(None),
        }
    }

    pub async fn state(&self) -> AuthState {
        *self.state.read().await
    }

    /// Distinguishes "no auth required" from "auth_required challenge
    /// received" for the given issuer, based on whether the caller (who
    /// has already inspected the aggregator's `auth://status`/401
    /// response) found a challenge.
    pub async fn check_connection(&self, challenge_present: bool) -> AuthState {
        let mut state = self.state.write().await;
        *state = if challenge_present {
            AuthState::PendingAuth
        } else {
            AuthState::Authenticated
        };
        *state
    }

    /// Idempotent: calling twice while flow-in-progress returns the same
    /// URL rather than starting a second flow.
    pub async fn start_flow(&self, client_config: OAuthClientConfig) -> AuthResult<String> {
        {
            let flow = self.flow.lock().await;
            if let Some(active) = flow.as_ref() {
                if active.client_config.issuer == client_config.issuer {
                    return Ok(active.auth_url.clone());
                }
            }
        }

        let (redirect_uri, callback_rx, shutdown_tx) = spawn_callback_server().await?;
        let client = build_client(&client_config, &redirect_uri)?;

        let (pkce_challenge, pkce_verifier) = PkceCodeChallenge::new_random_sha256();
        let mut request = client.authorize_url(CsrfToken::new_random).set_pkce_challenge(pkce_challenge);
        for scope in &client_config.scopes {
            request = request.add_scope(Scope::new(scope.clone()));
        }
        let (auth_url, csrf_token) = request.url();

        let mut flow = self.flow.lock().await;
        *flow = Some(ActiveFlow {
            auth_url: auth_url.to_string(),
            redirect_uri,
            csrf_token,
            pkce_verifier,
            client_config,
            callback_rx: Mutex::new(Some(callback_rx)),
            _shutdown: shutdown_tx,
        });
        *self.state.write().await = AuthState::FlowInProgress;

        Ok(auth_url.to_string())
    }

    /// Blocks until the loopback server receives a code and token exchange
    /// completes, or until `config::REAUTH_WAIT_TIMEOUT` elapses.
    pub async fn wait_for_auth(&self) -> AuthResult<()> {
        let rx = {
            let flow = self.flow.lock().await;
            let active = flow.as_ref().ok_or(AuthError::NotAuthenticated)?;
            active
                .callback_rx
                .lock()
                .await
                .take()
                .ok_or(AuthError::WaitTimeout)?
        };

        let outcome = tokio::time::timeout(config::REAUTH_WAIT_TIMEOUT, rx)
            .await
            .map_err(|_| AuthError::WaitTimeout)?
            .map_err(|_| AuthError::WaitTimeout)?;

        let (code, state) = match outcome {
            CallbackOutcome::Success { code, state } => (code, state),
            CallbackOutcome::Error(description) => {
                *self.state.write().await = AuthState::Failed;
                return Err(AuthError::TokenExchange(description));
            }
        };

        let mut flow_guard = self.flow.lock().await;
        let active = flow_guard.take().ok_or(AuthError::NotAuthenticated)?;

        if state != active.csrf_token.secret().as_str() {
            *self.state.write().await = AuthState::Failed;
            return Err(AuthError::StateMismatch);
        }

        let client = build_client(&active.client_config, &active.redirect_uri)?;
        let token_response = client
            .exchange_code(AuthorizationCode::new(code))
            .set_pkce_verifier(active.pkce_verifier)
            .request_async(async_http_client)
            .await
            .map_err(|e| {
                AuthError::TokenExchange(e.to_string())
            })?;

        let expiry = token_response
            .expires_in()
            .map(|d| chrono::Utc::now() + chrono::Duration::from_std(d).unwrap_or_default());

        let token = OAuthToken {
            access_token: token_response.access_token().secret().clone(),
            refresh_token: token_response.refresh_token().map(|t| t.secret().clone()),
            issuer: active.client_config.issuer.clone(),
            server_url: active.client_config.server_url.clone(),
            expiry,
        };

        self.store.put(token).await;
        *self.state.write().await = AuthState::Authenticated;
        drop(flow_guard);

        info!(issuer = %active.client_config.issuer, "OAuth flow completed");
        Ok(())
    }

    pub async fn get_bearer_token(&self, issuer: &str) -> AuthResult<String> {
        let token = self
            .store
            .get_by_issuer(issuer)
            .await
            .ok_or_else(|| AuthError::NoToken(issuer.to_string()))?;
        Ok(token.bearer_header())
    }

    pub async fn clear_token(&self, issuer: &str) {
        self.store.delete(issuer).await;
        *self.state.write().await = AuthState::Unauthenticated;
    }
}
