//! The client-side transport contract (§4.A).
//!
//! Two wire flavours share one observable contract: open, invoke with a
//! deadline, optionally subscribe to notifications, close.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use url::Url;

use crate::protocol::JsonRpcNotification;
use crate::transport::error::TransportError;

/// Header map carried by a session: `Authorization`, a session-id header,
/// and arbitrary custom headers.
pub type HeaderMap = HashMap<String, String>;

/// Channel used to fan out notifications to a single subscriber.
pub type NotificationSender = mpsc::Sender<JsonRpcNotification>;

/// Which of the two wire flavours an [`Endpoint`] names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Sse,
    StreamableHttp,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Sse => "sse",
            TransportKind::StreamableHttp => "streamable-http",
        }
    }
}

impl std::str::FromStr for TransportKind {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sse" => Ok(TransportKind::Sse),
            "streamable-http" | "streamable_http" => Ok(TransportKind::StreamableHttp),
            other => Err(TransportError::Network(format!(
                "unknown transport kind: {other}"
            ))),
        }
    }
}

/// A URL plus a transport flavour tag. Immutable per session; replaced
/// atomically on context switch (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: Url,
    pub kind: TransportKind,
}

impl Endpoint {
    pub fn parse(url: &str, kind: TransportKind) -> Result<Self, TransportError> {
        let url = Url::parse(url).map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self { url, kind })
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.url, self.kind.as_str())
    }
}

/// The client-side transport contract.
///
/// Header changes do not retroactively apply to an open transport: a
/// `set_header` must be followed by `reconnect` (i.e. a fresh `start`) to
/// take effect, per §4.A's tie-break note.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open the underlying channel and return ready.
    async fn start(&mut self, headers: HeaderMap) -> Result<(), TransportError>;

    /// Perform a JSON-RPC round-trip, failing at `deadline` with
    /// [`TransportError::Timeout`] rather than hanging indefinitely.
    async fn invoke(
        &self,
        method: &str,
        params: Option<Value>,
        deadline: Duration,
    ) -> Result<Value, TransportError>;

    /// Register the single subscriber for server-pushed notifications.
    /// Must fail with [`TransportError::NotificationsUnsupported`] when
    /// `supports_notifications()` is `false`.
    fn on_notification(&mut self, sender: NotificationSender) -> Result<(), TransportError>;

    /// Tear down the channel. No further callbacks fire after this returns.
    async fn close(&mut self) -> Result<(), TransportError>;

    /// Whether this transport ever calls back into a registered subscriber.
    fn supports_notifications(&self) -> bool;

    /// The endpoint this transport was constructed for.
    fn endpoint(&self) -> &Endpoint;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// A transport double for session/server tests, recording calls made
    /// against it rather than talking to a real aggregator.
    pub struct MockTransport {
        pub endpoint: Endpoint,
        pub supports_notifications: bool,
        pub responses: Mutex<HashMap<String, Result<Value, TransportError>>>,
        pub invocations: Mutex<Vec<(String, Option<Value>)>>,
        pub notification_sender: Mutex<Option<NotificationSender>>,
    }

    impl MockTransport {
        pub fn new(endpoint: Endpoint, supports_notifications: bool) -> Self {
            Self {
                endpoint,
                supports_notifications,
                responses: Mutex::new(HashMap::new()),
                invocations: Mutex::new(Vec::new()),
                notification_sender: Mutex::new(None),
            }
        }

        pub fn stub(&self, method: &str, result: Result<Value, TransportError>) {
            self.responses
                .lock()
                .unwrap()
                .insert(method.to_string(), result);
        }

        pub async fn push_notification(&self, notification: JsonRpcNotification) {
            let sender = self.notification_sender.lock().unwrap().clone();
            if let Some(sender) = sender {
                let _ = sender.send(notification).await;
            }
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn start(&mut self, _headers: HeaderMap) -> Result<(), TransportError> {
            Ok(())
        }

        async fn invoke(
            &self,
            method: &str,
            params: Option<Value>,
            _deadline: Duration,
        ) -> Result<Value, TransportError> {
            self.invocations
                .lock()
                .unwrap()
                .push((method.to_string(), params));
            self.responses
                .lock()
                .unwrap()
                .get(method)
                .cloned()
                .unwrap_or_else(|| Ok(Value::Null))
        }

        fn on_notification(&mut self, sender: NotificationSender) -> Result<(), TransportError> {
            if !self.supports_notifications {
                return Err(TransportError::NotificationsUnsupported);
            }
            *self.notification_sender.lock().unwrap() = Some(sender);
            Ok(())
        }

        async fn close(&mut self) -> Result<(), TransportError> {
            Ok(())
        }

        fn supports_notifications(&self) -> bool {
            self.supports_notifications
        }

        fn endpoint(&self) -> &Endpoint {
            &self.endpoint
        }
    }

    #[tokio::test]
    async fn mock_records_invocations_and_replays_stubs() {
        let endpoint = Endpoint::parse("https://agg.example/mcp", TransportKind::Sse).unwrap();
        let transport = MockTransport::new(endpoint, true);
        transport.stub("ping", Ok(serde_json::json!({"pong": true})));

        let result = transport
            .invoke("ping", None, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(result, serde_json::json!({"pong": true}));
        assert_eq!(transport.invocations.lock().unwrap().len(), 1);
    }

    #[test]
    fn streamable_http_rejects_notification_subscription() {
        let endpoint =
            Endpoint::parse("https://agg.example/mcp", TransportKind::StreamableHttp).unwrap();
        let mut transport = MockTransport::new(endpoint, false);
        let (tx, _rx) = mpsc::channel(1);
        assert!(matches!(
            transport.on_notification(tx),
            Err(TransportError::NotificationsUnsupported)
        ));
    }
}
