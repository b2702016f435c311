//! Transport — §4.A.
//!
//! Two wire flavours (SSE, streamable HTTP) share one observable contract,
//! carrying JSON-RPC to the remote aggregator. Only the SSE flavour ever
//! delivers notifications.

pub mod error;
pub mod sse;
pub mod streamable_http;
pub mod traits;

pub use error::{TransportError, TransportResult};
pub use sse::SseTransport;
pub use streamable_http::StreamableHttpTransport;
pub use traits::{Endpoint, HeaderMap, NotificationSender, Transport, TransportKind};

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

/// Enum-dispatched transport so a [`crate::integration::Session`] can own
/// a transport by value without boxing a non-object-safe trait. Each
/// variant still implements [`Transport`] directly for tests and for
/// code that only needs the trait.
pub enum AnyTransport {
    Sse(SseTransport),
    StreamableHttp(StreamableHttpTransport),
}

impl AnyTransport {
    pub fn new(endpoint: Endpoint) -> Self {
        match endpoint.kind {
            TransportKind::Sse => AnyTransport::Sse(SseTransport::new(endpoint)),
            TransportKind::StreamableHttp => {
                AnyTransport::StreamableHttp(StreamableHttpTransport::new(endpoint))
            }
        }
    }
}

#[async_trait]
impl Transport for AnyTransport {
    async fn start(&mut self, headers: HeaderMap) -> Result<(), TransportError> {
        match self {
            AnyTransport::Sse(t) => t.start(headers).await,
            AnyTransport::StreamableHttp(t) => t.start(headers).await,
        }
    }

    async fn invoke(
        &self,
        method: &str,
        params: Option<Value>,
        deadline: Duration,
    ) -> Result<Value, TransportError> {
        match self {
            AnyTransport::Sse(t) => t.invoke(method, params, deadline).await,
            AnyTransport::StreamableHttp(t) => t.invoke(method, params, deadline).await,
        }
    }

    fn on_notification(&mut self, sender: NotificationSender) -> Result<(), TransportError> {
        match self {
            AnyTransport::Sse(t) => t.on_notification(sender),
            AnyTransport::StreamableHttp(t) => t.on_notification(sender),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        match self {
            AnyTransport::Sse(t) => t.close().await,
            AnyTransport::StreamableHttp(t) => t.close().await,
        }
    }

    fn supports_notifications(&self) -> bool {
        match self {
            AnyTransport::Sse(t) => t.supports_notifications(),
            AnyTransport::StreamableHttp(t) => t.supports_notifications(),
        }
    }

    fn endpoint(&self) -> &Endpoint {
        match self {
            AnyTransport::Sse(t) => t.endpoint(),
            AnyTransport::StreamableHttp(t) => t.endpoint(),
        }
    }
}
