//! Streamable-HTTP transport: plain request/response over POST, no
//! server-pushed notifications (`supports_notifications() == false`).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::protocol::{JsonRpcMessage, JsonRpcMessageTrait, JsonRpcRequest, RequestId};
use crate::transport::error::TransportError;
use crate::transport::traits::{Endpoint, HeaderMap, NotificationSender, Transport};

pub struct StreamableHttpTransport {
    endpoint: Endpoint,
    client: reqwest::Client,
    headers: RwLock<HeaderMap>,
    id_counter: std::sync::atomic::AtomicI64,
}

impl StreamableHttpTransport {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::new(),
            headers: RwLock::new(HeaderMap::new()),
            id_counter: std::sync::atomic::AtomicI64::new(1),
        }
    }

    fn next_id(&self) -> RequestId {
        let id = self.id_counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        RequestId::new_number(id)
    }
}

#[async_trait]
impl Transport for StreamableHttpTransport {
    async fn start(&mut self, headers: HeaderMap) -> Result<(), TransportError> {
        *self.headers.write().await = headers;
        Ok(())
    }

    async fn invoke(
        &self,
        method: &str,
        params: Option<Value>,
        deadline: Duration,
    ) -> Result<Value, TransportError> {
        let request = JsonRpcRequest::new(method, params, self.next_id());
        let body = request
            .to_json()
            .map_err(|e| TransportError::Malformed(e.to_string()))?;

        let headers = self.headers.read().await.clone();
        let mut builder = self
            .client
            .post(self.endpoint.url.clone())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .body(body);
        for (key, value) in &headers {
            builder = builder.header(key.as_str(), value.as_str());
        }

        let response = tokio::time::timeout(deadline, builder.send())
            .await
            .map_err(|_| TransportError::Timeout(deadline))?
            .map_err(|e| TransportError::Network(e.to_string()))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(TransportError::Unauthorized);
        }
        if !response.status().is_success() {
            let status = response.status();
            return Err(TransportError::ServerError {
                code: status.as_u16() as i32,
                message: status.to_string(),
            });
        }

        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let message: JsonRpcMessage = serde_json::from_str(&text)
            .map_err(|e| TransportError::Malformed(e.to_string()))?;

        match message {
            JsonRpcMessage::Response(response) => {
                if let Some(error) = response.error {
                    Err(TransportError::ServerError {
                        code: 0,
                        message: error.to_string(),
                    })
                } else {
                    Ok(response.result.unwrap_or(Value::Null))
                }
            }
            other => Err(TransportError::Malformed(format!(
                "expected a JSON-RPC response, got {other:?}"
            ))),
        }
    }

    fn on_notification(&mut self, _sender: NotificationSender) -> Result<(), TransportError> {
        Err(TransportError::NotificationsUnsupported)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    fn supports_notifications(&self) -> bool {
        false
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::traits::TransportKind;

    #[test]
    fn streamable_http_never_supports_notifications() {
        let endpoint =
            Endpoint::parse("https://agg.example/mcp", TransportKind::StreamableHttp).unwrap();
        let mut transport = StreamableHttpTransport::new(endpoint);
        let (tx, _rx) = tokio::sync::mpsc::channel(1);
        assert!(matches!(
            transport.on_notification(tx),
            Err(TransportError::NotificationsUnsupported)
        ));
    }
}
