//! SSE transport: a long-lived GET stream delivers responses and
//! notifications; requests are POSTed and correlated by JSON-RPC id.
//!
//! Grounded in `other_examples/684e984f_MagicBeansAI-magictunnel__src-mcp-clients-sse_client.rs`
//! for the connect/correlate/forward shape, reusing this crate's
//! `CorrelationManager` instead of a hand-rolled pending-request map.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::TimeDelta;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::correlation::{CorrelationConfig, CorrelationError, CorrelationManager};
use crate::protocol::{JsonRpcMessage, JsonRpcMessageTrait, JsonRpcNotification, JsonRpcRequest};
use crate::transport::error::TransportError;
use crate::transport::traits::{Endpoint, HeaderMap, NotificationSender, Transport};

/// SSE-flavoured transport (§4.A: `supports_notifications() == true`).
pub struct SseTransport {
    endpoint: Endpoint,
    client: reqwest::Client,
    headers: Mutex<HeaderMap>,
    correlation: Mutex<Option<Arc<CorrelationManager>>>,
    notification_tx: Mutex<Option<NotificationSender>>,
    read_task: Mutex<Option<JoinHandle<()>>>,
}

impl SseTransport {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            client: reqwest::Client::new(),
            headers: Mutex::new(HeaderMap::new()),
            correlation: Mutex::new(None),
            notification_tx: Mutex::new(None),
            read_task: Mutex::new(None),
        }
    }

    fn apply_headers(
        headers: &HeaderMap,
        mut builder: reqwest::RequestBuilder,
    ) -> reqwest::RequestBuilder {
        for (key, value) in headers {
            builder = builder.header(key.as_str(), value.as_str());
        }
        builder
    }

    async fn correlation(&self) -> Result<Arc<CorrelationManager>, TransportError> {
        self.correlation
            .lock()
            .await
            .clone()
            .ok_or(TransportError::Closed)
    }

    async fn spawn_reader(&self, correlation: Arc<CorrelationManager>) -> Result<JoinHandle<()>, TransportError> {
        let headers = self.headers.lock().await.clone();
        let request = Self::apply_headers(
            &headers,
            self.client
                .get(self.endpoint.url.clone())
                .header("Accept", "text/event-stream"),
        );

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(TransportError::Unauthorized);
        }
        if !response.status().is_success() {
            return Err(TransportError::Network(format!(
                "unexpected status opening SSE stream: {}",
                response.status()
            )));
        }

        let notification_tx = self.notification_tx.lock().await.clone();
        let mut byte_stream = response.bytes_stream();

        let handle = tokio::spawn(async move {
            let mut buffer = String::new();
            let mut data_lines: Vec<String> = Vec::new();

            while let Some(chunk) = byte_stream.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!("sse stream read error: {e}");
                        break;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(newline_at) = buffer.find('\n') {
                    let line = buffer[..newline_at].trim_end_matches('\r').to_string();
                    buffer.drain(..=newline_at);

                    if line.is_empty() {
                        if data_lines.is_empty() {
                            continue;
                        }
                        let payload = data_lines.join("\n");
                        data_lines.clear();
                        dispatch_event(&payload, &correlation, &notification_tx).await;
                        continue;
                    }
                    if let Some(data) = line.strip_prefix("data:") {
                        data_lines.push(data.trim_start().to_string());
                    }
                    // Other SSE fields (event:, id:, retry:) carry no
                    // information this transport needs to act on.
                }
            }
            debug!("sse reader task exiting");
        });

        Ok(handle)
    }
}

async fn dispatch_event(
    payload: &str,
    correlation: &Arc<CorrelationManager>,
    notification_tx: &Option<NotificationSender>,
) {
    trace!("sse event payload: {payload}");
    let message: JsonRpcMessage = match serde_json::from_str(payload) {
        Ok(message) => message,
        Err(e) => {
            warn!("dropping malformed sse event: {e}");
            return;
        }
    };

    match message {
        JsonRpcMessage::Response(response) => {
            let Some(id) = response.id.clone() else {
                warn!("dropping sse response with no id");
                return;
            };
            let result = if let Some(error) = &response.error {
                Err(CorrelationError::Internal {
                    message: error.to_string(),
                })
            } else {
                Ok(response.result.unwrap_or(Value::Null))
            };
            if let Err(e) = correlation.correlate_response(&id, result).await {
                debug!("sse response for unknown or completed request {id}: {e}");
            }
        }
        JsonRpcMessage::Notification(notification) => {
            if let Some(sender) = notification_tx {
                match sender.try_send(notification) {
                    Ok(()) => {}
                    Err(tokio::sync::mpsc::error::TrySendError::Full(_)) => {
                        warn!("notification queue full; dropping notification");
                    }
                    Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => {
                        debug!("notification subscriber dropped its receiver");
                    }
                }
            }
        }
        JsonRpcMessage::Request(_) => {
            debug!("ignoring unexpected inbound request on client sse stream");
        }
    }
}

#[async_trait]
impl Transport for SseTransport {
    async fn start(&mut self, headers: HeaderMap) -> Result<(), TransportError> {
        *self.headers.lock().await = headers;

        let manager = CorrelationManager::new_without_cleanup(CorrelationConfig::default())
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let manager = Arc::new(manager);
        *self.correlation.lock().await = Some(manager.clone());

        let handle = self.spawn_reader(manager).await?;
        *self.read_task.lock().await = Some(handle);
        Ok(())
    }

    async fn invoke(
        &self,
        method: &str,
        params: Option<Value>,
        deadline: Duration,
    ) -> Result<Value, TransportError> {
        let correlation = self.correlation().await?;

        let timeout = TimeDelta::from_std(deadline).unwrap_or(TimeDelta::seconds(30));
        let (id, receiver) = correlation
            .register_request(Some(timeout), params.clone().unwrap_or(Value::Null))
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let request = JsonRpcRequest::new(method, params, id.clone());
        let headers = self.headers.lock().await.clone();
        let body = request
            .to_json()
            .map_err(|e| TransportError::Malformed(e.to_string()))?;

        let http_request = Self::apply_headers(
            &headers,
            self.client
                .post(self.endpoint.url.clone())
                .header("Content-Type", "application/json")
                .body(body),
        );

        let response = http_request
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            let _ = correlation.cancel_request(&id).await;
            return Err(TransportError::Unauthorized);
        }
        if !response.status().is_success() {
            let status = response.status();
            let _ = correlation.cancel_request(&id).await;
            return Err(TransportError::ServerError {
                code: status.as_u16() as i32,
                message: status.to_string(),
            });
        }

        match tokio::time::timeout(deadline, receiver).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(CorrelationError::Internal { message }))) => {
                Err(TransportError::ServerError { code: 0, message })
            }
            Ok(Ok(Err(e))) => Err(TransportError::Network(e.to_string())),
            Ok(Err(_)) => Err(TransportError::Closed),
            Err(_) => {
                let _ = correlation.cancel_request(&id).await;
                Err(TransportError::Timeout(deadline))
            }
        }
    }

    fn on_notification(&mut self, sender: NotificationSender) -> Result<(), TransportError> {
        *self
            .notification_tx
            .try_lock()
            .map_err(|_| TransportError::Network("transport busy".to_string()))? = Some(sender);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if let Some(handle) = self.read_task.lock().await.take() {
            handle.abort();
        }
        *self.correlation.lock().await = None;
        Ok(())
    }

    fn supports_notifications(&self) -> bool {
        true
    }

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::traits::TransportKind;

    #[tokio::test]
    async fn invoke_before_start_is_closed() {
        let endpoint = Endpoint::parse("https://agg.example/mcp", TransportKind::Sse).unwrap();
        let transport = SseTransport::new(endpoint);
        let result = transport
            .invoke("ping", None, Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(TransportError::Closed)));
    }

    #[test]
    fn supports_notifications_is_true() {
        let endpoint = Endpoint::parse("https://agg.example/mcp", TransportKind::Sse).unwrap();
        let transport = SseTransport::new(endpoint);
        assert!(transport.supports_notifications());
    }
}
