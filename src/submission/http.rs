//! HTTP transport for submission requests.
//!
//! Every request is a JSON `POST` to `api_base_url + endpoint`. Non-2xx
//! responses are decoded for a `detail` message, which is what the backend
//! uses for user-facing errors such as "Email already registered".

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::FlowConfig;
use crate::error::{ConfigError, TransportError};
use crate::flow::FlowType;

use super::{FlowTransport, SubmissionOutcome, SubmissionRequest};

/// `FlowTransport` backed by `reqwest`.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(config: &FlowConfig) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(config.submit_timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            timeout: config.submit_timeout,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    fn request_error(&self, error: reqwest::Error) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout(self.timeout)
        } else if error.is_decode() {
            TransportError::Decode(error.to_string())
        } else {
            TransportError::Network(error.to_string())
        }
    }
}

#[async_trait]
impl FlowTransport for HttpTransport {
    async fn send(
        &self,
        flow: FlowType,
        request: &SubmissionRequest,
    ) -> Result<SubmissionOutcome, TransportError> {
        let url = self.url(&request.endpoint);
        debug!(flow = %flow, url = %url, "POST submission");

        let resp = self
            .client
            .post(&url)
            .json(&request.body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| self.request_error(e))?;

        if !status.is_success() {
            debug!(flow = %flow, status = %status, "Submission rejected");
            return Err(TransportError::Status {
                code: status.as_u16(),
                detail: error_detail(&text),
            });
        }

        let body = if text.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))?
        };
        Ok(SubmissionOutcome::from_body(body))
    }
}

/// Pull a user-facing message out of an error body.
///
/// Accepts `{"detail": "..."}`, validation-style `{"detail": [{"msg": "..."}]}`
/// and `{"message": "..."}`.
pub fn error_detail(text: &str) -> Option<String> {
    let body: serde_json::Value = serde_json::from_str(text).ok()?;
    match &body["detail"] {
        serde_json::Value::String(detail) if !detail.trim().is_empty() => {
            return Some(detail.clone());
        }
        serde_json::Value::Array(items) => {
            let messages: Vec<&str> = items.iter().filter_map(|i| i["msg"].as_str()).collect();
            if !messages.is_empty() {
                return Some(messages.join("; "));
            }
        }
        _ => {}
    }
    body["message"]
        .as_str()
        .filter(|m| !m.trim().is_empty())
        .map(str::to_string)
}
