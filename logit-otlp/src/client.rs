use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use logit_core::LogitResult;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use url::Url;

use crate::config::OtlpConfig;

/// HTTP transport for OTLP payloads.
///
/// The reqwest client is built lazily and rebuilt after server errors or
/// transport failures, so a wedged connection pool cannot poison later
/// exports. `send` reports success or failure but never returns an error:
/// a dropped batch is logged and forgotten.
pub struct OtlpHttpClient {
    endpoint: Url,
    timeout: Duration,
    headers: Vec<(String, String)>,
    client: Mutex<Option<reqwest::Client>>,
}

impl OtlpHttpClient {
    pub fn new(config: &OtlpConfig) -> LogitResult<Self> {
        Ok(Self {
            endpoint: config.endpoint_url()?,
            timeout: config.timeout,
            headers: config.headers.clone(),
            client: Mutex::new(None),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Posts one payload. Returns true when the collector accepted it.
    pub async fn send(&self, payload: &Value) -> bool {
        let client = match self.client() {
            Some(client) => client,
            None => return false,
        };
        let response = client.post(self.endpoint.clone()).json(payload).send().await;
        match response {
            Ok(response) => self.handle_status(response.status()),
            Err(err) => {
                tracing::warn!(endpoint = %self.endpoint, error = %err, "Export request failed, batch dropped");
                self.reset();
                false
            }
        }
    }

    fn handle_status(&self, status: StatusCode) -> bool {
        match status.as_u16() {
            200 | 202 => true,
            400 => {
                tracing::warn!(endpoint = %self.endpoint, "Collector rejected batch as malformed");
                false
            }
            401 | 403 => {
                tracing::warn!(endpoint = %self.endpoint, status = status.as_u16(), "Collector authentication failed, batch dropped");
                false
            }
            429 => {
                tracing::warn!(endpoint = %self.endpoint, "Collector rate limited the exporter, batch dropped");
                false
            }
            500..=599 => {
                tracing::warn!(endpoint = %self.endpoint, status = status.as_u16(), "Collector server error, batch dropped");
                self.reset();
                false
            }
            other => {
                tracing::warn!(endpoint = %self.endpoint, status = other, "Unexpected collector status, batch dropped");
                false
            }
        }
    }

    /// Drops the cached client; the next send builds a fresh one.
    pub fn reset(&self) {
        *self.lock() = None;
    }

    fn client(&self) -> Option<reqwest::Client> {
        let mut slot = self.lock();
        if slot.is_none() {
            match self.build_client() {
                Ok(client) => *slot = Some(client),
                Err(err) => {
                    tracing::warn!(error = %err, "Failed to build export HTTP client");
                    return None;
                }
            }
        }
        slot.clone()
    }

    fn build_client(&self) -> reqwest::Result<reqwest::Client> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &self.headers {
            match (
                HeaderName::try_from(name.as_str()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.insert(name, value);
                }
                _ => {
                    tracing::warn!(header = name.as_str(), "Skipping invalid export header");
                }
            }
        }
        reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(concat!("logit/", env!("CARGO_PKG_VERSION")))
            .timeout(self.timeout)
            .build()
    }

    fn lock(&self) -> MutexGuard<'_, Option<reqwest::Client>> {
        self.client.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(endpoint: &str) -> OtlpHttpClient {
        OtlpHttpClient::new(&OtlpConfig::new(endpoint)).unwrap()
    }

    #[test]
    fn test_endpoint_gets_logs_path() {
        let client = client_for("http://localhost:4318");
        assert_eq!(client.endpoint().path(), "/v1/logs");
    }

    #[test]
    fn test_status_policy() {
        let client = client_for("http://localhost:4318");
        assert!(client.handle_status(StatusCode::OK));
        assert!(client.handle_status(StatusCode::ACCEPTED));
        assert!(!client.handle_status(StatusCode::BAD_REQUEST));
        assert!(!client.handle_status(StatusCode::UNAUTHORIZED));
        assert!(!client.handle_status(StatusCode::FORBIDDEN));
        assert!(!client.handle_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(!client.handle_status(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(!client.handle_status(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn test_server_error_resets_client() {
        let client = client_for("http://localhost:4318");
        assert!(client.client().is_some());
        assert!(client.lock().is_some());
        client.handle_status(StatusCode::BAD_GATEWAY);
        assert!(client.lock().is_none());
    }

    #[tokio::test]
    async fn test_transport_error_returns_false() {
        // Port 9 is discard; nothing listens on it in the test environment.
        let client = client_for("http://127.0.0.1:9");
        let delivered = client.send(&serde_json::json!({})).await;
        assert!(!delivered);
        assert!(client.lock().is_none());
    }
}
