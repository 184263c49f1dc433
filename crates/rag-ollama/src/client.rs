//! Shared HTTP client for the Ollama API.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use rag_core::{RagError, Result, ServiceConfig};

use crate::retry::{is_retryable_error, is_retryable_status, RetryPolicy};

/// Connection to an Ollama server. Cheap to clone.
#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    http: Client,
    policy: RetryPolicy,
}

impl OllamaClient {
    /// Build a client from service settings.
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(RagError::config("service base_url must not be empty"));
        }
        if config.request_timeout_secs == 0 {
            return Err(RagError::config("request_timeout_secs must be at least 1"));
        }

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| RagError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            http,
            policy: RetryPolicy::from_config(config),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    /// POST a JSON body to `path` and decode the JSON reply, retrying
    /// transient failures. `service` names the caller in errors.
    pub async fn post_json<B, T>(&self, service: &str, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        let attempts = self.policy.attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!("POST {} (attempt {}/{})", url, attempt, attempts);

            let failure = match self.http.post(&url).json(body).send().await {
                Ok(resp) if resp.status().is_success() => {
                    return resp.json::<T>().await.map_err(|e| {
                        RagError::dependency(
                            service,
                            format!("Malformed response from {}: {}", url, e),
                        )
                    });
                }
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    let message = format!("{} returned {}: {}", url, status, text.trim());
                    if !is_retryable_status(status) {
                        return Err(RagError::dependency(service, message));
                    }
                    message
                }
                Err(e) => {
                    let message = format!("Request to {} failed: {}", url, e);
                    if !is_retryable_error(&e) {
                        return Err(RagError::dependency(service, message));
                    }
                    message
                }
            };

            if attempt >= attempts {
                return Err(RagError::dependency(
                    service,
                    format!("{} (gave up after {} attempts)", failure, attempt),
                ));
            }

            let delay = self.policy.delay(attempt);
            warn!(
                "{} call failed (attempt {}/{}), retrying in {:?}: {}",
                service, attempt, attempts, delay, failure
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubServer;
    use serde_json::{json, Value};
    use std::net::TcpListener;

    fn config(base_url: &str, max_retries: u32) -> ServiceConfig {
        ServiceConfig {
            base_url: base_url.to_string(),
            request_timeout_secs: 5,
            max_retries,
            retry_backoff_ms: 1,
        }
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = OllamaClient::new(&config("http://localhost:11434/", 0)).unwrap();
        assert_eq!(client.base_url(), "http://localhost:11434");
    }

    #[test]
    fn test_retry_policy_from_service_config() {
        let client = OllamaClient::new(&config("http://localhost:11434", 3)).unwrap();
        let policy = client.retry_policy();
        assert_eq!(policy.attempts(), 4);
        assert_eq!(policy.delay(1), Duration::from_millis(1));
        assert_eq!(policy.delay(3), Duration::from_millis(4));
    }

    #[test]
    fn test_empty_base_url_rejected() {
        let err = OllamaClient::new(&config("  ", 0)).err().unwrap();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut service = config("http://localhost:11434", 0);
        service.request_timeout_secs = 0;
        let err = OllamaClient::new(&service).err().unwrap();
        assert_eq!(err.error_code(), "CONFIG_ERROR");
    }

    #[tokio::test]
    async fn test_retries_server_error_then_succeeds() {
        let server = StubServer::start(vec![
            (503, r#"{"error":"loading model"}"#),
            (200, r#"{"ok":true}"#),
        ])
        .await;
        let client = OllamaClient::new(&config(&server.base_url, 2)).unwrap();

        let reply: Value = client
            .post_json("test", "/api/ping", &json!({"x": 1}))
            .await
            .unwrap();

        assert_eq!(reply["ok"], true);
        assert_eq!(server.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let server = StubServer::start(vec![(400, r#"{"error":"bad model"}"#)]).await;
        let client = OllamaClient::new(&config(&server.base_url, 3)).unwrap();

        let err = client
            .post_json::<_, Value>("test", "/api/ping", &json!({}))
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "DEPENDENCY_FAILURE");
        assert!(err.to_string().contains("400"));
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let server = StubServer::start(vec![
            (500, "{}"),
            (502, "{}"),
        ])
        .await;
        let client = OllamaClient::new(&config(&server.base_url, 1)).unwrap();

        let err = client
            .post_json::<_, Value>("test", "/api/ping", &json!({}))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("gave up after 2 attempts"));
        assert_eq!(server.requests().len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_service_is_dependency_failure() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = OllamaClient::new(&config(&format!("http://127.0.0.1:{}", port), 1)).unwrap();

        let err = client
            .post_json::<_, Value>("ollama embed", "/api/embed", &json!({}))
            .await
            .unwrap_err();

        match err {
            RagError::Dependency { service, .. } => assert_eq!(service, "ollama embed"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_body_is_dependency_failure() {
        let server = StubServer::start(vec![(200, "not json")]).await;
        let client = OllamaClient::new(&config(&server.base_url, 3)).unwrap();

        let err = client
            .post_json::<_, Value>("test", "/api/ping", &json!({}))
            .await
            .unwrap_err();

        assert_eq!(err.error_code(), "DEPENDENCY_FAILURE");
        assert_eq!(server.requests().len(), 1);
    }
}
