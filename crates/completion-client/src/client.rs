//! HTTP client for an OpenAI-compatible completion service
//!
//! `complete` tries `/v1/chat/completions` first. Servers that only speak
//! the older plain completion API answer that with a client or compatibility
//! status (400, 404, 405, 415, 501), and the client then retries exactly once
//! against `/v1/completions` with an equivalent body.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{CompletionError, Result};
use crate::types::{error_message, extract_models, extract_text, CompletionRequest};

const MODELS_PATH: &str = "/v1/models";
const CHAT_PATH: &str = "/v1/chat/completions";
const COMPLETIONS_PATH: &str = "/v1/completions";

/// Statuses that mean "this server has no chat endpoint"
const FALLBACK_STATUSES: [u16; 5] = [400, 404, 405, 415, 501];

fn should_fall_back(status: StatusCode) -> bool {
    FALLBACK_STATUSES.contains(&status.as_u16())
}

/// Client for one completion service
#[derive(Debug, Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    request_timeout: Duration,
    models_timeout: Duration,
}

impl CompletionClient {
    /// Create a client for `base_url` with default timeouts
    pub fn new(base_url: impl Into<String>) -> Self {
        let defaults = ClientConfig::default();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            request_timeout: Duration::from_millis(defaults.request_timeout_ms),
            models_timeout: Duration::from_millis(defaults.models_timeout_ms),
        }
    }

    /// Create a client from settings; fails when host or port is missing
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let base_url = config.base_url().ok_or(CompletionError::NotConfigured)?;
        Ok(Self::new(base_url)
            .with_api_key(config.api_key().map(str::to_string))
            .with_timeouts(
                Duration::from_millis(config.request_timeout_ms),
                Duration::from_millis(config.models_timeout_ms),
            ))
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    /// Set the completion and model-listing timeouts
    pub fn with_timeouts(mut self, request: Duration, models: Duration) -> Self {
        self.request_timeout = request;
        self.models_timeout = models;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// List the models the service offers
    ///
    /// A success body of an unrecognized shape yields an empty list.
    pub async fn list_models(&self) -> Result<Vec<Value>> {
        let response = self
            .authorize(self.http.get(self.url(MODELS_PATH)))
            .timeout(self.models_timeout)
            .send()
            .await?;
        let response = check_status(response).await?;

        let data = read_json(response).await?;
        Ok(extract_models(data))
    }

    /// Run a completion and return the generated text
    ///
    /// A success body without any recognizable text yields "".
    pub async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let response = self.post(CHAT_PATH, &request.chat_body()).await?;

        let response = if should_fall_back(response.status()) {
            log::warn!(
                "{} answered {}, retrying with {}",
                CHAT_PATH,
                response.status(),
                COMPLETIONS_PATH
            );
            self.post(COMPLETIONS_PATH, &request.plain_body()).await?
        } else {
            response
        };

        let response = check_status(response).await?;
        let data = read_json(response).await?;
        Ok(extract_text(&data))
    }

    async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response> {
        log::debug!("POST {}", self.url(path));
        Ok(self
            .authorize(self.http.post(self.url(path)))
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await?)
    }
}

/// Turn a non-success response into `CompletionError::Http`
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let mut message = error_message(&body);
    if message.is_empty() {
        message = status.canonical_reason().unwrap_or("request failed").to_string();
    }
    Err(CompletionError::Http {
        status: status.as_u16(),
        message,
    })
}

async fn read_json(response: reqwest::Response) -> Result<Value> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| CompletionError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct Hits {
        chat: AtomicUsize,
        completions: AtomicUsize,
    }

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    /// Chat endpoint answers `chat_status`; plain endpoint answers `plain_status`
    async fn completion_server(chat_status: u16, plain_status: u16) -> (String, Arc<Hits>) {
        let hits = Arc::new(Hits::default());
        let router = Router::new()
            .route(
                "/v1/chat/completions",
                post(move |State(hits): State<Arc<Hits>>, Json(body): Json<Value>| async move {
                    hits.chat.fetch_add(1, Ordering::SeqCst);
                    let status = AxumStatus::from_u16(chat_status).unwrap();
                    if status.is_success() {
                        let prompt = body["messages"][0]["content"].clone();
                        (status, Json(json!({"choices": [{"message": {"content": prompt}}]})))
                    } else {
                        (status, Json(json!({"error": {"message": "chat unavailable"}})))
                    }
                }),
            )
            .route(
                "/v1/completions",
                post(move |State(hits): State<Arc<Hits>>, Json(body): Json<Value>| async move {
                    hits.completions.fetch_add(1, Ordering::SeqCst);
                    let status = AxumStatus::from_u16(plain_status).unwrap();
                    if status.is_success() {
                        let text = format!("plain:{}", body["prompt"].as_str().unwrap_or_default());
                        (status, Json(json!({"choices": [{"text": text}]})))
                    } else {
                        (status, Json(json!({"message": "no such route"})))
                    }
                }),
            )
            .with_state(hits.clone());
        (spawn_server(router).await, hits)
    }

    #[tokio::test]
    async fn test_chat_success_uses_no_fallback() {
        let (url, hits) = completion_server(200, 200).await;
        let client = CompletionClient::new(url);

        let text = client
            .complete(&CompletionRequest::new("m", "hello"))
            .await
            .unwrap();
        assert_eq!(text, "hello");
        assert_eq!(hits.chat.load(Ordering::SeqCst), 1);
        assert_eq!(hits.completions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_404_falls_back_exactly_once() {
        let (url, hits) = completion_server(404, 200).await;
        let client = CompletionClient::new(format!("{}/", url));

        let text = client
            .complete(&CompletionRequest::new("m", "hello"))
            .await
            .unwrap();
        assert_eq!(text, "plain:hello");
        assert_eq!(hits.chat.load(Ordering::SeqCst), 1);
        assert_eq!(hits.completions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_fallback_surfaces_its_error() {
        let (url, hits) = completion_server(404, 404).await;
        let client = CompletionClient::new(url);

        let err = client
            .complete(&CompletionRequest::new("m", "hello"))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.message(), "no such route");
        assert_eq!(hits.completions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_error_does_not_fall_back() {
        let (url, hits) = completion_server(500, 200).await;
        let client = CompletionClient::new(url);

        let err = client
            .complete(&CompletionRequest::new("m", "hello"))
            .await
            .unwrap_err();
        match err {
            CompletionError::Http { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "chat unavailable");
            }
            other => panic!("Expected HTTP error, got {:?}", other),
        }
        assert_eq!(hits.completions.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bearer_auth_header() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("none")
                    .to_string();
                Json(json!({"choices": [{"message": {"content": auth}}]}))
            }),
        );
        let url = spawn_server(router).await;

        let client = CompletionClient::new(url.clone()).with_api_key(Some("secret".to_string()));
        let text = client.complete(&CompletionRequest::new("m", "x")).await.unwrap();
        assert_eq!(text, "Bearer secret");

        let client = CompletionClient::new(url);
        let text = client.complete(&CompletionRequest::new("m", "x")).await.unwrap();
        assert_eq!(text, "none");
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let router = Router::new().route(
            "/v1/chat/completions",
            post(|| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Json(json!({"text": "late"}))
            }),
        );
        let url = spawn_server(router).await;
        let client = CompletionClient::new(url)
            .with_timeouts(Duration::from_millis(50), Duration::from_millis(50));

        let err = client
            .complete(&CompletionRequest::new("m", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, CompletionError::Timeout));
    }

    #[tokio::test]
    async fn test_list_models() {
        let router = Router::new()
            .route("/v1/models", get(|| async { Json(json!({"data": [{"id": "a"}, {"id": "b"}]})) }));
        let client = CompletionClient::new(spawn_server(router).await);
        let models = client.list_models().await.unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models[0]["id"], "a");

        let router = Router::new()
            .route("/v1/models", get(|| async { Json(json!({"unexpected": true})) }));
        let client = CompletionClient::new(spawn_server(router).await);
        assert!(client.list_models().await.unwrap().is_empty());

        let router = Router::new().route(
            "/v1/models",
            get(|| async { (AxumStatus::SERVICE_UNAVAILABLE, "warming up").into_response() }),
        );
        let client = CompletionClient::new(spawn_server(router).await);
        let err = client.list_models().await.unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.message(), "warming up");
    }

    #[test]
    fn test_from_config() {
        assert!(matches!(
            CompletionClient::from_config(&ClientConfig::default()),
            Err(CompletionError::NotConfigured)
        ));

        let client =
            CompletionClient::from_config(&ClientConfig::new("127.0.0.1", "6005").with_api_key("k"))
                .unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:6005");
        assert_eq!(client.api_key(), Some("k"));
    }
}
