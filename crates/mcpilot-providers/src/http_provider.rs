//! Streaming HTTP client for OpenAI-compatible chat completion APIs.
//!
//! Posts to `<apiBase>/chat/completions` with `stream: true` and hands the
//! response body to the SSE decoder. Works against OpenAI, OpenRouter, vLLM,
//! llama.cpp and anything else that speaks the same protocol.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, error, warn};

use mcpilot_core::config::ProviderConfig;
use mcpilot_core::types::ChatCompletionRequest;

use crate::sse::decode_stream;
use crate::traits::{ChatRequest, EventStream, ModelClient, ProviderError};

// ─────────────────────────────────────────────
// HttpProvider
// ─────────────────────────────────────────────

/// A model client that talks to any OpenAI-compatible HTTP API.
pub struct HttpProvider {
    /// HTTP client (shared, connection-pooled).
    client: reqwest::Client,
    /// API base URL (e.g. `"https://api.openai.com/v1"`).
    api_base: String,
    /// API key for Bearer authentication.
    api_key: String,
    /// Extra headers to send with each request.
    extra_headers: HeaderMap,
}

impl std::fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProvider")
            .field("api_base", &self.api_base)
            .field("has_key", &!self.api_key.is_empty())
            .finish()
    }
}

impl HttpProvider {
    /// Create a new HttpProvider from the provider section of the config.
    pub fn new(config: &ProviderConfig) -> anyhow::Result<Self> {
        let mut extra_headers = HeaderMap::new();
        if let Some(ref headers) = config.extra_headers {
            for (key, value) in headers {
                if let (Ok(name), Ok(val)) = (
                    HeaderName::from_bytes(key.as_bytes()),
                    HeaderValue::from_str(value),
                ) {
                    extra_headers.insert(name, val);
                } else {
                    warn!("Invalid header: {}={}", key, value);
                }
            }
        }

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .read_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build HTTP client")?;

        Ok(HttpProvider {
            client,
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            extra_headers,
        })
    }

    /// Build the full chat completions URL.
    fn completions_url(&self) -> String {
        let base = self.api_base.trim_end_matches('/');
        format!("{}/chat/completions", base)
    }

    fn request_body(request: &ChatRequest) -> ChatCompletionRequest {
        let has_tools = !request.tools.is_empty();
        ChatCompletionRequest {
            model: request.model.clone(),
            messages: request.messages.clone(),
            tools: has_tools.then(|| request.tools.clone()),
            tool_choice: has_tools.then(|| request.tool_choice.as_str().to_string()),
            max_tokens: Some(request.config.max_tokens),
            temperature: Some(request.config.temperature),
            stream: true,
        }
    }
}

#[async_trait]
impl ModelClient for HttpProvider {
    async fn stream_chat(&self, request: &ChatRequest) -> Result<EventStream, ProviderError> {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            tool_choice = request.tool_choice.as_str(),
            "Calling LLM"
        );

        let mut http_req = self
            .client
            .post(self.completions_url())
            .headers(self.extra_headers.clone())
            .json(&Self::request_body(request));
        if !self.api_key.is_empty() {
            http_req = http_req.bearer_auth(&self.api_key);
        }

        let response = http_req.send().await.map_err(|e| {
            error!(error = %e, "HTTP request failed");
            ProviderError::Unavailable(format!("request failed: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            error!(status = %status, body = %error_text, "API error");
            return Err(ProviderError::Unavailable(format!("{status}: {error_text}")));
        }

        Ok(decode_stream(response.bytes_stream()))
    }

    fn display_name(&self) -> &str {
        "openai-compatible"
    }
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{LlmRequestConfig, StreamEvent, ToolChoice};
    use futures::StreamExt;
    use mcpilot_core::types::{Message, ToolDefinition};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn make_config(api_key: &str, api_base: &str) -> ProviderConfig {
        ProviderConfig {
            api_key: api_key.to_string(),
            api_base: api_base.to_string(),
            ..Default::default()
        }
    }

    fn request(tools: Vec<ToolDefinition>, tool_choice: ToolChoice) -> ChatRequest {
        ChatRequest {
            model: "gpt-4.1-mini".into(),
            messages: vec![Message::system("You are a researcher."), Message::user("Hello")],
            tools,
            tool_choice,
            config: LlmRequestConfig::default(),
        }
    }

    fn sse_body(lines: &[&str]) -> String {
        lines.iter().map(|l| format!("data: {l}\n\n")).collect()
    }

    async fn collect(stream: EventStream) -> Vec<StreamEvent> {
        stream.map(|e| e.unwrap()).collect().await
    }

    // ── Unit tests ──

    #[test]
    fn test_completions_url_trailing_slash() {
        let provider = HttpProvider::new(&make_config("key", "https://api.openai.com/v1/")).unwrap();
        assert_eq!(
            provider.completions_url(),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_extra_headers() {
        let mut config = make_config("key", "https://api.openai.com/v1");
        config.extra_headers = Some(
            [("X-App-Code".to_string(), "my-app-code".to_string())]
                .into_iter()
                .collect(),
        );
        let provider = HttpProvider::new(&config).unwrap();
        assert!(provider.extra_headers.contains_key("x-app-code"));
    }

    #[test]
    fn test_request_body_omits_tool_choice_without_tools() {
        let body = HttpProvider::request_body(&request(vec![], ToolChoice::Auto));
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("tools").is_none());
        assert!(json.get("tool_choice").is_none());
        assert_eq!(json["stream"], true);
    }

    // ── Integration tests with mock server ──

    #[tokio::test]
    async fn test_stream_text() {
        let mock_server = MockServer::start().await;

        let body = sse_body(&[
            r#"{"choices":[{"delta":{"role":"assistant","content":"It's 52°F "}}]}"#,
            r#"{"choices":[{"delta":{"content":"and cloudy."},"finish_reason":"stop"}]}"#,
            "[DONE]",
        ]);
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("Authorization", "Bearer test-key-123"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&mock_server)
            .await;

        let provider = HttpProvider::new(&make_config("test-key-123", &mock_server.uri())).unwrap();
        let stream = provider
            .stream_chat(&request(vec![], ToolChoice::Auto))
            .await
            .unwrap();

        assert_eq!(
            collect(stream).await,
            vec![
                StreamEvent::TextDelta("It's 52°F ".into()),
                StreamEvent::TextDelta("and cloudy.".into()),
                StreamEvent::TurnComplete {
                    finish_reason: Some("stop".into())
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_stream_tool_calls() {
        let mock_server = MockServer::start().await;

        let body = sse_body(&[
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_a","type":"function","function":{"name":"get_forecast","arguments":""}}]}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"lat\":47.6,"}}]}}]}"#,
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"\"lon\":-122.3}"}}]}}]}"#,
            r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#,
            "[DONE]",
        ]);
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4.1-mini",
                "stream": true,
                "tool_choice": "auto"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;

        let tool_def = ToolDefinition::new(
            "get_forecast",
            "Forecast",
            serde_json::json!({"type": "object", "properties": {"lat": {"type": "number"}}}),
        );
        let provider = HttpProvider::new(&make_config("key", &mock_server.uri())).unwrap();
        let events = collect(
            provider
                .stream_chat(&request(vec![tool_def], ToolChoice::Auto))
                .await
                .unwrap(),
        )
        .await;

        assert_eq!(events.len(), 4);
        let args: String = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::ToolCallDelta { id, arguments, .. } if id == "call_a" => {
                    Some(arguments.as_str())
                }
                _ => None,
            })
            .collect();
        assert_eq!(args, r#"{"lat":47.6,"lon":-122.3}"#);
        assert_eq!(
            events.last(),
            Some(&StreamEvent::TurnComplete {
                finish_reason: Some("tool_calls".into())
            })
        );
    }

    #[tokio::test]
    async fn test_final_pass_sends_tool_choice_none() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(serde_json::json!({ "tool_choice": "none" })))
            .respond_with(ResponseTemplate::new(200).set_body_string(sse_body(&["[DONE]"])))
            .mount(&mock_server)
            .await;

        let tool_def = ToolDefinition::new("t", "t", serde_json::json!({"type": "object"}));
        let provider = HttpProvider::new(&make_config("key", &mock_server.uri())).unwrap();
        let events = collect(
            provider
                .stream_chat(&request(vec![tool_def], ToolChoice::None))
                .await
                .unwrap(),
        )
        .await;

        // If the body matcher fails, wiremock returns 404 → we'd get an error
        assert_eq!(events, vec![StreamEvent::TurnComplete { finish_reason: None }]);
    }

    #[tokio::test]
    async fn test_api_error_is_unavailable() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(429).set_body_json(serde_json::json!({
                    "error": {
                        "message": "Rate limit exceeded",
                        "type": "rate_limit_error"
                    }
                })),
            )
            .mount(&mock_server)
            .await;

        let provider = HttpProvider::new(&make_config("key", &mock_server.uri())).unwrap();
        let err = match provider.stream_chat(&request(vec![], ToolChoice::Auto)).await {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };

        assert!(matches!(err, ProviderError::Unavailable(_)));
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn test_slow_stream_outlives_timeout() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        // Chunks arrive 600ms apart, so the whole stream takes longer than
        // the one second timeout while no single read does.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 16 * 1024];
            let _ = socket.read(&mut buf).await.unwrap();
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\n\r\n")
                .await
                .unwrap();
            let events = sse_body(&[
                r#"{"choices":[{"delta":{"content":"one "}}]}"#,
                r#"{"choices":[{"delta":{"content":"two"},"finish_reason":"stop"}]}"#,
                "[DONE]",
            ]);
            for event in events.split_inclusive("\n\n") {
                tokio::time::sleep(Duration::from_millis(600)).await;
                let chunk = format!("{:x}\r\n{event}\r\n", event.len());
                socket.write_all(chunk.as_bytes()).await.unwrap();
            }
            socket.write_all(b"0\r\n\r\n").await.unwrap();
        });

        let config = ProviderConfig {
            timeout_secs: 1,
            ..make_config("key", &format!("http://{addr}"))
        };
        let provider = HttpProvider::new(&config).unwrap();
        let stream = provider
            .stream_chat(&request(vec![], ToolChoice::Auto))
            .await
            .unwrap();

        assert_eq!(
            collect(stream).await,
            vec![
                StreamEvent::TextDelta("one ".into()),
                StreamEvent::TextDelta("two".into()),
                StreamEvent::TurnComplete {
                    finish_reason: Some("stop".into())
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_network_error_is_unavailable() {
        // Point to a port that's not listening
        let provider = HttpProvider::new(&make_config("key", "http://127.0.0.1:1")).unwrap();
        let result = provider.stream_chat(&request(vec![], ToolChoice::Auto)).await;
        assert!(matches!(result, Err(ProviderError::Unavailable(_))));
    }
}
