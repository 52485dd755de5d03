//! OpenAI-compatible chat-completion client shared by the hosted and local
//! backends.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{BackendConfig, ChatMessage, LlmResponse, UsageMetadata};
use crate::error::{Result, SentinelError};

pub(crate) struct ChatClient {
    client: Client,
    backend: &'static str,
    endpoint: String,
    model: String,
    credential: Option<String>,
    timeout: Duration,
    /// Ask for a single JSON body instead of a stream (Ollama native API)
    disable_stream: bool,
    /// Also accept the Ollama `{"message": {...}}` response shape
    accept_native: bool,
}

impl ChatClient {
    pub(crate) fn new(backend: &'static str, config: &BackendConfig) -> Result<Self> {
        url::Url::parse(&config.endpoint).map_err(|e| {
            SentinelError::Validation(format!("invalid {} endpoint {}: {}", backend, config.endpoint, e))
        })?;
        let client = Client::builder()
            .build()
            .map_err(|e| SentinelError::backend(backend, format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            backend,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            credential: config.credential.clone(),
            timeout: config.timeout,
            disable_stream: false,
            accept_native: false,
        })
    }

    pub(crate) fn with_native_shape(mut self) -> Self {
        self.disable_stream = true;
        self.accept_native = true;
        self
    }

    /// POST the conversation. The whole exchange, body included, runs under
    /// the configured timeout.
    pub(crate) async fn complete(&self, messages: &[ChatMessage]) -> Result<LlmResponse> {
        let req_body = ChatRequest {
            model: &self.model,
            messages,
            stream: self.disable_stream.then_some(false),
        };
        debug!(backend = self.backend, endpoint = %self.endpoint, model = %self.model, "chat request");

        let exchange = async {
            let mut req = self
                .client
                .post(&self.endpoint)
                .header("Content-Type", "application/json")
                .json(&req_body);
            if let Some(key) = &self.credential {
                req = req.bearer_auth(key);
            }
            let response = req.send().await?;
            let status = response.status();
            let body = response.text().await?;
            Ok::<_, SentinelError>((status, body))
        };

        let (status, body) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                SentinelError::Timeout(format!(
                    "{} request to {} timed out after {}s",
                    self.backend,
                    self.endpoint,
                    self.timeout.as_secs()
                ))
            })??;

        if !status.is_success() {
            return Err(self.status_error(status, &body));
        }
        self.parse_body(&body)
    }

    /// 429 and 5xx are worth one retry; any other status is final.
    fn status_error(&self, status: StatusCode, body: &str) -> SentinelError {
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            SentinelError::from_status(status, &self.endpoint)
        } else {
            SentinelError::backend(self.backend, format!("API error {}: {}", status, body))
        }
    }

    fn parse_body(&self, body: &str) -> Result<LlmResponse> {
        match serde_json::from_str::<OpenAiResponse>(body) {
            Ok(resp) => {
                let choice = resp
                    .choices
                    .into_iter()
                    .next()
                    .ok_or_else(|| SentinelError::backend(self.backend, "response has no choices"))?;
                let usage = resp.usage.unwrap_or_default();
                Ok(LlmResponse {
                    content: choice.message.content,
                    usage: UsageMetadata {
                        prompt_tokens: usage.prompt_tokens.unwrap_or(0),
                        completion_tokens: usage.completion_tokens.unwrap_or(0),
                        total_tokens: usage.total_tokens.unwrap_or(0),
                    },
                    model: resp.model.unwrap_or_else(|| self.model.clone()),
                })
            }
            Err(e) => {
                if self.accept_native {
                    if let Ok(native) = serde_json::from_str::<NativeResponse>(body) {
                        let prompt_tokens = native.prompt_eval_count.unwrap_or(0);
                        let completion_tokens = native.eval_count.unwrap_or(0);
                        return Ok(LlmResponse {
                            content: native.message.content,
                            usage: UsageMetadata {
                                prompt_tokens,
                                completion_tokens,
                                total_tokens: prompt_tokens + completion_tokens,
                            },
                            model: native.model.unwrap_or_else(|| self.model.clone()),
                        });
                    }
                }
                Err(SentinelError::Parse(format!(
                    "unrecognized {} response: {} (body: {})",
                    self.backend, e, body
                )))
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    model: Option<String>,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: Option<usize>,
    #[serde(default)]
    completion_tokens: Option<usize>,
    #[serde(default)]
    total_tokens: Option<usize>,
}

/// Ollama `/api/chat` with `stream: false`
#[derive(Debug, Deserialize)]
struct NativeResponse {
    model: Option<String>,
    message: ChatMessage,
    prompt_eval_count: Option<usize>,
    eval_count: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Provider;

    fn client(native: bool) -> ChatClient {
        let cfg = BackendConfig::new(Provider::Local, "http://localhost:11434/api/chat", "llama3");
        let c = ChatClient::new("local", &cfg).unwrap();
        if native {
            c.with_native_shape()
        } else {
            c
        }
    }

    #[test]
    fn parses_both_response_shapes() {
        let openai = r#"{"choices":[{"message":{"role":"assistant","content":"hi"}}]}"#;
        let native = r#"{"model":"llama3","message":{"role":"assistant","content":"hello"},
                         "prompt_eval_count":3,"eval_count":4,"done":true}"#;

        let resp = client(true).parse_body(openai).unwrap();
        assert_eq!(resp.content, "hi");
        assert_eq!(resp.model, "llama3");

        let resp = client(true).parse_body(native).unwrap();
        assert_eq!(resp.content, "hello");
        assert_eq!(resp.usage.total_tokens, 7);

        assert!(matches!(client(false).parse_body(native), Err(SentinelError::Parse(_))));
    }

    #[test]
    fn statuses_split_into_retryable_and_final() {
        let c = client(false);
        assert!(c.status_error(StatusCode::TOO_MANY_REQUESTS, "").is_transient());
        assert!(c.status_error(StatusCode::BAD_GATEWAY, "").is_transient());
        let e = c.status_error(StatusCode::UNAUTHORIZED, "bad key");
        assert!(!e.is_transient());
        assert!(e.to_string().contains("401"));
    }
}
