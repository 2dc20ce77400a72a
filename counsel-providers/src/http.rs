//! OpenAI-compatible chat-completions wire client.
//!
//! Every registered provider speaks this shape (native endpoints, custom
//! endpoints, and OpenRouter all accept it); only base URLs, keys, and
//! capability tables differ.

use std::time::Duration;

use counsel_types::{GenerationRequest, GenerationResponse, ProviderError, TokenUsage};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    stream: bool,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

/// Thin chat-completions client over `reqwest`.
pub struct OpenAiCompatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    provider_name: String,
}

impl OpenAiCompatClient {
    /// Create a client for `base_url` (without the `/chat/completions`
    /// suffix). An empty key sends no Authorization header, which local
    /// endpoints accept.
    pub fn new(
        provider_name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            provider_name: provider_name.into(),
        }
    }

    /// Run one chat completion, bounded by `timeout` and `cancel`.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<GenerationResponse, ProviderError> {
        let mut messages = Vec::with_capacity(2);
        if !request.system_prompt.is_empty() {
            messages.push(WireMessage {
                role: "system",
                content: &request.system_prompt,
            });
        }
        messages.push(WireMessage {
            role: "user",
            content: &request.prompt,
        });

        let body = WireRequest {
            model: &request.model_name,
            messages,
            temperature: Some(request.temperature),
            max_tokens: request.max_output_tokens,
            stream: false,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let mut builder = self.client.post(&url).json(&body);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }

        debug!(provider = self.provider_name, model = request.model_name, %url, "provider call");

        let send = async {
            let response = builder
                .send()
                .await
                .map_err(|e| ProviderError::Network(Box::new(e)))?;
            map_response(response, &self.provider_name, &request.model_name).await
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(ProviderError::Cancelled),
            result = tokio::time::timeout(timeout, send) => match result {
                Ok(inner) => inner,
                Err(_) => Err(ProviderError::Timeout(timeout)),
            },
        }
    }
}

async fn map_response(
    response: reqwest::Response,
    provider_name: &str,
    model_name: &str,
) -> Result<GenerationResponse, ProviderError> {
    let status = response.status();
    if !status.is_success() {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs);
        let body = response.text().await.unwrap_or_default();
        return Err(match status.as_u16() {
            401 | 403 => ProviderError::Authentication(body),
            404 => ProviderError::ModelNotFound(model_name.to_string()),
            429 => ProviderError::RateLimit { retry_after },
            500..=599 => ProviderError::ServiceUnavailable(body),
            _ => ProviderError::InvalidRequest(body),
        });
    }

    let wire: WireResponse = response
        .json()
        .await
        .map_err(|e| ProviderError::Other(Box::new(e)))?;

    let content = wire
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default();
    let usage = wire.usage.unwrap_or_default();

    Ok(GenerationResponse {
        content,
        model_name: wire.model.unwrap_or_else(|| model_name.to_string()),
        provider_name: provider_name.to_string(),
        usage: TokenUsage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serialises_without_empty_fields() {
        let body = WireRequest {
            model: "o3",
            messages: vec![WireMessage {
                role: "user",
                content: "hi",
            }],
            temperature: Some(0.5),
            max_tokens: None,
            stream: false,
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["model"], "o3");
        assert!(v.get("max_tokens").is_none());
        assert_eq!(v["messages"][0]["role"], "user");
    }

    #[test]
    fn response_parses_minimal_shape() {
        let raw = r#"{"choices":[{"message":{"content":"hello"}}]}"#;
        let wire: WireResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(wire.choices[0].message.content.as_deref(), Some("hello"));
        assert!(wire.usage.is_none());
    }

    #[tokio::test]
    async fn pre_cancelled_token_short_circuits() {
        let client = OpenAiCompatClient::new("test", "http://127.0.0.1:9", "");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let request = GenerationRequest {
            model_name: "m".into(),
            prompt: "p".into(),
            ..Default::default()
        };
        let err = client
            .generate(&request, Duration::from_secs(5), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Cancelled));
    }
}
