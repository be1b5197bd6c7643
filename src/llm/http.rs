//! HTTP model caller speaking the OpenAI-compatible chat completions schema.
//!
//! All three provider profiles expose (or are reached through) an
//! OpenAI-compatible endpoint, so one client parameterized by base URL and
//! API key covers them. No automatic retry: the engine's failure policy is
//! fail-fast, and a thrown transport error aborts the run.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{LlmError, ModelCaller, ModelReply};
use crate::engine::types::Provider;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const GOOGLE_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions";
// Anthropic models are reached through OpenRouter's compatible endpoint.
const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// OpenAI-compatible chat completions client.
pub struct HttpModelCaller {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpModelCaller {
    /// Create a caller for a provider profile using its default endpoint.
    pub fn for_provider(provider: Provider, api_key: String) -> Self {
        let base_url = match provider {
            Provider::OpenAi => OPENAI_API_URL,
            Provider::Google => GOOGLE_API_URL,
            Provider::Anthropic => OPENROUTER_API_URL,
        };
        Self::new(base_url.to_string(), api_key)
    }

    /// Create a caller against an explicit endpoint (proxies, tests).
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: Option<u64>,
    #[serde(default)]
    completion_tokens: Option<u64>,
}

#[async_trait]
impl ModelCaller for HttpModelCaller {
    async fn invoke(
        &self,
        model: &str,
        system_prompts: &[String],
        human_prompt: &str,
    ) -> Result<ModelReply, LlmError> {
        let mut messages: Vec<WireMessage> = system_prompts
            .iter()
            .map(|p| WireMessage {
                role: "system",
                content: p,
            })
            .collect();
        messages.push(WireMessage {
            role: "user",
            content: human_prompt,
        });

        let request = ChatRequest { model, messages };

        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Network(format!("Request timeout: {}", e))
                } else if e.is_connect() {
                    LlmError::Network(format!("Connection failed: {}", e))
                } else {
                    LlmError::Network(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            return Err(LlmError::from_status(status.as_u16(), body));
        }

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            LlmError::Parse(format!("Failed to parse response: {}, body: {}", e, body))
        })?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Parse("No choices in response".to_string()))?;

        Ok(ModelReply {
            text: choice.message.content.unwrap_or_default(),
            tokens_in: parsed.usage.as_ref().and_then(|u| u.prompt_tokens),
            tokens_out: parsed.usage.as_ref().and_then(|u| u.completion_tokens),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parsing_shape() {
        let body = r#"{
            "choices": [{"message": {"content": "hello"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 7}
        }"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hello"));
        assert_eq!(parsed.usage.as_ref().unwrap().prompt_tokens, Some(12));
        assert_eq!(parsed.usage.unwrap().completion_tokens, Some(7));
    }

    #[test]
    fn test_response_without_usage() {
        let body = r#"{"choices": [{"message": {"content": "x"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert!(parsed.usage.is_none());
    }

    #[test]
    fn test_provider_endpoints() {
        let c = HttpModelCaller::for_provider(Provider::OpenAi, "k".into());
        assert!(c.base_url.contains("api.openai.com"));
        let c = HttpModelCaller::for_provider(Provider::Google, "k".into());
        assert!(c.base_url.contains("generativelanguage"));
        let c = HttpModelCaller::for_provider(Provider::Anthropic, "k".into());
        assert!(c.base_url.contains("openrouter"));
    }
}
