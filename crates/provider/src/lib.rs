//! OpenAI-compatible chat-completion client.
//!
//! Works with: OpenAI, Qwen (DashScope compatible mode), DeepSeek, and
//! any other endpoint exposing `/v1/chat/completions`.
//!
//! One completion per call, without streaming or retries; failure is
//! surfaced immediately so the caller gets a fast signal.

use async_trait::async_trait;
use nestchat_core::error::ClientError;
use nestchat_core::client::{ChatClient, ChatReply, ChatRequest};
use nestchat_core::message::ChatTurn;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// An OpenAI-compatible chat client.
pub struct OpenAiCompatClient {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatClient {
    /// Create a new client against an OpenAI-compatible base URL.
    ///
    /// The HTTP client carries a generous outer timeout; the effective
    /// per-request deadline comes from `ChatRequest::timeout_secs`.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| ClientError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Build a client from the application config.
    pub fn from_config(config: &nestchat_config::AppConfig) -> Result<Self, ClientError> {
        Self::new(
            "openai-compat",
            config.base_url.clone(),
            config.api_key.clone().unwrap_or_default(),
        )
    }

    /// Convert our ChatTurn types to the wire format.
    fn to_api_messages(messages: &[ChatTurn]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().into(),
                content: m.content.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl ChatClient for OpenAiCompatClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ChatRequest) -> std::result::Result<ChatReply, ClientError> {
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        debug!(
            client = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .timeout(std::time::Duration::from_secs(request.timeout_secs))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClientError::Timeout(format!("no response within {}s", request.timeout_secs))
                } else {
                    ClientError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ClientError::RateLimited { retry_after_secs: 5 });
        }

        if status == 401 || status == 403 {
            return Err(ClientError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Chat API returned error");
            return Err(ClientError::Api {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response.json().await.map_err(|e| ClientError::Api {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::Api {
                status_code: 200,
                message: "No choices in response".into(),
            })?;

        Ok(ChatReply {
            content: choice.message.content.unwrap_or_default(),
            model: api_response.model,
        })
    }
}

// --- Wire types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ApiChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestchat_core::message::ChatTurn;

    #[test]
    fn constructor_strips_trailing_slash() {
        let client =
            OpenAiCompatClient::new("qwen", "https://dashscope.aliyuncs.com/compatible-mode/v1/", "sk-test")
                .unwrap();
        assert_eq!(client.name(), "qwen");
        assert!(!client.base_url.ends_with('/'));
    }

    #[test]
    fn from_config_uses_defaults() {
        let config = nestchat_config::AppConfig::default();
        let client = OpenAiCompatClient::from_config(&config).unwrap();
        assert!(client.base_url.contains("api.openai.com"));
    }

    #[test]
    fn message_conversion_preserves_order() {
        let messages = vec![
            ChatTurn::system("你是一位资深的儿童教育专家"),
            ChatTurn::user("孩子不肯写作业"),
            ChatTurn::assistant("先共情，再分析"),
        ];
        let api_messages = OpenAiCompatClient::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 3);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
        assert_eq!(api_messages[2].role, "assistant");
        assert_eq!(api_messages[1].content, "孩子不肯写作业");
    }

    #[test]
    fn parse_completion_response() {
        let data = r#"{
            "model": "gpt-4o-mini",
            "choices": [{"message": {"role": "assistant", "content": "多表扬孩子"}}]
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.model, "gpt-4o-mini");
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("多表扬孩子"));
    }

    #[test]
    fn parse_response_with_null_content() {
        let data = r#"{"model": "m", "choices": [{"message": {"content": null}}]}"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }

    #[test]
    fn parse_response_without_choices() {
        let data = r#"{"model": "m", "choices": []}"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert!(parsed.choices.is_empty());
    }
}
