use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ClassificationRequest, Classifier, RawResponse};
use crate::consts::DEFAULT_MODEL;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
// A classification answer is a couple dozen tokens.
const MAX_TOKENS: u32 = 256;

/// Classifies feedback by calling the Anthropic Messages API.
pub struct AnthropicClassifier {
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl AnthropicClassifier {
    /// Uses `ANTHROPIC_API_KEY` from the environment. A missing key is
    /// reported when `classify` is called, not here.
    pub fn new(model: Option<String>) -> Self {
        let api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        Self::with_api_key(model, api_key)
    }

    pub fn with_api_key(model: Option<String>, api_key: Option<String>) -> Self {
        Self {
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Join the text blocks of a response body. Falls back to the whole
    /// envelope when there is no text to be found.
    fn extract_payload(body: serde_json::Value) -> RawResponse {
        let text = serde_json::from_value::<ApiResponse>(body.clone())
            .map(|resp| {
                resp.content
                    .iter()
                    .filter(|block| block.content_type == "text")
                    .filter_map(|block| block.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            RawResponse::Envelope(body)
        } else {
            RawResponse::Text(text)
        }
    }
}

#[async_trait]
impl Classifier for AnthropicClassifier {
    async fn classify(&self, request: &ClassificationRequest) -> Result<RawResponse> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("no Anthropic credentials found. Set {API_KEY_ENV}."))?;

        let messages = [Message {
            role: "user",
            content: &request.user_prompt,
        }];
        let body = ApiRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: &request.system_instruction,
            messages: &messages,
        };

        let resp = self
            .client
            .post(API_URL)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .header("x-api-key", api_key)
            .json(&body)
            .send()
            .await
            .context("classification request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            bail!("Anthropic API error ({}): {}", status, text);
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .context("classification response is not JSON")?;

        if let Some(usage) = body.get("usage") {
            debug!(%usage, "classification token usage");
        }

        Ok(Self::extract_payload(body))
    }
}

// --- API types ---

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: &'a [Message<'a>],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_joins_text_blocks() {
        let body = json!({
            "content": [
                {"type": "text", "text": "{\"sentiment\": "},
                {"type": "text", "text": "\"Positive\"}"}
            ]
        });
        assert_eq!(
            AnthropicClassifier::extract_payload(body),
            RawResponse::Text("{\"sentiment\": \"Positive\"}".to_string())
        );
    }

    #[test]
    fn extract_skips_non_text_blocks() {
        let body = json!({
            "content": [
                {"type": "tool_use", "id": "x"},
                {"type": "text", "text": "hello"}
            ]
        });
        assert_eq!(
            AnthropicClassifier::extract_payload(body),
            RawResponse::Text("hello".to_string())
        );
    }

    #[test]
    fn extract_without_text_keeps_envelope() {
        let body = json!({"content": []});
        assert_eq!(
            AnthropicClassifier::extract_payload(body.clone()),
            RawResponse::Envelope(body)
        );
    }

    #[test]
    fn extract_unexpected_shape_keeps_envelope() {
        let body = json!({"error": {"message": "overloaded"}});
        assert!(matches!(
            AnthropicClassifier::extract_payload(body),
            RawResponse::Envelope(_)
        ));
    }

    #[test]
    fn default_model_applies() {
        let c = AnthropicClassifier::with_api_key(None, None);
        assert_eq!(c.model(), DEFAULT_MODEL);
    }

    #[tokio::test]
    async fn missing_key_fails_visibly() {
        let c = AnthropicClassifier::with_api_key(None, None);
        let req = ClassificationRequest {
            system_instruction: "s".to_string(),
            user_prompt: "u".to_string(),
        };
        let err = c.classify(&req).await.unwrap_err();
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn request_serializes_system_and_prompt() {
        let messages = [Message {
            role: "user",
            content: "prompt",
        }];
        let body = ApiRequest {
            model: "m",
            max_tokens: MAX_TOKENS,
            system: "sys",
            messages: &messages,
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["system"], "sys");
        assert_eq!(v["messages"][0]["role"], "user");
        assert_eq!(v["messages"][0]["content"], "prompt");
    }
}
