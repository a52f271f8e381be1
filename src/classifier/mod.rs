pub mod anthropic;
pub mod mock;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::feedback::IncomingFeedback;
use crate::prompts::classify::{build_classify_prompt, system_instruction};

/// What gets sent to the classification service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub system_instruction: String,
    pub user_prompt: String,
}

/// Whatever the service sent back. Untrusted until normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawResponse {
    /// A plain text payload.
    Text(String),
    /// A structured envelope the payload still has to be dug out of.
    Envelope(serde_json::Value),
}

/// Build the request for one item. Same item, same request.
pub fn build_request(item: &IncomingFeedback) -> ClassificationRequest {
    ClassificationRequest {
        system_instruction: system_instruction().to_string(),
        user_prompt: build_classify_prompt(&item.content),
    }
}

/// The external classification service. An LLM, a test script, anything.
///
/// Transport failures must come back as `Err` so the step engine can retry;
/// a garbage answer is still `Ok` and gets dealt with by the normalizer.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, request: &ClassificationRequest) -> Result<RawResponse>;
}
