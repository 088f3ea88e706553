//! OpenAI-compatible chat-completions client
//!
//! Minimal client for the auto-reply feature: one system prompt, one user
//! message, one generated reply. Works against any endpoint implementing the
//! `/chat/completions` shape.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::AutoReplyConfig;
use crate::{Error, Result};

/// Outbound request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Client for an OpenAI-compatible completion endpoint
pub struct CompletionClient {
    client: reqwest::Client,
    api_url: String,
    api_key: SecretString,
    model: String,
    system_prompt: String,
    max_tokens: u32,
}

impl CompletionClient {
    /// Build a client from the auto-reply configuration
    ///
    /// Returns `None` when the feature is disabled or no API key is set.
    #[must_use]
    pub fn from_config(config: &AutoReplyConfig) -> Option<Self> {
        if !config.is_active() {
            return None;
        }
        let api_key = config.api_key.clone()?;

        Some(Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            max_tokens: config.max_tokens,
        })
    }

    /// Generate a reply for one inbound text
    ///
    /// # Errors
    ///
    /// Returns error if the request fails, the endpoint answers non-2xx, or
    /// the response carries no text.
    pub async fn generate(&self, user_text: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.api_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": self.system_prompt},
                {"role": "user", "content": user_text},
            ],
            "max_tokens": self.max_tokens,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Completion(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Completion(format!("{status} - {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Completion(format!("invalid response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| Error::Completion("empty completion".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
