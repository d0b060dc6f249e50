use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use itertools::Itertools;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::fmt;

use crate::core::config::CoincubConfig;
use crate::core::types::{AnalysisBackend, AnalysisRequest};
use crate::fallback::FallbackHandle;
use crate::memory::Role;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const PERSONA: &str = "You are CoinCub, a concise crypto-market analyst. \
Ground your answer in the supplied news context and conversation history, \
state uncertainty plainly, and never give financial advice as a guarantee.";

/// Marker for statuses worth retrying on the fallback model.
#[derive(Debug)]
struct BackendBusy(StatusCode);

impl fmt::Display for BackendBusy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model backend busy (status {})", self.0)
    }
}

impl std::error::Error for BackendBusy {}

/// Analysis backend talking to the Gemini `generateContent` REST endpoint.
/// A busy primary model triggers the fallback notice and a single retry on
/// the fallback model; there is no further retry loop.
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    primary_model: String,
    fallback_model: String,
}

impl GeminiBackend {
    pub fn new(config: &CoincubConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    pub fn with_client(client: Client, config: &CoincubConfig) -> Self {
        Self {
            client,
            api_key: config.gemini_api_key.clone(),
            primary_model: config.primary_model.clone(),
            fallback_model: config.fallback_model.clone(),
        }
    }

    fn build_prompt(request: &AnalysisRequest) -> String {
        let mut prompt = String::from(PERSONA);
        prompt.push_str("\n\n");

        if !request.tokens.is_empty() {
            prompt.push_str(&format!(
                "Tokens under discussion: {}\n\n",
                request.tokens.iter().join(", ")
            ));
        }

        if !request.memory.is_empty() {
            let transcript = request
                .memory
                .iter()
                .map(|entry| {
                    let role = match entry.role {
                        Role::User => "user",
                        Role::Assistant => "assistant",
                    };
                    format!("{}: {}", role, entry.text)
                })
                .join("\n");
            prompt.push_str(&format!("Conversation so far:\n{}\n\n", transcript));
        }

        prompt.push_str(&format!(
            "Recent news:\n{}\n\nQuestion: {}",
            request.news_block, request.raw_text
        ));
        prompt
    }

    async fn generate(&self, model: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/{}:generateContent", GEMINI_BASE_URL, model);
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .with_context(|| format!("request to model {} failed", model))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(BackendBusy(status).into());
        }

        let payload: Value = response
            .error_for_status()?
            .json()
            .await
            .with_context(|| format!("unreadable response from model {}", model))?;

        extract_text(&payload).ok_or_else(|| anyhow!("malformed response from model {}", model))
    }
}

fn extract_text(payload: &Value) -> Option<String> {
    payload["candidates"][0]["content"]["parts"][0]["text"]
        .as_str()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

#[async_trait]
impl AnalysisBackend for GeminiBackend {
    async fn analyze(&self, request: AnalysisRequest, fallback: FallbackHandle) -> Result<String> {
        let prompt = Self::build_prompt(&request);

        match self.generate(&self.primary_model, &prompt).await {
            Ok(text) => Ok(text),
            Err(err) if err.downcast_ref::<BackendBusy>().is_some() => {
                log::warn!(
                    "primary model {} unavailable for chat {}: {err:#}",
                    self.primary_model,
                    request.chat
                );
                fallback.notify(&self.fallback_model);
                self.generate(&self.fallback_model, &prompt).await
            }
            Err(err) => Err(err),
        }
    }
}
