use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::fallback::FallbackHandle;
use crate::memory::MemoryEntry;

/// Opaque key identifying one chat. Scopes the request queue, the memory log
/// and the serialization guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Transport-specific handle needed to address a reply back to its origin.
#[derive(Debug, Clone)]
pub struct ReplyHandle {
    pub chat: ChatId,
}

/// One inbound message, snapshotted at enqueue time and consumed exactly once
/// by the drain loop.
#[derive(Debug, Clone)]
pub struct RequestUnit {
    pub chat: ChatId,
    pub text: String,
    pub received_at: DateTime<Utc>,
    pub reply: ReplyHandle,
}

impl RequestUnit {
    pub fn new(chat: ChatId, text: impl Into<String>) -> Self {
        Self {
            chat,
            text: text.into(),
            received_at: Utc::now(),
            reply: ReplyHandle { chat },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    pub source: String,
    pub published: DateTime<Utc>,
}

/// Everything the analysis backend needs for one request.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub tokens: Vec<String>,
    pub news_block: String,
    pub raw_text: String,
    pub chat: ChatId,
    pub memory: Vec<MemoryEntry>,
}

/// Headline retrieval. "Nothing found" is `Ok` with an empty vector; only
/// transport failures are errors.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    async fn headlines(&self, token: Option<&str>, max_items: usize) -> Result<Vec<Headline>>;
}

/// The model backend. May block internally for a long time and may invoke the
/// fallback handle any number of times, from any thread, before returning.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn analyze(&self, request: AnalysisRequest, fallback: FallbackHandle) -> Result<String>;
}

/// Outbound side of the chat platform. Rich-formatting fallbacks on send are
/// the implementation's concern, not the pipeline's.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send_message(&self, reply: &ReplyHandle, text: &str) -> Result<()>;

    async fn send_typing(&self, reply: &ReplyHandle) -> Result<()>;
}
