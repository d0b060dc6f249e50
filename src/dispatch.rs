use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use futures::future::try_join;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::core::types::{
    AnalysisBackend, AnalysisRequest, ChatId, NewsProvider, RequestUnit, Transport,
};
use crate::fallback::{FallbackHandle, OutboundNotice};
use crate::memory::{MemoryStore, Role};
use crate::news;
use crate::tokens;
use crate::typing::TypingSignal;

pub const DEGRADED_REPLY: &str = "😵 Sorry, a general error occurred.";

const SINGLE_TOKEN_NEWS: usize = 6;
const PAIRED_TOKEN_NEWS: usize = 3;
const GENERAL_NEWS: usize = 6;

struct ChatQueue {
    units: VecDeque<RequestUnit>,
    draining: bool,
}

/// Registry of per-chat FIFO queues with single-drainer ownership. Queues are
/// created lazily and never removed; an idle queue is just empty.
#[derive(Default)]
pub struct ChatQueues {
    inner: Mutex<HashMap<ChatId, ChatQueue>>,
}

impl ChatQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a unit. Returns true when this call claimed drain ownership
    /// for the chat, in which case the caller must run the drain loop; false
    /// means an existing drainer will pick the unit up.
    pub fn enqueue(&self, unit: RequestUnit) -> bool {
        let mut inner = self.inner.lock().expect("chat queue registry poisoned");
        let entry = inner.entry(unit.chat).or_insert_with(|| ChatQueue {
            units: VecDeque::new(),
            draining: false,
        });
        entry.units.push_back(unit);
        if entry.draining {
            false
        } else {
            entry.draining = true;
            true
        }
    }

    /// Pops the next unit for `chat`, or releases drain ownership when the
    /// queue is empty. Pop and release share one critical section, so a unit
    /// enqueued concurrently either lands in front of this drainer or finds
    /// the chat idle and claims ownership itself; it can never be stranded.
    pub fn next(&self, chat: ChatId) -> Option<RequestUnit> {
        let mut inner = self.inner.lock().expect("chat queue registry poisoned");
        let entry = inner.get_mut(&chat)?;
        match entry.units.pop_front() {
            Some(unit) => Some(unit),
            None => {
                entry.draining = false;
                None
            }
        }
    }

    /// Number of units currently waiting for `chat`, the in-flight one
    /// excluded.
    pub fn depth(&self, chat: ChatId) -> usize {
        let inner = self.inner.lock().expect("chat queue registry poisoned");
        inner.get(&chat).map_or(0, |q| q.units.len())
    }
}

/// Ties the queue registry, typing signal, fallback notifier and the
/// collaborators together. One instance serves every chat.
pub struct Dispatcher {
    queues: ChatQueues,
    transport: Arc<dyn Transport>,
    news: Arc<dyn NewsProvider>,
    backend: Arc<dyn AnalysisBackend>,
    memory: Arc<MemoryStore>,
    outbound: UnboundedSender<OutboundNotice>,
}

impl Dispatcher {
    /// Also spawns the outbound delivery task, which performs transport sends
    /// for notices raised on backend worker threads.
    pub fn new(
        transport: Arc<dyn Transport>,
        news: Arc<dyn NewsProvider>,
        backend: Arc<dyn AnalysisBackend>,
        memory: Arc<MemoryStore>,
    ) -> Arc<Self> {
        let (outbound, rx) = mpsc::unbounded_channel();
        let dispatcher = Arc::new(Self {
            queues: ChatQueues::new(),
            transport,
            news,
            backend,
            memory,
            outbound,
        });
        tokio::spawn(Self::deliver_notices(dispatcher.transport.clone(), rx));
        dispatcher
    }

    async fn deliver_notices(
        transport: Arc<dyn Transport>,
        mut rx: UnboundedReceiver<OutboundNotice>,
    ) {
        while let Some(notice) = rx.recv().await {
            if let Err(err) = transport.send_message(&notice.reply, &notice.text).await {
                log::warn!(
                    "failed to deliver fallback notice to chat {}: {err:#}",
                    notice.reply.chat
                );
            }
        }
    }

    /// Entry point for inbound messages. Non-blocking: enqueues the unit and,
    /// when this arrival claims ownership, spawns the drain loop for its chat.
    pub fn handle_message(self: &Arc<Self>, unit: RequestUnit) {
        let chat = unit.chat;
        if self.queues.enqueue(unit) {
            log::debug!("claimed drain ownership for chat {}", chat);
            let dispatcher = Arc::clone(self);
            tokio::spawn(async move { dispatcher.drain(chat).await });
        } else {
            log::debug!(
                "chat {} already draining, queue depth {}",
                chat,
                self.queues.depth(chat)
            );
        }
    }

    /// Sequential consumer of one chat's queue. Exactly one instance runs per
    /// chat at any time; it exits only once `next` has released ownership.
    async fn drain(self: Arc<Self>, chat: ChatId) {
        while let Some(unit) = self.queues.next(chat) {
            self.process(unit).await;
        }
        log::debug!("released drain ownership for chat {}", chat);
    }

    async fn process(&self, unit: RequestUnit) {
        let text = unit.text.trim().to_string();
        if text.is_empty() {
            return;
        }

        if let Err(err) = self.memory.append(unit.chat, Role::User, &text) {
            log::warn!("failed to record user message for chat {}: {err:#}", unit.chat);
        }

        // The signal guard covers everything up to the reply decision; its
        // drop aborts the typing task on every exit path.
        let typing = TypingSignal::start(Arc::clone(&self.transport), unit.reply.clone());
        let fallback = FallbackHandle::new(unit.reply.clone(), self.outbound.clone());

        let response = match self.run_analysis(&unit, &text, fallback.clone()).await {
            Ok(response) => response,
            Err(err) => {
                log::error!("analysis failed for chat {}: {err:#}", unit.chat);
                DEGRADED_REPLY.to_string()
            }
        };
        drop(typing);

        if let Err(err) = self.memory.append(unit.chat, Role::Assistant, &response) {
            log::warn!(
                "failed to record assistant reply for chat {}: {err:#}",
                unit.chat
            );
        }

        // A degraded reply duplicates the interim notice when the fallback
        // path already reached the user, so it is suppressed in that case.
        if response == DEGRADED_REPLY && fallback.fired() {
            log::info!(
                "suppressing degraded reply for chat {}, fallback notice already sent",
                unit.chat
            );
            return;
        }
        if let Err(err) = self.transport.send_message(&unit.reply, &response).await {
            log::error!("failed to send reply to chat {}: {err:#}", unit.chat);
        }
    }

    async fn run_analysis(
        &self,
        unit: &RequestUnit,
        text: &str,
        fallback: FallbackHandle,
    ) -> Result<String> {
        let tokens = tokens::extract_tokens(text);
        let memory = self.memory.load(unit.chat);

        let headlines = match tokens.as_slice() {
            [token] => {
                self.news
                    .headlines(Some(token.as_str()), SINGLE_TOKEN_NEWS)
                    .await?
            }
            [first, second] => {
                let (mut a, b) = try_join(
                    self.news.headlines(Some(first.as_str()), PAIRED_TOKEN_NEWS),
                    self.news.headlines(Some(second.as_str()), PAIRED_TOKEN_NEWS),
                )
                .await?;
                a.extend(b);
                a
            }
            _ => self.news.headlines(None, GENERAL_NEWS).await?,
        };
        let news_block = news::format_news_block(&headlines);

        let request = AnalysisRequest {
            tokens,
            news_block,
            raw_text: text.to_string(),
            chat: unit.chat,
            memory,
        };
        self.backend.analyze(request, fallback).await
    }
}
