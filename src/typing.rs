use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::core::types::{ReplyHandle, Transport};

pub const TYPING_INTERVAL: Duration = Duration::from_secs(4);

/// Periodic "still working" indicator tied to one request's processing
/// lifetime. The first emission happens immediately, then once per interval.
/// Dropping the signal cancels the task, so holding one across the processing
/// block guarantees cleanup on every exit path.
pub struct TypingSignal {
    handle: JoinHandle<()>,
}

impl TypingSignal {
    pub fn start(transport: Arc<dyn Transport>, reply: ReplyHandle) -> Self {
        Self::start_every(transport, reply, TYPING_INTERVAL)
    }

    fn start_every(transport: Arc<dyn Transport>, reply: ReplyHandle, interval: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                // Best effort: a failed indicator never escalates.
                if let Err(err) = transport.send_typing(&reply).await {
                    log::warn!("typing indicator failed for chat {}: {err:#}", reply.chat);
                }
            }
        });
        Self { handle }
    }

    /// Idempotent; the task observes the abort at its next await point, within
    /// one interval at worst.
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for TypingSignal {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use crate::core::types::ChatId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTransport {
        typing: AtomicUsize,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn send_message(&self, _reply: &ReplyHandle, _text: &str) -> Result<()> {
            Ok(())
        }

        async fn send_typing(&self, _reply: &ReplyHandle) -> Result<()> {
            self.typing.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn reply() -> ReplyHandle {
        ReplyHandle { chat: ChatId(1) }
    }

    #[tokio::test(start_paused = true)]
    async fn emits_immediately_and_then_periodically() {
        let transport = Arc::new(CountingTransport::default());
        let signal =
            TypingSignal::start_every(transport.clone(), reply(), Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(35)).await;
        assert!(transport.typing.load(Ordering::SeqCst) >= 3);
        signal.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn never_emits_after_stop() {
        let transport = Arc::new(CountingTransport::default());
        let signal =
            TypingSignal::start_every(transport.clone(), reply(), Duration::from_millis(10));

        tokio::time::sleep(Duration::from_millis(15)).await;
        signal.stop();
        let seen = transport.typing.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.typing.load(Ordering::SeqCst), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_first_emission_is_clean() {
        let transport = Arc::new(CountingTransport::default());
        let signal =
            TypingSignal::start_every(transport.clone(), reply(), Duration::from_millis(10));
        signal.stop();
        signal.stop();

        tokio::time::sleep(Duration::from_millis(50)).await;
        // The first tick resolves immediately, so at most one emission may
        // have squeezed in before the abort landed.
        assert!(transport.typing.load(Ordering::SeqCst) <= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn drop_cancels_the_task() {
        let transport = Arc::new(CountingTransport::default());
        {
            let _signal =
                TypingSignal::start_every(transport.clone(), reply(), Duration::from_millis(10));
            tokio::time::sleep(Duration::from_millis(15)).await;
        }
        let seen = transport.typing.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(transport.typing.load(Ordering::SeqCst), seen);
    }
}
