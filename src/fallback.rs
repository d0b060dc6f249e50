use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

use crate::core::types::ReplyHandle;

/// Notice queued for delivery by the dispatcher's outbound task, which owns
/// all transport sends. The notifier itself may run on a backend worker
/// thread, so delivery is handed off rather than performed in place.
#[derive(Debug)]
pub struct OutboundNotice {
    pub reply: ReplyHandle,
    pub text: String,
}

/// One-shot gate for the "primary model busy" notice. One instance exists per
/// request unit; clones share the same flag. Only the first `notify` call,
/// from whichever thread wins the swap, schedules the notice.
#[derive(Clone)]
pub struct FallbackHandle {
    sent: Arc<AtomicBool>,
    outbound: UnboundedSender<OutboundNotice>,
    reply: ReplyHandle,
}

impl FallbackHandle {
    pub fn new(reply: ReplyHandle, outbound: UnboundedSender<OutboundNotice>) -> Self {
        Self {
            sent: Arc::new(AtomicBool::new(false)),
            outbound,
            reply,
        }
    }

    /// Safe to call from any thread, any number of times.
    pub fn notify(&self, fallback_model: &str) {
        if self
            .sent
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let notice = OutboundNotice {
            reply: self.reply.clone(),
            text: format!(
                "⚠️ The primary model is busy, retrying with {}.",
                fallback_model
            ),
        };
        if self.outbound.send(notice).is_err() {
            log::warn!(
                "outbound channel closed, dropping fallback notice for chat {}",
                self.reply.chat
            );
        }
    }

    /// Whether the notice was ever scheduled for this request. Read once after
    /// the backend returns to drive the reply decision.
    pub fn fired(&self) -> bool {
        self.sent.load(Ordering::Acquire)
    }
}
