//! Haptic/audio feedback sink. Fire-and-forget: a scanner that cannot buzz
//! must never fail the scan.

use async_trait::async_trait;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackSignal {
    Success,
    Warning,
    Failure,
}

#[async_trait]
pub trait FeedbackSink: Send + Sync {
    async fn emit(&self, signal: FeedbackSignal);
}

pub struct NullFeedback;

#[async_trait]
impl FeedbackSink for NullFeedback {
    async fn emit(&self, signal: FeedbackSignal) {
        debug!(signal = ?signal, "Feedback signal dropped (null sink)");
    }
}
