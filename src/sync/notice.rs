//! User-facing notices (toasts)
//!
//! Mutation failures and confirmations are broadcast to whoever renders the
//! dashboard. A lagging subscriber loses the oldest notices, never blocks
//! the sender.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Error,
}

/// One user-visible message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

impl Notice {
    pub fn is_error(&self) -> bool {
        self.level == NoticeLevel::Error
    }
}

/// Broadcast channel for [`Notice`]s.
#[derive(Debug, Clone)]
pub struct NoticeBus {
    tx: broadcast::Sender<Notice>,
}

impl NoticeBus {
    /// `capacity` notices are buffered per subscriber before the oldest are
    /// dropped. Zero is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Receive every notice emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(NoticeLevel::Info, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(NoticeLevel::Error, message.into());
    }

    fn emit(&self, level: NoticeLevel, message: String) {
        let notice = Notice { level, message, at: Utc::now() };
        // No subscriber is not an error: nobody is looking at the screen.
        if self.tx.send(notice).is_err() {
            tracing::trace!(?level, "Notice dropped, no subscribers");
        }
    }
}
