//! Change senders supplied by the host

use std::sync::Mutex;

use thiserror::Error;
use tokio::sync::mpsc;

use super::notice::ChangeNotice;

/// A sender rejected a notice
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Notice delivery failed: {0}")]
pub struct SendError(pub String);

impl SendError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }
}

/// Delivers one notice. Called synchronously, in commit order.
pub trait ChangeSender: Send + Sync {
    fn send(&self, notice: &ChangeNotice) -> Result<(), SendError>;
}

/// Discards every notice
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSender;

impl ChangeSender for NullSender {
    fn send(&self, _notice: &ChangeNotice) -> Result<(), SendError> {
        Ok(())
    }
}

/// Keeps every notice in memory
#[derive(Debug, Default)]
pub struct CollectingSender {
    notices: Mutex<Vec<ChangeNotice>>,
}

impl CollectingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notices received so far, in delivery order
    pub fn notices(&self) -> Vec<ChangeNotice> {
        self.notices.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Removes and returns the notices received so far
    pub fn take(&self) -> Vec<ChangeNotice> {
        std::mem::take(&mut *self.notices.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

impl ChangeSender for CollectingSender {
    fn send(&self, notice: &ChangeNotice) -> Result<(), SendError> {
        self.notices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notice.clone());
        Ok(())
    }
}

/// Notice sender half of a channel
pub type NoticeSender = mpsc::UnboundedSender<ChangeNotice>;

/// Notice receiver half of a channel
pub type NoticeReceiver = mpsc::UnboundedReceiver<ChangeNotice>;

/// Forwards notices to an async consumer. Fails once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelSender {
    tx: NoticeSender,
}

impl ChannelSender {
    pub fn new() -> (Self, NoticeReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ChangeSender for ChannelSender {
    fn send(&self, notice: &ChangeNotice) -> Result<(), SendError> {
        self.tx
            .send(notice.clone())
            .map_err(|_| SendError::new("notice receiver closed"))
    }
}
