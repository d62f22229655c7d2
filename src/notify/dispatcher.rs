//! # Change Notification Dispatcher
//!
//! Hands the notices of one committed unit of work to the sender.
//!
//! ## Rules
//! - Runs only after the store committed; never on rollback
//! - One notice at a time, in commit order
//! - At-most-once, best-effort: a failed send is reported, never retried,
//!   and never changes the commit outcome

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use super::notice::ChangeNotice;
use super::sender::{ChangeSender, SendError};
use crate::observability::{log_event_with_fields, Event, PipelineMetrics};

/// Failure receiver for one subscriber
pub type FailureReceiver = mpsc::UnboundedReceiver<DeliveryFailure>;

/// A notice the sender rejected
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryFailure {
    pub notice: ChangeNotice,
    pub error: SendError,
}

/// Result of dispatching one commit's notices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    /// Notices handed to the sender
    pub attempted: usize,
    /// Notices the sender accepted
    pub delivered: usize,
    /// Notices the sender rejected
    pub failures: Vec<DeliveryFailure>,
}

impl DispatchReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Dispatches committed changes to the host's sender
pub struct ChangeNotificationDispatcher {
    sender: Arc<dyn ChangeSender>,
    failure_subscribers: Mutex<Vec<mpsc::UnboundedSender<DeliveryFailure>>>,
    metrics: Arc<PipelineMetrics>,
}

impl std::fmt::Debug for ChangeNotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeNotificationDispatcher")
            .field("failure_subscribers", &self.subscriber_count())
            .finish_non_exhaustive()
    }
}

impl ChangeNotificationDispatcher {
    pub fn new(sender: Arc<dyn ChangeSender>, metrics: Arc<PipelineMetrics>) -> Self {
        Self {
            sender,
            failure_subscribers: Mutex::new(Vec::new()),
            metrics,
        }
    }

    /// Subscribe to delivery failures. The subscription ends when the
    /// receiver is dropped.
    pub fn subscribe_failures(&self) -> FailureReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.failure_subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }

    /// Live failure subscribers
    pub fn subscriber_count(&self) -> usize {
        let mut subscribers = self.failure_subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|tx| !tx.is_closed());
        subscribers.len()
    }

    /// Sends every notice in order and reports the outcome.
    pub fn dispatch(&self, notices: &[ChangeNotice]) -> DispatchReport {
        let mut report = DispatchReport::default();

        for notice in notices {
            report.attempted += 1;
            let unit_of_work = notice.unit_of_work.to_string();
            let kind = notice.kind.to_string();

            match self.sender.send(notice) {
                Ok(()) => {
                    report.delivered += 1;
                    self.metrics.increment_notices_delivered();
                    log_event_with_fields(
                        Event::NoticeDelivered,
                        &[
                            ("entity", notice.entity_type.as_str()),
                            ("identity", notice.identity.as_str()),
                            ("kind", kind.as_str()),
                            ("unit_of_work", unit_of_work.as_str()),
                        ],
                    );
                }
                Err(error) => {
                    self.metrics.increment_notices_failed();
                    log_event_with_fields(
                        Event::NoticeDeliveryFailed,
                        &[
                            ("entity", notice.entity_type.as_str()),
                            ("identity", notice.identity.as_str()),
                            ("kind", kind.as_str()),
                            ("reason", error.0.as_str()),
                            ("unit_of_work", unit_of_work.as_str()),
                        ],
                    );
                    let failure = DeliveryFailure {
                        notice: notice.clone(),
                        error,
                    };
                    self.publish_failure(&failure);
                    report.failures.push(failure);
                }
            }
        }

        report
    }

    fn publish_failure(&self, failure: &DeliveryFailure) {
        let mut subscribers = self.failure_subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|tx| tx.send(failure.clone()).is_ok());
    }
}
