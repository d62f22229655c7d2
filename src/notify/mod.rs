//! # Change notification
//!
//! Notices are built after conflict resolution and dispatched only once the
//! store has committed. Delivery failures never reach the commit outcome;
//! they are reported through `DispatchReport` and failure subscribers.

mod dispatcher;
mod notice;
mod sender;

pub use dispatcher::{ChangeNotificationDispatcher, DeliveryFailure, DispatchReport, FailureReceiver};
pub use notice::{ChangeKind, ChangeNotice};
pub use sender::{ChangeSender, ChannelSender, CollectingSender, NoticeReceiver, NoticeSender, NullSender, SendError};
