//! External service clients: the downstream partner notification sink.

pub mod notification;

pub use notification::{
    DEFAULT_NOTIFY_TIMEOUT, HttpNotificationSink, NotificationSink, NotifyError,
    RecordingNotificationSink, SentNotification,
};
