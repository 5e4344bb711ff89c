//! Best-effort delivery notifications to partners.
//!
//! A notification is a GET to the partner's URL with the transaction fields as
//! query parameters. Only the status code is inspected; the body is dropped.

use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use txworker_core::NotificationParams;

/// Upper bound for one notification request, connect included.
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Error)]
pub enum NotifyError {
    #[error("failed to build http client: {0}")]
    Client(String),

    /// Connection refused, DNS failure, timeout, malformed URL.
    #[error("notification request failed: {0}")]
    Transport(String),

    #[error("partner responded with status {0}")]
    Status(u16),
}

#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    /// Send one notification. Any 2xx response is success.
    async fn notify(&self, url: &str, params: &NotificationParams) -> Result<(), NotifyError>;
}

/// reqwest-backed sink. The client (and its connection pool) is shared by
/// every record processor.
#[derive(Debug, Clone)]
pub struct HttpNotificationSink {
    client: reqwest::Client,
}

impl HttpNotificationSink {
    pub fn new(timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl NotificationSink for HttpNotificationSink {
    async fn notify(&self, url: &str, params: &NotificationParams) -> Result<(), NotifyError> {
        let response = self
            .client
            .get(url)
            .query(params.pairs())
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        debug!(url = %response.url(), status = status.as_u16(), "notification sent");

        if status.is_success() {
            Ok(())
        } else {
            Err(NotifyError::Status(status.as_u16()))
        }
    }
}

/// A notification captured by [`RecordingNotificationSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub url: String,
    pub params: NotificationParams,
}

/// Sink that records calls instead of sending them. Intended for tests/dev.
#[derive(Debug, Default)]
pub struct RecordingNotificationSink {
    sent: Mutex<Vec<SentNotification>>,
    failure: Mutex<Option<NotifyError>>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `error` (still recorded).
    pub fn fail_with(&self, error: NotifyError) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = Some(error);
        }
    }

    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn notify(&self, url: &str, params: &NotificationParams) -> Result<(), NotifyError> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentNotification {
                url: url.to_string(),
                params: params.clone(),
            });
        }

        match self.failure.lock() {
            Ok(failure) => failure.clone().map_or(Ok(()), Err),
            Err(_) => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl<T: NotificationSink + ?Sized> NotificationSink for std::sync::Arc<T> {
    async fn notify(&self, url: &str, params: &NotificationParams) -> Result<(), NotifyError> {
        (**self).notify(url, params).await
    }
}
