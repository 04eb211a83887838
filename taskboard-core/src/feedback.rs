//! User-facing notifications and progress indicators.
//!
//! The host supplies a `Feedback` implementation. Core code never talks to
//! it directly: it goes through `Notifier`, which logs and drops failures so
//! a broken feedback surface cannot fail a data operation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NotificationLevel {
    Success,
    Error,
    Warning,
    Info,
}

impl NotificationLevel {
    pub fn default_duration(self) -> Duration {
        match self {
            Self::Success | Self::Info => Duration::from_millis(3000),
            Self::Error => Duration::from_millis(5000),
            Self::Warning => Duration::from_millis(4000),
        }
    }

    fn log_level(self) -> log::Level {
        match self {
            Self::Success | Self::Info => log::Level::Info,
            Self::Warning => log::Level::Warn,
            Self::Error => log::Level::Error,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub duration: Duration,
}

impl Notification {
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            duration: level.default_duration(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FeedbackError {
    #[error("Feedback surface unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Feedback: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), FeedbackError>;

    async fn start_loading(&self, operation_id: &str, message: &str) -> Result<(), FeedbackError>;

    /// `percent` is already clamped to 0-100.
    async fn update_progress(
        &self,
        operation_id: &str,
        message: &str,
        percent: u8,
    ) -> Result<(), FeedbackError>;

    async fn stop_loading(&self, operation_id: &str) -> Result<(), FeedbackError>;
}

/// Routes feedback to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFeedback;

#[async_trait]
impl Feedback for LogFeedback {
    async fn notify(&self, notification: Notification) -> Result<(), FeedbackError> {
        log::log!(
            target: "taskboard.feedback",
            notification.level.log_level(),
            "{}",
            notification.message
        );
        Ok(())
    }

    async fn start_loading(&self, operation_id: &str, message: &str) -> Result<(), FeedbackError> {
        log::info!(target: "taskboard.feedback", "[{}] {}", operation_id, message);
        Ok(())
    }

    async fn update_progress(
        &self,
        operation_id: &str,
        message: &str,
        percent: u8,
    ) -> Result<(), FeedbackError> {
        log::info!(
            target: "taskboard.feedback",
            "[{}] {} ({}%)",
            operation_id,
            message,
            percent
        );
        Ok(())
    }

    async fn stop_loading(&self, operation_id: &str) -> Result<(), FeedbackError> {
        log::debug!(target: "taskboard.feedback", "[{}] done", operation_id);
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFeedback;

#[async_trait]
impl Feedback for NoopFeedback {
    async fn notify(&self, _notification: Notification) -> Result<(), FeedbackError> {
        Ok(())
    }

    async fn start_loading(&self, _operation_id: &str, _message: &str) -> Result<(), FeedbackError> {
        Ok(())
    }

    async fn update_progress(
        &self,
        _operation_id: &str,
        _message: &str,
        _percent: u8,
    ) -> Result<(), FeedbackError> {
        Ok(())
    }

    async fn stop_loading(&self, _operation_id: &str) -> Result<(), FeedbackError> {
        Ok(())
    }
}

/// Fire-and-forget handle over a `Feedback` surface.
#[derive(Clone)]
pub struct Notifier {
    inner: Arc<dyn Feedback>,
}

impl Notifier {
    pub fn new(inner: Arc<dyn Feedback>) -> Self {
        Self { inner }
    }

    pub fn noop() -> Self {
        Self::new(Arc::new(NoopFeedback))
    }

    pub fn log() -> Self {
        Self::new(Arc::new(LogFeedback))
    }

    pub async fn notify(&self, notification: Notification) {
        let level = notification.level;
        if let Err(e) = self.inner.notify(notification).await {
            dropped("notify", &format!("{:?}", level), &e);
        }
    }

    pub async fn success(&self, message: impl Into<String>) {
        self.notify(Notification::new(NotificationLevel::Success, message))
            .await;
    }

    pub async fn error(&self, message: impl Into<String>) {
        self.notify(Notification::new(NotificationLevel::Error, message))
            .await;
    }

    pub async fn warning(&self, message: impl Into<String>) {
        self.notify(Notification::new(NotificationLevel::Warning, message))
            .await;
    }

    /// Warning with an explicit display duration.
    pub async fn warning_for(&self, message: impl Into<String>, duration: Duration) {
        let mut notification = Notification::new(NotificationLevel::Warning, message);
        notification.duration = duration;
        self.notify(notification).await;
    }

    pub async fn info(&self, message: impl Into<String>) {
        self.notify(Notification::new(NotificationLevel::Info, message))
            .await;
    }

    pub async fn start_loading(&self, operation_id: &str, message: &str) {
        if let Err(e) = self.inner.start_loading(operation_id, message).await {
            dropped("start_loading", operation_id, &e);
        }
    }

    pub async fn update_progress(&self, operation_id: &str, message: &str, percent: u32) {
        let percent = percent.min(100) as u8;
        if let Err(e) = self
            .inner
            .update_progress(operation_id, message, percent)
            .await
        {
            dropped("update_progress", operation_id, &e);
        }
    }

    pub async fn stop_loading(&self, operation_id: &str) {
        if let Err(e) = self.inner.stop_loading(operation_id).await {
            dropped("stop_loading", operation_id, &e);
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::log()
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier").finish_non_exhaustive()
    }
}

fn dropped(call: &str, subject: &str, error: &FeedbackError) {
    log::warn!(
        target: "taskboard.feedback",
        "Feedback {} for {} dropped: {}",
        call,
        subject,
        error
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FeedbackEvent, RecordingFeedback};

    struct BrokenFeedback;

    #[async_trait]
    impl Feedback for BrokenFeedback {
        async fn notify(&self, _n: Notification) -> Result<(), FeedbackError> {
            Err(FeedbackError::Unavailable("closed".into()))
        }
        async fn start_loading(&self, _id: &str, _m: &str) -> Result<(), FeedbackError> {
            Err(FeedbackError::Unavailable("closed".into()))
        }
        async fn update_progress(&self, _id: &str, _m: &str, _p: u8) -> Result<(), FeedbackError> {
            Err(FeedbackError::Unavailable("closed".into()))
        }
        async fn stop_loading(&self, _id: &str) -> Result<(), FeedbackError> {
            Err(FeedbackError::Unavailable("closed".into()))
        }
    }

    #[test]
    fn test_default_durations() {
        assert_eq!(NotificationLevel::Success.default_duration().as_millis(), 3000);
        assert_eq!(NotificationLevel::Error.default_duration().as_millis(), 5000);
        assert_eq!(NotificationLevel::Warning.default_duration().as_millis(), 4000);
        assert_eq!(NotificationLevel::Info.default_duration().as_millis(), 3000);
    }

    #[tokio::test]
    async fn test_notifier_swallows_failures() {
        let notifier = Notifier::new(Arc::new(BrokenFeedback));
        notifier.error("boom").await;
        notifier.start_loading("op", "working").await;
        notifier.update_progress("op", "half", 50).await;
        notifier.stop_loading("op").await;
    }

    #[tokio::test]
    async fn test_progress_is_clamped() {
        let recorder = Arc::new(RecordingFeedback::default());
        let notifier = Notifier::new(recorder.clone());
        notifier.update_progress("op", "over", 250).await;
        assert_eq!(
            recorder.events(),
            vec![FeedbackEvent::Progress("op".into(), "over".into(), 100)]
        );
    }
}
