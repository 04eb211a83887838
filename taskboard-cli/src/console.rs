use async_trait::async_trait;
use std::io::Write;
use taskboard_core::feedback::FeedbackError;
use taskboard_core::{Feedback, Notification, NotificationLevel};

/// Feedback surface that prints to stderr, keeping stdout for command output.
pub struct ConsoleFeedback;

fn label(level: NotificationLevel) -> &'static str {
    match level {
        NotificationLevel::Success => "ok",
        NotificationLevel::Error => "error",
        NotificationLevel::Warning => "warning",
        NotificationLevel::Info => "info",
    }
}

fn emit(line: String) -> Result<(), FeedbackError> {
    let mut stderr = std::io::stderr().lock();
    writeln!(stderr, "{}", line).map_err(|e| FeedbackError::Unavailable(e.to_string()))
}

#[async_trait]
impl Feedback for ConsoleFeedback {
    async fn notify(&self, notification: Notification) -> Result<(), FeedbackError> {
        emit(format!("[{}] {}", label(notification.level), notification.message))
    }

    async fn start_loading(&self, _operation_id: &str, message: &str) -> Result<(), FeedbackError> {
        emit(format!("... {}", message))
    }

    async fn update_progress(
        &self,
        _operation_id: &str,
        message: &str,
        percent: u8,
    ) -> Result<(), FeedbackError> {
        emit(format!("... {:>3}% {}", percent, message))
    }

    async fn stop_loading(&self, operation_id: &str) -> Result<(), FeedbackError> {
        log::debug!(target: "taskboard.cli", "{} finished", operation_id);
        Ok(())
    }
}
