//! Shared fakes for the crate's unit tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::config::CoreConfig;
use crate::feedback::{Feedback, FeedbackError, Notification, NotificationLevel, Notifier};
use crate::service::BoardService;
use crate::storage::memory::MemoryStore;
use crate::storage::{KeyValueStore, StorageError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackEvent {
    Notify(NotificationLevel, String),
    StartLoading(String, String),
    Progress(String, String, u8),
    StopLoading(String),
}

#[derive(Debug, Default)]
pub struct RecordingFeedback {
    events: Mutex<Vec<FeedbackEvent>>,
}

impl RecordingFeedback {
    pub fn events(&self) -> Vec<FeedbackEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn messages(&self, level: NotificationLevel) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                FeedbackEvent::Notify(l, m) if l == level => Some(m),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: FeedbackEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl Feedback for RecordingFeedback {
    async fn notify(&self, notification: Notification) -> Result<(), FeedbackError> {
        self.push(FeedbackEvent::Notify(notification.level, notification.message));
        Ok(())
    }

    async fn start_loading(&self, operation_id: &str, message: &str) -> Result<(), FeedbackError> {
        self.push(FeedbackEvent::StartLoading(operation_id.into(), message.into()));
        Ok(())
    }

    async fn update_progress(
        &self,
        operation_id: &str,
        message: &str,
        percent: u8,
    ) -> Result<(), FeedbackError> {
        self.push(FeedbackEvent::Progress(operation_id.into(), message.into(), percent));
        Ok(())
    }

    async fn stop_loading(&self, operation_id: &str) -> Result<(), FeedbackError> {
        self.push(FeedbackEvent::StopLoading(operation_id.into()));
        Ok(())
    }
}

/// Memory store that can be told to fail.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    /// Number of upcoming `set` calls that fail.
    fail_sets: AtomicU32,
    /// Number of upcoming `get` calls that fail.
    fail_gets: AtomicU32,
    /// Every `set` whose key contains one of these fails.
    poisoned_keys: Mutex<Vec<String>>,
    sets: AtomicU32,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_sets(&self, n: u32) {
        self.fail_sets.store(n, Ordering::SeqCst);
    }

    pub fn fail_next_gets(&self, n: u32) {
        self.fail_gets.store(n, Ordering::SeqCst);
    }

    pub fn poison(&self, key_part: &str) {
        self.poisoned_keys.lock().unwrap().push(key_part.to_string());
    }

    pub fn set_calls(&self) -> u32 {
        self.sets.load(Ordering::SeqCst)
    }

    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        // let concurrent callers interleave here
        tokio::task::yield_now().await;
        let poisoned = self
            .poisoned_keys
            .lock()
            .unwrap()
            .iter()
            .any(|p| key.contains(p.as_str()));
        if poisoned || Self::take(&self.fail_sets) {
            return Err(StorageError::Backend(format!("write to {} refused", key)));
        }
        self.inner.set(key, value).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        if Self::take(&self.fail_gets) {
            return Err(StorageError::Backend(format!("read of {} refused", key)));
        }
        self.inner.get(key).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.inner.remove(key).await
    }

    async fn list_keys(&self) -> Result<Vec<String>, StorageError> {
        self.inner.list_keys().await
    }
}

pub fn service_over(store: Arc<dyn KeyValueStore>) -> BoardService {
    BoardService::new(store, CoreConfig::default())
}

pub fn recording_notifier() -> (Arc<RecordingFeedback>, Notifier) {
    let recorder = Arc::new(RecordingFeedback::default());
    let notifier = Notifier::new(recorder.clone());
    (recorder, notifier)
}
