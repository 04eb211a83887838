/// Tiered data recovery, emergency backups and backup retention.
///
/// `recover` walks primary data, then the newest backup, then fresh default
/// boards, stopping at the first tier that yields a usable set. Only the last
/// tier may fail the call.
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::backup::{fingerprint, parse_backup, BackupSnapshot};
use crate::error::{KanbanError, Result};
use crate::feedback::Notifier;
use crate::integrity::{ingest, ingest_value, parse_object, Ingested, RepairOptions};
use crate::service::{check_context, BoardService};
use crate::storage::keys::{
    backup_key, data_key, emergency_key, parse_backup_key, pre_restore_key, BackupKind,
};
use crate::storage::{vacant_key, KeyValueStore};
use crate::types::BoardSet;

const RECOVERY_OPERATION: &str = "data-recovery";
const RESTORE_OPERATION: &str = "restore-backup";

/// Result of one recovery tier.
#[derive(Debug, Clone)]
pub enum TierOutcome {
    Recovered(BoardSet),
    Failed(String),
}

/// A readable backup of one context.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupEntry {
    pub key: String,
    pub kind: BackupKind,
    /// Timestamp embedded in the key.
    pub taken_at: DateTime<Utc>,
    pub data: BoardSet,
    /// SHA-256 of the stored payload.
    pub digest: String,
}

pub struct RecoveryOrchestrator {
    service: Arc<BoardService>,
    notifier: Notifier,
}

impl RecoveryOrchestrator {
    pub fn new(service: Arc<BoardService>, notifier: Notifier) -> Self {
        Self { service, notifier }
    }

    /// Produce usable data for `context` from the best available source.
    pub async fn recover(&self, context: &str) -> Result<BoardSet> {
        check_context(context)?;
        self.notifier
            .start_loading(
                RECOVERY_OPERATION,
                &format!("Recovering data for '{}'...", context),
            )
            .await;
        let result = self.run_tiers(context).await;
        self.notifier.stop_loading(RECOVERY_OPERATION).await;

        if let Err(e) = &result {
            log::error!(
                target: "taskboard.recovery",
                "Recovery of context '{}' failed: {}",
                context,
                e
            );
            self.notifier
                .error(format!("Data recovery for '{}' failed: {}", context, e))
                .await;
        }
        result
    }

    async fn run_tiers(&self, context: &str) -> Result<BoardSet> {
        let _guard = self.service.lock_context(context).await;
        self.service.invalidate(context);

        self.notifier
            .update_progress(RECOVERY_OPERATION, "Checking primary data...", 10)
            .await;
        match self.from_primary(context).await {
            TierOutcome::Recovered(set) => {
                log::info!(target: "taskboard.recovery", "Context '{}' loaded from primary data", context);
                self.notifier
                    .success(format!("Data for '{}' loaded successfully.", context))
                    .await;
                return Ok(set);
            }
            TierOutcome::Failed(reason) => log::warn!(
                target: "taskboard.recovery",
                "Primary data of context '{}' unusable: {}",
                context,
                reason
            ),
        }

        self.notifier
            .update_progress(RECOVERY_OPERATION, "Looking for backups...", 40)
            .await;
        match self.from_latest_backup(context).await {
            TierOutcome::Recovered(set) => {
                self.notifier
                    .info(format!("Data for '{}' was restored from a backup.", context))
                    .await;
                return Ok(set);
            }
            TierOutcome::Failed(reason) => log::warn!(
                target: "taskboard.recovery",
                "No usable backup for context '{}': {}",
                context,
                reason
            ),
        }

        self.notifier
            .update_progress(RECOVERY_OPERATION, "Creating default boards...", 80)
            .await;
        let set = self
            .service
            .persist_locked(self.service.default_set(context), "recover")
            .await?;
        self.create_emergency_backup(&set, context).await;
        log::warn!(
            target: "taskboard.recovery",
            "Context '{}' reset to default boards",
            context
        );
        self.notifier
            .warning(format!(
                "No usable data found for '{}'. Started with default boards.",
                context
            ))
            .await;
        Ok(set)
    }

    async fn from_primary(&self, context: &str) -> TierOutcome {
        let text = match self.service.read_primary(context, "recover").await {
            Ok(Some(text)) => text,
            Ok(None) => return TierOutcome::Failed("no primary data".to_string()),
            Err(e) => return TierOutcome::Failed(e.to_string()),
        };
        let ingested = match ingest(&text, context, &self.service.repair_options(context)) {
            Ok(ingested) => ingested,
            Err(e) => return TierOutcome::Failed(format!("primary data is unreadable: {}", e)),
        };
        match ingested.repair {
            None => {
                self.service.remember(ingested.set.clone());
                TierOutcome::Recovered(ingested.set)
            }
            Some(report) if report.synthesized_defaults => {
                TierOutcome::Failed("primary data holds no usable boards".to_string())
            }
            Some(_) => match self.service.persist_locked(ingested.set, "recover").await {
                Ok(set) => TierOutcome::Recovered(set),
                Err(e) => TierOutcome::Failed(format!("saving repaired data failed: {}", e)),
            },
        }
    }

    async fn from_latest_backup(&self, context: &str) -> TierOutcome {
        let entries = match self.available_backups(context).await {
            Ok(entries) => entries,
            Err(e) => return TierOutcome::Failed(e.to_string()),
        };
        let Some(latest) = entries.into_iter().next() else {
            return TierOutcome::Failed("no backups available".to_string());
        };
        log::info!(
            target: "taskboard.recovery",
            "Recovering context '{}' from {}",
            context,
            latest.key
        );
        match self.service.persist_locked(latest.data, "recover").await {
            Ok(set) => TierOutcome::Recovered(set),
            Err(e) => TierOutcome::Failed(format!("writing back {} failed: {}", latest.key, e)),
        }
    }

    /// Store `set` as an emergency backup and a regular backup of `context`.
    /// Failures are logged and reported as `false`.
    pub async fn create_emergency_backup(&self, set: &BoardSet, context: &str) -> bool {
        let json = match BackupSnapshot::of(set).and_then(|mut snapshot| {
            snapshot.context = Some(context.to_string());
            snapshot.to_json()
        }) {
            Ok(json) => json,
            Err(e) => {
                log::error!(
                    target: "taskboard.recovery",
                    "Could not serialize emergency backup of '{}': {}",
                    context,
                    e
                );
                return false;
            }
        };

        let now = Utc::now();
        let store: &dyn KeyValueStore = &**self.service.store();
        for base in [emergency_key(context, now), backup_key(context, now)] {
            let written = match vacant_key(store, &base).await {
                Ok(key) => store.set(&key, &json).await,
                Err(e) => Err(e),
            };
            if let Err(e) = written {
                log::error!(
                    target: "taskboard.recovery",
                    "Could not write emergency backup {}: {}",
                    base,
                    e
                );
                return false;
            }
        }
        log::info!(target: "taskboard.recovery", "Emergency backup of '{}' stored", context);
        true
    }

    /// Every readable backup of `context`, newest data first.
    pub async fn available_backups(&self, context: &str) -> Result<Vec<BackupEntry>> {
        check_context(context)?;
        let store = self.service.store();
        let keys = store
            .list_keys()
            .await
            .map_err(|e| KanbanError::storage("available_backups", context, e))?;
        let options = self.service.repair_options(context);

        let mut entries = Vec::new();
        for key in keys {
            let Some((kind, taken_at)) = parse_backup_key(&key, context) else {
                continue;
            };
            let text = match store.get(&key).await {
                Ok(Some(text)) => text,
                Ok(None) => continue,
                Err(e) => {
                    log::warn!(target: "taskboard.recovery", "Skipping backup {}: {}", key, e);
                    continue;
                }
            };
            match read_backup(&text, context, &options) {
                Ok(data) => entries.push(BackupEntry {
                    digest: fingerprint(&text),
                    key,
                    kind,
                    taken_at,
                    data,
                }),
                Err(reason) => log::warn!(
                    target: "taskboard.recovery",
                    "Skipping unreadable backup {}: {}",
                    key,
                    reason
                ),
            }
        }

        entries.sort_by(|a, b| {
            b.data
                .last_modified
                .cmp(&a.data.last_modified)
                .then(b.taken_at.cmp(&a.taken_at))
        });
        Ok(entries)
    }

    /// Restore the first backup whose data was last modified strictly within
    /// the configured window of `at`. The current data is kept as a pre-restore
    /// backup first.
    pub async fn restore_from_backup(&self, context: &str, at: DateTime<Utc>) -> Result<BoardSet> {
        check_context(context)?;
        let window = self.service.config().restore_window();
        let entry = self
            .available_backups(context)
            .await?
            .into_iter()
            .find(|entry| {
                let delta = entry.data.last_modified.signed_duration_since(at);
                delta < window && delta > -window
            })
            .ok_or_else(|| {
                KanbanError::InvalidOperation(format!(
                    "No backup of '{}' found within {}s of {}",
                    context,
                    window.num_seconds(),
                    at.to_rfc3339()
                ))
            })?;

        self.notifier
            .start_loading(
                RESTORE_OPERATION,
                &format!("Restoring '{}' from {}...", context, entry.key),
            )
            .await;
        let key = entry.key.clone();
        let result = self.restore_entry(context, entry).await;
        self.notifier.stop_loading(RESTORE_OPERATION).await;

        match &result {
            Ok(_) => {
                log::info!(target: "taskboard.recovery", "Restored context '{}' from {}", context, key);
                self.notifier
                    .success(format!("Data for '{}' restored from backup.", context))
                    .await;
            }
            Err(e) => {
                log::error!(
                    target: "taskboard.recovery",
                    "Restore of context '{}' from {} failed: {}",
                    context,
                    key,
                    e
                );
                self.notifier
                    .error(format!("Restoring '{}' failed: {}", context, e))
                    .await;
            }
        }
        result
    }

    async fn restore_entry(&self, context: &str, entry: BackupEntry) -> Result<BoardSet> {
        let _guard = self.service.lock_context(context).await;
        if let Some(current) = self
            .service
            .read_primary(context, "restore_from_backup")
            .await?
        {
            self.store_pre_restore(context, &current).await?;
        }
        self.service
            .persist_locked(entry.data, "restore_from_backup")
            .await
    }

    async fn store_pre_restore(&self, context: &str, current: &str) -> Result<()> {
        let data = match parse_object(current) {
            Ok(data) => data,
            Err(e) => {
                log::warn!(
                    target: "taskboard.recovery",
                    "Current data of '{}' is unreadable, not keeping a pre-restore copy: {}",
                    context,
                    e
                );
                return Ok(());
            }
        };
        let snapshot = BackupSnapshot {
            context: Some(context.to_string()),
            data: Some(data),
            backup_date: Some(Utc::now()),
        };
        let store: &dyn KeyValueStore = &**self.service.store();
        let json = snapshot.to_json()?;
        let key = vacant_key(store, &pre_restore_key(context, Utc::now()))
            .await
            .map_err(|e| KanbanError::storage("restore_from_backup", context, e))?;
        store
            .set(&key, &json)
            .await
            .map_err(|e| KanbanError::storage("restore_from_backup", context, e))?;
        log::debug!(target: "taskboard.recovery", "Stored pre-restore copy {}", key);
        Ok(())
    }

    /// Delete backups of `context` whose key timestamp is older than
    /// `keep_days` (default: configured retention). Returns how many went.
    pub async fn cleanup_old_backups(&self, context: &str, keep_days: Option<u32>) -> Result<usize> {
        check_context(context)?;
        let keep_days = keep_days.unwrap_or(self.service.config().backup_retention_days);
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(keep_days));
        let store = self.service.store();
        let keys = store
            .list_keys()
            .await
            .map_err(|e| KanbanError::storage("cleanup_old_backups", context, e))?;

        let mut removed = 0;
        for key in keys {
            let Some((_, taken_at)) = parse_backup_key(&key, context) else {
                continue;
            };
            if taken_at >= cutoff {
                continue;
            }
            match store.remove(&key).await {
                Ok(()) => removed += 1,
                Err(e) => log::warn!(
                    target: "taskboard.recovery",
                    "Could not remove old backup {}: {}",
                    key,
                    e
                ),
            }
        }
        log::info!(
            target: "taskboard.recovery",
            "Removed {} backup(s) of '{}' older than {} day(s)",
            removed,
            context,
            keep_days
        );
        Ok(removed)
    }

    /// True when `context` has primary data or at least one backup.
    pub async fn can_recover(&self, context: &str) -> Result<bool> {
        check_context(context)?;
        if self
            .service
            .read_primary(context, "can_recover")
            .await?
            .is_some()
        {
            return Ok(true);
        }
        let keys = self
            .service
            .store()
            .list_keys()
            .await
            .map_err(|e| KanbanError::storage("can_recover", context, e))?;
        Ok(keys.iter().any(|key| parse_backup_key(key, context).is_some()))
    }

    /// Check arbitrary text as data for `context`, repairing it if needed.
    pub fn validate_and_repair(&self, context: &str, text: &str) -> Result<Ingested> {
        check_context(context)?;
        let ingested = ingest(text, context, &self.service.repair_options(context)).map_err(|e| {
            KanbanError::CorruptData {
                key: data_key(context),
                reason: e.to_string(),
            }
        })?;
        if ingested.repair.is_none() {
            log::debug!(target: "taskboard.recovery", "Data for '{}' is valid", context);
        }
        Ok(ingested)
    }
}

/// Decode a stored backup. Besides versioned snapshots, a bare board set
/// (as older emergency backups were written) is accepted.
fn read_backup(
    text: &str,
    context: &str,
    options: &RepairOptions,
) -> std::result::Result<BoardSet, String> {
    let value: Value = match parse_backup(text) {
        Ok(snapshot) => snapshot.data.unwrap_or_default(),
        Err(snapshot_error) => {
            let value = parse_object(text).map_err(|e| e.to_string())?;
            if value.get("version").is_some() {
                return Err(snapshot_error.to_string());
            }
            value
        }
    };
    let ingested = ingest_value(value, context, options).map_err(|e| e.to_string())?;
    match ingested.repair {
        Some(report) if report.synthesized_defaults => {
            Err("backup holds no usable boards".to_string())
        }
        _ => Ok(ingested.set),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::NotificationLevel;
    use crate::test_support::{recording_notifier, service_over, FeedbackEvent, FlakyStore, RecordingFeedback};
    use chrono::{Duration, SubsecRound, TimeZone};

    fn setup() -> (
        Arc<FlakyStore>,
        Arc<BoardService>,
        Arc<RecordingFeedback>,
        RecoveryOrchestrator,
    ) {
        let store = Arc::new(FlakyStore::new());
        let service = Arc::new(service_over(store.clone()));
        let (recorder, notifier) = recording_notifier();
        let recovery = RecoveryOrchestrator::new(service.clone(), notifier);
        (store, service, recorder, recovery)
    }

    fn set_at(titles: &[&str], at: DateTime<Utc>) -> BoardSet {
        let mut set = BoardSet::with_titles("ctx", titles);
        set.last_modified = at;
        set
    }

    fn snapshot_text(set: &BoardSet) -> String {
        BackupSnapshot::of(set).unwrap().to_json().unwrap()
    }

    fn titles(set: &BoardSet) -> Vec<&str> {
        set.boards.iter().map(|b| b.title.as_str()).collect()
    }

    #[tokio::test]
    async fn test_corrupt_primary_recovers_latest_backup() {
        let (store, service, recorder, recovery) = setup();
        let now = Utc::now();
        store.inner.set("kanban_data_ctx", "{broken").await.unwrap();
        let older = set_at(&["Old"], now - Duration::hours(2));
        store
            .inner
            .set(&backup_key("ctx", now - Duration::hours(2)), &snapshot_text(&older))
            .await
            .unwrap();
        // key stamp is older, but the data is newer
        let newer = set_at(&["New"], now - Duration::hours(1));
        store
            .inner
            .set(&emergency_key("ctx", now - Duration::hours(3)), &snapshot_text(&newer))
            .await
            .unwrap();

        let set = recovery.recover("ctx").await.unwrap();
        assert_eq!(titles(&set), vec!["New"]);

        service.clear_cache();
        assert_eq!(titles(&service.load_data("ctx").await.unwrap()), vec!["New"]);

        let events = recorder.events();
        assert!(matches!(
            events.first(),
            Some(FeedbackEvent::StartLoading(op, _)) if op == "data-recovery"
        ));
        assert_eq!(
            events.last(),
            Some(&FeedbackEvent::StopLoading("data-recovery".to_string()))
        );
        assert_eq!(recorder.messages(NotificationLevel::Info).len(), 1);
    }

    #[tokio::test]
    async fn test_no_backups_falls_back_to_defaults() {
        let (store, _, recorder, recovery) = setup();
        store.inner.set("kanban_data_ctx", "{broken").await.unwrap();

        let set = recovery.recover("ctx").await.unwrap();
        assert_eq!(titles(&set), vec!["To Do", "In Progress", "Done"]);

        let keys = store.list_keys().await.unwrap();
        assert!(keys.iter().any(|k| k.starts_with("emergency_backup_ctx_")));
        assert!(keys.iter().any(|k| k.starts_with("kanban_backup_ctx_")));
        assert_eq!(recovery.available_backups("ctx").await.unwrap().len(), 2);
        assert_eq!(recorder.messages(NotificationLevel::Warning).len(), 1);
    }

    #[tokio::test]
    async fn test_valid_primary_is_used() {
        let (store, service, recorder, recovery) = setup();
        service.create_board("ctx", "Extra").await.unwrap();
        service.clear_cache();

        let set = recovery.recover("ctx").await.unwrap();
        assert_eq!(set.boards.last().unwrap().title, "Extra");
        assert_eq!(recorder.messages(NotificationLevel::Success).len(), 1);
        assert_eq!(store.list_keys().await.unwrap(), vec!["kanban_data_ctx"]);
        assert_eq!(service.cached_contexts(), vec!["ctx"]);
    }

    #[tokio::test]
    async fn test_fatal_when_defaults_cannot_be_saved() {
        let (store, _, recorder, recovery) = setup();
        store.fail_next_sets(10);
        let err = recovery.recover("ctx").await.unwrap_err();
        assert!(matches!(err, KanbanError::StorageFailure { operation: "recover", .. }));
        assert_eq!(recorder.messages(NotificationLevel::Error).len(), 1);
        assert_eq!(
            recorder.events().last(),
            Some(&FeedbackEvent::StopLoading("data-recovery".to_string()))
        );
    }

    #[tokio::test]
    async fn test_available_backups_filters_and_orders() {
        let (store, _, _, recovery) = setup();
        let t = |h| Utc.with_ymd_and_hms(2024, 3, 9, h, 0, 0).unwrap();

        let regular = snapshot_text(&set_at(&["Regular"], t(10)));
        store.inner.set(&backup_key("ctx", t(10)), &regular).await.unwrap();
        let bare = serde_json::to_string(&set_at(&["Bare"], t(12))).unwrap();
        store.inner.set(&pre_restore_key("ctx", t(12)), &bare).await.unwrap();
        store.inner.set(&emergency_key("ctx", t(13)), "garbage").await.unwrap();
        store
            .inner
            .set(&emergency_key("ctx_b", t(14)), &snapshot_text(&set_at(&["Other"], t(14))))
            .await
            .unwrap();

        let entries = recovery.available_backups("ctx").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, BackupKind::PreRestore);
        assert_eq!(titles(&entries[0].data), vec!["Bare"]);
        assert_eq!(entries[1].kind, BackupKind::Regular);
        assert_eq!(entries[1].taken_at, t(10));
        assert_eq!(entries[1].digest, fingerprint(&regular));
    }

    #[tokio::test]
    async fn test_restore_from_backup_within_window() {
        let (store, service, recorder, recovery) = setup();
        service.create_board("ctx", "Current").await.unwrap();
        let at = (Utc::now() - Duration::days(1)).trunc_subsecs(0);
        store
            .inner
            .set(&backup_key("ctx", at), &snapshot_text(&set_at(&["Restored"], at)))
            .await
            .unwrap();

        let set = recovery
            .restore_from_backup("ctx", at + Duration::seconds(30))
            .await
            .unwrap();
        assert_eq!(titles(&set), vec!["Restored"]);

        let entries = recovery.available_backups("ctx").await.unwrap();
        let pre_restore = entries
            .iter()
            .find(|e| e.kind == BackupKind::PreRestore)
            .unwrap();
        assert!(pre_restore.data.boards.iter().any(|b| b.title == "Current"));
        assert!(recorder.events().contains(&FeedbackEvent::StopLoading("restore-backup".to_string())));

        let err = recovery
            .restore_from_backup("ctx", at + Duration::minutes(10))
            .await
            .unwrap_err();
        assert!(matches!(err, KanbanError::InvalidOperation(_)));

        let window = service.config().restore_window();
        for edge in [at + window, at - window] {
            assert!(matches!(
                recovery.restore_from_backup("ctx", edge).await,
                Err(KanbanError::InvalidOperation(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_backups_in_the_same_second_are_all_kept() {
        let (store, _, _, recovery) = setup();
        let set = BoardSet::default_for("ctx");
        assert!(recovery.create_emergency_backup(&set, "ctx").await);
        assert!(recovery.create_emergency_backup(&set, "ctx").await);
        assert!(recovery.create_emergency_backup(&set, "ctx").await);

        assert_eq!(store.list_keys().await.unwrap().len(), 6);
        let entries = recovery.available_backups("ctx").await.unwrap();
        assert_eq!(entries.len(), 6);
        assert_eq!(
            entries.iter().filter(|e| e.kind == BackupKind::Emergency).count(),
            3
        );
    }

    #[tokio::test]
    async fn test_pre_restore_copies_are_not_seen_by_similar_contexts() {
        let (store, _, _, recovery) = setup();
        let old = Utc::now() - Duration::days(40);
        let text = snapshot_text(&set_at(&["Safety"], old));
        store.inner.set(&pre_restore_key("ctx", old), &text).await.unwrap();

        let similar = "ctx_pre_restore";
        assert!(recovery.available_backups(similar).await.unwrap().is_empty());
        assert!(!recovery.can_recover(similar).await.unwrap());
        assert_eq!(recovery.cleanup_old_backups(similar, None).await.unwrap(), 0);

        let entries = recovery.available_backups("ctx").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, BackupKind::PreRestore);
    }

    #[tokio::test]
    async fn test_cleanup_old_backups() {
        let (store, _, _, recovery) = setup();
        let old = Utc::now() - Duration::days(40);
        let fresh = Utc::now() - Duration::days(1);
        for key in [
            backup_key("ctx", old),
            emergency_key("ctx", old),
            pre_restore_key("ctx", old),
            backup_key("ctx", fresh),
            emergency_key("ctx_b", old),
            data_key("ctx"),
        ] {
            store.inner.set(&key, "x").await.unwrap();
        }

        assert_eq!(recovery.cleanup_old_backups("ctx", None).await.unwrap(), 3);
        let keys = store.list_keys().await.unwrap();
        assert!(keys.contains(&backup_key("ctx", fresh)));
        assert!(keys.contains(&emergency_key("ctx_b", old)));
        assert!(keys.contains(&data_key("ctx")));

        assert_eq!(recovery.cleanup_old_backups("ctx", Some(0)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_can_recover() {
        let (store, service, _, recovery) = setup();
        assert!(!recovery.can_recover("ctx").await.unwrap());
        store
            .inner
            .set(&backup_key("ctx", Utc::now()), "x")
            .await
            .unwrap();
        assert!(recovery.can_recover("ctx").await.unwrap());

        service.create_board("other", "X").await.unwrap();
        assert!(recovery.can_recover("other").await.unwrap());
    }

    #[tokio::test]
    async fn test_emergency_backup_reports_failure() {
        let (store, _, _, recovery) = setup();
        let set = BoardSet::default_for("ctx");
        store.fail_next_sets(1);
        assert!(!recovery.create_emergency_backup(&set, "ctx").await);
        assert!(recovery.create_emergency_backup(&set, "ctx").await);
        assert!(!recovery.available_backups("ctx").await.unwrap().is_empty());
    }

    #[test]
    fn test_validate_and_repair() {
        let (_, _, _, recovery) = setup();
        let valid = serde_json::to_string(&BoardSet::default_for("ctx")).unwrap();
        assert!(recovery.validate_and_repair("ctx", &valid).unwrap().repair.is_none());

        let gappy = r#"{"boards":[{"id":"b","title":"T","order":5}]}"#;
        let ingested = recovery.validate_and_repair("ctx", gappy).unwrap();
        assert!(ingested.repair.is_some());
        assert_eq!(ingested.set.boards[0].order, 0);

        assert!(matches!(
            recovery.validate_and_repair("ctx", "[1]"),
            Err(KanbanError::CorruptData { .. })
        ));
    }
}
