//! Versioned backup snapshots, whole-store export and import.
//!
//! Both snapshot formats are internally tagged by `version`. Only `"1.0"` is
//! understood; anything else is rejected before any data is touched.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{KanbanError, Result};
use crate::integrity::{ingest_value, parse_object};
use crate::service::{check_context, BoardService};
use crate::storage::keys::{backup_key, data_key};
use crate::storage::{vacant_key, KeyValueStore};
use crate::types::BoardSet;

pub const SNAPSHOT_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "version")]
pub enum BackupEnvelope {
    #[serde(rename = "1.0")]
    V1(BackupSnapshot),
}

/// One context's data plus where and when it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSnapshot {
    #[serde(default)]
    pub context: Option<String>,
    /// Kept as raw JSON so damaged payloads can still be repaired.
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub backup_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "version")]
pub enum ExportEnvelope {
    #[serde(rename = "1.0")]
    V1(ExportSnapshot),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
    #[serde(default)]
    pub export_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub contexts: Option<BTreeMap<String, Value>>,
}

impl BackupSnapshot {
    pub fn of(set: &BoardSet) -> Result<Self> {
        Ok(Self {
            context: Some(set.context.clone()),
            data: Some(serde_json::to_value(set)?),
            backup_date: Some(Utc::now()),
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&BackupEnvelope::V1(self.clone()))?)
    }

    /// The data payload, which must be a JSON object.
    pub fn payload(&self) -> Result<&Value> {
        match &self.data {
            Some(data) if data.is_object() => Ok(data),
            _ => Err(KanbanError::InvalidSnapshot(
                "Backup snapshot has no board data".to_string(),
            )),
        }
    }
}

/// Hex SHA-256 of a stored payload, for telling backups apart.
pub fn fingerprint(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Check the `version` tag before decoding so unknown versions get a
/// precise message instead of a serde variant error.
fn check_version(value: &Value, kind: &str) -> Result<()> {
    match value.get("version") {
        Some(Value::String(v)) if v == SNAPSHOT_VERSION => Ok(()),
        Some(Value::String(v)) => Err(KanbanError::InvalidSnapshot(format!(
            "Unsupported {} version '{}'",
            kind, v
        ))),
        Some(_) => Err(KanbanError::InvalidSnapshot(format!(
            "{} version must be a string",
            kind
        ))),
        None => Err(KanbanError::InvalidSnapshot(format!(
            "{} has no version",
            kind
        ))),
    }
}

fn snapshot_value(text: &str, kind: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Err(KanbanError::InvalidSnapshot(format!("{} is empty", kind)));
    }
    let value = parse_object(text)
        .map_err(|e| KanbanError::InvalidSnapshot(format!("{} is not readable: {}", kind, e)))?;
    check_version(&value, kind)?;
    Ok(value)
}

pub fn parse_backup(text: &str) -> Result<BackupSnapshot> {
    let value = snapshot_value(text, "Backup snapshot")?;
    let BackupEnvelope::V1(snapshot) = serde_json::from_value::<BackupEnvelope>(value)
        .map_err(|e| KanbanError::InvalidSnapshot(format!("Backup snapshot is malformed: {}", e)))?;
    snapshot.payload()?;
    Ok(snapshot)
}

pub fn parse_export(text: &str) -> Result<ExportSnapshot> {
    let value = snapshot_value(text, "Export snapshot")?;
    let ExportEnvelope::V1(snapshot) = serde_json::from_value::<ExportEnvelope>(value)
        .map_err(|e| KanbanError::InvalidSnapshot(format!("Export snapshot is malformed: {}", e)))?;
    if snapshot.contexts.is_none() {
        return Err(KanbanError::InvalidSnapshot(
            "Export snapshot has no contexts".to_string(),
        ));
    }
    Ok(snapshot)
}

pub struct BackupManager {
    service: Arc<BoardService>,
}

impl BackupManager {
    pub fn new(service: Arc<BoardService>) -> Self {
        Self { service }
    }

    /// Pretty JSON backup of one context's current data.
    pub async fn create_backup(&self, context: &str) -> Result<String> {
        let set = self.service.load_data(context).await?;
        BackupSnapshot::of(&set)?.to_json()
    }

    /// Persist a backup under the regular backup key and return the key.
    pub async fn store_backup(&self, context: &str) -> Result<String> {
        let json = self.create_backup(context).await?;
        let store: &dyn KeyValueStore = &**self.service.store();
        let key = vacant_key(store, &backup_key(context, Utc::now()))
            .await
            .map_err(|e| KanbanError::storage("store_backup", context, e))?;
        store
            .set(&key, &json)
            .await
            .map_err(|e| KanbanError::storage("store_backup", context, e))?;
        log::info!(target: "taskboard.backup", "Stored backup {}", key);
        Ok(key)
    }

    /// Replace `context`'s data with a backup snapshot. The snapshot's own
    /// context is ignored; invalid data is repaired before it is saved.
    pub async fn restore_backup(&self, context: &str, snapshot: &str) -> Result<BoardSet> {
        check_context(context)?;
        let backup = parse_backup(snapshot)?;
        let set = self.prepare(context, backup.payload()?.clone())?;
        let restored = self.service.replace_data(set).await?;
        log::info!(
            target: "taskboard.backup",
            "Restored context '{}' from backup of {}",
            context,
            backup
                .backup_date
                .map(|d| d.to_rfc3339())
                .unwrap_or_else(|| "unknown date".to_string())
        );
        Ok(restored)
    }

    /// Every known context in one snapshot.
    pub async fn export_all(&self) -> Result<String> {
        let mut contexts = BTreeMap::new();
        for context in self.service.known_contexts().await? {
            let set = self.service.load_data(&context).await?;
            contexts.insert(context, serde_json::to_value(&set)?);
        }
        let envelope = ExportEnvelope::V1(ExportSnapshot {
            export_date: Some(Utc::now()),
            contexts: Some(contexts),
        });
        Ok(serde_json::to_string_pretty(&envelope)?)
    }

    /// Import every context of an export snapshot, or none of them.
    ///
    /// All contexts are decoded and repaired before the first write. If a
    /// write fails, contexts already written are put back to what they held
    /// before the import.
    pub async fn import_all(&self, snapshot: &str) -> Result<Vec<String>> {
        let export = parse_export(snapshot)?;
        let label = export
            .export_date
            .map(|d| d.to_rfc3339())
            .unwrap_or_else(|| "unknown date".to_string());

        let mut staged = Vec::new();
        for (context, data) in export.contexts.unwrap_or_default() {
            if context.trim().is_empty() {
                return Err(KanbanError::InvalidSnapshot(
                    "Export snapshot contains a blank context".to_string(),
                ));
            }
            if !data.is_object() {
                return Err(KanbanError::InvalidSnapshot(format!(
                    "Context '{}' in export snapshot has no board data",
                    context
                )));
            }
            staged.push(self.prepare(&context, data)?);
        }

        // BTreeMap iteration keeps lock order stable across callers.
        let mut guards = Vec::with_capacity(staged.len());
        for set in &staged {
            guards.push(self.service.lock_context(&set.context).await);
        }

        let mut previous = Vec::with_capacity(staged.len());
        for set in &staged {
            let prior = self
                .service
                .read_primary(&set.context, "import_all")
                .await
                .map_err(|e| import_failed(&label, e))?;
            previous.push(prior);
        }

        let mut imported = Vec::with_capacity(staged.len());
        for set in staged {
            let context = set.context.clone();
            if let Err(e) = self.service.persist_locked(set, "import_all").await {
                log::error!(
                    target: "taskboard.backup",
                    "Import of context '{}' failed, rolling back {} context(s): {}",
                    context,
                    imported.len(),
                    e
                );
                self.roll_back(&imported, &previous).await;
                return Err(import_failed(&label, e));
            }
            imported.push(context);
        }
        drop(guards);

        log::info!(
            target: "taskboard.backup",
            "Imported {} context(s) from snapshot of {}",
            imported.len(),
            label
        );
        Ok(imported)
    }

    pub async fn available_contexts(&self) -> Result<Vec<String>> {
        self.service.known_contexts().await
    }

    /// Force the target context, then keep valid data or repair it.
    fn prepare(&self, context: &str, data: Value) -> Result<BoardSet> {
        let mut set = ingest_value(data, context, &self.service.repair_options(context))
            .map_err(|e| KanbanError::InvalidSnapshot(e.to_string()))?
            .set;
        set.touch();
        Ok(set)
    }

    /// Put `contexts[i]` back to `previous[i]`. Caller holds their locks.
    async fn roll_back(&self, contexts: &[String], previous: &[Option<String>]) {
        for (context, prior) in contexts.iter().zip(previous) {
            let outcome = match prior {
                Some(text) => self
                    .service
                    .store()
                    .set(&data_key(context), text)
                    .await
                    .map_err(|e| KanbanError::storage("import_rollback", context, e)),
                None => self.service.remove_locked(context, "import_rollback").await,
            };
            self.service.invalidate(context);
            if let Err(e) = outcome {
                log::error!(
                    target: "taskboard.backup",
                    "Rollback of context '{}' failed: {}",
                    context,
                    e
                );
            }
        }
    }
}

fn import_failed(snapshot: &str, source: KanbanError) -> KanbanError {
    KanbanError::ImportFailed {
        snapshot: snapshot.to_string(),
        source: Box::new(source),
    }
}
