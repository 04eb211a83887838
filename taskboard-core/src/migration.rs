/// Upgrades of stored data and context initialization.
///
/// Migration works on the raw stored JSON rather than the cached set, so it
/// sees exactly what older writers left behind: PascalCase fields, drifted
/// card links, order gaps and unset creation dates.
use std::sync::Arc;

use serde_json::Value;

use crate::error::{KanbanError, Result};
use crate::integrity::{parse_object, repair, RawBoardSet, RepairOptions, ValidationIssue, ValidationKind};
use crate::service::{check_context, BoardService};
use crate::storage::keys::data_key;
use crate::types::{clamp_text, BoardSet, MAX_BOARD_TITLE_LEN};

pub struct Migrator {
    service: Arc<BoardService>,
}

impl Migrator {
    pub fn new(service: Arc<BoardService>) -> Self {
        Self { service }
    }

    /// Bring a context's stored data up to the current shape. Returns
    /// whether anything had to change; data is only written when it did.
    pub async fn migrate_context(&self, context: &str) -> Result<bool> {
        check_context(context)?;
        let _guard = self.service.lock_context(context).await;

        let Some(text) = self.service.read_primary(context, "migrate_context").await? else {
            return Ok(false);
        };
        let value = parse_object(&text).map_err(|e| KanbanError::CorruptData {
            key: data_key(context),
            reason: e.to_string(),
        })?;

        let mut raw = RawBoardSet::from_value(&value);
        raw.context = Some(context.to_string());
        let options = RepairOptions::migration()
            .with_context(context)
            .with_default_titles(self.service.config().titles_for(context));
        let mut migrated = repair(&raw, &options);
        if raw.boards.is_empty() {
            // an empty board list is valid data, not something to fill in
            migrated.boards.clear();
        }

        if is_current_shape(&value) && RawBoardSet::from(&migrated) == raw {
            log::debug!(target: "taskboard.migration", "Context '{}' is up to date", context);
            return Ok(false);
        }

        self.service
            .persist_locked(migrated, "migrate_context")
            .await?;
        log::info!(target: "taskboard.migration", "Migrated context '{}'", context);
        Ok(true)
    }

    /// Create a context's boards if it has no data yet. `titles` overrides
    /// the configured template. Returns whether data was created.
    pub async fn initialize_context(&self, context: &str, titles: Option<&[String]>) -> Result<bool> {
        check_context(context)?;
        let board_titles = self.board_titles(context, titles)?;
        let _guard = self.service.lock_context(context).await;
        if self
            .service
            .read_primary(context, "initialize_context")
            .await?
            .is_some()
        {
            return Ok(false);
        }
        self.service
            .persist_locked(
                BoardSet::with_titles(context, &board_titles),
                "initialize_context",
            )
            .await?;
        log::info!(
            target: "taskboard.migration",
            "Initialized context '{}' with {} board(s)",
            context,
            board_titles.len()
        );
        Ok(true)
    }

    /// Drop whatever a context holds and start over from its template.
    pub async fn clean_and_reinitialize(&self, context: &str) -> Result<BoardSet> {
        check_context(context)?;
        let board_titles = self.board_titles(context, None)?;
        let _guard = self.service.lock_context(context).await;
        self.service
            .remove_locked(context, "clean_and_reinitialize")
            .await?;
        log::warn!(
            target: "taskboard.migration",
            "Cleared data of context '{}', reinitializing",
            context
        );
        self.service
            .persist_locked(
                BoardSet::with_titles(context, &board_titles),
                "clean_and_reinitialize",
            )
            .await
    }

    fn board_titles(&self, context: &str, custom: Option<&[String]>) -> Result<Vec<String>> {
        let source = match custom {
            Some(titles) if !titles.is_empty() => titles,
            _ => self.service.config().titles_for(context),
        };
        let mut titles = Vec::with_capacity(source.len());
        let mut issues = Vec::new();
        for title in source {
            let trimmed = title.trim();
            if trimmed.is_empty() || clamp_text(trimmed, MAX_BOARD_TITLE_LEN) != trimmed {
                issues.push(ValidationIssue {
                    kind: ValidationKind::InvalidBoardTitle,
                    message: format!(
                        "Board title must be 1-{} non-blank characters: {:?}",
                        MAX_BOARD_TITLE_LEN, title
                    ),
                    entity_id: None,
                });
            } else {
                titles.push(trimmed.to_string());
            }
        }
        if !issues.is_empty() {
            return Err(KanbanError::validation(
                format!("Board titles for context '{}' are invalid", context),
                issues,
            ));
        }
        Ok(titles)
    }
}

/// True when `value` carries the current (camelCase, fully populated) shape.
fn is_current_shape(value: &Value) -> bool {
    serde_json::from_value::<BoardSet>(value.clone()).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::integrity::validate;
    use crate::storage::memory::MemoryStore;
    use crate::storage::KeyValueStore;
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn setup() -> (Arc<MemoryStore>, Arc<BoardService>, Migrator) {
        let store = Arc::new(MemoryStore::new());
        let service = Arc::new(BoardService::new(store.clone(), CoreConfig::default()));
        (store, service.clone(), Migrator::new(service))
    }

    fn legacy() -> String {
        json!({
            "Context": "ctx",
            "Boards": [
                { "Id": "b1", "Title": "Todo", "Order": 4, "CreatedAt": "0001-01-01T00:00:00",
                  "Cards": [
                      { "Id": "c1", "Title": "drifted", "BoardId": "b9", "Order": 3 },
                      { "Id": "c2", "Title": "ok", "BoardId": "b1", "Order": 1,
                        "CreatedAt": "2024-01-01T00:00:00Z" }
                  ] },
                { "Id": "b2", "Title": "Done", "Order": 9, "CreatedAt": "2024-01-01T00:00:00Z" }
            ]
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_migrates_legacy_data_once() {
        let (store, service, migrator) = setup();
        store.set("kanban_data_ctx", &legacy()).await.unwrap();

        assert!(migrator.migrate_context("ctx").await.unwrap());
        let set = service.load_data("ctx").await.unwrap();
        assert!(validate(&set).valid);
        let b1 = set.board("b1").unwrap();
        assert_eq!(b1.order, 0);
        assert!(b1.created_at < Utc::now() - Duration::hours(23));
        let titles: Vec<&str> = b1.cards.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["ok", "drifted"]);
        assert!(b1.cards.iter().all(|c| c.board_id == "b1"));

        assert!(!migrator.migrate_context("ctx").await.unwrap());
    }

    #[tokio::test]
    async fn test_absent_and_current_data_are_left_alone() {
        let (store, service, migrator) = setup();
        assert!(!migrator.migrate_context("ctx").await.unwrap());
        assert!(store.is_empty().await);

        service.create_board("ctx", "Extra").await.unwrap();
        let before = store.get("kanban_data_ctx").await.unwrap();
        assert!(!migrator.migrate_context("ctx").await.unwrap());
        assert_eq!(store.get("kanban_data_ctx").await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_empty_board_list_stays_empty() {
        let (store, service, migrator) = setup();
        store
            .set("kanban_data_ctx", r#"{"Context":"ctx","Boards":[]}"#)
            .await
            .unwrap();
        assert!(migrator.migrate_context("ctx").await.unwrap());
        assert!(service.load_data("ctx").await.unwrap().boards.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_data_is_reported() {
        let (store, _, migrator) = setup();
        store.set("kanban_data_ctx", "[[[").await.unwrap();
        assert!(matches!(
            migrator.migrate_context("ctx").await,
            Err(KanbanError::CorruptData { .. })
        ));
    }

    #[tokio::test]
    async fn test_initialize_context() {
        let (_, service, migrator) = setup();
        let custom = vec!["Plan".to_string(), " Build ".to_string()];
        assert!(migrator.initialize_context("ctx", Some(&custom)).await.unwrap());
        assert!(!migrator.initialize_context("ctx", None).await.unwrap());

        let set = service.load_data("ctx").await.unwrap();
        let titles: Vec<&str> = set.boards.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["Plan", "Build"]);

        let bad = vec!["  ".to_string()];
        assert!(matches!(
            migrator.initialize_context("other", Some(&bad)).await,
            Err(KanbanError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn test_initialize_uses_template() {
        let store = Arc::new(MemoryStore::new());
        let mut config = CoreConfig::default();
        config.board_templates.insert(
            "civil".to_string(),
            vec!["Planning".to_string(), "Execution".to_string(), "Review".to_string()],
        );
        let service = Arc::new(BoardService::new(store, config));
        let migrator = Migrator::new(service.clone());
        migrator.initialize_context("civil", None).await.unwrap();
        let set = service.load_data("civil").await.unwrap();
        assert_eq!(set.boards[2].title, "Review");
    }

    #[tokio::test]
    async fn test_clean_and_reinitialize() {
        let (store, service, migrator) = setup();
        store.set("kanban_data_ctx", "garbage").await.unwrap();
        assert!(service.load_data("ctx").await.is_err());

        let set = migrator.clean_and_reinitialize("ctx").await.unwrap();
        assert_eq!(set.boards.len(), 3);
        assert_eq!(service.load_data("ctx").await.unwrap(), set);
    }
}
