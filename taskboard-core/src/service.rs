/// Board service: CRUD and reordering for one context at a time.
///
/// - Reads go through `BoardCache`, writes go to the key-value store first
/// - One async lock per context spans the whole load -> mutate -> save
///   sequence, so overlapping calls on a context never lose updates
/// - Mutations run on a copy; the cache only changes after a successful write
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::cache::BoardCache;
use crate::config::CoreConfig;
use crate::error::{KanbanError, Result};
use crate::integrity::{ingest, validate, RepairOptions, ValidationIssue, ValidationKind};
use crate::storage::keys::{context_of_data_key, data_key};
use crate::storage::KeyValueStore;
use crate::types::{
    char_len, is_valid_title, Board, BoardSet, Card, MAX_BOARD_TITLE_LEN, MAX_CARD_TITLE_LEN,
    MAX_DESCRIPTION_LEN,
};

pub struct BoardService {
    store: Arc<dyn KeyValueStore>,
    cache: BoardCache,
    write_locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    config: CoreConfig,
}

impl BoardService {
    pub fn new(store: Arc<dyn KeyValueStore>, config: CoreConfig) -> Self {
        Self {
            store,
            cache: BoardCache::new(),
            write_locks: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Fresh set for a context with no data: its template titles or the defaults.
    pub fn default_set(&self, context: &str) -> BoardSet {
        BoardSet::with_titles(context, self.config.titles_for(context))
    }

    pub(crate) fn repair_options(&self, context: &str) -> RepairOptions {
        RepairOptions::now()
            .with_context(context)
            .with_default_titles(self.config.titles_for(context))
    }

    fn get_write_lock(&self, context: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self
            .write_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Holders and waiters keep a clone; a lone map reference is idle.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(context.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Hold the context's write lock. Used by backup, recovery and migration
    /// to run multi-step sequences without interleaving with service calls.
    pub(crate) async fn lock_context(&self, context: &str) -> OwnedMutexGuard<()> {
        self.get_write_lock(context).lock_owned().await
    }

    // ── Reads ────────────────────────────────────────────────────────────

    pub async fn load_data(&self, context: &str) -> Result<BoardSet> {
        check_context(context)?;
        let _guard = self.lock_context(context).await;
        self.load_locked(context).await
    }

    pub(crate) async fn load_locked(&self, context: &str) -> Result<BoardSet> {
        if let Some(set) = self.cache.get(context) {
            return Ok(set);
        }

        let key = data_key(context);
        let set = match self.read_primary(context, "load_data").await? {
            None => {
                log::info!(
                    target: "taskboard.service",
                    "No data for context '{}', using default boards",
                    context
                );
                self.default_set(context)
            }
            Some(text) => {
                ingest(&text, context, &self.repair_options(context))
                    .map_err(|e| KanbanError::CorruptData {
                        key,
                        reason: e.to_string(),
                    })?
                    .set
            }
        };

        self.cache.insert(set.clone());
        Ok(set)
    }

    /// Raw primary payload; blank values count as absent.
    pub(crate) async fn read_primary(
        &self,
        context: &str,
        operation: &'static str,
    ) -> Result<Option<String>> {
        let stored = self
            .store
            .get(&data_key(context))
            .await
            .map_err(|e| KanbanError::storage(operation, context, e))?;
        Ok(stored.filter(|text| !text.trim().is_empty()))
    }

    pub async fn get_board(&self, context: &str, board_id: &str) -> Result<Board> {
        let set = self.load_data(context).await?;
        set.board(board_id)
            .cloned()
            .ok_or_else(|| KanbanError::BoardNotFound(board_id.to_string()))
    }

    pub async fn get_card(&self, context: &str, card_id: &str) -> Result<Card> {
        let set = self.load_data(context).await?;
        set.card(card_id)
            .cloned()
            .ok_or_else(|| KanbanError::CardNotFound(card_id.to_string()))
    }

    /// Contexts that have primary data in storage, sorted.
    pub async fn known_contexts(&self) -> Result<Vec<String>> {
        let keys = self
            .store
            .list_keys()
            .await
            .map_err(|e| KanbanError::storage("known_contexts", "*", e))?;
        let mut contexts: Vec<String> = keys
            .iter()
            .filter_map(|key| context_of_data_key(key))
            .map(str::to_string)
            .collect();
        contexts.sort();
        contexts.dedup();
        Ok(contexts)
    }

    // ── Whole-set writes ─────────────────────────────────────────────────

    /// Persist a caller-built set. Structural problems are rejected with
    /// every violation listed; nothing is repaired silently.
    pub async fn save_data(&self, set: &BoardSet) -> Result<BoardSet> {
        check_context(&set.context)?;
        let _guard = self.lock_context(&set.context).await;
        self.persist_locked(set.clone(), "save_data").await
    }

    /// Replace a context's data wholesale (restore, import, recovery).
    pub async fn replace_data(&self, set: BoardSet) -> Result<BoardSet> {
        check_context(&set.context)?;
        let _guard = self.lock_context(&set.context).await;
        self.persist_locked(set, "replace_data").await
    }

    /// Validate, normalize, write, then cache. Caller holds the context lock.
    pub(crate) async fn persist_locked(
        &self,
        mut set: BoardSet,
        operation: &'static str,
    ) -> Result<BoardSet> {
        let structural = validate(&set).structural();
        if !structural.is_empty() {
            return Err(KanbanError::validation(
                format!("Board data for context '{}' is invalid", set.context),
                structural,
            ));
        }

        set.normalize_orders();
        set.touch();
        let json = serde_json::to_string(&set)?;
        self.store
            .set(&data_key(&set.context), &json)
            .await
            .map_err(|e| KanbanError::storage(operation, &set.context, e))?;

        log::debug!(
            target: "taskboard.service",
            "{}: saved context '{}' ({} boards, {} cards)",
            operation,
            set.context,
            set.boards.len(),
            set.card_count()
        );
        self.cache.insert(set.clone());
        Ok(set)
    }

    /// Remove primary data and drop the cache entry. Caller holds the lock.
    pub(crate) async fn remove_locked(&self, context: &str, operation: &'static str) -> Result<()> {
        self.store
            .remove(&data_key(context))
            .await
            .map_err(|e| KanbanError::storage(operation, context, e))?;
        self.cache.invalidate(context);
        Ok(())
    }

    /// Cache a set that matches what storage holds. Caller holds the lock.
    pub(crate) fn remember(&self, set: BoardSet) {
        self.cache.insert(set);
    }

    // ── Cache lifecycle ──────────────────────────────────────────────────

    pub fn invalidate(&self, context: &str) -> bool {
        self.cache.invalidate(context)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn cached_contexts(&self) -> Vec<String> {
        self.cache.contexts()
    }

    // ── Mutations ────────────────────────────────────────────────────────

    async fn mutate<T>(
        &self,
        context: &str,
        operation: &'static str,
        apply: impl FnOnce(&mut BoardSet) -> Result<T>,
    ) -> Result<T> {
        check_context(context)?;
        let _guard = self.lock_context(context).await;
        let mut set = self.load_locked(context).await?;
        let out = apply(&mut set)?;
        self.persist_locked(set, operation).await?;
        Ok(out)
    }

    pub async fn create_board(&self, context: &str, title: &str) -> Result<Board> {
        let title = checked_title(
            title,
            MAX_BOARD_TITLE_LEN,
            ValidationKind::InvalidBoardTitle,
            "Board",
        )?;
        self.mutate(context, "create_board", |set| {
            let board = Board::new(&title, set.boards.len() as u32);
            set.boards.push(board.clone());
            Ok(board)
        })
        .await
    }

    pub async fn create_card(&self, context: &str, board_id: &str, title: &str) -> Result<Card> {
        check_id(board_id, "Board")?;
        let title = checked_title(
            title,
            MAX_CARD_TITLE_LEN,
            ValidationKind::InvalidCardTitle,
            "Card",
        )?;
        self.mutate(context, "create_card", |set| {
            let board = set
                .board_mut(board_id)
                .ok_or_else(|| KanbanError::BoardNotFound(board_id.to_string()))?;
            let card = Card::new(&board.id, &title, board.cards.len() as u32);
            board.cards.push(card.clone());
            board.touch();
            Ok(card)
        })
        .await
    }

    /// Delete a board and every card it holds.
    pub async fn delete_board(&self, context: &str, board_id: &str) -> Result<()> {
        check_id(board_id, "Board")?;
        self.mutate(context, "delete_board", |set| {
            let index = set
                .boards
                .iter()
                .position(|b| b.id == board_id)
                .ok_or_else(|| KanbanError::BoardNotFound(board_id.to_string()))?;
            let removed = set.boards.remove(index);
            set.reindex();
            log::debug!(
                target: "taskboard.service",
                "Deleted board '{}' with {} card(s)",
                removed.title,
                removed.cards.len()
            );
            Ok(())
        })
        .await
    }

    pub async fn delete_card(&self, context: &str, card_id: &str) -> Result<()> {
        check_id(card_id, "Card")?;
        self.mutate(context, "delete_card", |set| {
            let (bi, ci) = set
                .card_position(card_id)
                .ok_or_else(|| KanbanError::CardNotFound(card_id.to_string()))?;
            let board = &mut set.boards[bi];
            board.cards.remove(ci);
            board.reindex_cards();
            board.touch();
            Ok(())
        })
        .await
    }

    /// Move a card to `new_order` within `target_board_id` (which may be its
    /// current board). Positions past the end append.
    pub async fn move_card(
        &self,
        context: &str,
        card_id: &str,
        target_board_id: &str,
        new_order: i64,
    ) -> Result<Card> {
        check_id(card_id, "Card")?;
        check_id(target_board_id, "Board")?;
        let position = check_order(new_order)?;
        self.mutate(context, "move_card", |set| {
            let (bi, ci) = set
                .card_position(card_id)
                .ok_or_else(|| KanbanError::CardNotFound(card_id.to_string()))?;
            let ti = set
                .boards
                .iter()
                .position(|b| b.id == target_board_id)
                .ok_or_else(|| KanbanError::BoardNotFound(target_board_id.to_string()))?;

            let source = &mut set.boards[bi];
            let mut card = source.cards.remove(ci);
            source.reindex_cards();
            source.touch();

            let target = &mut set.boards[ti];
            let index = position.min(target.cards.len());
            card.board_id = target.id.clone();
            card.touch();
            target.cards.insert(index, card);
            target.reindex_cards();
            target.touch();
            Ok(target.cards[index].clone())
        })
        .await
    }

    pub async fn move_board(&self, context: &str, board_id: &str, new_order: i64) -> Result<Board> {
        check_id(board_id, "Board")?;
        let position = check_order(new_order)?;
        self.mutate(context, "move_board", |set| {
            let current = set
                .boards
                .iter()
                .position(|b| b.id == board_id)
                .ok_or_else(|| KanbanError::BoardNotFound(board_id.to_string()))?;
            let mut board = set.boards.remove(current);
            board.touch();
            let index = position.min(set.boards.len());
            set.boards.insert(index, board);
            set.reindex();
            Ok(set.boards[index].clone())
        })
        .await
    }

    pub async fn update_board_title(
        &self,
        context: &str,
        board_id: &str,
        title: &str,
    ) -> Result<Board> {
        check_id(board_id, "Board")?;
        let title = checked_title(
            title,
            MAX_BOARD_TITLE_LEN,
            ValidationKind::InvalidBoardTitle,
            "Board",
        )?;
        self.mutate(context, "update_board_title", |set| {
            let board = set
                .board_mut(board_id)
                .ok_or_else(|| KanbanError::BoardNotFound(board_id.to_string()))?;
            board.title = title;
            board.touch();
            Ok(board.clone())
        })
        .await
    }

    pub async fn update_card_title(&self, context: &str, card_id: &str, title: &str) -> Result<Card> {
        check_id(card_id, "Card")?;
        let title = checked_title(
            title,
            MAX_CARD_TITLE_LEN,
            ValidationKind::InvalidCardTitle,
            "Card",
        )?;
        self.mutate(context, "update_card_title", |set| {
            edit_card(set, card_id, |card| card.title = title)
        })
        .await
    }

    pub async fn update_card_description(
        &self,
        context: &str,
        card_id: &str,
        description: &str,
    ) -> Result<Card> {
        check_id(card_id, "Card")?;
        let description = description.trim().to_string();
        if char_len(&description) > MAX_DESCRIPTION_LEN {
            return Err(KanbanError::validation(
                "Card description is invalid",
                vec![ValidationIssue {
                    kind: ValidationKind::DescriptionTooLong,
                    message: format!(
                        "Card description exceeds {} characters (got {})",
                        MAX_DESCRIPTION_LEN,
                        char_len(&description)
                    ),
                    entity_id: Some(card_id.to_string()),
                }],
            ));
        }
        self.mutate(context, "update_card_description", |set| {
            edit_card(set, card_id, |card| card.description = description)
        })
        .await
    }
}

/// Apply `edit` to a card, bumping the card and its board.
fn edit_card(set: &mut BoardSet, card_id: &str, edit: impl FnOnce(&mut Card)) -> Result<Card> {
    let (bi, ci) = set
        .card_position(card_id)
        .ok_or_else(|| KanbanError::CardNotFound(card_id.to_string()))?;
    let board = &mut set.boards[bi];
    board.touch();
    let card = &mut board.cards[ci];
    edit(card);
    card.touch();
    Ok(card.clone())
}

pub(crate) fn check_context(context: &str) -> Result<()> {
    if context.trim().is_empty() {
        return Err(KanbanError::InvalidArgument(
            "Context must not be blank".to_string(),
        ));
    }
    Ok(())
}

fn check_id(id: &str, entity: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(KanbanError::InvalidArgument(format!(
            "{} id must not be blank",
            entity
        )));
    }
    Ok(())
}

fn check_order(new_order: i64) -> Result<usize> {
    if new_order < 0 {
        return Err(KanbanError::InvalidArgument(format!(
            "Order must be non-negative (got {})",
            new_order
        )));
    }
    Ok(usize::try_from(new_order).unwrap_or(usize::MAX))
}

/// Trimmed title, or a `Validation` error when blank or too long.
fn checked_title(title: &str, max_len: usize, kind: ValidationKind, entity: &str) -> Result<String> {
    let trimmed = title.trim();
    if is_valid_title(trimmed, max_len) {
        return Ok(trimmed.to_string());
    }
    Err(KanbanError::validation(
        format!("{} title is invalid", entity),
        vec![ValidationIssue {
            kind,
            message: format!(
                "{} title must be 1-{} non-blank characters (got {})",
                entity,
                max_len,
                char_len(trimmed)
            ),
            entity_id: None,
        }],
    ))
}
