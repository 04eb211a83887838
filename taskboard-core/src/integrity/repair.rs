/// Best-effort reconstruction of a valid board set from raw data.
///
/// Rules, applied per board and per card:
/// - missing or blank title -> dropped
/// - title/description trimmed and cut to their length limits
/// - missing, blank or already-used id -> fresh id
/// - card `boardId` re-derived from the parent that holds it
/// - orders re-densified by stable sort on the old order (missing orders last)
/// - missing timestamps -> `RepairOptions::missing_timestamp`
/// - no surviving boards -> the default boards are synthesized
///
/// Repairing a repaired set returns it unchanged.
use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use super::raw::{RawBoard, RawBoardSet};
use crate::types::{
    clamp_text, new_id, Board, BoardSet, Card, DEFAULT_BOARD_TITLES, MAX_BOARD_TITLE_LEN,
    MAX_CARD_TITLE_LEN, MAX_DESCRIPTION_LEN,
};

const UNKNOWN_CONTEXT: &str = "unknown";

#[derive(Debug, Clone)]
pub struct RepairOptions {
    /// Stamp used for any missing createdAt/lastModified.
    pub missing_timestamp: DateTime<Utc>,
    /// Context used when the raw data has none.
    pub fallback_context: Option<String>,
    /// Titles for boards synthesized when nothing survives.
    pub default_titles: Vec<String>,
}

impl RepairOptions {
    /// Fill gaps with the current time.
    pub fn now() -> Self {
        Self {
            missing_timestamp: Utc::now(),
            fallback_context: None,
            default_titles: DEFAULT_BOARD_TITLES.iter().map(|t| t.to_string()).collect(),
        }
    }

    /// Fill gaps with a past sentinel (now - 1 day) so migrated legacy
    /// records are distinguishable from freshly created ones.
    pub fn migration() -> Self {
        Self {
            missing_timestamp: Utc::now() - Duration::days(1),
            ..Self::now()
        }
    }

    pub fn with_context(mut self, context: &str) -> Self {
        self.fallback_context = Some(context.to_string());
        self
    }

    pub fn with_default_titles(mut self, titles: &[String]) -> Self {
        if !titles.is_empty() {
            self.default_titles = titles.to_vec();
        }
        self
    }
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self::now()
    }
}

/// What a repair pass had to change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    pub dropped_boards: usize,
    pub dropped_cards: usize,
    pub reassigned_ids: usize,
    pub relinked_cards: usize,
    pub filled_timestamps: usize,
    pub synthesized_defaults: bool,
}

pub fn repair(raw: &RawBoardSet, options: &RepairOptions) -> BoardSet {
    repair_with_report(raw, options).0
}

pub fn repair_with_report(raw: &RawBoardSet, options: &RepairOptions) -> (BoardSet, RepairReport) {
    let mut report = RepairReport::default();
    let mut ids = IdRegistry::default();
    let stamp = options.missing_timestamp;

    let context = non_blank(raw.context.as_deref())
        .or_else(|| non_blank(options.fallback_context.as_deref()))
        .unwrap_or(UNKNOWN_CONTEXT)
        .to_string();

    let mut boards = Vec::new();
    for raw_board in stable_by_order(&raw.boards, |b| b.order) {
        let title = clamp_text(raw_board.title.as_deref().unwrap_or(""), MAX_BOARD_TITLE_LEN);
        if title.is_empty() {
            report.dropped_boards += 1;
            report.dropped_cards += raw_board.cards.len();
            continue;
        }
        let board_id = ids.board(raw_board.id.as_deref(), &mut report);
        let cards = repair_cards(raw_board, &board_id, stamp, &mut ids, &mut report);

        boards.push(Board {
            order: boards.len() as u32,
            id: board_id,
            title,
            cards,
            created_at: fill(raw_board.created_at, stamp, &mut report),
            last_modified: fill(raw_board.last_modified, stamp, &mut report),
        });
    }

    if boards.is_empty() {
        log::warn!(
            target: "taskboard.integrity",
            "No valid boards in data for context '{}', synthesizing defaults",
            context
        );
        report.synthesized_defaults = true;
        let titles: Vec<String> = options
            .default_titles
            .iter()
            .map(|t| clamp_text(t, MAX_BOARD_TITLE_LEN))
            .filter(|t| !t.is_empty())
            .collect();
        boards = if titles.is_empty() {
            BoardSet::default_for(&context).boards
        } else {
            BoardSet::with_titles(&context, &titles).boards
        };
    }

    let set = BoardSet {
        context,
        boards,
        last_modified: fill(raw.last_modified, stamp, &mut report),
    };
    log::debug!(
        target: "taskboard.integrity",
        "Repaired context '{}': {} boards, {} cards ({:?})",
        set.context,
        set.boards.len(),
        set.card_count(),
        report
    );
    (set, report)
}

fn repair_cards(
    raw_board: &RawBoard,
    board_id: &str,
    stamp: DateTime<Utc>,
    ids: &mut IdRegistry,
    report: &mut RepairReport,
) -> Vec<Card> {
    let mut cards = Vec::new();
    for raw_card in stable_by_order(&raw_board.cards, |c| c.order) {
        let title = clamp_text(raw_card.title.as_deref().unwrap_or(""), MAX_CARD_TITLE_LEN);
        if title.is_empty() {
            report.dropped_cards += 1;
            continue;
        }
        if raw_card.board_id.as_deref() != Some(board_id) {
            report.relinked_cards += 1;
        }
        cards.push(Card {
            order: cards.len() as u32,
            id: ids.card(raw_card.id.as_deref(), report),
            title,
            description: clamp_text(
                raw_card.description.as_deref().unwrap_or(""),
                MAX_DESCRIPTION_LEN,
            ),
            board_id: board_id.to_string(),
            created_at: fill(raw_card.created_at, stamp, report),
            last_modified: fill(raw_card.last_modified, stamp, report),
        });
    }
    cards
}

/// Items sorted by their prior order; ties and missing orders keep their
/// original sequence, with missing orders after all present ones.
fn stable_by_order<T>(items: &[T], order: impl Fn(&T) -> Option<i64>) -> Vec<&T> {
    let mut sorted: Vec<&T> = items.iter().collect();
    sorted.sort_by_key(|item| match order(item) {
        Some(o) => (0u8, o),
        None => (1u8, 0),
    });
    sorted
}

fn fill(value: Option<DateTime<Utc>>, stamp: DateTime<Utc>, report: &mut RepairReport) -> DateTime<Utc> {
    value.unwrap_or_else(|| {
        report.filled_timestamps += 1;
        stamp
    })
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

#[derive(Default)]
struct IdRegistry {
    boards: HashSet<String>,
    cards: HashSet<String>,
}

impl IdRegistry {
    fn board(&mut self, id: Option<&str>, report: &mut RepairReport) -> String {
        Self::claim(&mut self.boards, id, report)
    }

    fn card(&mut self, id: Option<&str>, report: &mut RepairReport) -> String {
        Self::claim(&mut self.cards, id, report)
    }

    fn claim(used: &mut HashSet<String>, id: Option<&str>, report: &mut RepairReport) -> String {
        if let Some(id) = non_blank(id) {
            if used.insert(id.to_string()) {
                return id.to_string();
            }
        }
        report.reassigned_ids += 1;
        loop {
            let fresh = new_id();
            if used.insert(fresh.clone()) {
                return fresh;
            }
        }
    }
}
