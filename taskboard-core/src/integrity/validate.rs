/// Structural validation of a board set.
///
/// Collects every violation instead of stopping at the first, so callers can
/// show (or log) the complete list.
use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::types::{
    char_len, is_valid_title, BoardSet, MAX_BOARD_TITLE_LEN, MAX_CARD_TITLE_LEN,
    MAX_DESCRIPTION_LEN,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationKind {
    BlankContext,
    BlankBoardId,
    BlankCardId,
    InvalidBoardTitle,
    InvalidCardTitle,
    DescriptionTooLong,
    DuplicateBoardId,
    DuplicateCardId,
    BoardOrdersNotDense,
    CardOrdersNotDense,
    DanglingBoardReference,
}

impl ValidationKind {
    /// Order gaps are fixed by normalization on save; every other kind
    /// makes a set unsaveable.
    pub fn is_structural(self) -> bool {
        !matches!(self, Self::BoardOrdersNotDense | Self::CardOrdersNotDense)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    pub kind: ValidationKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
}

impl ValidationReport {
    fn from_issues(errors: Vec<ValidationIssue>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Issues that block a save (everything except order gaps).
    pub fn structural(&self) -> Vec<ValidationIssue> {
        self.errors
            .iter()
            .filter(|issue| issue.kind.is_structural())
            .cloned()
            .collect()
    }

    pub fn has(&self, kind: ValidationKind) -> bool {
        self.errors.iter().any(|issue| issue.kind == kind)
    }
}

struct Issues(Vec<ValidationIssue>);

impl Issues {
    fn push(&mut self, kind: ValidationKind, entity_id: Option<&str>, message: String) {
        self.0.push(ValidationIssue {
            kind,
            message,
            entity_id: entity_id.map(str::to_string),
        });
    }
}

pub fn validate(set: &BoardSet) -> ValidationReport {
    let mut issues = Issues(Vec::new());

    if set.context.trim().is_empty() {
        issues.push(
            ValidationKind::BlankContext,
            None,
            "Board set context must not be blank".to_string(),
        );
    }

    let board_ids: HashSet<&str> = set.boards.iter().map(|b| b.id.as_str()).collect();
    let mut seen_boards: HashMap<&str, usize> = HashMap::new();
    let mut seen_cards: HashMap<&str, usize> = HashMap::new();

    for board in &set.boards {
        if board.id.trim().is_empty() {
            issues.push(
                ValidationKind::BlankBoardId,
                None,
                format!("Board '{}' has a blank id", board.title),
            );
        } else {
            *seen_boards.entry(board.id.as_str()).or_default() += 1;
        }

        if !is_valid_title(&board.title, MAX_BOARD_TITLE_LEN) {
            issues.push(
                ValidationKind::InvalidBoardTitle,
                Some(&board.id),
                format!(
                    "Board title must be 1-{} non-blank characters (got {})",
                    MAX_BOARD_TITLE_LEN,
                    char_len(&board.title)
                ),
            );
        }

        for card in &board.cards {
            if card.id.trim().is_empty() {
                issues.push(
                    ValidationKind::BlankCardId,
                    None,
                    format!("Card '{}' in board '{}' has a blank id", card.title, board.title),
                );
            } else {
                *seen_cards.entry(card.id.as_str()).or_default() += 1;
            }

            if !is_valid_title(&card.title, MAX_CARD_TITLE_LEN) {
                issues.push(
                    ValidationKind::InvalidCardTitle,
                    Some(&card.id),
                    format!(
                        "Card title must be 1-{} non-blank characters (got {})",
                        MAX_CARD_TITLE_LEN,
                        char_len(&card.title)
                    ),
                );
            }

            if char_len(&card.description) > MAX_DESCRIPTION_LEN {
                issues.push(
                    ValidationKind::DescriptionTooLong,
                    Some(&card.id),
                    format!(
                        "Card description exceeds {} characters",
                        MAX_DESCRIPTION_LEN
                    ),
                );
            }

            if card.board_id != board.id {
                let message = if board_ids.contains(card.board_id.as_str()) {
                    format!(
                        "Card '{}' is held by board '{}' but references board '{}'",
                        card.title, board.id, card.board_id
                    )
                } else {
                    format!(
                        "Card '{}' references unknown board '{}'",
                        card.title, card.board_id
                    )
                };
                issues.push(ValidationKind::DanglingBoardReference, Some(&card.id), message);
            }
        }

        if !is_dense(board.cards.iter().map(|c| c.order)) {
            issues.push(
                ValidationKind::CardOrdersNotDense,
                Some(&board.id),
                format!("Card orders in board '{}' are not a dense 0-based sequence", board.title),
            );
        }
    }

    if !is_dense(set.boards.iter().map(|b| b.order)) {
        issues.push(
            ValidationKind::BoardOrdersNotDense,
            None,
            "Board orders are not a dense 0-based sequence".to_string(),
        );
    }

    // Report duplicates in first-seen order so output is deterministic.
    let mut reported = HashSet::new();
    for board in &set.boards {
        let id = board.id.as_str();
        if seen_boards.get(id).copied().unwrap_or(0) > 1 && reported.insert(id) {
            issues.push(
                ValidationKind::DuplicateBoardId,
                Some(id),
                format!("Board id '{}' is used {} times", id, seen_boards[id]),
            );
        }
    }
    let mut reported = HashSet::new();
    for card in set.boards.iter().flat_map(|b| b.cards.iter()) {
        let id = card.id.as_str();
        if seen_cards.get(id).copied().unwrap_or(0) > 1 && reported.insert(id) {
            issues.push(
                ValidationKind::DuplicateCardId,
                Some(id),
                format!("Card id '{}' is used {} times", id, seen_cards[id]),
            );
        }
    }

    ValidationReport::from_issues(issues.0)
}

/// True when the sorted values are exactly `0..n`.
fn is_dense(orders: impl Iterator<Item = u32>) -> bool {
    let mut sorted: Vec<u32> = orders.collect();
    sorted.sort_unstable();
    sorted.iter().enumerate().all(|(i, &o)| o as usize == i)
}
