use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_BOARD_TITLE_LEN: usize = 100;
pub const MAX_CARD_TITLE_LEN: usize = 200;
pub const MAX_DESCRIPTION_LEN: usize = 1000;

/// Board titles used when a context has no data and no configured template.
pub const DEFAULT_BOARD_TITLES: [&str; 3] = ["To Do", "In Progress", "Done"];

/// Generate a fresh entity id (UUID v4).
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub board_id: String,
    pub order: u32,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl Card {
    pub fn new(board_id: &str, title: &str, order: u32) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            title: title.to_string(),
            description: String::new(),
            board_id: board_id.to_string(),
            order,
            created_at: now,
            last_modified: now,
        }
    }

    pub fn is_valid(&self) -> bool {
        is_valid_title(&self.title, MAX_CARD_TITLE_LEN)
            && char_len(&self.description) <= MAX_DESCRIPTION_LEN
            && !self.board_id.trim().is_empty()
    }

    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: String,
    pub title: String,
    pub order: u32,
    #[serde(default)]
    pub cards: Vec<Card>,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

impl Board {
    pub fn new(title: &str, order: u32) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            title: title.to_string(),
            order,
            cards: Vec::new(),
            created_at: now,
            last_modified: now,
        }
    }

    pub fn is_valid(&self) -> bool {
        is_valid_title(&self.title, MAX_BOARD_TITLE_LEN)
    }

    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }

    /// Assign `order = position` to every card, in current `Vec` order.
    pub fn reindex_cards(&mut self) {
        for (i, card) in self.cards.iter_mut().enumerate() {
            card.order = i as u32;
        }
    }
}

/// All boards of one context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSet {
    pub context: String,
    #[serde(default)]
    pub boards: Vec<Board>,
    pub last_modified: DateTime<Utc>,
}

impl BoardSet {
    pub fn new(context: &str, boards: Vec<Board>) -> Self {
        Self {
            context: context.to_string(),
            boards,
            last_modified: Utc::now(),
        }
    }

    /// Fresh set holding one empty board per title, ordered as given.
    pub fn with_titles<S: AsRef<str>>(context: &str, titles: &[S]) -> Self {
        let boards = titles
            .iter()
            .enumerate()
            .map(|(i, t)| Board::new(t.as_ref(), i as u32))
            .collect();
        Self::new(context, boards)
    }

    pub fn default_for(context: &str) -> Self {
        Self::with_titles(context, &DEFAULT_BOARD_TITLES)
    }

    pub fn board(&self, board_id: &str) -> Option<&Board> {
        self.boards.iter().find(|b| b.id == board_id)
    }

    pub fn board_mut(&mut self, board_id: &str) -> Option<&mut Board> {
        self.boards.iter_mut().find(|b| b.id == board_id)
    }

    pub fn card(&self, card_id: &str) -> Option<&Card> {
        self.boards
            .iter()
            .flat_map(|b| b.cards.iter())
            .find(|c| c.id == card_id)
    }

    /// Locate a card as (board index, card index).
    pub fn card_position(&self, card_id: &str) -> Option<(usize, usize)> {
        self.boards.iter().enumerate().find_map(|(bi, b)| {
            b.cards
                .iter()
                .position(|c| c.id == card_id)
                .map(|ci| (bi, ci))
        })
    }

    pub fn card_count(&self) -> usize {
        self.boards.iter().map(|b| b.cards.len()).sum()
    }

    /// Stable-sort boards and cards by their `order` field, then rewrite
    /// orders as dense `0..n` positions.
    pub fn normalize_orders(&mut self) {
        self.boards.sort_by_key(|b| b.order);
        for board in &mut self.boards {
            board.cards.sort_by_key(|c| c.order);
        }
        self.reindex();
    }

    /// Rewrite orders from current `Vec` positions without sorting.
    pub fn reindex(&mut self) {
        for (i, board) in self.boards.iter_mut().enumerate() {
            board.order = i as u32;
            board.reindex_cards();
        }
    }

    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }
}

/// Length in chars, which is what title/description limits count.
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

pub fn is_valid_title(title: &str, max_len: usize) -> bool {
    !title.trim().is_empty() && char_len(title) <= max_len
}

/// Trim, truncate to `max_len` chars, and trim again so a cut never leaves
/// trailing whitespace behind.
pub fn clamp_text(text: &str, max_len: usize) -> String {
    let trimmed = text.trim();
    if char_len(trimmed) <= max_len {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max_len).collect();
    cut.trim_end().to_string()
}
