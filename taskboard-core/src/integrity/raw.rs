/// Lenient view of persisted board data.
///
/// Everything read from storage or a backup is untrusted: fields may be
/// missing, have the wrong JSON type, or use the PascalCase names older
/// writers produced. `RawBoardSet` captures whatever is usable and leaves the
/// rest as `None`, so the repair pass can decide what to keep.
use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use crate::types::{Board, BoardSet, Card};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBoardSet {
    pub context: Option<String>,
    pub boards: Vec<RawBoard>,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBoard {
    pub id: Option<String>,
    pub title: Option<String>,
    pub order: Option<i64>,
    pub cards: Vec<RawCard>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCard {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub board_id: Option<String>,
    pub order: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl RawBoardSet {
    /// Parse arbitrary text. Text that is not JSON yields an empty set.
    pub fn from_json(text: &str) -> Self {
        serde_json::from_str::<Value>(text)
            .map(|v| Self::from_value(&v))
            .unwrap_or_default()
    }

    /// Extract whatever is usable from any JSON value. Non-objects yield an
    /// empty set.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Self::default();
        };
        Self {
            context: string_field(obj, "context"),
            boards: array_field(obj, "boards")
                .iter()
                .filter_map(|b| b.as_object().map(RawBoard::from_object))
                .collect(),
            last_modified: time_field(obj, "lastModified"),
        }
    }
}

impl RawBoard {
    fn from_object(obj: &Map<String, Value>) -> Self {
        Self {
            id: string_field(obj, "id"),
            title: string_field(obj, "title"),
            order: int_field(obj, "order"),
            cards: array_field(obj, "cards")
                .iter()
                .filter_map(|c| c.as_object().map(RawCard::from_object))
                .collect(),
            created_at: time_field(obj, "createdAt"),
            last_modified: time_field(obj, "lastModified"),
        }
    }
}

impl RawCard {
    fn from_object(obj: &Map<String, Value>) -> Self {
        Self {
            id: string_field(obj, "id"),
            title: string_field(obj, "title"),
            description: string_field(obj, "description"),
            board_id: string_field(obj, "boardId"),
            order: int_field(obj, "order"),
            created_at: time_field(obj, "createdAt"),
            last_modified: time_field(obj, "lastModified"),
        }
    }
}

impl From<&BoardSet> for RawBoardSet {
    fn from(set: &BoardSet) -> Self {
        Self {
            context: Some(set.context.clone()),
            boards: set.boards.iter().map(RawBoard::from).collect(),
            last_modified: Some(set.last_modified),
        }
    }
}

impl From<&Board> for RawBoard {
    fn from(board: &Board) -> Self {
        Self {
            id: Some(board.id.clone()),
            title: Some(board.title.clone()),
            order: Some(board.order as i64),
            cards: board.cards.iter().map(RawCard::from).collect(),
            created_at: Some(board.created_at),
            last_modified: Some(board.last_modified),
        }
    }
}

impl From<&Card> for RawCard {
    fn from(card: &Card) -> Self {
        Self {
            id: Some(card.id.clone()),
            title: Some(card.title.clone()),
            description: Some(card.description.clone()),
            board_id: Some(card.board_id.clone()),
            order: Some(card.order as i64),
            created_at: Some(card.created_at),
            last_modified: Some(card.last_modified),
        }
    }
}

/// Look a field up by its camelCase name, falling back to a
/// case-insensitive match (`BoardId`, `boardid`, ...).
fn field<'a>(obj: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    obj.get(name).or_else(|| {
        obj.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
    })
}

fn string_field(obj: &Map<String, Value>, name: &str) -> Option<String> {
    match field(obj, name)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn int_field(obj: &Map<String, Value>, name: &str) -> Option<i64> {
    match field(obj, name)? {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.abs() < i64::MAX as f64)
                .map(|f| f.trunc() as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn array_field<'a>(obj: &'a Map<String, Value>, name: &str) -> &'a [Value] {
    field(obj, name)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

fn time_field(obj: &Map<String, Value>, name: &str) -> Option<DateTime<Utc>> {
    field(obj, name).and_then(Value::as_str).and_then(parse_time)
}

/// RFC 3339, or a naive ISO timestamp taken as UTC. The year-1 "default"
/// date older writers used for unset values counts as missing.
fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })?;
    (parsed.year() > 1).then_some(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_garbage_yields_empty() {
        assert_eq!(RawBoardSet::from_json("{not json"), RawBoardSet::default());
        assert_eq!(RawBoardSet::from_json("42"), RawBoardSet::default());
        assert_eq!(RawBoardSet::from_json(""), RawBoardSet::default());
    }

    #[test]
    fn test_wrong_types_become_missing() {
        let raw = RawBoardSet::from_value(&json!({
            "context": ["nope"],
            "boards": [
                { "id": "b1", "title": 7, "order": "2", "cards": "oops" },
                "not a board",
                { "id": null, "title": "Doing", "order": 1.9 }
            ]
        }));
        assert_eq!(raw.context, None);
        assert_eq!(raw.boards.len(), 2);
        assert_eq!(raw.boards[0].title.as_deref(), Some("7"));
        assert_eq!(raw.boards[0].order, Some(2));
        assert!(raw.boards[0].cards.is_empty());
        assert_eq!(raw.boards[1].id, None);
        assert_eq!(raw.boards[1].order, Some(1));
    }

    #[test]
    fn test_pascal_case_fields_accepted() {
        let raw = RawBoardSet::from_value(&json!({
            "Context": "civil",
            "Boards": [{
                "Id": "b1",
                "Title": "Todo",
                "Order": 0,
                "CreatedAt": "0001-01-01T00:00:00",
                "Cards": [{ "Id": "c1", "Title": "Task", "BoardId": "b1", "Order": 0 }]
            }]
        }));
        assert_eq!(raw.context.as_deref(), Some("civil"));
        assert_eq!(raw.boards[0].cards[0].board_id.as_deref(), Some("b1"));
        // the year-1 placeholder is treated as unset
        assert_eq!(raw.boards[0].created_at, None);
    }

    #[test]
    fn test_parse_time_formats() {
        assert!(parse_time("2024-03-09T14:05:07Z").is_some());
        assert!(parse_time("2024-03-09T14:05:07.123+02:00").is_some());
        assert!(parse_time("2024-03-09T14:05:07.1234567").is_some());
        assert!(parse_time("yesterday").is_none());
    }

    #[test]
    fn test_from_board_set_keeps_everything() {
        let set = BoardSet::default_for("ctx");
        let raw = RawBoardSet::from(&set);
        assert_eq!(raw.context.as_deref(), Some("ctx"));
        assert_eq!(raw.boards.len(), 3);
        assert_eq!(raw.boards[2].order, Some(2));
    }
}
