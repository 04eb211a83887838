/// Storage key scheme.
///
/// - primary data:      `kanban_data_{context}`
/// - emergency backup:  `emergency_backup_{context}_{yyyyMMdd_HHmmss}`
/// - pre-restore copy:  `pre_restore_backup_{context}_{yyyyMMdd_HHmmss}`
/// - regular backup:    `kanban_backup_{context}_{yyyyMMdd_HHmmss}`
///
/// A backup written in the same second as an existing one gets a `_{n}`
/// suffix after the timestamp.
///
/// Contexts may themselves contain `_`, so backup keys are matched by
/// requiring the remainder after the context prefix to be exactly a
/// timestamp plus an optional all-digit suffix. Each kind has its own
/// prefix, so no context name can produce another context's key.
use chrono::{DateTime, NaiveDateTime, Utc};

pub const DATA_PREFIX: &str = "kanban_data_";
pub const EMERGENCY_PREFIX: &str = "emergency_backup_";
pub const BACKUP_PREFIX: &str = "kanban_backup_";
pub const PRE_RESTORE_PREFIX: &str = "pre_restore_backup_";
const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BackupKind {
    Regular,
    Emergency,
    PreRestore,
}

pub fn data_key(context: &str) -> String {
    format!("{}{}", DATA_PREFIX, context)
}

/// Context name of a primary data key, if it is one.
pub fn context_of_data_key(key: &str) -> Option<&str> {
    key.strip_prefix(DATA_PREFIX)
        .filter(|ctx| !ctx.trim().is_empty())
}

pub fn stamp(at: DateTime<Utc>) -> String {
    at.format(STAMP_FORMAT).to_string()
}

pub fn parse_stamp(s: &str) -> Option<DateTime<Utc>> {
    // Exactly `yyyyMMdd_HHmmss`; chrono alone would accept shorter fields.
    if s.len() != 15 || !s.is_char_boundary(8) || s.as_bytes()[8] != b'_' {
        return None;
    }
    NaiveDateTime::parse_from_str(s, STAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Timestamp of a key remainder: `yyyyMMdd_HHmmss` or `yyyyMMdd_HHmmss_{n}`.
fn parse_key_stamp(rest: &str) -> Option<DateTime<Utc>> {
    match rest.get(15..) {
        Some("") => parse_stamp(rest),
        Some(suffix) => {
            let digits = suffix.strip_prefix('_')?;
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            parse_stamp(&rest[..15])
        }
        None => None,
    }
}

/// `key` with a collision suffix; `n == 0` leaves it unchanged.
pub fn with_suffix(key: &str, n: u32) -> String {
    if n == 0 {
        key.to_string()
    } else {
        format!("{}_{}", key, n)
    }
}

pub fn emergency_key(context: &str, at: DateTime<Utc>) -> String {
    format!("{}{}_{}", EMERGENCY_PREFIX, context, stamp(at))
}

pub fn pre_restore_key(context: &str, at: DateTime<Utc>) -> String {
    format!("{}{}_{}", PRE_RESTORE_PREFIX, context, stamp(at))
}

pub fn backup_key(context: &str, at: DateTime<Utc>) -> String {
    format!("{}{}_{}", BACKUP_PREFIX, context, stamp(at))
}

/// Classify `key` as a backup of `context`, returning its kind and the
/// timestamp embedded in the key.
pub fn parse_backup_key(key: &str, context: &str) -> Option<(BackupKind, DateTime<Utc>)> {
    [
        (EMERGENCY_PREFIX, BackupKind::Emergency),
        (PRE_RESTORE_PREFIX, BackupKind::PreRestore),
        (BACKUP_PREFIX, BackupKind::Regular),
    ]
    .into_iter()
    .find_map(|(prefix, kind)| {
        strip_context(key, prefix, context)
            .and_then(parse_key_stamp)
            .map(|ts| (kind, ts))
    })
}

fn strip_context<'a>(key: &'a str, prefix: &str, context: &str) -> Option<&'a str> {
    key.strip_prefix(prefix)?
        .strip_prefix(context)?
        .strip_prefix('_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap()
    }

    #[test]
    fn test_key_formats() {
        assert_eq!(data_key("civil"), "kanban_data_civil");
        assert_eq!(emergency_key("civil", at()), "emergency_backup_civil_20240309_140507");
        assert_eq!(
            pre_restore_key("civil", at()),
            "pre_restore_backup_civil_20240309_140507"
        );
        assert_eq!(
            with_suffix(&backup_key("civil", at()), 2),
            "kanban_backup_civil_20240309_140507_2"
        );
        assert_eq!(with_suffix("k", 0), "k");
        assert_eq!(backup_key("civil", at()), "kanban_backup_civil_20240309_140507");
    }

    #[test]
    fn test_parse_backup_key_kinds() {
        assert_eq!(
            parse_backup_key("emergency_backup_civil_20240309_140507", "civil"),
            Some((BackupKind::Emergency, at()))
        );
        assert_eq!(
            parse_backup_key("pre_restore_backup_civil_20240309_140507", "civil"),
            Some((BackupKind::PreRestore, at()))
        );
        assert_eq!(
            parse_backup_key("kanban_backup_civil_20240309_140507", "civil"),
            Some((BackupKind::Regular, at()))
        );
    }

    #[test]
    fn test_parse_backup_key_does_not_leak_across_contexts() {
        let key = emergency_key("a_b", at());
        assert!(parse_backup_key(&key, "a").is_none());
        assert!(parse_backup_key(&key, "a_b").is_some());
        assert!(parse_backup_key("kanban_data_a", "a").is_none());
        assert!(parse_backup_key("emergency_backup_a_garbage", "a").is_none());
    }

    #[test]
    fn test_pre_restore_keys_stay_with_their_context() {
        let pre_restore = pre_restore_key("a", at());
        assert_eq!(
            parse_backup_key(&pre_restore, "a"),
            Some((BackupKind::PreRestore, at()))
        );
        assert!(parse_backup_key(&pre_restore, "a_pre_restore").is_none());
        assert_ne!(pre_restore, emergency_key("a_pre_restore", at()));

        let emergency = emergency_key("a_pre_restore", at());
        assert_eq!(
            parse_backup_key(&emergency, "a_pre_restore"),
            Some((BackupKind::Emergency, at()))
        );
        assert!(parse_backup_key(&emergency, "a").is_none());

        let nested = pre_restore_key("pre_restore_a", at());
        assert!(parse_backup_key(&nested, "a").is_none());
        assert!(parse_backup_key(&nested, "pre_restore_a").is_some());
    }

    #[test]
    fn test_suffixed_keys_parse_only_for_their_context() {
        let key = with_suffix(&emergency_key("a", at()), 3);
        assert_eq!(parse_backup_key(&key, "a"), Some((BackupKind::Emergency, at())));
        assert!(parse_backup_key(&key, "a_20240309").is_none());

        let stamped_context = backup_key(&format!("a_{}", stamp(at())), at());
        assert!(parse_backup_key(&stamped_context, "a").is_none());
        assert!(parse_backup_key("kanban_backup_a_20240309_140507_", "a").is_none());
        assert!(parse_backup_key("kanban_backup_a_20240309_140507_x1", "a").is_none());
    }

    #[test]
    fn test_context_of_data_key() {
        assert_eq!(context_of_data_key("kanban_data_civil"), Some("civil"));
        assert_eq!(context_of_data_key("kanban_data_"), None);
        assert_eq!(context_of_data_key("emergency_backup_x"), None);
    }

    #[test]
    fn test_parse_stamp_rejects_malformed() {
        assert!(parse_stamp("20240309_140507").is_some());
        assert!(parse_stamp("2024039_140507").is_none());
        assert!(parse_stamp("20241309_140507").is_none());
        assert!(parse_stamp("").is_none());
    }
}
