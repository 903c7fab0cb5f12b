use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Prefix marking request-originated (canonical) thread ids
pub const CANONICAL_THREAD_PREFIX: &str = "req_";

/// Number of words kept when deriving a thread title
pub const TITLE_WORD_LIMIT: usize = 10;

/// Thread metadata row. `message_count` and `last_activity` are a cache of
/// the message log and may briefly lag it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub thread_id: String,
    pub user_id: String,
    pub session_id: String,
    pub message_count: u64,
    pub last_activity: DateTime<Utc>,
}

/// Thread listing entry with a human-readable title
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub session_id: String,
    pub title: String,
    pub message_count: u64,
    pub last_activity: DateTime<Utc>,
}

/// Normalize a caller-supplied thread id to its canonical storage key.
///
/// Idempotent: an id that already carries the prefix is returned unchanged.
pub fn canonical_thread_id(raw: &str) -> String {
    if raw.starts_with(CANONICAL_THREAD_PREFIX) {
        raw.to_string()
    } else {
        format!("{}{}", CANONICAL_THREAD_PREFIX, raw)
    }
}

/// Unprefixed form of a thread id, used by rows written before ids were
/// normalized.
pub fn legacy_thread_id(id: &str) -> String {
    let canonical = canonical_thread_id(id);
    canonical[CANONICAL_THREAD_PREFIX.len()..].to_string()
}

/// Both identifier spaces a thread's rows may live under: `[canonical, legacy]`.
/// The two strings always differ.
pub fn thread_id_spaces(id: &str) -> [String; 2] {
    [canonical_thread_id(id), legacy_thread_id(id)]
}

/// First `TITLE_WORD_LIMIT` words of `content`, single-space separated
pub fn title_from_content(content: &str) -> String {
    content
        .split_whitespace()
        .take(TITLE_WORD_LIMIT)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_is_deterministic() {
        assert_eq!(canonical_thread_id("abc"), "req_abc");
        assert_eq!(canonical_thread_id("abc"), canonical_thread_id("abc"));
    }

    #[test]
    fn test_canonical_is_idempotent() {
        let once = canonical_thread_id("abc");
        assert_eq!(canonical_thread_id(&once), once);
    }

    #[test]
    fn test_prefix_lookalike_still_normalized() {
        assert_eq!(canonical_thread_id("request-1"), "req_request-1");
    }

    #[test]
    fn test_spaces_are_disjoint() {
        let [canonical, legacy] = thread_id_spaces("req_req_x");
        assert_eq!(canonical, "req_req_x");
        assert_eq!(legacy, "req_x");
        assert_ne!(canonical, legacy);

        let [canonical, legacy] = thread_id_spaces("x");
        assert_eq!(canonical, "req_x");
        assert_eq!(legacy, "x");
    }

    #[test]
    fn test_title_takes_ten_words() {
        let title = title_from_content("one two  three\nfour five six seven eight nine ten eleven");
        assert_eq!(title, "one two three four five six seven eight nine ten");
        assert_eq!(title_from_content("   "), "");
    }
}
