//! Buffered text changes and clamped replay
//!
//! While the native widget is hidden (async mode) or being resynchronized,
//! its content cannot be trusted to match the model, so keystrokes are not
//! applied directly. They are recorded as `TextChange` entries in a
//! `ChangeLog` and replayed against freshly fetched model text once the
//! widget is shown again.
//!
//! The log is the one structure both execution contexts touch without full
//! marshaling: the widget's change observer appends on the host UI thread
//! while the resynchronization task drains it, so entries live behind the
//! log's own mutex.

use std::sync::Mutex;

use smallvec::SmallVec;

/// A single buffered edit, char-indexed
///
/// Exactly one of `inserted` / `deleted` is meaningful per entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextChange {
    /// Position the change was observed at
    pub at: usize,
    /// Text inserted at `at`
    pub inserted: Option<String>,
    /// Number of chars removed
    pub deleted: usize,
}

impl TextChange {
    /// An insertion of `text` at char position `at`
    pub fn insert(at: usize, text: impl Into<String>) -> Self {
        Self {
            at,
            inserted: Some(text.into()),
            deleted: 0,
        }
    }

    /// A removal of `len` chars observed at char position `at`
    pub fn delete(at: usize, len: usize) -> Self {
        Self {
            at,
            inserted: None,
            deleted: len,
        }
    }
}

/// Ordered queue of pending edits captured while the widget is untrusted
#[derive(Debug, Default)]
pub struct ChangeLog {
    entries: Mutex<SmallVec<[TextChange; 8]>>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a change observed by the widget
    pub fn push(&self, change: TextChange) {
        self.entries.lock().unwrap().push(change);
    }

    /// Take every buffered change, leaving the log empty
    pub fn drain(&self) -> SmallVec<[TextChange; 8]> {
        std::mem::take(&mut *self.entries.lock().unwrap())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}

/// Replay buffered changes against `text`, starting from `cursor`
///
/// Insertions splice at their recorded position, clamped to the current
/// bounds when the position has gone stale; deletions remove chars ending at
/// the tracked cursor, clamped the same way. Returns the resulting text and
/// cursor. Never fails: stale positions degrade to nearest-valid, matching
/// the rest of the subsystem's best-effort posture.
pub fn replay(
    text: &str,
    cursor: usize,
    changes: impl IntoIterator<Item = TextChange>,
) -> (String, usize) {
    let mut chars: Vec<char> = text.chars().collect();
    let mut cursor = cursor.min(chars.len());

    for change in changes {
        if let Some(inserted) = change.inserted {
            let at = change.at.min(chars.len());
            let mut tail: Vec<char> = chars.split_off(at);
            chars.extend(inserted.chars());
            chars.append(&mut tail);
            cursor = at + inserted.chars().count();
        } else if change.deleted > 0 {
            let end = cursor.min(chars.len());
            let start = end.saturating_sub(change.deleted);
            chars.drain(start..end);
            cursor = start;
        }
    }

    (chars.into_iter().collect(), cursor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replay_in_order() {
        let log = ChangeLog::new();
        log.push(TextChange::insert(2, "x"));
        log.push(TextChange::delete(3, 1));

        let (text, cursor) = replay("abcd", 2, log.drain());
        assert_eq!(text, "abcd");
        assert_eq!(cursor, 2);
    }

    #[test]
    fn test_insert_moves_cursor_past_insertion() {
        let (text, cursor) = replay("hello", 0, [TextChange::insert(5, " world")]);
        assert_eq!(text, "hello world");
        assert_eq!(cursor, 11);
    }

    #[test]
    fn test_stale_insert_position_clamps_to_end() {
        let (text, cursor) = replay("ab", 0, [TextChange::insert(99, "z")]);
        assert_eq!(text, "abz");
        assert_eq!(cursor, 3);
    }

    #[test]
    fn test_delete_clamps_at_start() {
        let (text, cursor) = replay("ab", 1, [TextChange::delete(0, 5)]);
        assert_eq!(text, "b");
        assert_eq!(cursor, 0);
    }

    #[test]
    fn test_delete_ends_at_cursor() {
        let (text, cursor) = replay("abcdef", 4, [TextChange::delete(2, 2)]);
        assert_eq!(text, "abef");
        assert_eq!(cursor, 2);
    }

    #[test]
    fn test_replay_is_char_indexed() {
        let (text, cursor) = replay("héllo", 5, [TextChange::delete(4, 1)]);
        assert_eq!(text, "héll");
        assert_eq!(cursor, 4);

        let (text, _) = replay("日本", 0, [TextChange::insert(1, "x")]);
        assert_eq!(text, "日x本");
    }

    #[test]
    fn test_drain_empties_the_log() {
        let log = ChangeLog::new();
        log.push(TextChange::insert(0, "a"));
        assert_eq!(log.len(), 1);
        let drained = log.drain();
        assert_eq!(drained.len(), 1);
        assert!(log.is_empty());
    }
}
