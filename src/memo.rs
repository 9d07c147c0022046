//! Memos: short user notes kept in a key/value storage.
//!
//! The whole memo list lives as one JSON array under [`MEMOS_KEY`]. Every
//! change is a read-modify-write of that array, expressed as a
//! [`MemoCommand`] so the last [`MAX_HISTORY`] changes can be undone.
//! [`SelectionTracker`] drives the "memo from selected text" button.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use chrono::DateTime;

use crate::models::{memo_timestamp, Memo};

pub const MEMOS_KEY: &str = "memos";

/// How long a parsed memo list is served from cache.
pub const CACHE_TTL: Duration = Duration::from_millis(100);

pub const MAX_HISTORY: usize = 50;

/// Selections closer together than this are ignored.
pub const SELECTION_THROTTLE: Duration = Duration::from_millis(200);

/// The selection button disappears on its own after this long.
pub const BUTTON_TIMEOUT: Duration = Duration::from_millis(3000);

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct StorageError(pub String);

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "storage error: {}", self.0)
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug)]
pub enum MemoError {
    IndexOutOfRange { index: usize, len: usize },
    EmptyContent,
    Storage(StorageError),
    Serialize(serde_json::Error),
}

impl std::fmt::Display for MemoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoError::IndexOutOfRange { index, len } => {
                write!(f, "memo index {} out of range ({} memos)", index, len)
            }
            MemoError::EmptyContent => write!(f, "memo content is empty"),
            MemoError::Storage(e) => write!(f, "{}", e),
            MemoError::Serialize(e) => write!(f, "failed to serialize memos: {}", e),
        }
    }
}

impl std::error::Error for MemoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MemoError::Storage(e) => Some(e),
            MemoError::Serialize(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StorageError> for MemoError {
    fn from(e: StorageError) -> Self {
        MemoError::Storage(e)
    }
}

impl From<serde_json::Error> for MemoError {
    fn from(e: serde_json::Error) -> Self {
        MemoError::Serialize(e)
    }
}

// ============================================================================
// Storage
// ============================================================================

/// String key/value storage with the semantics of browser local storage.
pub trait Storage {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&mut self, key: &str, value: String) -> Result<(), StorageError>;
}

/// In-memory [`Storage`], optionally with a byte quota per value.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    items: HashMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            items: HashMap::new(),
            quota: Some(quota),
        }
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: String) -> Result<(), StorageError> {
        if let Some(quota) = self.quota {
            if value.len() > quota {
                return Err(StorageError(format!(
                    "quota exceeded: {} > {} bytes",
                    value.len(),
                    quota
                )));
            }
        }
        self.items.insert(key.to_string(), value);
        Ok(())
    }
}

// ============================================================================
// Memo Store
// ============================================================================

pub struct MemoStore<S: Storage> {
    storage: S,
    cache: Option<(Instant, Vec<Memo>)>,
}

impl<S: Storage> MemoStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            cache: None,
        }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Direct access to the backing storage. Writes made through it are
    /// not seen until the read cache expires or is invalidated.
    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    fn read(&self) -> Vec<Memo> {
        let Some(raw) = self.storage.get_item(MEMOS_KEY) else {
            return Vec::new();
        };
        match serde_json::from_str(&raw) {
            Ok(memos) => memos,
            Err(e) => {
                log::error!("Error reading memos from storage: {}", e);
                Vec::new()
            }
        }
    }

    /// All memos in storage order, as of `now`.
    pub fn memos_at(&mut self, now: Instant) -> Vec<Memo> {
        if let Some((read_at, memos)) = &self.cache {
            if now.saturating_duration_since(*read_at) < CACHE_TTL {
                return memos.clone();
            }
        }
        let memos = self.read();
        self.cache = Some((now, memos.clone()));
        memos
    }

    pub fn memos(&mut self) -> Vec<Memo> {
        self.memos_at(Instant::now())
    }

    pub fn len(&mut self) -> usize {
        self.memos().len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.memos().is_empty()
    }

    /// Replace the stored list.
    pub fn save(&mut self, memos: &[Memo]) -> Result<(), MemoError> {
        let json = serde_json::to_string(memos)?;
        self.invalidate();
        self.storage.set_item(MEMOS_KEY, json)?;
        Ok(())
    }

    /// Memos newest first, each paired with its index in storage order
    /// (the index that [`MemoCommand`]s address). Unparseable timestamps
    /// sort last.
    pub fn sorted_newest_first(&mut self) -> Vec<(usize, Memo)> {
        let mut memos: Vec<(usize, Memo)> = self.memos().into_iter().enumerate().collect();
        memos.sort_by_key(|(_, memo)| {
            std::cmp::Reverse(
                DateTime::parse_from_rfc3339(&memo.timestamp)
                    .map(|t| t.timestamp_millis())
                    .unwrap_or(i64::MIN),
            )
        });
        memos
    }
}

// ============================================================================
// Commands
// ============================================================================

/// A reversible change to the memo list. `Edit` and `Delete` record what
/// they overwrote when applied, which `invert` puts back.
#[derive(Debug, Clone, PartialEq)]
pub enum MemoCommand {
    Add {
        memo: Memo,
    },
    Edit {
        index: usize,
        content: String,
        /// Content and timestamp before the edit.
        previous: Option<(String, String)>,
    },
    Delete {
        index: usize,
        removed: Option<Memo>,
    },
}

impl MemoCommand {
    pub fn add(memo: Memo) -> Self {
        MemoCommand::Add { memo }
    }

    pub fn edit(index: usize, content: impl Into<String>) -> Self {
        MemoCommand::Edit {
            index,
            content: content.into(),
            previous: None,
        }
    }

    pub fn delete(index: usize) -> Self {
        MemoCommand::Delete {
            index,
            removed: None,
        }
    }

    pub fn apply<S: Storage>(&mut self, store: &mut MemoStore<S>) -> Result<(), MemoError> {
        let mut memos = store.memos();
        let len = memos.len();

        match self {
            MemoCommand::Add { memo } => {
                if memo.content.trim().is_empty() {
                    return Err(MemoError::EmptyContent);
                }
                memos.push(memo.clone());
                store.save(&memos)
            }
            MemoCommand::Edit {
                index,
                content,
                previous,
            } => {
                if content.trim().is_empty() {
                    return Err(MemoError::EmptyContent);
                }
                let memo = memos
                    .get_mut(*index)
                    .ok_or(MemoError::IndexOutOfRange { index: *index, len })?;
                let old = (
                    std::mem::replace(&mut memo.content, content.clone()),
                    std::mem::replace(&mut memo.timestamp, memo_timestamp()),
                );
                store.save(&memos)?;
                *previous = Some(old);
                Ok(())
            }
            MemoCommand::Delete { index, removed } => {
                if *index >= len {
                    return Err(MemoError::IndexOutOfRange { index: *index, len });
                }
                let memo = memos.remove(*index);
                store.save(&memos)?;
                *removed = Some(memo);
                Ok(())
            }
        }
    }

    /// Undo a previously applied command. Returns `false` when there was
    /// nothing to restore.
    pub fn invert<S: Storage>(&mut self, store: &mut MemoStore<S>) -> Result<bool, MemoError> {
        let mut memos = store.memos();

        match self {
            MemoCommand::Add { memo } => {
                let Some(pos) = memos.iter().rposition(|m| m.id == memo.id) else {
                    return Ok(false);
                };
                memos.remove(pos);
            }
            MemoCommand::Edit {
                index, previous, ..
            } => {
                let Some(memo) = memos.get_mut(*index) else {
                    return Ok(false);
                };
                let Some((content, timestamp)) = previous.take() else {
                    return Ok(false);
                };
                memo.content = content;
                memo.timestamp = timestamp;
            }
            MemoCommand::Delete { index, removed } => {
                let Some(memo) = removed.take() else {
                    return Ok(false);
                };
                let at = (*index).min(memos.len());
                memos.insert(at, memo);
            }
        }

        store.save(&memos)?;
        Ok(true)
    }
}

/// Applied commands, most recent last, capped at a fixed size.
#[derive(Debug)]
pub struct CommandHistory {
    commands: VecDeque<MemoCommand>,
    capacity: usize,
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::with_capacity(MAX_HISTORY)
    }
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            commands: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Apply `command` and remember it. A failed command is not recorded.
    pub fn execute<S: Storage>(
        &mut self,
        mut command: MemoCommand,
        store: &mut MemoStore<S>,
    ) -> Result<(), MemoError> {
        command.apply(store)?;
        self.commands.push_back(command);
        if self.commands.len() > self.capacity {
            self.commands.pop_front();
        }
        Ok(())
    }

    /// Undo the most recent command. `Ok(false)` if the history is empty or
    /// the command had nothing to restore.
    pub fn undo<S: Storage>(&mut self, store: &mut MemoStore<S>) -> Result<bool, MemoError> {
        match self.commands.pop_back() {
            Some(mut command) => command.invert(store),
            None => Ok(false),
        }
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MemoCommand> {
        self.commands.iter()
    }
}

// ============================================================================
// Memo Book
// ============================================================================

/// A memo store with undo history.
pub struct MemoBook<S: Storage> {
    store: MemoStore<S>,
    history: CommandHistory,
}

impl<S: Storage> MemoBook<S> {
    pub fn new(storage: S) -> Self {
        Self {
            store: MemoStore::new(storage),
            history: CommandHistory::new(),
        }
    }

    pub fn store(&mut self) -> &mut MemoStore<S> {
        &mut self.store
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn add(&mut self, content: &str, file_url: &str) -> Result<Memo, MemoError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(MemoError::EmptyContent);
        }
        let memo = Memo::new(content, file_url);
        self.history
            .execute(MemoCommand::add(memo.clone()), &mut self.store)?;
        log::info!("Added memo {} for {:?}", memo.id, file_url);
        Ok(memo)
    }

    pub fn edit(&mut self, index: usize, content: &str) -> Result<(), MemoError> {
        self.history
            .execute(MemoCommand::edit(index, content.trim()), &mut self.store)
    }

    pub fn delete(&mut self, index: usize) -> Result<Memo, MemoError> {
        self.history
            .execute(MemoCommand::delete(index), &mut self.store)?;
        match self.history.commands.back() {
            Some(MemoCommand::Delete {
                removed: Some(memo),
                ..
            }) => Ok(memo.clone()),
            _ => Err(MemoError::IndexOutOfRange {
                index,
                len: self.store.len(),
            }),
        }
    }

    pub fn undo(&mut self) -> Result<bool, MemoError> {
        self.history.undo(&mut self.store)
    }

    /// Memos for display, newest first, with their storage indices.
    pub fn list(&mut self) -> Vec<(usize, Memo)> {
        self.store.sorted_newest_first()
    }
}

// ============================================================================
// Text Selection
// ============================================================================

/// The floating "add memo" button shown next to a text selection.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionButton {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub shown_at: Instant,
}

#[derive(Debug, Default)]
pub struct SelectionTracker {
    last_selection: Option<Instant>,
    button: Option<SelectionButton>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// A selection ended at page position (`x`, `y`). Shows the button for
    /// a non-blank selection unless the previous one was too recent.
    pub fn on_selection(
        &mut self,
        now: Instant,
        text: &str,
        x: f64,
        y: f64,
    ) -> Option<&SelectionButton> {
        if let Some(last) = self.last_selection {
            if now.saturating_duration_since(last) < SELECTION_THROTTLE {
                return None;
            }
        }
        self.last_selection = Some(now);

        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        self.button = Some(SelectionButton {
            text: text.to_string(),
            x,
            y,
            shown_at: now,
        });
        self.button.as_ref()
    }

    pub fn button(&self) -> Option<&SelectionButton> {
        self.button.as_ref()
    }

    /// Expire the button after [`BUTTON_TIMEOUT`]. Returns `true` if it was
    /// dismissed by this call.
    pub fn tick(&mut self, now: Instant) -> bool {
        match &self.button {
            Some(button) if now.saturating_duration_since(button.shown_at) >= BUTTON_TIMEOUT => {
                self.button = None;
                true
            }
            _ => false,
        }
    }

    pub fn on_click_outside(&mut self) {
        self.dismiss();
    }

    pub fn dismiss(&mut self) {
        self.button = None;
    }

    /// Initial memo text offered for the current selection.
    pub fn prefill(&self) -> Option<String> {
        self.button
            .as_ref()
            .map(|b| format!("\"{}\"\n\n", b.text))
    }

    /// The user submitted `input` from the memo prompt. Dismisses the
    /// button and returns the memo content, if any.
    pub fn confirm(&mut self, input: &str) -> Option<String> {
        self.dismiss();
        let content = input.trim();
        (!content.is_empty()).then(|| content.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memo(id: i64, content: &str, timestamp: &str) -> Memo {
        Memo {
            id,
            content: content.to_string(),
            timestamp: timestamp.to_string(),
            file_url: String::new(),
        }
    }

    fn stored(book: &mut MemoBook<MemoryStorage>) -> Vec<String> {
        book.store()
            .memos()
            .into_iter()
            .map(|m| m.content)
            .collect()
    }

    #[test]
    fn test_missing_and_corrupt_storage_read_as_empty() {
        let mut store = MemoStore::new(MemoryStorage::new());
        assert!(store.memos().is_empty());

        store
            .storage_mut()
            .set_item(MEMOS_KEY, "{not json".to_string())
            .unwrap();
        store.invalidate();
        assert!(store.memos().is_empty());
    }

    #[test]
    fn test_read_cache_expires() {
        let mut store = MemoStore::new(MemoryStorage::new());
        let t0 = Instant::now();
        assert!(store.memos_at(t0).is_empty());

        let json = serde_json::to_string(&[memo(1, "a", "2024-01-01T00:00:00.000Z")]).unwrap();
        store.storage_mut().set_item(MEMOS_KEY, json).unwrap();

        assert!(store.memos_at(t0 + Duration::from_millis(50)).is_empty());
        assert_eq!(store.memos_at(t0 + CACHE_TTL).len(), 1);
    }

    #[test]
    fn test_save_invalidates_cache() {
        let mut store = MemoStore::new(MemoryStorage::new());
        assert!(store.memos().is_empty());
        store.save(&[memo(1, "a", "t")]).unwrap();
        assert_eq!(store.memos().len(), 1);
        let raw = store.storage().get_item(MEMOS_KEY).unwrap();
        assert!(raw.starts_with(r#"[{"id":1,"content":"a""#));
    }

    #[test]
    fn test_sorted_newest_first_keeps_storage_index() {
        let mut store = MemoStore::new(MemoryStorage::new());
        store
            .save(&[
                memo(1, "old", "2024-01-01T00:00:00.000Z"),
                memo(2, "new", "2024-03-01T00:00:00.000Z"),
                memo(3, "bad", "yesterday"),
                memo(4, "mid", "2024-02-01T00:00:00.000Z"),
            ])
            .unwrap();
        let order: Vec<(usize, String)> = store
            .sorted_newest_first()
            .into_iter()
            .map(|(i, m)| (i, m.content))
            .collect();
        assert_eq!(
            order,
            vec![
                (1, "new".to_string()),
                (3, "mid".to_string()),
                (0, "old".to_string()),
                (2, "bad".to_string()),
            ]
        );
    }

    #[test]
    fn test_add_edit_delete_undo() {
        let mut book = MemoBook::new(MemoryStorage::new());
        let first = book.add("  first  ", "https://raw.githubusercontent.com/a/b/c.md").unwrap();
        assert_eq!(first.content, "first");
        book.add("second", "").unwrap();
        assert_eq!(stored(&mut book), vec!["first", "second"]);

        book.edit(0, "first, edited").unwrap();
        assert_eq!(stored(&mut book), vec!["first, edited", "second"]);

        let removed = book.delete(1).unwrap();
        assert_eq!(removed.content, "second");
        assert_eq!(stored(&mut book), vec!["first, edited"]);

        assert!(book.undo().unwrap());
        assert_eq!(stored(&mut book), vec!["first, edited", "second"]);

        assert!(book.undo().unwrap());
        let memos = book.store().memos();
        assert_eq!(memos[0].content, "first");
        assert_eq!(memos[0].timestamp, first.timestamp);

        assert!(book.undo().unwrap());
        assert!(book.undo().unwrap());
        assert!(stored(&mut book).is_empty());
        assert!(!book.undo().unwrap());
    }

    #[test]
    fn test_delete_then_undo_restores_position() {
        let mut book = MemoBook::new(MemoryStorage::new());
        book.store()
            .save(&[memo(1, "a", "t"), memo(2, "b", "t"), memo(3, "c", "t")])
            .unwrap();
        book.delete(1).unwrap();
        assert_eq!(stored(&mut book), vec!["a", "c"]);
        book.undo().unwrap();
        assert_eq!(stored(&mut book), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_invalid_operations_leave_store_unchanged() {
        let mut book = MemoBook::new(MemoryStorage::new());
        book.add("only", "").unwrap();

        assert!(matches!(
            book.edit(5, "x"),
            Err(MemoError::IndexOutOfRange { index: 5, len: 1 })
        ));
        assert!(matches!(book.delete(1), Err(MemoError::IndexOutOfRange { .. })));
        assert!(matches!(book.edit(0, "   "), Err(MemoError::EmptyContent)));
        assert!(matches!(book.add("\n\t", ""), Err(MemoError::EmptyContent)));

        assert_eq!(stored(&mut book), vec!["only"]);
        assert_eq!(book.history().len(), 1);
    }

    #[test]
    fn test_storage_failure_surfaces_and_is_not_recorded() {
        let mut book = MemoBook::new(MemoryStorage::with_quota(120));
        book.add("short", "").unwrap();
        let err = book.add(&"x".repeat(200), "").unwrap_err();
        assert!(matches!(err, MemoError::Storage(_)));
        assert!(err.to_string().contains("quota exceeded"));
        assert_eq!(stored(&mut book), vec!["short"]);
        assert_eq!(book.history().len(), 1);
    }

    #[test]
    fn test_history_is_capped() {
        let mut store = MemoStore::new(MemoryStorage::new());
        let mut history = CommandHistory::new();
        for i in 0..(MAX_HISTORY + 10) {
            history
                .execute(MemoCommand::add(memo(i as i64, "m", "t")), &mut store)
                .unwrap();
        }
        assert_eq!(history.len(), MAX_HISTORY);
        for _ in 0..MAX_HISTORY {
            assert!(history.undo(&mut store).unwrap());
        }
        assert!(!history.undo(&mut store).unwrap());
        // The ten oldest adds fell out of the history and stay.
        assert_eq!(store.memos().len(), 10);

        history
            .execute(MemoCommand::add(memo(99, "m", "t")), &mut store)
            .unwrap();
        history.clear();
        assert!(history.is_empty());
    }

    #[test]
    fn test_selection_throttle_and_blank() {
        let mut tracker = SelectionTracker::new();
        let t0 = Instant::now();
        assert!(tracker.on_selection(t0, "  hello ", 10.0, 20.0).is_some());
        assert_eq!(tracker.button().unwrap().text, "hello");

        assert!(tracker
            .on_selection(t0 + Duration::from_millis(100), "other", 0.0, 0.0)
            .is_none());
        assert_eq!(tracker.button().unwrap().text, "hello");

        assert!(tracker
            .on_selection(t0 + Duration::from_millis(400), "   ", 0.0, 0.0)
            .is_none());

        let button = tracker
            .on_selection(t0 + Duration::from_millis(700), "world", 5.0, 6.0)
            .unwrap();
        assert_eq!((button.x, button.y), (5.0, 6.0));
    }

    #[test]
    fn test_selection_button_timeout_and_outside_click() {
        let mut tracker = SelectionTracker::new();
        let t0 = Instant::now();
        tracker.on_selection(t0, "text", 0.0, 0.0);
        assert!(!tracker.tick(t0 + Duration::from_millis(2999)));
        assert!(tracker.tick(t0 + BUTTON_TIMEOUT));
        assert!(tracker.button().is_none());

        tracker.on_selection(t0 + Duration::from_secs(5), "text", 0.0, 0.0);
        tracker.on_click_outside();
        assert!(tracker.button().is_none());
        assert!(!tracker.tick(t0 + Duration::from_secs(60)));
    }

    #[test]
    fn test_selection_prefill_and_confirm() {
        let mut tracker = SelectionTracker::new();
        tracker.on_selection(Instant::now(), "quoted", 0.0, 0.0);
        assert_eq!(tracker.prefill().as_deref(), Some("\"quoted\"\n\n"));

        assert_eq!(
            tracker.confirm("\"quoted\"\n\nmy note\n").as_deref(),
            Some("\"quoted\"\n\nmy note")
        );
        assert!(tracker.button().is_none());
        assert_eq!(tracker.prefill(), None);
        assert_eq!(tracker.confirm("   "), None);
    }
}
