//! Command history.
//!
//! Provides mode-scoped input history with up/down navigation. The outer
//! history can be persisted under a per-application key; mode histories are
//! kept in memory only and discarded when the mode exits.

/// Default number of entries kept (and persisted).
pub const DEFAULT_MAX_ENTRIES: usize = 500;

/// Prefix of the key history is persisted under.
pub const HISTORY_KEY_PREFIX: &str = "cmd_history_";

/// Returns the storage key for a history id.
pub fn history_key(id: &str) -> String {
    format!("{HISTORY_KEY_PREFIX}{id}")
}

/// Entries plus the navigation cursor for one level of history.
#[derive(Debug, Default, Clone)]
struct Frame {
    /// Stored entries (oldest first).
    entries: Vec<String>,
    /// How many steps back from the newest entry the user has navigated.
    cursor: usize,
}

/// History entries that should be written to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedHistory {
    /// Storage key, `cmd_history_<id>`.
    pub key: String,
    /// The newest entries, oldest first.
    pub entries: Vec<String>,
}

/// Input history with mode scoping.
#[derive(Debug)]
pub struct History {
    current: Frame,
    /// Outer frames saved while modes are active, innermost last.
    saved: Vec<Frame>,
    id: Option<String>,
    max_entries: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    /// Creates an empty, unpersisted history.
    pub fn new() -> Self {
        Self {
            current: Frame::default(),
            saved: Vec::new(),
            id: None,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }

    /// Creates a history persisted under `id`, keeping at most `max_entries`.
    pub fn with_id(id: impl Into<String>, max_entries: usize) -> Self {
        Self {
            id: Some(id.into()),
            max_entries: max_entries.max(1),
            ..Self::new()
        }
    }

    /// Sets the persistence id.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Returns the storage key, if an id is set.
    pub fn key(&self) -> Option<String> {
        self.id.as_deref().map(history_key)
    }

    /// Returns the maximum number of entries kept.
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Adds previously persisted entries to the outer history.
    pub fn load(&mut self, entries: Vec<String>) {
        let frame = self.saved.first_mut().unwrap_or(&mut self.current);
        frame.entries.extend(entries);
        let overflow = frame.entries.len().saturating_sub(self.max_entries);
        frame.entries.drain(..overflow);
    }

    /// Records a submitted line.
    ///
    /// Blank lines and consecutive duplicates are skipped. The cursor is
    /// always reset.
    pub fn push(&mut self, line: &str) {
        self.current.cursor = 0;

        if line.trim().is_empty() {
            return;
        }
        if self.current.entries.last().map(String::as_str) == Some(line) {
            return;
        }

        self.current.entries.push(line.to_string());
        if self.current.entries.len() > self.max_entries {
            self.current.entries.remove(0);
        }
    }

    /// Moves one entry back (up arrow). Stops at the oldest entry.
    pub fn previous(&mut self) -> Option<&str> {
        let frame = &mut self.current;
        if frame.entries.is_empty() {
            return None;
        }
        frame.cursor = (frame.cursor + 1).min(frame.entries.len());
        frame
            .entries
            .get(frame.entries.len() - frame.cursor)
            .map(String::as_str)
    }

    /// Moves one entry forward (down arrow). Returns `""` past the newest entry.
    pub fn next(&mut self) -> &str {
        let frame = &mut self.current;
        if frame.cursor <= 1 {
            frame.cursor = 0;
            return "";
        }
        frame.cursor -= 1;
        frame
            .entries
            .get(frame.entries.len() - frame.cursor)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Returns the entry `depth` steps back from the newest, without moving.
    pub fn peek(&self, depth: usize) -> Option<&str> {
        let len = self.current.entries.len();
        len.checked_sub(depth + 1)
            .and_then(|idx| self.current.entries.get(idx))
            .map(String::as_str)
    }

    /// Returns the entries of the active level, oldest first.
    pub fn entries(&self) -> &[String] {
        &self.current.entries
    }

    /// Starts a fresh history for a mode, saving the current one.
    pub fn enter_mode(&mut self) {
        let outer = std::mem::take(&mut self.current);
        self.saved.push(outer);
    }

    /// Discards the mode history and restores the enclosing one.
    pub fn exit_mode(&mut self) {
        if let Some(outer) = self.saved.pop() {
            self.current = outer;
        }
    }

    /// Returns true while a mode history is active.
    pub fn in_mode(&self) -> bool {
        !self.saved.is_empty()
    }

    /// Returns what should be persisted, or `None` in a mode or without an id.
    pub fn persisted(&self) -> Option<PersistedHistory> {
        if self.in_mode() {
            return None;
        }
        let key = self.key()?;
        let entries = &self.current.entries;
        let start = entries.len().saturating_sub(self.max_entries);
        Some(PersistedHistory {
            key,
            entries: entries[start..].to_vec(),
        })
    }

    /// Clears the active level.
    pub fn clear(&mut self) {
        self.current = Frame::default();
    }
}
