use std::collections::VecDeque;

/// Snapshots kept before the oldest is evicted.
pub const HISTORY_CAP: usize = 20;

/// Bounded undo/redo stack of full snapshots with a cursor.
///
/// The cursor always indexes a stored snapshot; entries after it are the redo future and are
/// discarded by the next [`History::push`].
#[derive(Clone, Debug)]
pub struct History<T> {
    entries: VecDeque<T>,
    cursor: usize,
    cap: usize,
}

impl<T: Clone> History<T> {
    /// History holding only `initial`.
    pub fn new(initial: T) -> Self {
        Self::with_cap(initial, HISTORY_CAP)
    }

    /// History with a custom cap (at least 1).
    pub fn with_cap(initial: T, cap: usize) -> Self {
        let mut entries = VecDeque::with_capacity(cap.max(1));
        entries.push_back(initial);
        Self {
            entries,
            cursor: 0,
            cap: cap.max(1),
        }
    }

    /// Append a snapshot after the cursor, dropping any redo future and the oldest overflow.
    pub fn push(&mut self, snapshot: T) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push_back(snapshot);
        while self.entries.len() > self.cap {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
    }

    /// Step back; returns the restored snapshot.
    pub fn undo(&mut self) -> Option<&T> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        self.entries.get(self.cursor)
    }

    /// Step forward; returns the restored snapshot.
    pub fn redo(&mut self) -> Option<&T> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        self.entries.get(self.cursor)
    }

    /// Snapshot under the cursor.
    pub fn current(&self) -> Option<&T> {
        self.entries.get(self.cursor)
    }

    /// Whether [`History::undo`] would move.
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    /// Whether [`History::redo`] would move.
    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    /// Stored snapshots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Never true; a history always holds at least its initial snapshot.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cursor position.
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

#[cfg(test)]
#[path = "../../tests/unit/studio/history.rs"]
mod tests;
