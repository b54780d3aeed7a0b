//! Snapshot History - Undo/Redo over Shared Documents
//!
//! Every edit produces a new `Arc` snapshot, so history is three slots of
//! pointers: past, present, future. Snapshots share unchanged subtrees, which
//! keeps long histories cheap.
//!
//! - A push whose snapshot is the present `Arc` is ignored (no-op edit)
//! - A real push clears the redo stack
//! - Both stacks keep the most recent entry last

use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct History<T> {
    past: Vec<Arc<T>>,
    present: Arc<T>,
    future: Vec<Arc<T>>,
    /// Maximum number of undo levels (0 = unlimited)
    max_levels: usize,
}

impl<T> History<T> {
    pub fn new(present: Arc<T>) -> Self {
        Self::with_max_levels(present, 0)
    }

    pub fn with_max_levels(present: Arc<T>, max_levels: usize) -> Self {
        Self {
            past: Vec::new(),
            present,
            future: Vec::new(),
            max_levels,
        }
    }

    pub fn present(&self) -> &Arc<T> {
        &self.present
    }

    /// Record `next` as the present. Returns false for a no-op edit.
    pub fn push(&mut self, next: Arc<T>) -> bool {
        if Arc::ptr_eq(&next, &self.present) {
            return false;
        }
        let prev = std::mem::replace(&mut self.present, next);
        self.past.push(prev);
        self.future.clear();
        if self.max_levels > 0 && self.past.len() > self.max_levels {
            self.past.remove(0);
        }
        true
    }

    pub fn undo(&mut self) -> bool {
        let Some(prev) = self.past.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.present, prev);
        self.future.push(current);
        true
    }

    pub fn redo(&mut self) -> bool {
        let Some(next) = self.future.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.present, next);
        self.past.push(current);
        true
    }

    /// Replace the present and forget both stacks (new template, import).
    pub fn reset(&mut self, present: Arc<T>) {
        self.present = present;
        self.past.clear();
        self.future.clear();
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn undo_levels(&self) -> usize {
        self.past.len()
    }

    pub fn redo_levels(&self) -> usize {
        self.future.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_undo_redo() {
        let mut history = History::new(Arc::new(0));
        assert!(history.push(Arc::new(1)));
        assert!(history.push(Arc::new(2)));
        assert_eq!(history.undo_levels(), 2);

        assert!(history.undo());
        assert_eq!(**history.present(), 1);
        assert!(history.redo());
        assert_eq!(**history.present(), 2);
        assert!(!history.redo());
    }

    #[test]
    fn test_same_arc_is_not_recorded() {
        let mut history = History::new(Arc::new("a"));
        let same = Arc::clone(history.present());
        assert!(!history.push(same));
        assert!(!history.can_undo());

        // equal value, different allocation: still an edit
        assert!(history.push(Arc::new("a")));
        assert!(history.can_undo());
    }

    #[test]
    fn test_push_clears_redo() {
        let mut history = History::new(Arc::new(0));
        history.push(Arc::new(1));
        history.undo();
        assert!(history.can_redo());
        history.push(Arc::new(5));
        assert!(!history.can_redo());
        assert_eq!(history.redo_levels(), 0);
    }

    #[test]
    fn test_undo_on_empty_is_noop() {
        let mut history = History::new(Arc::new(7));
        assert!(!history.undo());
        assert_eq!(**history.present(), 7);
    }

    #[test]
    fn test_reset_forgets_stacks() {
        let mut history = History::new(Arc::new(0));
        history.push(Arc::new(1));
        history.push(Arc::new(2));
        history.undo();
        history.reset(Arc::new(9));
        assert_eq!(**history.present(), 9);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_max_levels_drops_oldest() {
        let mut history = History::with_max_levels(Arc::new(0), 2);
        for i in 1..=4 {
            history.push(Arc::new(i));
        }
        assert_eq!(history.undo_levels(), 2);
        history.undo();
        history.undo();
        assert_eq!(**history.present(), 2);
    }
}
