//! Linear undo/redo over snapshots.

/// Snapshot history with undo and redo stacks.
#[derive(Debug, Clone, Default)]
pub struct History<T> {
    past: Vec<T>,
    present: T,
    future: Vec<T>,
}

impl<T: Clone> History<T> {
    pub fn new(initial: T) -> Self {
        Self {
            past: Vec::new(),
            present: initial,
            future: Vec::new(),
        }
    }

    pub fn present(&self) -> &T {
        &self.present
    }

    /// Commit a new state. The previous state becomes undoable and the redo
    /// stack is cleared.
    pub fn record_action(&mut self, next: T) {
        let previous = std::mem::replace(&mut self.present, next);
        self.past.push(previous);
        self.future.clear();
    }

    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.past.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.present, previous);
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

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Drop both stacks and start over from `state`.
    pub fn reset(&mut self, state: T) {
        self.past.clear();
        self.future.clear();
        self.present = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undo_redo_single_action() {
        let mut history = History::new(vec![1]);
        history.record_action(vec![1, 2]);

        assert!(history.undo());
        assert_eq!(history.present(), &vec![1]);
        assert!(history.redo());
        assert_eq!(history.present(), &vec![1, 2]);
    }

    #[test]
    fn test_empty_stacks_are_noops() {
        let mut history = History::new(0);
        assert!(!history.undo());
        assert!(!history.redo());
        assert_eq!(*history.present(), 0);
    }

    #[test]
    fn test_record_clears_redo() {
        let mut history = History::new(0);
        history.record_action(1);
        history.record_action(2);
        history.undo();
        assert!(history.can_redo());

        history.record_action(3);
        assert!(!history.can_redo());
        history.undo();
        assert_eq!(*history.present(), 1);
        history.undo();
        assert_eq!(*history.present(), 0);
        assert!(!history.can_undo());
    }
}
