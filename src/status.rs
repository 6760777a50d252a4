//! Single-assignment status handoff between a run's worker context and the
//! supervising thread.

use std::sync::Mutex;

/// Mutex-guarded single-write cell.
///
/// The context that detects a run's terminal state publishes it exactly once;
/// any number of readers, on any thread, observe either nothing or the whole
/// value. A second write is a logic bug and panics.
#[derive(Debug)]
pub struct StatusSlot<T> {
    cell: Mutex<Option<T>>,
}

impl<T> Default for StatusSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StatusSlot<T> {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self {
            cell: Mutex::new(None),
        }
    }

    /// Publishes `value`.
    ///
    /// Panics if the slot was already written.
    pub fn set(&self, value: T) {
        let mut cell = self.cell.lock().unwrap();
        assert!(cell.is_none(), "status slot written twice");
        *cell = Some(value);
    }

    pub fn is_set(&self) -> bool {
        self.cell.lock().unwrap().is_some()
    }
}

impl<T: Clone> StatusSlot<T> {
    /// Returns the published value, or `None` if nothing was written yet.
    pub fn get(&self) -> Option<T> {
        self.cell.lock().unwrap().clone()
    }
}
