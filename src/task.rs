//! Task data structure.
//!
//! This module defines the core `Task` struct: a single checklist item with
//! its text, completion flag, and store-issued identifier.

/// A single checklist item.
///
/// Ids are issued by the store on a task's first persist, so a task that has
/// not yet reached the store carries `id: None`. Ids are stable: once issued
/// they never change and are never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Store-issued identifier. `None` until the first persist.
    pub id: Option<i64>,
    pub text: String,
    pub completed: bool,
}

impl Task {
    /// Create a new, not-yet-persisted task.
    pub fn new(text: impl Into<String>) -> Self {
        Task {
            id: None,
            text: text.into(),
            completed: false,
        }
    }
}
