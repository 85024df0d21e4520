//! Enumerations for TUI state management.

/// Application state for the terminal user interface.
#[derive(Clone, Copy, PartialEq)]
pub enum AppState {
    List,
    AddTask,
    EditTask,
    Confirm,
    Help,
}
