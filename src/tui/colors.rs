//! Color constants for the terminal user interface.

use ratatui::style::Color;

/// Used for the focused input border.
pub const GOLD: Color = Color::Rgb(255, 215, 0);
/// Used for the delete confirmation dialog.
pub const DARK_RED: Color = Color::Rgb(114, 0, 0);
