//! Main application logic for the terminal user interface.
//!
//! This module contains the `App` struct which owns the in-memory task
//! list, handles user input, renders the checklist, and queues a
//! persistence cycle after every state mutation.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use log::{error, info};
use ratatui::{
    backend::Backend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};

use crate::store::{Store, StoreWriter};
use crate::task::Task;
use crate::tui::{
    colors::{DARK_RED, GOLD},
    enums::AppState,
    input::InputField,
    utils::centered_rect,
};

/// Main application state for the terminal user interface.
///
/// The task list lives here and nowhere else; every view renders from it
/// and every mutation goes through it, followed by a queued save of the
/// whole list.
pub struct App {
    state: AppState,
    tasks: Vec<Task>,
    store: Arc<Store>,
    writer: StoreWriter,
    list_state: ListState,
    input: InputField,
    editing: Option<usize>,
    pending_delete: Option<usize>,
    status_message: String,
}

impl App {
    /// Create a new App instance, loading all persisted tasks.
    ///
    /// A load failure is logged and the session starts with an empty list,
    /// per the store failure policy.
    pub fn new(store: Arc<Store>) -> Self {
        let tasks = match store.load_all() {
            Ok(tasks) => tasks,
            Err(err) => {
                error!("failed to load tasks, starting empty: {err}");
                Vec::new()
            }
        };
        info!("loaded {} task(s)", tasks.len());

        let writer = StoreWriter::spawn(Arc::clone(&store));
        let mut list_state = ListState::default();
        if !tasks.is_empty() {
            list_state.select(Some(0));
        }

        App {
            state: AppState::List,
            tasks,
            store,
            writer,
            list_state,
            input: InputField::new(),
            editing: None,
            pending_delete: None,
            status_message: String::new(),
        }
    }

    /// Queue a persistence cycle for the current list.
    fn persist(&self) {
        self.writer.queue_save(self.tasks.clone());
    }

    fn set_status_message(&mut self, message: String) {
        self.status_message = message;
    }

    fn clear_status_message(&mut self) {
        self.status_message.clear();
    }

    /// Currently selected list index, bounds-checked against the list.
    fn selected_index(&self) -> Option<usize> {
        self.list_state.selected().filter(|&i| i < self.tasks.len())
    }

    fn select_previous(&mut self) {
        if let Some(selected) = self.list_state.selected() {
            if selected > 0 {
                self.list_state.select(Some(selected - 1));
            }
        } else if !self.tasks.is_empty() {
            self.list_state.select(Some(0));
        }
    }

    fn select_next(&mut self) {
        if let Some(selected) = self.list_state.selected() {
            if selected + 1 < self.tasks.len() {
                self.list_state.select(Some(selected + 1));
            }
        } else if !self.tasks.is_empty() {
            self.list_state.select(Some(0));
        }
    }

    fn clamp_selection(&mut self) {
        if self.tasks.is_empty() {
            self.list_state.select(None);
        } else {
            let idx = self.list_state.selected().unwrap_or(0).min(self.tasks.len() - 1);
            self.list_state.select(Some(idx));
        }
    }

    /// Append a task from the add input.
    ///
    /// Blank or whitespace-only input is a no-op. The store issues the id
    /// here, on the task's first persist; an insert failure leaves the task
    /// visible with no id.
    fn commit_add(&mut self) {
        let raw = self.input.take();
        self.state = AppState::List;
        let text = raw.trim();
        if text.is_empty() {
            return;
        }

        let mut task = Task::new(text);
        match self.store.insert(&task) {
            Ok(id) => task.id = Some(id),
            Err(err) => error!("failed to persist new task: {err}"),
        }
        self.tasks.push(task);
        self.list_state.select(Some(self.tasks.len() - 1));
        self.persist();
        self.set_status_message("Task added".to_string());
    }

    /// Open the edit modal with the selected task's text staged.
    fn begin_edit(&mut self) {
        if let Some(idx) = self.selected_index() {
            self.editing = Some(idx);
            self.input = InputField::with_value(&self.tasks[idx].text);
            self.state = AppState::EditTask;
        }
    }

    /// Commit the staged text to the task being edited.
    ///
    /// An empty string is permitted; only add validates its input.
    fn commit_edit(&mut self) {
        let staged = self.input.take();
        if let Some(idx) = self.editing.take() {
            if let Some(task) = self.tasks.get_mut(idx) {
                task.text = staged;
            }
        }
        self.state = AppState::List;
        self.persist();
        self.set_status_message("Task updated".to_string());
    }

    /// Discard the staged text and return to the list.
    fn cancel_edit(&mut self) {
        self.editing = None;
        self.input.clear();
        self.state = AppState::List;
    }

    /// Flip the completion flag of the selected task.
    fn toggle_selected(&mut self) {
        if let Some(idx) = self.selected_index() {
            let task = &mut self.tasks[idx];
            task.completed = !task.completed;
            self.persist();
        }
    }

    /// Remove the task staged for deletion. Runs only after confirmation.
    fn delete_pending(&mut self) {
        if let Some(idx) = self.pending_delete.take() {
            if idx < self.tasks.len() {
                self.tasks.remove(idx);
                self.clamp_selection();
                self.persist();
                self.set_status_message("Task deleted".to_string());
            }
        }
    }

    /// Replace the in-memory list with the persisted one.
    fn reload_tasks(&mut self) {
        match self.store.load_all() {
            Ok(tasks) => {
                self.tasks = tasks;
                self.clamp_selection();
                self.set_status_message("Tasks reloaded".to_string());
            }
            Err(err) => {
                error!("failed to reload tasks: {err}");
                self.set_status_message("Reload failed, keeping current list".to_string());
            }
        }
    }

    /// Handle keyboard input when in the task list view.
    ///
    /// Returns true if the application should quit.
    fn handle_list_input(&mut self, key: KeyCode, modifiers: KeyModifiers) -> io::Result<bool> {
        match key {
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => return Ok(true),
            KeyCode::Char('q') | KeyCode::Esc => return Ok(true),
            KeyCode::Up | KeyCode::Char('k') => self.select_previous(),
            KeyCode::Down | KeyCode::Char('j') => self.select_next(),
            KeyCode::Char(' ') => self.toggle_selected(),
            KeyCode::Char('a') => {
                self.input.clear();
                self.state = AppState::AddTask;
            }
            KeyCode::Char('e') => self.begin_edit(),
            KeyCode::Char('d') => {
                if let Some(idx) = self.selected_index() {
                    self.pending_delete = Some(idx);
                    self.state = AppState::Confirm;
                }
            }
            KeyCode::Char('r') => self.reload_tasks(),
            KeyCode::Char('h') | KeyCode::F(1) => self.state = AppState::Help,
            _ => {}
        }
        Ok(false)
    }

    /// Cursor and editing keys shared by the add and edit inputs.
    fn handle_text_key(&mut self, key: KeyCode, modifiers: KeyModifiers) {
        match key {
            KeyCode::Backspace if modifiers.contains(KeyModifiers::CONTROL) => self.input.clear(),
            KeyCode::Backspace => self.input.handle_backspace(),
            KeyCode::Delete => self.input.handle_delete(),
            KeyCode::Left => self.input.move_cursor_left(),
            KeyCode::Right => self.input.move_cursor_right(),
            KeyCode::Home => self.input.move_cursor_home(),
            KeyCode::End => self.input.move_cursor_end(),
            KeyCode::Char(c) => self.input.handle_char(c),
            _ => {}
        }
    }

    /// Handle keyboard input in the add-task input.
    fn handle_add_input(&mut self, key: KeyCode, modifiers: KeyModifiers) -> io::Result<bool> {
        match key {
            KeyCode::Enter => self.commit_add(),
            KeyCode::Esc => {
                self.input.clear();
                self.state = AppState::List;
            }
            other => self.handle_text_key(other, modifiers),
        }
        Ok(false)
    }

    /// Handle keyboard input in the edit modal.
    fn handle_edit_input(&mut self, key: KeyCode, modifiers: KeyModifiers) -> io::Result<bool> {
        match key {
            KeyCode::Enter => self.commit_edit(),
            KeyCode::Esc => self.cancel_edit(),
            other => self.handle_text_key(other, modifiers),
        }
        Ok(false)
    }

    /// Handle keyboard input in the confirmation dialog.
    fn handle_confirm_input(&mut self, key: KeyCode, _modifiers: KeyModifiers) -> io::Result<bool> {
        match key {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                self.delete_pending();
                self.state = AppState::List;
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                self.pending_delete = None;
                self.state = AppState::List;
            }
            _ => {}
        }
        Ok(false)
    }

    /// Handle keyboard input in the help screen.
    fn handle_help_input(&mut self, key: KeyCode, _modifiers: KeyModifiers) -> io::Result<bool> {
        match key {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('h') => {
                self.state = AppState::List;
            }
            _ => {}
        }
        Ok(false)
    }

    /// Dispatch one key event based on the current application state.
    ///
    /// Returns true if the application should quit.
    fn handle_key(&mut self, key: KeyCode, modifiers: KeyModifiers) -> io::Result<bool> {
        self.clear_status_message();
        match self.state {
            AppState::List => self.handle_list_input(key, modifiers),
            AppState::AddTask => self.handle_add_input(key, modifiers),
            AppState::EditTask => self.handle_edit_input(key, modifiers),
            AppState::Confirm => self.handle_confirm_input(key, modifiers),
            AppState::Help => self.handle_help_input(key, modifiers),
        }
    }

    /// Poll for and handle keyboard events.
    ///
    /// Returns true if the application should quit.
    fn handle_input(&mut self) -> io::Result<bool> {
        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                return self.handle_key(key.code, key.modifiers);
            }
        }
        Ok(false)
    }

    /// Render the checklist with its header.
    fn render_task_list(&mut self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // header
                Constraint::Min(0),    // checklist
            ])
            .split(area);

        let open = self.tasks.iter().filter(|t| !t.completed).count();
        let header_text = vec![Line::from(vec![
            Span::styled("CHECKLIST", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  "),
            Span::styled(
                format!("{open} open of {} task(s)", self.tasks.len()),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::ITALIC),
            ),
        ])];
        let header_block = Paragraph::new(header_text)
            .block(Block::default().borders(Borders::ALL))
            .alignment(Alignment::Center);
        f.render_widget(header_block, chunks[0]);

        let items: Vec<ListItem> = self
            .tasks
            .iter()
            .enumerate()
            .map(|(i, task)| {
                let marker = if task.completed { "[x]" } else { "[ ]" };
                let text_style = if task.completed {
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::CROSSED_OUT)
                } else {
                    Style::default()
                };
                ListItem::new(Line::from(vec![
                    Span::raw(format!("{marker} ")),
                    Span::styled(format!("{:>3}. ", i + 1), Style::default().fg(Color::DarkGray)),
                    Span::styled(task.text.clone(), text_style),
                ]))
            })
            .collect();

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("Tasks ({}) - Press 'h' for help", self.tasks.len())),
            )
            .highlight_style(Style::default().bg(Color::Gray).fg(Color::Black))
            .highlight_symbol(">> ");

        f.render_stateful_widget(list, chunks[1], &mut self.list_state);
    }

    /// Render the add-task input anchored above the status bar.
    fn render_add_input(&mut self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(3)])
            .split(area);

        let input = Paragraph::new(self.input.value.as_str()).block(
            Block::default()
                .borders(Borders::ALL)
                .title("New Task (Enter to add, Esc to cancel)")
                .border_style(Style::default().fg(GOLD)),
        );
        f.render_widget(Clear, chunks[1]);
        f.render_widget(input, chunks[1]);
        f.set_cursor_position((
            chunks[1].x + self.input.cursor() as u16 + 1,
            chunks[1].y + 1,
        ));
    }

    /// Render the edit modal over the checklist.
    fn render_edit_modal(&mut self, f: &mut Frame, area: Rect) {
        let area = centered_rect(60, 20, area);
        f.render_widget(Clear, area);

        let input = Paragraph::new(self.input.value.as_str()).block(
            Block::default()
                .borders(Borders::ALL)
                .title("Edit Task (Enter to save, Esc to cancel)")
                .border_style(Style::default().fg(GOLD)),
        );
        f.render_widget(input, area);
        f.set_cursor_position((area.x + self.input.cursor() as u16 + 1, area.y + 1));
    }

    /// Render a confirmation dialog for destructive actions.
    fn render_confirm(&mut self, f: &mut Frame, area: Rect) {
        let block = Block::default()
            .title("Confirm Action")
            .borders(Borders::ALL)
            .style(Style::default().bg(DARK_RED));

        let area = centered_rect(50, 20, area);
        f.render_widget(Clear, area);

        let action = self
            .pending_delete
            .and_then(|idx| self.tasks.get(idx))
            .map(|task| format!("Delete \"{}\"", task.text))
            .unwrap_or_default();

        let text = vec![
            Line::from(""),
            Line::from(vec![Span::styled(
                "Are you sure you want to:",
                Style::default().add_modifier(Modifier::BOLD),
            )]),
            Line::from(action),
            Line::from(""),
            Line::from("This action cannot be undone."),
            Line::from(""),
            Line::from("Press 'y' to confirm, 'n' to cancel"),
        ];

        let paragraph = Paragraph::new(text)
            .block(block)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true });

        f.render_widget(paragraph, area);
    }

    /// Render the help screen with keyboard shortcuts.
    fn render_help(&mut self, f: &mut Frame, area: Rect) {
        let help_text = vec![
            Line::from(vec![Span::styled(
                "Checklist Help",
                Style::default().add_modifier(Modifier::BOLD),
            )]),
            Line::from(""),
            Line::from(vec![Span::styled(
                "Task List:",
                Style::default().add_modifier(Modifier::BOLD),
            )]),
            Line::from("  Up/k, Down/j   Select task"),
            Line::from("  Space          Toggle completion"),
            Line::from("  a              Add new task"),
            Line::from("  e              Edit selected task"),
            Line::from("  d              Delete selected task (asks first)"),
            Line::from("  r              Reload from the store"),
            Line::from("  h/F1           Show this help"),
            Line::from("  q/Esc/Ctrl+C   Quit"),
            Line::from(""),
            Line::from(vec![Span::styled(
                "Add / Edit:",
                Style::default().add_modifier(Modifier::BOLD),
            )]),
            Line::from("  Enter          Save"),
            Line::from("  Esc            Cancel"),
            Line::from("  Ctrl+Backspace Clear the field"),
            Line::from("  Home/End       Jump within the field"),
            Line::from(""),
            Line::from("Press Esc, 'q' or 'h' to return"),
        ];

        let help = Paragraph::new(help_text)
            .block(Block::default().borders(Borders::ALL).title("Help"))
            .wrap(Wrap { trim: false });
        f.render_widget(help, area);
    }

    /// Render the status bar at the bottom of the screen.
    fn render_status_bar(&mut self, f: &mut Frame, area: Rect) {
        let status_text = if !self.status_message.is_empty() {
            self.status_message.clone()
        } else {
            match self.state {
                AppState::List => {
                    format!("Tasks: {} | Press 'h' for help", self.tasks.len())
                }
                AppState::AddTask => "Add New Task".to_string(),
                AppState::EditTask => "Edit Task".to_string(),
                AppState::Confirm => "Confirm Delete".to_string(),
                AppState::Help => "Help".to_string(),
            }
        };

        let status = Paragraph::new(status_text)
            .style(Style::default().bg(Color::Blue).fg(Color::White))
            .alignment(Alignment::Left);
        f.render_widget(status, area);
    }

    /// Main render function that dispatches to appropriate view renderers.
    fn render(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(1)].as_ref())
            .split(f.area());

        match self.state {
            AppState::List => self.render_task_list(f, chunks[0]),
            AppState::AddTask => {
                self.render_task_list(f, chunks[0]);
                self.render_add_input(f, chunks[0]);
            }
            AppState::EditTask => {
                self.render_task_list(f, chunks[0]);
                self.render_edit_modal(f, chunks[0]);
            }
            AppState::Confirm => {
                self.render_task_list(f, chunks[0]);
                self.render_confirm(f, chunks[0]);
            }
            AppState::Help => self.render_help(f, chunks[0]),
        }

        self.render_status_bar(f, chunks[1]);
    }

    /// Main event loop for the TUI application.
    ///
    /// Handles rendering and input processing until the user exits.
    pub fn run<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> io::Result<()> {
        loop {
            terminal.draw(|f| self.render(f))?;

            if self.handle_input()? {
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_app() -> App {
        App::new(Arc::new(Store::open_in_memory().expect("in-memory store")))
    }

    fn press(app: &mut App, key: KeyCode) {
        app.handle_key(key, KeyModifiers::NONE).expect("key handling");
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn add_task(app: &mut App, text: &str) {
        press(app, KeyCode::Char('a'));
        type_text(app, text);
        press(app, KeyCode::Enter);
    }

    fn texts(app: &App) -> Vec<&str> {
        app.tasks.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn adding_a_task_appends_it_uncompleted() {
        let mut app = test_app();
        add_task(&mut app, "Buy milk");

        assert_eq!(texts(&app), vec!["Buy milk"]);
        assert!(!app.tasks[0].completed);
        assert!(app.tasks[0].id.is_some(), "store issues the id on add");
        assert!(app.state == AppState::List);
    }

    #[test]
    fn adding_blank_input_is_a_no_op() {
        let mut app = test_app();
        add_task(&mut app, "   ");

        assert!(app.tasks.is_empty());
        assert!(app.state == AppState::List);
    }

    #[test]
    fn toggling_twice_restores_the_original_state() {
        let mut app = test_app();
        add_task(&mut app, "Buy milk");

        press(&mut app, KeyCode::Char(' '));
        assert!(app.tasks[0].completed);
        press(&mut app, KeyCode::Char(' '));
        assert!(!app.tasks[0].completed);
    }

    #[test]
    fn editing_replaces_only_the_targeted_text() {
        let mut app = test_app();
        add_task(&mut app, "Buy milk");
        add_task(&mut app, "Walk dog");
        let ids: Vec<_> = app.tasks.iter().map(|t| t.id).collect();

        app.list_state.select(Some(0));
        press(&mut app, KeyCode::Char('e'));
        app.handle_key(KeyCode::Backspace, KeyModifiers::CONTROL)
            .expect("clear staged text");
        type_text(&mut app, "Buy oat milk");
        press(&mut app, KeyCode::Enter);

        assert_eq!(texts(&app), vec!["Buy oat milk", "Walk dog"]);
        assert!(app.tasks.iter().all(|t| !t.completed));
        let ids_after: Vec<_> = app.tasks.iter().map(|t| t.id).collect();
        assert_eq!(ids_after, ids, "editing must not touch ids");
    }

    #[test]
    fn cancelling_an_edit_discards_the_staged_text() {
        let mut app = test_app();
        add_task(&mut app, "Buy milk");

        press(&mut app, KeyCode::Char('e'));
        type_text(&mut app, " and bread");
        press(&mut app, KeyCode::Esc);

        assert_eq!(texts(&app), vec!["Buy milk"]);
    }

    #[test]
    fn committing_an_empty_edit_is_permitted() {
        let mut app = test_app();
        add_task(&mut app, "Buy milk");

        press(&mut app, KeyCode::Char('e'));
        app.handle_key(KeyCode::Backspace, KeyModifiers::CONTROL)
            .expect("clear staged text");
        press(&mut app, KeyCode::Enter);

        assert_eq!(texts(&app), vec![""]);
    }

    #[test]
    fn deleting_with_confirmation_removes_exactly_one_task() {
        let mut app = test_app();
        add_task(&mut app, "Buy milk");
        add_task(&mut app, "Walk dog");

        app.list_state.select(Some(0));
        press(&mut app, KeyCode::Char('d'));
        assert!(app.state == AppState::Confirm);
        press(&mut app, KeyCode::Char('y'));

        assert_eq!(texts(&app), vec!["Walk dog"]);
    }

    #[test]
    fn declining_the_confirmation_leaves_the_list_unchanged() {
        let mut app = test_app();
        add_task(&mut app, "Buy milk");
        add_task(&mut app, "Walk dog");

        app.list_state.select(Some(0));
        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Char('n'));

        assert_eq!(texts(&app), vec!["Buy milk", "Walk dog"]);
    }

    #[test]
    fn reload_reads_back_the_persisted_list() {
        let mut app = test_app();
        add_task(&mut app, "Buy milk");

        press(&mut app, KeyCode::Char('r'));
        assert_eq!(texts(&app), vec!["Buy milk"]);
    }

    #[test]
    fn quit_keys_exit_the_list_state() {
        let mut app = test_app();
        assert!(app
            .handle_key(KeyCode::Char('q'), KeyModifiers::NONE)
            .expect("key handling"));
    }

    #[test]
    fn store_converges_to_the_final_list_on_shutdown() {
        let store = Arc::new(Store::open_in_memory().expect("in-memory store"));
        let mut app = App::new(Arc::clone(&store));

        add_task(&mut app, "Buy milk");
        add_task(&mut app, "Walk dog");
        add_task(&mut app, "Water plants");
        press(&mut app, KeyCode::Char(' ')); // complete "Water plants"
        app.list_state.select(Some(0));
        press(&mut app, KeyCode::Char('d'));
        press(&mut app, KeyCode::Enter); // confirm deleting "Buy milk"

        let expected = app.tasks.clone();
        drop(app); // drains the writer queue

        assert_eq!(store.load_all().expect("load_all"), expected);
        assert_eq!(texts_of(&expected), vec!["Walk dog", "Water plants"]);
    }

    fn texts_of(tasks: &[Task]) -> Vec<&str> {
        tasks.iter().map(|t| t.text.as_str()).collect()
    }
}
