use std::sync::Arc;

use chatassist_core::{
    ChatError, Config, ConversationController, GeminiClient, PendingTurn, TurnId,
};
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::task::JoinHandle;

/// Rows a line takes when wrapped at `width` columns (at least one)
fn wrapped_rows(line: &str, width: usize) -> u16 {
    // Character count, not byte length, for UTF-8 text
    let rows = line.chars().count().div_ceil(width.max(1)).max(1);
    u16::try_from(rows).unwrap_or(u16::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Browsing the transcript
    Normal,
    /// Typing a new message in the composer
    Composing,
    /// Rewriting a past user message in place
    EditingMessage,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub controller: ConversationController,
    pub config: Config,

    // Composer
    pub input: String,
    pub input_cursor: usize, // cursor position in chars

    // Inline message editor
    pub edit_input: String,
    pub edit_cursor: usize,

    // Transcript view
    pub selected_message: Option<usize>,
    pub chat_scroll: u16,
    pub chat_height: u16, // Height of chat area for scroll calculations
    pub chat_width: u16,  // Width of chat area for wrap calculations
    pub chat_area: Option<Rect>,

    // Reply in flight
    pending: Option<(TurnId, JoinHandle<Result<String, ChatError>>)>,
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Persona picker state
    pub show_persona_picker: bool,
    pub persona_picker_state: ListState,

    // API key input state
    pub show_api_key_input: bool,
    pub api_key_input: String,
    pub api_key_input_cursor: usize,

    /// One-line notice shown in the footer until the next key press
    pub status: Option<String>,
}

impl App {
    pub fn new(controller: ConversationController, config: Config) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Composing,
            controller,
            config,

            input: String::new(),
            input_cursor: 0,

            edit_input: String::new(),
            edit_cursor: 0,

            selected_message: None,
            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_area: None,

            pending: None,
            animation_frame: 0,

            show_persona_picker: false,
            persona_picker_state: ListState::default(),

            show_api_key_input: false,
            api_key_input: String::new(),
            api_key_input_cursor: 0,

            status: None,
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.controller.is_busy()
    }

    fn dispatch(&mut self, turn: PendingTurn) {
        let client = self.controller.client();
        let PendingTurn {
            id,
            system_prompt,
            user_text,
        } = turn;

        let handle = tokio::spawn(async move { client.complete(&system_prompt, &user_text).await });
        self.pending = Some((id, handle));
        self.scroll_to_bottom();
    }

    /// Feed a finished completion task back into the controller
    pub async fn poll_pending(&mut self) {
        let finished = matches!(&self.pending, Some((_, handle)) if handle.is_finished());
        if !finished {
            return;
        }

        if let Some((turn, handle)) = self.pending.take() {
            let result = match handle.await {
                Ok(result) => result,
                Err(err) => Err(ChatError::request_failed(format!(
                    "completion task failed: {}",
                    err
                ))),
            };
            self.controller.complete_turn(turn, result);
            self.scroll_to_bottom();
        }
    }

    fn report(&mut self, err: &ChatError) {
        self.status = Some(match err {
            ChatError::Busy => "Wait for the current reply to finish".to_string(),
            ChatError::InvalidArgument(_) => "Message can't be empty".to_string(),
            ChatError::NotFound(_) => "That message can't be edited".to_string(),
            ChatError::RequestFailed(detail) => format!("Request failed: {}", detail),
        });
    }

    // Composer
    pub fn submit_input(&mut self) {
        match self.controller.begin_submit(&self.input) {
            Ok(turn) => {
                self.input.clear();
                self.input_cursor = 0;
                self.selected_message = None;
                self.dispatch(turn);
            }
            // Blank input is silently ignored
            Err(ChatError::InvalidArgument(_)) => {}
            Err(err) => self.report(&err),
        }
    }

    // Inline editing
    pub fn start_edit_selected(&mut self) {
        if self.is_waiting() {
            self.report(&ChatError::Busy);
            return;
        }

        let Some(id) = self
            .selected_message
            .and_then(|i| self.controller.transcript().messages().get(i))
            .map(|m| m.id)
        else {
            return;
        };

        match self.controller.begin_edit(id) {
            Ok(text) => {
                self.edit_cursor = text.chars().count();
                self.edit_input = text;
                self.input_mode = InputMode::EditingMessage;
            }
            Err(err) => self.report(&err),
        }
    }

    pub fn commit_edit(&mut self) {
        let Some(id) = self.controller.editing() else {
            self.input_mode = InputMode::Normal;
            return;
        };

        match self.controller.begin_commit_edit(id, &self.edit_input) {
            Ok(turn) => {
                self.edit_input.clear();
                self.edit_cursor = 0;
                self.input_mode = InputMode::Normal;
                self.selected_message = None;
                self.dispatch(turn);
            }
            Err(err @ ChatError::NotFound(_)) => {
                self.report(&err);
                self.cancel_edit();
            }
            Err(err) => self.report(&err),
        }
    }

    pub fn cancel_edit(&mut self) {
        self.controller.cancel_edit();
        self.edit_input.clear();
        self.edit_cursor = 0;
        self.input_mode = InputMode::Normal;
    }

    // Transcript selection
    pub fn select_next_message(&mut self) {
        let len = self.controller.transcript().len();
        if len > 0 {
            let next = self.selected_message.map_or(len - 1, |i| (i + 1).min(len - 1));
            self.selected_message = Some(next);
        }
    }

    pub fn select_prev_message(&mut self) {
        let len = self.controller.transcript().len();
        if len > 0 {
            let prev = self.selected_message.map_or(len - 1, |i| i.saturating_sub(1));
            self.selected_message = Some(prev);
        }
    }

    // Chat scrolling
    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines);
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
    }

    pub fn half_page(&self) -> u16 {
        (self.chat_height / 2).max(1)
    }

    /// Scroll chat to bottom so the newest message (or "Thinking...") is visible
    pub fn scroll_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in self.controller.transcript().messages() {
            total_lines = total_lines.saturating_add(1); // Sender line
            for line in msg.text.lines() {
                total_lines = total_lines.saturating_add(wrapped_rows(line, wrap_width));
            }
            total_lines = total_lines.saturating_add(1); // Blank line after message
        }

        if self.is_waiting() {
            total_lines = total_lines.saturating_add(2);
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.is_waiting() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Persona picker methods
    pub fn open_persona_picker(&mut self) {
        let current = self
            .controller
            .personas()
            .position(self.controller.active_persona().id)
            .unwrap_or(0);
        self.persona_picker_state.select(Some(current));
        self.show_persona_picker = true;
    }

    pub fn persona_picker_nav_down(&mut self) {
        let len = self.controller.personas().list().len();
        if len > 0 {
            let i = self.persona_picker_state.selected().unwrap_or(0);
            self.persona_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn persona_picker_nav_up(&mut self) {
        let i = self.persona_picker_state.selected().unwrap_or(0);
        self.persona_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_persona(&mut self) {
        self.show_persona_picker = false;

        let Some(persona_id) = self
            .persona_picker_state
            .selected()
            .and_then(|i| self.controller.personas().list().get(i))
            .map(|p| p.id)
        else {
            return;
        };

        match self.controller.switch_persona(persona_id) {
            Ok(_) => {
                self.selected_message = None;
                self.edit_input.clear();
                self.edit_cursor = 0;
                self.chat_scroll = 0;
                if self.input_mode == InputMode::EditingMessage {
                    self.input_mode = InputMode::Normal;
                }
            }
            Err(err) => self.report(&err),
        }
    }

    // API key popup
    pub fn open_api_key_input(&mut self) {
        self.api_key_input.clear();
        self.api_key_input_cursor = 0;
        self.show_api_key_input = true;
    }

    pub fn close_api_key_input(&mut self) {
        self.show_api_key_input = false;
        self.api_key_input.clear();
        self.api_key_input_cursor = 0;
    }

    /// Rebuild the backend client with the entered key and persist the key
    pub fn apply_api_key(&mut self) {
        let key = self.api_key_input.trim().to_string();
        if key.is_empty() {
            self.close_api_key_input();
            return;
        }

        let client = match GeminiClient::from_config(&self.config, &key) {
            Ok(client) => client,
            Err(err) => {
                tracing::error!(error = %err, "Could not build completion client");
                self.status = Some(format!("Could not configure client: {}", err));
                return;
            }
        };

        if let Err(err) = self.controller.set_client(Arc::new(client)) {
            self.report(&err);
            return;
        }

        self.config.api_key = Some(key.clone());
        if let Err(err) = Config::save_api_key(&key) {
            tracing::warn!(error = %err, "Failed to save API key to config");
            self.status = Some("API key set for this session (could not save config)".to_string());
        } else {
            self.status = Some("API key saved".to_string());
        }
        self.close_api_key_input();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{settle, test_app};
    use chatassist_core::{ControllerState, Sender, ERROR_REPLY};

    #[tokio::test]
    async fn test_submit_input_round_trip() {
        let mut app = test_app();
        app.input = "hi".to_string();
        app.input_cursor = 2;

        app.submit_input();
        assert!(app.input.is_empty());
        assert_eq!(app.controller.state(), ControllerState::AwaitingCompletion);
        assert_eq!(app.controller.transcript().len(), 2);

        settle(&mut app).await;

        let last = app.controller.transcript().last().unwrap();
        assert_eq!(last.sender, Sender::Assistant);
        assert_eq!(last.text, "echo: hi");
        assert_eq!(app.controller.state(), ControllerState::Idle);
    }

    #[tokio::test]
    async fn test_blank_input_is_ignored() {
        let mut app = test_app();
        app.input = "   ".to_string();

        app.submit_input();

        assert_eq!(app.controller.transcript().len(), 1);
        assert!(app.status.is_none());
        assert_eq!(app.input, "   ");
    }

    #[tokio::test]
    async fn test_submit_while_waiting_sets_status() {
        let mut app = test_app();
        app.input = "one".to_string();
        app.submit_input();
        app.input = "two".to_string();

        app.submit_input();

        assert_eq!(app.input, "two");
        assert!(app.status.as_deref().unwrap().contains("Wait"));
        settle(&mut app).await;
        assert_eq!(app.controller.transcript().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_reply_shows_error_text() {
        let mut app = test_app();
        app.input = "fail please".to_string();

        app.submit_input();
        settle(&mut app).await;

        assert_eq!(app.controller.transcript().last().unwrap().text, ERROR_REPLY);
        assert!(!app.is_waiting());
    }

    #[tokio::test]
    async fn test_edit_selected_message_regenerates() {
        let mut app = test_app();
        app.input = "hi".to_string();
        app.submit_input();
        settle(&mut app).await;

        app.selected_message = Some(1);
        app.start_edit_selected();
        assert_eq!(app.input_mode, InputMode::EditingMessage);
        assert_eq!(app.edit_input, "hi");

        app.edit_input = "bye".to_string();
        app.commit_edit();
        assert_eq!(app.controller.transcript().len(), 2);
        settle(&mut app).await;

        let texts: Vec<&str> = app
            .controller
            .transcript()
            .messages()
            .iter()
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(texts[1..], ["bye", "echo: bye"]);
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[tokio::test]
    async fn test_cannot_edit_assistant_message() {
        let mut app = test_app();
        app.selected_message = Some(0);

        app.start_edit_selected();

        assert_eq!(app.input_mode, InputMode::Composing);
        assert!(app.status.is_some());
        assert_eq!(app.controller.editing(), None);
    }

    #[tokio::test]
    async fn test_persona_picker_switches_and_resets() {
        let mut app = test_app();
        app.input = "hi".to_string();
        app.submit_input();
        settle(&mut app).await;

        app.open_persona_picker();
        assert_eq!(app.persona_picker_state.selected(), Some(0));
        app.persona_picker_nav_down();
        app.persona_picker_nav_down();
        app.persona_picker_nav_down();
        app.select_persona();

        assert!(!app.show_persona_picker);
        assert_eq!(app.controller.active_persona().id, "support");
        assert_eq!(app.controller.transcript().len(), 1);
    }

    #[test]
    fn test_wrapped_rows() {
        assert_eq!(wrapped_rows("", 10), 1);
        assert_eq!(wrapped_rows("abc", 10), 1);
        assert_eq!(wrapped_rows(&"x".repeat(10), 10), 1);
        assert_eq!(wrapped_rows(&"x".repeat(11), 10), 2);
        assert_eq!(wrapped_rows("héllo", 5), 1);
        assert_eq!(wrapped_rows(&"x".repeat(200_000), 1), u16::MAX);
    }

    #[tokio::test]
    async fn test_scroll_to_bottom_exact_width_lines() {
        let mut app = test_app();
        app.chat_width = 10;
        app.chat_height = 3;
        app.input = "x".repeat(10);
        app.submit_input();
        settle(&mut app).await;

        // Each message: label row, wrapped text rows, blank row. "echo: " pushes the reply to 2 rows.
        let greeting_rows = wrapped_rows(&app.controller.transcript().messages()[0].text, 10);
        let total = (greeting_rows + 2) + 3 + 4;
        app.scroll_to_bottom();
        assert_eq!(app.chat_scroll, total - 3);
    }

    #[tokio::test]
    async fn test_message_selection_bounds() {
        let mut app = test_app();
        app.select_prev_message();
        assert_eq!(app.selected_message, Some(0));
        app.select_next_message();
        assert_eq!(app.selected_message, Some(0));
        app.select_prev_message();
        assert_eq!(app.selected_message, Some(0));
    }
}
