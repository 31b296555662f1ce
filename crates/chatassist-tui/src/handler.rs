use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::app::{App, InputMode};
use crate::tui::AppEvent;

const MOUSE_SCROLL_LINES: u16 = 3;

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

/// Apply a cursor/edit key to a single-line buffer. Returns false if the key
/// is not a text-editing key.
fn edit_line(text: &mut String, cursor: &mut usize, key: KeyEvent) -> bool {
    let char_count = text.chars().count();
    match key.code {
        KeyCode::Backspace => {
            if *cursor > 0 {
                *cursor -= 1;
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Delete => {
            if *cursor < char_count {
                let byte_pos = char_to_byte_index(text, *cursor);
                text.remove(byte_pos);
            }
        }
        KeyCode::Left => *cursor = cursor.saturating_sub(1),
        KeyCode::Right => *cursor = (*cursor + 1).min(char_count),
        KeyCode::Home => *cursor = 0,
        KeyCode::End => *cursor = char_count,
        // Ctrl/Alt chords are bindings, not text
        KeyCode::Char(_) if key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
            return false
        }
        KeyCode::Char(c) => {
            let byte_pos = char_to_byte_index(text, *cursor);
            text.insert(byte_pos, c);
            *cursor += 1;
        }
        _ => return false,
    }
    true
}

pub fn handle_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::Key(key) => handle_key(app, key),
        AppEvent::Mouse(mouse) => handle_mouse(app, mouse),
        AppEvent::Resize => app.scroll_to_bottom(),
        AppEvent::Tick => app.tick_animation(),
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        app.should_quit = true;
        return;
    }

    app.status = None;

    if app.show_api_key_input {
        handle_api_key_input(app, key);
        return;
    }

    if app.show_persona_picker {
        handle_persona_picker(app, key);
        return;
    }

    match app.input_mode {
        InputMode::Normal => handle_normal_mode(app, key),
        InputMode::Composing => handle_composing(app, key),
        InputMode::EditingMessage => handle_editing_message(app, key),
    }
}

fn handle_normal_mode(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,

        KeyCode::Char('i') | KeyCode::Tab => {
            app.input_mode = InputMode::Composing;
            app.input_cursor = app.input.chars().count();
        }

        KeyCode::Char('j') | KeyCode::Down => app.select_next_message(),
        KeyCode::Char('k') | KeyCode::Up => app.select_prev_message(),
        KeyCode::Esc => app.selected_message = None,

        KeyCode::Char('e') | KeyCode::Enter => app.start_edit_selected(),

        // Half-page scroll (must be before plain 'd'/'u' if those get bound)
        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            let lines = app.half_page();
            app.scroll_down(lines);
        }
        KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            let lines = app.half_page();
            app.scroll_up(lines);
        }
        KeyCode::Char('g') => app.chat_scroll = 0,
        KeyCode::Char('G') => app.scroll_to_bottom(),

        KeyCode::Char('P') => app.open_persona_picker(),
        KeyCode::Char('K') => app.open_api_key_input(),

        _ => {}
    }
}

fn handle_composing(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Tab => app.input_mode = InputMode::Normal,
        KeyCode::Enter => app.submit_input(),
        _ => {
            edit_line(&mut app.input, &mut app.input_cursor, key);
        }
    }
}

fn handle_editing_message(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.cancel_edit(),
        KeyCode::Enter => app.commit_edit(),
        _ => {
            edit_line(&mut app.edit_input, &mut app.edit_cursor, key);
        }
    }
}

fn handle_persona_picker(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.show_persona_picker = false,
        KeyCode::Char('j') | KeyCode::Down => app.persona_picker_nav_down(),
        KeyCode::Char('k') | KeyCode::Up => app.persona_picker_nav_up(),
        KeyCode::Enter => app.select_persona(),
        _ => {}
    }
}

fn handle_api_key_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.close_api_key_input(),
        KeyCode::Enter => app.apply_api_key(),
        _ => {
            edit_line(&mut app.api_key_input, &mut app.api_key_input_cursor, key);
        }
    }
}

/// Check if a point is within a rectangle
fn point_in_rect(x: u16, y: u16, rect: Rect) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

fn handle_mouse(app: &mut App, mouse: MouseEvent) {
    let in_chat = app
        .chat_area
        .map(|r| point_in_rect(mouse.column, mouse.row, r))
        .unwrap_or(false);
    if !in_chat {
        return;
    }

    match mouse.kind {
        MouseEventKind::ScrollDown => app.scroll_down(MOUSE_SCROLL_LINES),
        MouseEventKind::ScrollUp => app.scroll_up(MOUSE_SCROLL_LINES),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{settle, test_app};
    use chatassist_core::ControllerState;

    fn press(app: &mut App, code: KeyCode) {
        handle_event(app, AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE)));
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn test_char_to_byte_index_multibyte() {
        let s = "héllo";
        assert_eq!(char_to_byte_index(s, 0), 0);
        assert_eq!(char_to_byte_index(s, 2), 3);
        assert_eq!(char_to_byte_index(s, 10), s.len());
    }

    #[test]
    fn test_edit_line_cursor_movement() {
        let mut text = String::from("ac");
        let mut cursor = 1;
        let key = |code| KeyEvent::new(code, KeyModifiers::NONE);

        assert!(edit_line(&mut text, &mut cursor, key(KeyCode::Char('b'))));
        assert_eq!((text.as_str(), cursor), ("abc", 2));
        assert!(edit_line(&mut text, &mut cursor, key(KeyCode::Backspace)));
        assert_eq!((text.as_str(), cursor), ("ac", 1));
        assert!(edit_line(&mut text, &mut cursor, key(KeyCode::Delete)));
        assert_eq!((text.as_str(), cursor), ("a", 1));
        assert!(edit_line(&mut text, &mut cursor, key(KeyCode::Home)));
        assert_eq!(cursor, 0);
        assert!(!edit_line(&mut text, &mut cursor, key(KeyCode::F(1))));
    }

    #[test]
    fn test_edit_line_ignores_modifier_chords() {
        let mut text = String::from("ab");
        let mut cursor = 2;

        let ctrl_u = KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL);
        let alt_d = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::ALT);
        assert!(!edit_line(&mut text, &mut cursor, ctrl_u));
        assert!(!edit_line(&mut text, &mut cursor, alt_d));
        assert_eq!((text.as_str(), cursor), ("ab", 2));

        // Shifted letters are still text
        let shift_x = KeyEvent::new(KeyCode::Char('X'), KeyModifiers::SHIFT);
        assert!(edit_line(&mut text, &mut cursor, shift_x));
        assert_eq!(text, "abX");
    }

    #[test]
    fn test_ctrl_chord_in_composer_types_nothing() {
        let mut app = test_app();
        type_text(&mut app, "hi");
        handle_event(
            &mut app,
            AppEvent::Key(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL)),
        );
        assert_eq!(app.input, "hi");
        assert_eq!(app.input_cursor, 2);
    }

    #[test]
    fn test_point_in_rect() {
        let rect = Rect::new(2, 2, 4, 4);
        assert!(point_in_rect(2, 2, rect));
        assert!(point_in_rect(5, 5, rect));
        assert!(!point_in_rect(6, 5, rect));
        assert!(!point_in_rect(1, 3, rect));
    }

    #[tokio::test]
    async fn test_typing_and_enter_submits() {
        let mut app = test_app();
        type_text(&mut app, "hi");
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.controller.state(), ControllerState::AwaitingCompletion);
        settle(&mut app).await;
        assert_eq!(app.controller.transcript().len(), 3);
    }

    #[tokio::test]
    async fn test_edit_flow_via_keys() {
        let mut app = test_app();
        type_text(&mut app, "hi");
        press(&mut app, KeyCode::Enter);
        settle(&mut app).await;

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.input_mode, InputMode::Normal);
        // Bottom is the reply, one up is the user message
        press(&mut app, KeyCode::Char('k'));
        press(&mut app, KeyCode::Char('k'));
        press(&mut app, KeyCode::Char('e'));
        assert_eq!(app.input_mode, InputMode::EditingMessage);

        press(&mut app, KeyCode::End);
        press(&mut app, KeyCode::Backspace);
        press(&mut app, KeyCode::Backspace);
        type_text(&mut app, "bye");
        press(&mut app, KeyCode::Enter);
        settle(&mut app).await;

        let last = app.controller.transcript().last().unwrap();
        assert_eq!(last.text, "echo: bye");
        assert_eq!(app.controller.transcript().len(), 3);
    }

    #[tokio::test]
    async fn test_escape_cancels_edit_without_changes() {
        let mut app = test_app();
        type_text(&mut app, "hi");
        press(&mut app, KeyCode::Enter);
        settle(&mut app).await;

        app.input_mode = InputMode::Normal;
        app.selected_message = Some(1);
        press(&mut app, KeyCode::Enter);
        type_text(&mut app, " there");
        press(&mut app, KeyCode::Esc);

        assert_eq!(app.input_mode, InputMode::Normal);
        assert_eq!(app.controller.editing(), None);
        assert_eq!(app.controller.transcript().messages()[1].text, "hi");
    }

    #[tokio::test]
    async fn test_ctrl_c_quits() {
        let mut app = test_app();
        handle_event(
            &mut app,
            AppEvent::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
        );
        assert!(app.should_quit);
    }
}
