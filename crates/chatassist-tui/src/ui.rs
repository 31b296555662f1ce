use chatassist_core::{Persona, PersonaStyle, Sender};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, InputMode};

const APP_TITLE: &str = " Concise Chat Assist ";
const DISCLAIMER: &str = " AI responses may vary. Please verify important information. ";
const EDIT_CURSOR: char = '▏';

fn persona_color(style: PersonaStyle) -> Color {
    match style {
        PersonaStyle::Blue => Color::Blue,
        PersonaStyle::Green => Color::Green,
        PersonaStyle::Purple => Color::Magenta,
    }
}

/// Render `**bold**` spans; everything else is literal
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        let after_open = &rest[start + 2..];
        let Some(len) = after_open.find("**") else {
            break;
        };
        if len == 0 {
            // "****" has nothing to embolden
            spans.push(Span::raw(rest[..start + 4].to_string()));
            rest = &rest[start + 4..];
            continue;
        }

        if start > 0 {
            spans.push(Span::raw(rest[..start].to_string()));
        }
        spans.push(Span::styled(
            after_open[..len].to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        ));
        rest = &after_open[len + 2..];
    }

    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    Line::from(spans)
}

fn with_cursor(text: &str, cursor: usize) -> String {
    let mut out: String = text.chars().take(cursor).collect();
    out.push(EDIT_CURSOR);
    out.extend(text.chars().skip(cursor));
    out
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();

    let [header_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);

    if app.show_api_key_input {
        render_api_key_input(app, frame, area);
    } else if app.show_persona_picker {
        render_persona_picker(app, frame, area);
    }
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let persona = app.controller.active_persona();

    let title = Line::from(vec![
        Span::styled(APP_TITLE, Style::default().fg(Color::Cyan).bold()),
        Span::styled(
            format!(" {} {} ", persona.icon, persona.display_name),
            Style::default().fg(Color::White).bg(persona_color(persona.style)),
        ),
        Span::raw(" "),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ]);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn sender_line(persona: &Persona, sender: Sender, time: String, selected: bool) -> Line<'static> {
    let (label, color) = match sender {
        Sender::User => ("You".to_string(), Color::Cyan),
        Sender::Assistant => (persona.display_name.to_string(), persona_color(persona.style)),
    };

    let mut label_style = Style::default().fg(color).add_modifier(Modifier::BOLD);
    if selected {
        label_style = label_style.add_modifier(Modifier::REVERSED);
    }

    Line::from(vec![
        Span::raw(if selected { "> " } else { "" }),
        Span::styled(format!("{}:", label), label_style),
        Span::styled(format!(" {}", time), Style::default().fg(Color::DarkGray)),
    ])
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    app.chat_area = Some(area);
    // Inner size minus borders, for scroll calculations
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let persona = *app.controller.active_persona();
    let editing = app.controller.editing();
    let browsing = app.input_mode == InputMode::Normal;
    let border_color = if browsing { Color::Cyan } else { Color::DarkGray };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(format!(
            " {} {} · {} ",
            persona.icon,
            persona.display_name,
            app.config.model()
        ));

    let mut lines: Vec<Line> = Vec::new();

    for (i, msg) in app.controller.transcript().messages().iter().enumerate() {
        let time = msg
            .created_at
            .with_timezone(&chrono::Local)
            .format("%H:%M")
            .to_string();
        let selected = browsing && app.selected_message == Some(i);
        lines.push(sender_line(&persona, msg.sender, time, selected));

        if editing == Some(msg.id) {
            let edit_style = Style::default().fg(Color::Black).bg(Color::Yellow);
            for line in with_cursor(&app.edit_input, app.edit_cursor).split('\n') {
                lines.push(Line::from(Span::styled(line.to_string(), edit_style)));
            }
            lines.push(Line::from(Span::styled(
                "Enter to save, Esc to cancel. Later messages will be discarded.",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::ITALIC),
            )));
        } else {
            match msg.sender {
                Sender::User => {
                    for line in msg.text.lines() {
                        lines.push(Line::from(line.to_string()));
                    }
                }
                Sender::Assistant => {
                    for line in msg.text.lines() {
                        lines.push(parse_markdown_line(line));
                    }
                }
            }
        }
        lines.push(Line::default());
    }

    if app.is_waiting() {
        lines.push(Line::from(Span::styled(
            format!("{}:", persona.display_name),
            Style::default()
                .fg(persona_color(persona.style))
                .add_modifier(Modifier::BOLD),
        )));
        // Animated ellipsis: cycles through ".", "..", "..."
        let dots = ".".repeat((app.animation_frame as usize) + 1);
        lines.push(Line::from(Span::styled(
            format!("Thinking{}", dots),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )));
    }

    let chat = Paragraph::new(Text::from(lines))
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let persona = app.controller.active_persona();
    let composing = app.input_mode == InputMode::Composing;

    let (title, border_color) = if app.is_waiting() {
        (" Waiting for reply... ".to_string(), Color::DarkGray)
    } else if composing {
        (
            format!(" Message your {}... ", persona.display_name.to_lowercase()),
            Color::Yellow,
        )
    } else {
        (" Message (i to type) ".to_string(), Color::DarkGray)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title)
        .title_bottom(Line::from(DISCLAIMER).style(Style::default().fg(Color::DarkGray)));

    // Horizontal scrolling keeps the cursor inside the box
    let inner_width = area.width.saturating_sub(2) as usize;
    let scroll_offset = if inner_width == 0 || app.input_cursor < inner_width {
        0
    } else {
        app.input_cursor - inner_width + 1
    };

    let visible_text: String = app
        .input
        .chars()
        .skip(scroll_offset)
        .take(inner_width)
        .collect();

    let input = Paragraph::new(visible_text)
        .style(Style::default().fg(Color::Cyan))
        .block(block);
    frame.render_widget(input, area);

    if composing && !app.show_api_key_input && !app.show_persona_picker {
        let cursor_x = (app.input_cursor - scroll_offset) as u16;
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let (mode_text, mode_style) = match app.input_mode {
        InputMode::Normal => (" BROWSE ", Style::default().bg(Color::Blue).fg(Color::White)),
        InputMode::Composing => (" INPUT ", Style::default().bg(Color::Yellow).fg(Color::Black)),
        InputMode::EditingMessage => (" EDIT ", Style::default().bg(Color::Magenta).fg(Color::White)),
    };

    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().fg(Color::Gray);

    let mut spans = vec![Span::styled(mode_text, mode_style), Span::raw(" ")];

    if let Some(status) = &app.status {
        spans.push(Span::styled(
            status.clone(),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ));
    } else {
        let hints: &[(&str, &str)] = match app.input_mode {
            InputMode::Normal => &[
                ("j/k", "select"),
                ("e", "edit"),
                ("i", "type"),
                ("P", "persona"),
                ("K", "api key"),
                ("q", "quit"),
            ],
            InputMode::Composing => &[("Enter", "send"), ("Esc", "browse"), ("^C", "quit")],
            InputMode::EditingMessage => &[("Enter", "save & regenerate"), ("Esc", "cancel")],
        };
        for (key, label) in hints {
            spans.push(Span::styled(format!(" {} ", key), key_style));
            spans.push(Span::styled(format!(" {}  ", label), label_style));
        }
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn centered_popup(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(4));
    Rect::new(
        area.x + area.width.saturating_sub(width) / 2,
        area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    )
}

fn render_persona_picker(app: &mut App, frame: &mut Frame, area: Rect) {
    let personas = app.controller.personas().list();
    let active_id = app.controller.active_persona().id;
    let popup_area = centered_popup(area, 44, personas.len() as u16 + 2);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(" Persona (Enter to switch, Esc to cancel) ");

    let items: Vec<ListItem> = personas
        .iter()
        .map(|persona| {
            let mut style = Style::default().fg(persona_color(persona.style));
            if persona.id == active_id {
                style = style.add_modifier(Modifier::BOLD);
            }
            ListItem::new(format!(" {} {} ", persona.icon, persona.display_name)).style(style)
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Blue)
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    frame.render_stateful_widget(list, popup_area, &mut app.persona_picker_state);
}

fn render_api_key_input(app: &App, frame: &mut Frame, area: Rect) {
    let popup_area = centered_popup(area, 60, 5);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Gemini API key (Enter to save, Esc to cancel) ");

    let masked = "*".repeat(app.api_key_input.chars().count());
    let text = Text::from(vec![
        Line::from(Span::styled(
            "Stored in the config file. GEMINI_API_KEY takes precedence.",
            Style::default().fg(Color::DarkGray),
        )),
        Line::default(),
        Line::from(masked),
    ]);

    frame.render_widget(Paragraph::new(text).block(block), popup_area);

    let inner_width = popup_area.width.saturating_sub(2);
    let cursor_x = (app.api_key_input_cursor as u16).min(inner_width.saturating_sub(1));
    frame.set_cursor_position((popup_area.x + 1 + cursor_x, popup_area.y + 3));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_app;
    use ratatui::{backend::TestBackend, Terminal};

    fn screen_text(app: &mut App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_parse_markdown_bold() {
        let line = parse_markdown_line("a **b** c");
        assert_eq!(line.spans.len(), 3);
        assert_eq!(line.spans[1].content, "b");
        assert!(line.spans[1].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_parse_markdown_unclosed_is_literal() {
        let line = parse_markdown_line("a **b");
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "a **b");
    }

    #[test]
    fn test_with_cursor_inserts_marker() {
        assert_eq!(with_cursor("héllo", 2), "hé▏llo");
        assert_eq!(with_cursor("", 0), "▏");
    }

    #[test]
    fn test_render_shows_greeting() {
        let mut app = test_app();
        let screen = screen_text(&mut app);
        assert!(screen.contains("Hello! I'm your General Assistant."));
        assert!(screen.contains("Concise Chat Assist"));
        assert!(app.chat_area.is_some());
    }

    #[test]
    fn test_render_persona_picker() {
        let mut app = test_app();
        app.open_persona_picker();
        let screen = screen_text(&mut app);
        assert!(screen.contains("Customer Support"));
        assert!(screen.contains("Developer Assistant (Hindi)"));
    }
}
