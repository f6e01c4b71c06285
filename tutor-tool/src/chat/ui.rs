use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};
use tutor_chat::{Delivery, Entry, EntryKind, Message, Role};

use super::app::{AppMode, ChatApp};

const THREAD_INDENT: &str = "    │ ";

/// Lines of input shown before the box starts scrolling.
const MAX_INPUT_LINES: usize = 5;

pub fn render(frame: &mut Frame, app: &ChatApp) {
    let input_lines = app
        .active_composer()
        .map_or(1, |c| c.line_count().min(MAX_INPUT_LINES));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),                      // Header
            Constraint::Min(1),                         // Transcript
            Constraint::Length(input_lines as u16 + 2), // Input
            Constraint::Length(1),                      // Status bar
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);
    render_transcript(frame, app, chunks[1]);
    render_input(frame, app, chunks[2]);
    render_status_bar(frame, app, chunks[3]);

    match app.mode {
        AppMode::SelectSubject => render_subject_popup(frame, app),
        AppMode::SelectSuggestion => render_suggestion_popup(frame, app),
        _ => {}
    }
}

fn render_header(frame: &mut Frame, app: &ChatApp, area: Rect) {
    let subject = app.subject.as_ref().map_or("any subject", |s| s.name.as_str());
    let title = format!("tutor chat - {}", subject);

    let header = Paragraph::new(title)
        .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));

    frame.render_widget(header, area);
}

fn message_header(msg: &Message, selected: bool) -> Line<'static> {
    let (name, color) = match msg.role {
        Role::User => ("You", Color::Green),
        Role::Assistant => ("Tutor", Color::Blue),
    };
    let mut style = Style::default().fg(color).add_modifier(Modifier::BOLD);
    if selected {
        style = style.add_modifier(Modifier::REVERSED);
    }

    let mut spans = vec![Span::styled(format!("{}:", name), style)];
    if !msg.timestamp.is_empty() {
        spans.push(Span::styled(
            format!(" {}", msg.timestamp),
            Style::default().fg(Color::DarkGray),
        ));
    }
    if msg.edited {
        spans.push(Span::styled(" (edited)", Style::default().fg(Color::DarkGray)));
    }
    match msg.delivery {
        Delivery::Pending => spans.push(Span::styled(
            " sending…",
            Style::default().fg(Color::Yellow),
        )),
        Delivery::Failed => spans.push(Span::styled(
            " not delivered",
            Style::default().fg(Color::Red),
        )),
        Delivery::Confirmed => {}
    }
    Line::from(spans)
}

fn entry_lines(entry: &Entry, indent: &str, selected: bool, lines: &mut Vec<Line<'static>>) {
    match &entry.kind {
        EntryKind::Message(msg) => {
            let mut header = message_header(msg, selected);
            header.spans.insert(0, Span::raw(indent.to_string()));
            lines.push(header);

            if msg.is_editing() {
                lines.push(Line::from(Span::styled(
                    format!("{}  Editing…", indent),
                    Style::default()
                        .fg(Color::DarkGray)
                        .add_modifier(Modifier::ITALIC),
                )));
            } else {
                for line in msg.content.lines() {
                    lines.push(Line::from(format!("{}  {}", indent, line)));
                }
            }
        }
        EntryKind::Typing => {
            lines.push(Line::from(Span::styled(
                format!("{}Tutor is typing…", indent),
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::ITALIC),
            )));
        }
        EntryKind::Error(text) => {
            lines.push(Line::from(Span::styled(
                format!("{}{}", indent, text),
                Style::default().fg(Color::Red),
            )));
        }
    }
}

fn render_transcript(frame: &mut Frame, app: &ChatApp, area: Rect) {
    let transcript = app.controller.transcript();
    let mut lines: Vec<Line> = Vec::new();

    for entry in transcript.entries() {
        entry_lines(entry, "", app.selected == Some(entry.key), &mut lines);

        if let Some(thread) = transcript.thread(entry.key) {
            for reply in thread.entries() {
                entry_lines(reply, THREAD_INDENT, false, &mut lines);
            }
            if thread.composer_open {
                lines.push(Line::from(Span::styled(
                    format!("{}(replying…)", THREAD_INDENT),
                    Style::default().fg(Color::DarkGray),
                )));
            }
        }

        lines.push(Line::from("")); // Empty line between entries
    }

    let messages_block = Block::default().borders(Borders::ALL).title("Conversation");

    // Scroll offset that keeps the bottom of the conversation in view
    let visible_height = area.height.saturating_sub(2) as usize; // Account for borders
    let total_lines = lines.len();
    let scroll = if total_lines > visible_height {
        (total_lines - visible_height).saturating_sub(app.messages_scroll as usize)
    } else {
        0
    };

    let paragraph = Paragraph::new(Text::from(lines))
        .block(messages_block)
        .wrap(Wrap { trim: false })
        .scroll((scroll as u16, 0));

    frame.render_widget(paragraph, area);
}

fn render_input(frame: &mut Frame, app: &ChatApp, area: Rect) {
    let title = match app.mode {
        AppMode::Edit(_) => "Edit message",
        AppMode::Reply(_) => "Reply in thread",
        _ => "Ask the tutor",
    };
    let input_block = Block::default().borders(Borders::ALL).title(title);

    let Some(composer) = app.active_composer() else {
        frame.render_widget(input_block, area);
        return;
    };

    let (display_text, style) = if composer.text().is_empty() {
        (
            "Type your question here...".to_string(),
            Style::default().fg(Color::DarkGray),
        )
    } else {
        (composer.text().to_string(), Style::default())
    };

    // Keep the cursor line inside the box
    let visible = area.height.saturating_sub(2).max(1) as usize;
    let line = composer.cursor_line();
    let scroll = line.saturating_sub(visible - 1);

    let input_paragraph = Paragraph::new(display_text)
        .style(style)
        .block(input_block)
        .scroll((scroll as u16, 0));
    frame.render_widget(input_paragraph, area);

    let cursor_x = area.x + 1 + composer.cursor_column() as u16;
    let cursor_y = area.y + 1 + (line - scroll) as u16;
    frame.set_cursor_position((cursor_x, cursor_y));
}

fn render_status_bar(frame: &mut Frame, app: &ChatApp, area: Rect) {
    if let Some(status) = &app.status {
        let bar = Paragraph::new(status.as_str()).style(Style::default().fg(Color::Red));
        frame.render_widget(bar, area);
        return;
    }

    let hints = match app.mode {
        AppMode::Chat if app.is_waiting() => {
            "Waiting for the tutor…  ↑/↓: Select  ^Y: Copy  Esc: Quit"
        }
        AppMode::Chat if app.selected.is_some() => {
            "^E: Edit  ^R: Reply  ^Y: Copy  ↑/↓: Select  Enter: Send  Esc: Quit"
        }
        AppMode::Chat => {
            "Enter: Send  Shift+Enter: Newline  ↑/↓: Select  F2: Subject  F3: Suggestions  Esc: Quit"
        }
        AppMode::Edit(_) | AppMode::Reply(_) => "Enter: Send  Shift+Enter: Newline  Esc: Cancel",
        AppMode::SelectSubject | AppMode::SelectSuggestion => {
            "↑/↓: Navigate  Enter: Select  Esc: Cancel"
        }
    };

    let status_bar = Paragraph::new(hints).style(Style::default().fg(Color::DarkGray));
    frame.render_widget(status_bar, area);
}

fn render_subject_popup(frame: &mut Frame, app: &ChatApp) {
    let area = centered_rect(40, 50, frame.area());
    frame.render_widget(Clear, area);

    let items: Vec<ListItem> = app
        .subjects
        .iter()
        .map(|subject| {
            let is_current = app.subject.as_ref() == Some(subject);
            let style = if is_current {
                Style::default().fg(Color::Green)
            } else {
                Style::default()
            };
            let marker = if is_current { " ✓" } else { "" };
            ListItem::new(format!("{}{}", subject.name, marker)).style(style)
        })
        .collect();

    render_popup_list(frame, area, items, "Select Subject", app.popup_selected);
}

fn render_suggestion_popup(frame: &mut Frame, app: &ChatApp) {
    let area = centered_rect(60, 50, frame.area());
    frame.render_widget(Clear, area);

    let items: Vec<ListItem> = app
        .suggestions
        .iter()
        .map(|question| ListItem::new(question.as_str()))
        .collect();

    render_popup_list(frame, area, items, "Suggested Questions", app.popup_selected);
}

fn render_popup_list(
    frame: &mut Frame,
    area: Rect,
    items: Vec<ListItem>,
    title: &str,
    selected: usize,
) {
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(title))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");

    let mut state = ratatui::widgets::ListState::default();
    state.select(Some(selected));

    frame.render_stateful_widget(list, area, &mut state);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
