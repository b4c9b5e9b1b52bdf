//! UI rendering for the TUI

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph},
};
use unicode_width::UnicodeWidthStr;

use sandchat_core::chat::{ChatMessage, Role};
use sandchat_core::output::{ExecutionOutput, Representation, StreamName};
use sandchat_core::tools::{self, InvocationOutcome, ToolDisplay};
use sandchat_core::upload::UploadState;

use super::{App, AppState, SUGGESTED_PROMPTS};

/// Draw the entire UI
pub fn draw(frame: &mut Frame, app: &mut App) {
    let uploading = app.upload.state == UploadState::InFlight;
    let notice_count =
        app.upload_banner.iter().count() as u16 + app.warning.iter().count() as u16;

    let mut constraints = vec![Constraint::Min(5)];
    if uploading {
        constraints.push(Constraint::Length(3));
    }
    if notice_count > 0 {
        constraints.push(Constraint::Length(notice_count));
    }
    constraints.push(Constraint::Length(1)); // Status bar
    constraints.push(Constraint::Length(3)); // Input area

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(frame.area());

    let mut next = 0;
    draw_messages(frame, app, chunks[next]);
    next += 1;
    if uploading {
        draw_upload_gauge(frame, app, chunks[next]);
        next += 1;
    }
    if notice_count > 0 {
        draw_notices(frame, app, chunks[next]);
        next += 1;
    }
    draw_status_bar(frame, app, chunks[next]);
    draw_input(frame, app, chunks[next + 1]);
}

/// Draw the messages area
fn draw_messages(frame: &mut Frame, app: &mut App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(" Sandchat ");
    let inner_area = block.inner(area);
    frame.render_widget(block, area);

    let width = (inner_area.width as usize).saturating_sub(2);
    let items: Vec<ListItem> = {
        let transcript = app.transcript.lock();
        if transcript.is_empty() {
            overview_items()
        } else {
            transcript
                .messages()
                .iter()
                .flat_map(|message| message_to_items(message, width))
                .collect()
        }
    };

    let total_lines = items.len();
    let visible_lines = inner_area.height as usize;

    // scroll_offset == usize::MAX means pinned to the bottom
    let scroll = if app.scroll_offset == usize::MAX {
        total_lines.saturating_sub(visible_lines)
    } else {
        app.scroll_offset
            .min(total_lines.saturating_sub(visible_lines))
    };
    if app.scroll_offset == usize::MAX && total_lines > visible_lines {
        app.scroll_offset = total_lines - visible_lines;
    }

    let visible: Vec<ListItem> = items.into_iter().skip(scroll).take(visible_lines).collect();
    frame.render_widget(List::new(visible), inner_area);
}

/// Welcome screen shown before the first message
fn overview_items() -> Vec<ListItem<'static>> {
    let mut items = vec![
        ListItem::new(Line::from(Span::styled(
            "Chat with an assistant that can run code in your sandbox.",
            Style::default().fg(Color::Gray),
        ))),
        ListItem::new(Line::from("")),
        ListItem::new(Line::from(Span::styled(
            "Try one of these to get started:",
            Style::default().fg(Color::DarkGray),
        ))),
    ];
    for (title, label) in SUGGESTED_PROMPTS {
        items.push(ListItem::new(Line::from(vec![
            Span::raw("  • "),
            Span::styled(title, Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" "),
            Span::styled(label, Style::default().fg(Color::DarkGray)),
        ])));
    }
    items.push(ListItem::new(Line::from("")));
    items.push(ListItem::new(Line::from(Span::styled(
        "/upload <path> sends a file to the sandbox. Esc cancels a turn.",
        Style::default().fg(Color::DarkGray),
    ))));
    items
}

/// Convert one message (text, attachments, tool cells) to styled lines
fn message_to_items(message: &ChatMessage, width: usize) -> Vec<ListItem<'static>> {
    let mut items = Vec::new();

    let (prefix, style) = match message.role {
        Role::User => (
            "You: ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Role::Assistant => (
            "Assistant: ",
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        ),
    };

    if !message.text.is_empty() {
        let content_width = width.saturating_sub(prefix.len());
        for (i, line) in wrap_text(&message.text, content_width).into_iter().enumerate() {
            let item = if i == 0 {
                Line::from(vec![Span::styled(prefix.to_string(), style), Span::raw(line)])
            } else {
                Line::from(vec![Span::raw(" ".repeat(prefix.len())), Span::raw(line)])
            };
            items.push(ListItem::new(item));
        }
    }

    for attachment in &message.attachments {
        items.push(ListItem::new(Line::from(Span::styled(
            format!("  📎 {}", attachment.name),
            Style::default().fg(Color::DarkGray),
        ))));
    }

    for invocation in &message.tool_invocations {
        items.extend(invocation_items(invocation, width));
    }

    items.push(ListItem::new(Line::from("")));
    items
}

/// One tool invocation: status line plus its rendered body
fn invocation_items(
    invocation: &sandchat_core::chat::ToolInvocation,
    width: usize,
) -> Vec<ListItem<'static>> {
    let mut items = Vec::new();

    match tools::display(invocation) {
        ToolDisplay::Placeholder(kind) => {
            items.push(ListItem::new(Line::from(Span::styled(
                format!("▶ {}", kind.activity_label()),
                Style::default()
                    .fg(Color::Blue)
                    .add_modifier(Modifier::ITALIC),
            ))));
        }
        display => {
            let (symbol, text, color) = match tools::outcome(invocation) {
                InvocationOutcome::Completed => ("✓", "Execution completed", Color::Green),
                InvocationOutcome::Error => ("✗", "Execution failed", Color::Red),
            };
            items.push(ListItem::new(Line::from(Span::styled(
                format!("{} {}", symbol, text),
                Style::default().fg(color),
            ))));
            items.extend(display_items(display, width));
        }
    }

    items
}

/// Body lines for a finished invocation, by renderer
fn display_items(display: ToolDisplay, width: usize) -> Vec<ListItem<'static>> {
    match display {
        ToolDisplay::Placeholder(_) => Vec::new(),
        ToolDisplay::Weather(payload) => {
            let summary = payload
                .pointer("/current/temperature_2m")
                .and_then(serde_json::Value::as_f64)
                .map(|t| format!("  Current temperature: {:.1}°C", t));
            match summary {
                Some(line) => vec![ListItem::new(Line::from(Span::styled(
                    line,
                    Style::default().fg(Color::Cyan),
                )))],
                None => json_items(&payload),
            }
        }
        ToolDisplay::CodeCell { code, outputs } => {
            let mut items = vec![ListItem::new(Line::from(Span::styled(
                "  In:",
                Style::default().fg(Color::DarkGray),
            )))];
            for line in code.lines() {
                items.push(ListItem::new(Line::from(Span::styled(
                    format!("    {}", line),
                    Style::default().fg(Color::White),
                ))));
            }
            if !outputs.is_empty() {
                items.push(ListItem::new(Line::from(Span::styled(
                    "  Out:",
                    Style::default().fg(Color::DarkGray),
                ))));
                for output in &outputs {
                    items.extend(output_items(output, width));
                }
            }
            items
        }
        ToolDisplay::Generic(payload) => json_items(&payload),
    }
}

/// Lines for one classified execution output
fn output_items(output: &ExecutionOutput, _width: usize) -> Vec<ListItem<'static>> {
    match output {
        ExecutionOutput::Stream { name, text } => {
            let style = match name {
                StreamName::Stdout => Style::default(),
                StreamName::Stderr => Style::default().fg(Color::LightRed),
            };
            text.lines()
                .map(|line| {
                    ListItem::new(Line::from(Span::styled(format!("    {}", line), style)))
                })
                .collect()
        }
        ExecutionOutput::ExecuteResult { data } | ExecutionOutput::DisplayData { data } => {
            representation_items(data.preferred())
        }
        ExecutionOutput::Error {
            name,
            message,
            traceback,
        } => {
            let mut items = vec![ListItem::new(Line::from(Span::styled(
                format!("    ⚠ {}: {}", name, message),
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )))];
            for line in traceback {
                items.push(ListItem::new(Line::from(Span::styled(
                    format!("    {}", line),
                    Style::default().fg(Color::Red),
                ))));
            }
            items
        }
        ExecutionOutput::Unknown(raw) => json_items(raw),
    }
}

/// Lines for the single representation picked by the MIME preference
fn representation_items(representation: Representation) -> Vec<ListItem<'static>> {
    match representation {
        Representation::Html(html) => html
            .lines()
            .map(|line| {
                ListItem::new(Line::from(Span::styled(
                    format!("    {}", line),
                    Style::default().fg(Color::Cyan),
                )))
            })
            .collect(),
        Representation::Png(b64) => vec![ListItem::new(Line::from(Span::styled(
            format!("    [image/png, {} bytes base64]", b64.len()),
            Style::default().fg(Color::Magenta),
        )))],
        Representation::Jpeg(b64) => vec![ListItem::new(Line::from(Span::styled(
            format!("    [image/jpeg, {} bytes base64]", b64.len()),
            Style::default().fg(Color::Magenta),
        )))],
        Representation::Plain(text) | Representation::Raw(text) => text
            .lines()
            .map(|line| ListItem::new(Line::from(Span::raw(format!("    {}", line)))))
            .collect(),
    }
}

/// Pretty-printed structured dump
fn json_items(value: &serde_json::Value) -> Vec<ListItem<'static>> {
    serde_json::to_string_pretty(value)
        .unwrap_or_default()
        .lines()
        .map(|line| {
            ListItem::new(Line::from(Span::styled(
                format!("    {}", line),
                Style::default().fg(Color::Gray),
            )))
        })
        .collect()
}

/// Wrap text to fit within a given width
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        if paragraph.is_empty() {
            lines.push(String::new());
            continue;
        }

        let mut current_line = String::new();
        for word in paragraph.split_whitespace() {
            if current_line.is_empty() {
                if word.len() > max_width {
                    let mut remaining = word;
                    while remaining.len() > max_width {
                        lines.push(remaining[..max_width].to_string());
                        remaining = &remaining[max_width..];
                    }
                    current_line = remaining.to_string();
                } else {
                    current_line = word.to_string();
                }
            } else if current_line.len() + 1 + word.len() <= max_width {
                current_line.push(' ');
                current_line.push_str(word);
            } else {
                lines.push(current_line);
                current_line = word.to_string();
            }
        }
        if !current_line.is_empty() {
            lines.push(current_line);
        }
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Upload progress gauge
fn draw_upload_gauge(frame: &mut Frame, app: &App, area: Rect) {
    let percent = (app.upload.progress * 100.0).round() as u16;
    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Uploading file... "),
        )
        .gauge_style(Style::default().fg(Color::Cyan))
        .percent(percent.min(100))
        .label(format!("{}%", percent.min(100)));
    frame.render_widget(gauge, area);
}

/// Upload banner and warnings
fn draw_notices(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines = Vec::new();
    if let Some(banner) = &app.upload_banner {
        lines.push(Line::from(Span::styled(
            format!(" ● {} ", banner.text),
            Style::default().fg(Color::Green),
        )));
    }
    if let Some(warning) = &app.warning {
        lines.push(Line::from(Span::styled(
            format!(" ▲ {} ", warning.text),
            Style::default().fg(Color::Yellow),
        )));
    }
    frame.render_widget(Paragraph::new(lines), area);
}

/// Draw the status bar
fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let sandbox = format!("sandbox: {}", app.sandbox.label());
    let status_text = if app.status.is_empty() {
        format!(" Session {} | {} ", app.session_tag, sandbox)
    } else {
        format!(" Session {} | {} | {} ", app.session_tag, sandbox, app.status)
    };

    let style = match app.state {
        AppState::Streaming => Style::default().bg(Color::Blue).fg(Color::White),
        AppState::Normal => Style::default().bg(Color::DarkGray).fg(Color::White),
    };

    frame.render_widget(Paragraph::new(status_text).style(style), area);
}

/// Draw the input area
fn draw_input(frame: &mut Frame, app: &App, area: Rect) {
    let prompt = "You> ";
    let input_text = format!("{}{}", prompt, app.input.value());

    let title = match app.state {
        AppState::Streaming => " Input (streaming, Esc to cancel) ",
        AppState::Normal => " Input ",
    };

    let border_style = match app.state {
        AppState::Normal => Style::default().fg(Color::Cyan),
        AppState::Streaming => Style::default().fg(Color::DarkGray),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .border_style(border_style);

    frame.render_widget(Paragraph::new(input_text).block(block), area);

    let cursor_x =
        area.x + 1 + prompt.width() as u16 + app.input.visual_cursor() as u16;
    let cursor_y = area.y + 1;
    frame.set_cursor_position((cursor_x.min(area.x + area.width.saturating_sub(2)), cursor_y));
}
