//! Drawing the conversation
//!
//! Functions of the [`ConversationState`] snapshot and the local [`App`]
//! state. The only write is clamping `App::scroll` to the content.

use super::app::{shows_welcome, App, SUGGESTIONS};
use super::markdown;
use super::palette::Palette;
use crate::protocol::WebResultEntry;
use crate::state_machine::{
    ConnectionStatus, ConversationState, Message, MessageContent, MessageKind, Step,
};
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use ratatui::Frame;

const STREAM_CURSOR: &str = "▌";

pub fn draw(frame: &mut Frame, app: &mut App, state: &ConversationState) {
    let palette = Palette::for_theme(state.theme);
    let steps_height = if state.steps.is_empty() {
        0
    } else {
        u16::try_from(state.steps.len())
            .unwrap_or(u16::MAX)
            .saturating_add(2)
            .min(8)
    };
    let [header, body, steps, input] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Min(3),
        Constraint::Length(steps_height),
        Constraint::Length(3),
    ])
    .areas(frame.area());

    frame.render_widget(Paragraph::new(header_line(state, &palette)), header);
    draw_conversation(frame, body, app, state, &palette);
    if steps_height > 0 {
        draw_steps(frame, steps, state, &palette);
    }
    draw_input(frame, input, app, state, &palette);
}

fn header_line(state: &ConversationState, palette: &Palette) -> Line<'static> {
    let (dot, label, color) = match state.connection {
        ConnectionStatus::Connected => ("●", "connected", palette.success),
        ConnectionStatus::Connecting => ("◌", "connecting", palette.accent),
        ConnectionStatus::Disconnected => ("○", "disconnected", palette.error),
    };
    let mut spans = vec![
        Span::styled("Aegis Chat", palette.heading(palette.accent)),
        Span::raw("  "),
        Span::styled(format!("{dot} {label}"), Style::default().fg(color)),
        Span::styled(format!("  {} theme", state.theme.as_str()), palette.muted()),
    ];
    if state.streaming_message().is_some() {
        spans.push(Span::styled("  answering…", palette.accent()));
    } else if state.is_processing {
        spans.push(Span::styled("  working…", palette.accent()));
    }
    Line::from(spans)
}

fn draw_conversation(
    frame: &mut Frame,
    area: Rect,
    app: &mut App,
    state: &ConversationState,
    palette: &Palette,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border));
    let inner = block.inner(area);

    let lines: Vec<Line<'static>> = if shows_welcome(state) {
        welcome_lines(app.suggestion, palette)
    } else {
        state
            .messages
            .iter()
            .flat_map(|message| message_lines(message, palette))
            .collect()
    };

    // Stick to the bottom unless the user scrolled up, never past the top
    let max_scroll = wrapped_height(&lines, inner.width).saturating_sub(inner.height);
    app.scroll = app.scroll.min(max_scroll);
    let offset = max_scroll - app.scroll;

    let paragraph = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((offset, 0));
    frame.render_widget(paragraph, area);
}

/// Rows the lines occupy once wrapped to `width`
fn wrapped_height(lines: &[Line<'_>], width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = lines
        .iter()
        .map(|line| line.width().div_ceil(width).max(1))
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}

fn welcome_lines(selected: Option<usize>, palette: &Palette) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::styled("Welcome to Aegis AI", palette.heading(palette.accent)),
        Line::styled(
            "Your assistant with corrective retrieval-augmented generation.",
            palette.muted(),
        ),
        Line::default(),
        Line::styled("Try a question (Tab to fill the input):", palette.text()),
    ];
    for (i, suggestion) in SUGGESTIONS.iter().enumerate() {
        let style = if selected == Some(i) {
            palette.accent().add_modifier(Modifier::BOLD | Modifier::REVERSED)
        } else {
            palette.text()
        };
        lines.push(Line::styled(format!("  {}. {suggestion}", i + 1), style));
    }
    lines
}

pub fn message_lines(message: &Message, palette: &Palette) -> Vec<Line<'static>> {
    let text = message.as_text().unwrap_or_default();
    let mut lines = match (&message.kind, &message.content) {
        (MessageKind::User, _) => {
            let mut lines = vec![Line::styled("You", palette.heading(palette.user))];
            lines.extend(text.lines().map(|l| Line::styled(l.to_string(), palette.text())));
            lines
        }
        (MessageKind::Assistant, _) => {
            let mut lines = vec![Line::styled("Assistant", palette.heading(palette.assistant))];
            lines.extend(markdown::render(text, palette));
            if message.streaming {
                let cursor = Span::styled(STREAM_CURSOR, palette.accent());
                let has_body = lines.len() > 1;
                match lines.last_mut() {
                    Some(last) if has_body => last.spans.push(cursor),
                    _ => lines.push(Line::from(cursor)),
                }
            }
            lines
        }
        (MessageKind::Status, _) => vec![Line::styled(
            format!("… {text}"),
            palette.muted().add_modifier(Modifier::ITALIC),
        )],
        (MessageKind::Summary, _) => {
            let mut lines = vec![Line::styled("Summary", palette.heading(palette.accent))];
            lines.extend(markdown::render(text, palette));
            lines
        }
        (MessageKind::WebResults, MessageContent::WebResults(entries)) => {
            web_result_lines(entries, palette)
        }
        (MessageKind::WebResults, MessageContent::Text(_)) => {
            web_result_lines(&[], palette)
        }
        (MessageKind::Error, _) => vec![Line::styled(
            format!("Error: {text}"),
            Style::default().fg(palette.error),
        )],
    };
    lines.push(Line::default());
    lines
}

fn web_result_lines(entries: &[WebResultEntry], palette: &Palette) -> Vec<Line<'static>> {
    let mut lines = vec![Line::styled("Web results", palette.heading(palette.accent))];
    if entries.is_empty() {
        lines.push(Line::styled("No results", palette.muted()));
    }
    for (i, entry) in entries.iter().enumerate() {
        lines.push(Line::styled(
            format!("{}. {}", i + 1, entry.title),
            palette.text().add_modifier(Modifier::BOLD),
        ));
        if !entry.url.is_empty() {
            lines.push(Line::styled(
                format!("   {}", entry.url),
                palette.accent().add_modifier(Modifier::UNDERLINED),
            ));
        }
        if let Some(snippet) = &entry.snippet {
            lines.push(Line::styled(format!("   {snippet}"), palette.muted()));
        }
    }
    lines
}

fn step_line(step: &Step, active: bool, palette: &Palette) -> Line<'static> {
    let (marker, style) = if step.is_running() {
        ("⟳", palette.accent())
    } else {
        ("✓", Style::default().fg(palette.success))
    };
    let mut label_style = palette.text();
    if active && step.is_running() {
        label_style = label_style.add_modifier(Modifier::BOLD);
    }
    Line::from(vec![
        Span::styled(format!("{marker} "), style),
        Span::styled(step.label().to_string(), label_style),
    ])
}

fn draw_steps(frame: &mut Frame, area: Rect, state: &ConversationState, palette: &Palette) {
    let lines: Vec<Line<'static>> = state
        .steps
        .iter()
        .map(|step| {
            let active = state.active_step.as_deref() == Some(step.name.as_str());
            step_line(step, active, palette)
        })
        .collect();
    let block = Block::default()
        .title("Steps")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_input(frame: &mut Frame, area: Rect, app: &App, state: &ConversationState, palette: &Palette) {
    let (title, style) = if !state.is_connected() {
        ("Disconnected", palette.muted())
    } else if state.is_processing {
        ("Waiting for answer", palette.muted())
    } else {
        ("Ask a question (Enter to send, Ctrl-T theme, Esc quit)", palette.text())
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border));
    frame.render_widget(
        Paragraph::new(app.input.as_str()).style(style).block(block),
        area,
    );

    if state.accepts_input() {
        let width = u16::try_from(app.input.chars().count()).unwrap_or(u16::MAX);
        let x = area
            .x
            .saturating_add(1)
            .saturating_add(width)
            .min(area.right().saturating_sub(2));
        frame.set_cursor_position((x, area.y.saturating_add(1)));
    }
}
