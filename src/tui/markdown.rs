//! Markdown to styled terminal lines
//!
//! Covers what the backend actually emits in summaries and answers:
//! headings, paragraphs, nested lists, emphasis, inline and fenced code,
//! links and rules. Anything else degrades to plain text.

use super::palette::Palette;
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};

const BULLET: &str = "• ";
const RULE: &str = "────────────────";

pub fn render(input: &str, palette: &Palette) -> Vec<Line<'static>> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut writer = Writer::new(palette);
    for event in Parser::new_ext(input, options) {
        writer.handle(event);
    }
    writer.finish()
}

struct Writer<'p> {
    palette: &'p Palette,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    /// Inline style stack; the top is applied to new text
    styles: Vec<Style>,
    /// Next number per open list, `None` for bullets
    lists: Vec<Option<u64>>,
    link: Option<String>,
    in_code_block: bool,
    /// A blank line goes in before the next block
    pending_gap: bool,
}

impl<'p> Writer<'p> {
    fn new(palette: &'p Palette) -> Self {
        Self {
            palette,
            lines: Vec::new(),
            current: Vec::new(),
            styles: Vec::new(),
            lists: Vec::new(),
            link: None,
            in_code_block: false,
            pending_gap: false,
        }
    }

    fn style(&self) -> Style {
        self.styles
            .last()
            .copied()
            .unwrap_or_else(|| self.palette.text())
    }

    fn push_style(&mut self, modifier: Modifier) {
        let style = self.style().add_modifier(modifier);
        self.styles.push(style);
    }

    fn flush(&mut self) {
        if !self.current.is_empty() {
            self.lines.push(Line::from(std::mem::take(&mut self.current)));
        }
    }

    fn start_block(&mut self) {
        self.flush();
        if self.pending_gap && !self.lines.is_empty() {
            self.lines.push(Line::default());
        }
        self.pending_gap = false;
    }

    fn end_block(&mut self) {
        self.flush();
        self.pending_gap = true;
    }

    fn text(&mut self, text: &str) {
        if self.in_code_block {
            for line in text.lines() {
                self.lines.push(Line::from(vec![
                    Span::raw("  "),
                    Span::styled(line.to_string(), self.palette.code()),
                ]));
            }
        } else {
            let span = Span::styled(text.to_string(), self.style());
            self.current.push(span);
        }
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) | Event::Html(text) | Event::InlineHtml(text) => self.text(&text),
            Event::Code(code) => {
                let span = Span::styled(code.to_string(), self.palette.code());
                self.current.push(span);
            }
            Event::SoftBreak => self.current.push(Span::raw(" ")),
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.start_block();
                self.lines
                    .push(Line::from(Span::styled(RULE, self.palette.muted())));
                self.end_block();
            }
            Event::TaskListMarker(done) => {
                let marker = if done { "[x] " } else { "[ ] " };
                self.current.push(Span::styled(marker, self.palette.accent()));
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                if self.lists.is_empty() {
                    self.start_block();
                }
            }
            Tag::Heading { level, .. } => {
                self.start_block();
                let mut style = self.palette.heading(self.palette.accent);
                if level == HeadingLevel::H1 {
                    style = style.add_modifier(Modifier::UNDERLINED);
                }
                self.styles.push(style);
            }
            Tag::List(start) => {
                if self.lists.is_empty() {
                    self.start_block();
                } else {
                    self.flush();
                }
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let indent = "  ".repeat(self.lists.len().saturating_sub(1));
                let marker = match self.lists.last_mut() {
                    Some(Some(next)) => {
                        let marker = format!("{next}. ");
                        *next += 1;
                        marker
                    }
                    _ => BULLET.to_string(),
                };
                self.current.push(Span::raw(indent));
                self.current
                    .push(Span::styled(marker, self.palette.accent()));
            }
            Tag::Emphasis => self.push_style(Modifier::ITALIC),
            Tag::Strong => self.push_style(Modifier::BOLD),
            Tag::Strikethrough => self.push_style(Modifier::CROSSED_OUT),
            Tag::CodeBlock(_) => {
                self.start_block();
                self.in_code_block = true;
            }
            Tag::Link { dest_url, .. } => {
                self.link = Some(dest_url.to_string());
                let style = self.style().fg(self.palette.accent);
                self.styles.push(style.add_modifier(Modifier::UNDERLINED));
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                if self.lists.is_empty() {
                    self.end_block();
                } else {
                    self.flush();
                }
            }
            TagEnd::Heading(_) => {
                self.styles.pop();
                self.end_block();
            }
            TagEnd::List(_) => {
                self.lists.pop();
                if self.lists.is_empty() {
                    self.end_block();
                }
            }
            TagEnd::Item => self.flush(),
            TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough => {
                self.styles.pop();
            }
            TagEnd::CodeBlock => {
                self.in_code_block = false;
                self.end_block();
            }
            TagEnd::Link => {
                self.styles.pop();
                if let Some(url) = self.link.take() {
                    let span = Span::styled(format!(" ({url})"), self.palette.muted());
                    self.current.push(span);
                }
            }
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        self.lines
    }
}
