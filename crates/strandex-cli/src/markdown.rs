//! Markdown rendering for terminal output.
//!
//! Parses with pulldown-cmark into styled lines, then paints them with
//! crossterm ANSI styling. Long lines are left to the terminal to wrap.

use std::io::{self, Write as _};

use crossterm::style::{Attribute, Color, ContentStyle};
use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};

/// Style of one span of text. Nested styles merge, inner foreground wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanStyle {
    pub fg: Option<Color>,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub crossed: bool,
}

impl SpanStyle {
    fn fg(color: Color) -> Self {
        Self {
            fg: Some(color),
            ..Self::default()
        }
    }

    fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    fn underline(mut self) -> Self {
        self.underline = true;
        self
    }

    fn merge(self, inner: Self) -> Self {
        Self {
            fg: inner.fg.or(self.fg),
            bold: self.bold || inner.bold,
            italic: self.italic || inner.italic,
            underline: self.underline || inner.underline,
            crossed: self.crossed || inner.crossed,
        }
    }

    fn is_plain(&self) -> bool {
        *self == Self::default()
    }

    fn paint(&self, text: &str) -> String {
        if self.is_plain() {
            return text.to_string();
        }
        let mut style = ContentStyle::new();
        style.foreground_color = self.fg;
        if self.bold {
            style.attributes.set(Attribute::Bold);
        }
        if self.italic {
            style.attributes.set(Attribute::Italic);
        }
        if self.underline {
            style.attributes.set(Attribute::Underlined);
        }
        if self.crossed {
            style.attributes.set(Attribute::CrossedOut);
        }
        style.apply(text).to_string()
    }
}

/// Style definitions for markdown elements.
struct MarkdownStyle {
    bold: SpanStyle,
    italic: SpanStyle,
    code: SpanStyle,
    h1_h2: SpanStyle,
    h3: SpanStyle,
    h4_h6: SpanStyle,
    bullet: SpanStyle,
    blockquote: SpanStyle,
    link: SpanStyle,
    strikethrough: SpanStyle,
    rule: SpanStyle,
}

impl Default for MarkdownStyle {
    fn default() -> Self {
        Self {
            bold: SpanStyle::fg(Color::White).bold(),
            italic: SpanStyle::fg(Color::Magenta).italic(),
            code: SpanStyle::fg(Color::Yellow),
            h1_h2: SpanStyle::fg(Color::Green).bold(),
            h3: SpanStyle::fg(Color::Cyan).bold(),
            h4_h6: SpanStyle::fg(Color::Cyan).italic(),
            bullet: SpanStyle::fg(Color::Cyan),
            blockquote: SpanStyle::fg(Color::DarkGrey),
            link: SpanStyle::fg(Color::Blue).underline(),
            strikethrough: SpanStyle {
                crossed: true,
                ..SpanStyle::default()
            },
            rule: SpanStyle::fg(Color::DarkGrey),
        }
    }
}

pub type Span = (String, SpanStyle);
pub type Line = Vec<Span>;

fn flush_line(lines: &mut Vec<Line>, spans: &mut Line) {
    lines.push(std::mem::take(spans));
}

fn effective_style(stack: &[SpanStyle]) -> SpanStyle {
    stack
        .iter()
        .fold(SpanStyle::default(), |acc, style| acc.merge(*style))
}

/// Parse `content` into styled lines.
pub fn render_to_lines(content: &str) -> Vec<Line> {
    let styles = MarkdownStyle::default();
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH;
    let parser = Parser::new_ext(content, options);

    let mut lines: Vec<Line> = Vec::new();
    let mut current: Line = Vec::new();
    let mut style_stack: Vec<SpanStyle> = Vec::new();
    let mut in_code_block = false;
    let mut quote_depth = 0usize;

    // (is_ordered, next_number)
    let mut list_stack: Vec<(bool, u64)> = Vec::new();
    let mut pending_prefix: Option<Span> = None;
    let mut link_url: Option<String> = None;

    for event in parser {
        match event {
            Event::Start(Tag::Paragraph) => {}
            Event::End(TagEnd::Paragraph) => {
                flush_line(&mut lines, &mut current);
                if list_stack.is_empty() {
                    lines.push(Vec::new());
                }
            }

            Event::Start(Tag::Heading { level, .. }) => {
                let (style, prefix) = match level {
                    HeadingLevel::H1 => (styles.h1_h2, "# "),
                    HeadingLevel::H2 => (styles.h1_h2, "## "),
                    HeadingLevel::H3 => (styles.h3, "### "),
                    HeadingLevel::H4 => (styles.h4_h6, "#### "),
                    HeadingLevel::H5 => (styles.h4_h6, "##### "),
                    HeadingLevel::H6 => (styles.h4_h6, "###### "),
                };
                style_stack.push(style);
                current.push((prefix.to_string(), style));
            }
            Event::End(TagEnd::Heading(_)) => {
                style_stack.pop();
                flush_line(&mut lines, &mut current);
                lines.push(Vec::new());
            }

            Event::Start(Tag::Strong) => style_stack.push(styles.bold),
            Event::Start(Tag::Emphasis) => style_stack.push(styles.italic),
            Event::Start(Tag::Strikethrough) => style_stack.push(styles.strikethrough),
            Event::End(TagEnd::Strong | TagEnd::Emphasis | TagEnd::Strikethrough) => {
                style_stack.pop();
            }

            Event::Start(Tag::BlockQuote(_)) => {
                quote_depth += 1;
                style_stack.push(styles.blockquote);
            }
            Event::End(TagEnd::BlockQuote(_)) => {
                quote_depth = quote_depth.saturating_sub(1);
                style_stack.pop();
                if !current.is_empty() {
                    flush_line(&mut lines, &mut current);
                }
            }

            Event::Start(Tag::CodeBlock(_)) => {
                in_code_block = true;
                style_stack.push(styles.code);
            }
            Event::End(TagEnd::CodeBlock) => {
                in_code_block = false;
                style_stack.pop();
                if !current.is_empty() {
                    flush_line(&mut lines, &mut current);
                }
                lines.push(Vec::new());
            }

            Event::Start(Tag::List(start)) => {
                list_stack.push(match start {
                    Some(n) => (true, n),
                    None => (false, 0),
                });
            }
            Event::End(TagEnd::List(_)) => {
                list_stack.pop();
                if list_stack.is_empty() {
                    lines.push(Vec::new());
                }
            }

            Event::Start(Tag::Item) => {
                if !current.is_empty() {
                    flush_line(&mut lines, &mut current);
                }
                let indent = "  ".repeat(list_stack.len().saturating_sub(1));
                if let Some((ordered, next)) = list_stack.last_mut() {
                    let prefix = if *ordered {
                        let marker = format!("{}{}. ", indent, next);
                        *next += 1;
                        marker
                    } else {
                        format!("{}• ", indent)
                    };
                    pending_prefix = Some((prefix, styles.bullet));
                }
            }
            Event::End(TagEnd::Item) => {
                if !current.is_empty() {
                    flush_line(&mut lines, &mut current);
                }
            }

            Event::Start(Tag::Link { dest_url, .. }) => {
                link_url = Some(dest_url.to_string());
                style_stack.push(styles.link);
            }
            Event::End(TagEnd::Link) => {
                style_stack.pop();
                if let Some(url) = link_url.take() {
                    current.push((format!(" ({})", url), effective_style(&style_stack)));
                }
            }

            Event::Code(text) => {
                if let Some(prefix) = pending_prefix.take() {
                    current.push(prefix);
                }
                current.push((text.to_string(), styles.code));
            }

            Event::Text(text) => {
                let style = effective_style(&style_stack);
                if let Some(prefix) = pending_prefix.take() {
                    current.push(prefix);
                }

                if in_code_block {
                    for (i, line) in text.split('\n').enumerate() {
                        if i > 0 {
                            flush_line(&mut lines, &mut current);
                        }
                        if !line.is_empty() {
                            current.push((format!("    {}", line), style));
                        }
                    }
                } else if quote_depth > 0 {
                    for (i, line) in text.split('\n').enumerate() {
                        if i > 0 {
                            flush_line(&mut lines, &mut current);
                        }
                        if current.is_empty() {
                            current.push(("│ ".repeat(quote_depth), styles.blockquote));
                        }
                        if !line.is_empty() {
                            current.push((line.to_string(), style));
                        }
                    }
                } else {
                    current.push((text.to_string(), style));
                }
            }

            Event::SoftBreak => current.push((" ".to_string(), SpanStyle::default())),
            Event::HardBreak => flush_line(&mut lines, &mut current),

            Event::Rule => {
                if !current.is_empty() {
                    flush_line(&mut lines, &mut current);
                }
                lines.push(vec![("─".repeat(40), styles.rule)]);
                lines.push(Vec::new());
            }

            Event::Start(Tag::TableCell) => {
                if !current.is_empty() {
                    current.push((" │ ".to_string(), styles.rule));
                }
            }
            Event::End(TagEnd::TableHead | TagEnd::TableRow) => {
                flush_line(&mut lines, &mut current);
            }
            Event::End(TagEnd::Table) => lines.push(Vec::new()),

            _ => {}
        }
    }

    if !current.is_empty() {
        flush_line(&mut lines, &mut current);
    }
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }

    lines
}

/// Convert styled lines to an ANSI-escaped string.
pub fn lines_to_ansi(lines: &[Line]) -> String {
    lines
        .iter()
        .map(|line| {
            line.iter()
                .map(|(text, style)| style.paint(text))
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render markdown content to an ANSI string.
pub fn render_markdown(content: &str) -> String {
    lines_to_ansi(&render_to_lines(content))
}

/// Print `content` to stdout, rendered as Markdown when `render` is set.
pub fn print_result(content: &str, render: bool) -> io::Result<()> {
    let mut stdout = io::stdout();
    if render {
        writeln!(stdout, "{}", render_markdown(content))?;
    } else {
        writeln!(stdout, "{}", content)?;
    }
    stdout.flush()
}
