//! Markdown answers rendered as styled terminal text.
//!
//! Answer text comes from a remote service and is untrusted. Raw HTML is
//! dropped, and control characters are stripped from every fragment so an
//! answer cannot smuggle escape sequences into the terminal.

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
};

const CODE_COLOR: Color = Color::Cyan;
const LINK_COLOR: Color = Color::Blue;

/// Render untrusted markdown for display
pub fn render(markdown: &str) -> Text<'static> {
    let mut renderer = Renderer::default();
    for event in parse(markdown) {
        renderer.event(event);
    }
    renderer.finish()
}

/// Same content as `render`, without styling
pub fn to_plain(markdown: &str) -> String {
    render(markdown)
        .lines
        .iter()
        .map(|line| {
            line.spans
                .iter()
                .map(|span| span.content.as_ref())
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse(markdown: &str) -> impl Iterator<Item = Event<'_>> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    Parser::new_ext(markdown, options).filter(|event| !matches!(event, Event::Html(_) | Event::InlineHtml(_)))
}

/// Remove anything the terminal could interpret; tabs become spaces
pub fn sanitize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\t' => out.push_str("    "),
            '\n' => out.push('\n'),
            c if c.is_control() => {}
            // bidi overrides can disguise text
            '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}' => {}
            c => out.push(c),
        }
    }
    out
}

/// Open element; every `Start` pushes one and every `End` pops one
#[derive(Debug)]
enum Ctx {
    Paragraph,
    Heading,
    Quote,
    CodeBlock,
    List { next: Option<u64> },
    Item,
    Emphasis,
    Strong,
    Strike,
    Link { url: String, text: String },
    Image,
    Table,
    TableHead,
    TableRow,
    TableCell,
    Other,
}

#[derive(Default)]
struct Renderer {
    lines: Vec<Line<'static>>,
    spans: Vec<Span<'static>>,
    stack: Vec<Ctx>,
    cells_in_row: usize,
}

impl Renderer {
    fn event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(_) => self.end(),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => {
                let style = self.style().fg(CODE_COLOR);
                self.push(sanitize(&code), style);
            }
            Event::SoftBreak => self.push(" ".to_string(), self.style()),
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.flush();
                self.lines.push(Line::from(Span::styled(
                    "────────────",
                    Style::default().add_modifier(Modifier::DIM),
                )));
                self.blank();
            }
            Event::TaskListMarker(done) => {
                let marker = if done { "[x] " } else { "[ ] " };
                self.push(marker.to_string(), self.style());
            }
            Event::FootnoteReference(name) => {
                self.push(format!("[{}]", sanitize(&name)), self.style());
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        let ctx = match tag {
            Tag::Paragraph => Ctx::Paragraph,
            Tag::Heading { .. } => {
                self.flush();
                Ctx::Heading
            }
            Tag::BlockQuote(_) => {
                self.flush();
                Ctx::Quote
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                if let CodeBlockKind::Fenced(lang) = kind {
                    let lang = sanitize(&lang);
                    if !lang.trim().is_empty() {
                        self.lines.push(Line::from(Span::styled(
                            format!("  {}", lang.trim()),
                            Style::default().add_modifier(Modifier::DIM),
                        )));
                    }
                }
                Ctx::CodeBlock
            }
            Tag::List(start) => {
                self.flush();
                Ctx::List { next: start }
            }
            Tag::Item => {
                self.flush();
                let marker = self.next_marker();
                self.spans.push(Span::raw(marker));
                Ctx::Item
            }
            Tag::Emphasis => Ctx::Emphasis,
            Tag::Strong => Ctx::Strong,
            Tag::Strikethrough => Ctx::Strike,
            Tag::Link { dest_url, .. } => Ctx::Link {
                url: sanitize(&dest_url),
                text: String::new(),
            },
            Tag::Image { .. } => {
                self.push("[image: ".to_string(), self.style().add_modifier(Modifier::DIM));
                Ctx::Image
            }
            Tag::Table(_) => {
                self.flush();
                Ctx::Table
            }
            Tag::TableHead => {
                self.cells_in_row = 0;
                Ctx::TableHead
            }
            Tag::TableRow => {
                self.cells_in_row = 0;
                Ctx::TableRow
            }
            Tag::TableCell => {
                if self.cells_in_row > 0 {
                    self.push(" │ ".to_string(), Style::default().add_modifier(Modifier::DIM));
                }
                self.cells_in_row += 1;
                Ctx::TableCell
            }
            _ => Ctx::Other,
        };
        self.stack.push(ctx);
    }

    fn end(&mut self) {
        let Some(ctx) = self.stack.pop() else {
            return;
        };

        match ctx {
            Ctx::Paragraph => {
                self.flush();
                if !self.in_list() {
                    self.blank();
                }
            }
            Ctx::Heading | Ctx::CodeBlock | Ctx::Table => {
                self.flush();
                self.blank();
            }
            Ctx::Quote => {
                self.flush();
                if !self.in_quote() {
                    self.blank();
                }
            }
            Ctx::List { .. } => {
                self.flush();
                if !self.in_list() {
                    self.blank();
                }
            }
            Ctx::Item | Ctx::TableHead | Ctx::TableRow => self.flush(),
            Ctx::Link { url, text } => {
                if !url.is_empty() && url != text {
                    self.push(
                        format!(" ({url})"),
                        Style::default().fg(LINK_COLOR).add_modifier(Modifier::DIM),
                    );
                }
            }
            Ctx::Image => {
                self.push("]".to_string(), self.style().add_modifier(Modifier::DIM));
            }
            Ctx::Emphasis | Ctx::Strong | Ctx::Strike | Ctx::TableCell | Ctx::Other => {}
        }
    }

    fn text(&mut self, text: &str) {
        let clean = sanitize(text);

        if let Some(Ctx::Link { text: link_text, .. }) =
            self.stack.iter_mut().rev().find(|c| matches!(c, Ctx::Link { .. }))
        {
            link_text.push_str(&clean);
        }

        if self.in_code_block() {
            let style = Style::default().fg(CODE_COLOR);
            let mut lines = clean.split('\n').peekable();
            while let Some(line) = lines.next() {
                // the block's trailing newline leaves an empty last piece
                if line.is_empty() && lines.peek().is_none() {
                    break;
                }
                self.push(format!("  {line}"), style);
                self.flush();
            }
            return;
        }

        let style = self.style();
        self.push(clean.replace('\n', " "), style);
    }

    /// Inline style from every open element
    fn style(&self) -> Style {
        self.stack.iter().fold(Style::default(), |style, ctx| match ctx {
            Ctx::Strong | Ctx::TableHead => style.add_modifier(Modifier::BOLD),
            Ctx::Emphasis => style.add_modifier(Modifier::ITALIC),
            Ctx::Strike => style.add_modifier(Modifier::CROSSED_OUT),
            Ctx::Heading => style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            Ctx::Link { .. } => style.fg(LINK_COLOR).add_modifier(Modifier::UNDERLINED),
            Ctx::Quote => style.add_modifier(Modifier::ITALIC),
            _ => style,
        })
    }

    fn push(&mut self, content: String, style: Style) {
        if !content.is_empty() {
            self.spans.push(Span::styled(content, style));
        }
    }

    fn flush(&mut self) {
        if self.spans.is_empty() {
            return;
        }
        let mut spans = Vec::with_capacity(self.spans.len() + 1);
        let depth = self.quote_depth();
        if depth > 0 {
            spans.push(Span::styled(
                "│ ".repeat(depth),
                Style::default().add_modifier(Modifier::DIM),
            ));
        }
        spans.append(&mut self.spans);
        self.lines.push(Line::from(spans));
    }

    fn blank(&mut self) {
        if self.lines.last().is_some_and(|l| l.spans.is_empty()) || self.lines.is_empty() {
            return;
        }
        self.lines.push(Line::default());
    }

    fn next_marker(&mut self) -> String {
        let depth = self
            .stack
            .iter()
            .filter(|c| matches!(c, Ctx::List { .. }))
            .count();
        let indent = "  ".repeat(depth.saturating_sub(1));

        match self.stack.iter_mut().rev().find(|c| matches!(c, Ctx::List { .. })) {
            Some(Ctx::List { next: Some(n) }) => {
                let marker = format!("{indent}{n}. ");
                *n += 1;
                marker
            }
            _ => format!("{indent}• "),
        }
    }

    fn in_list(&self) -> bool {
        self.stack.iter().any(|c| matches!(c, Ctx::List { .. }))
    }

    fn in_quote(&self) -> bool {
        self.quote_depth() > 0
    }

    fn in_code_block(&self) -> bool {
        matches!(self.stack.last(), Some(Ctx::CodeBlock))
    }

    fn quote_depth(&self) -> usize {
        self.stack.iter().filter(|c| matches!(c, Ctx::Quote)).count()
    }

    fn finish(mut self) -> Text<'static> {
        self.flush();
        while self.lines.last().is_some_and(|l| l.spans.is_empty()) {
            self.lines.pop();
        }
        Text::from(self.lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(text: &Text<'static>) -> Vec<Span<'static>> {
        text.lines.iter().flat_map(|l| l.spans.clone()).collect()
    }

    #[test]
    fn test_strong_answer_is_bold() {
        let text = render("**Latte**");
        let latte = spans(&text)
            .into_iter()
            .find(|s| s.content == "Latte")
            .expect("Latte should be rendered");
        assert!(latte.style.add_modifier.contains(Modifier::BOLD));
        assert_eq!(to_plain("**Latte**"), "Latte");
    }

    #[test]
    fn test_inline_styles() {
        let text = render("plain *soft* ~~gone~~ `code`");
        let all = spans(&text);
        let find = |s: &str| all.iter().find(|sp| sp.content == s).unwrap().style;
        assert!(find("soft").add_modifier.contains(Modifier::ITALIC));
        assert!(find("gone").add_modifier.contains(Modifier::CROSSED_OUT));
        assert_eq!(find("code").fg, Some(CODE_COLOR));
    }

    #[test]
    fn test_raw_html_is_dropped() {
        let plain = to_plain("Top seller: <script>alert(1)</script>**Latte**\n\n<div>block</div>");
        assert!(!plain.contains("<script>"), "got: {plain}");
        assert!(!plain.contains("<div>"), "got: {plain}");
        assert!(plain.contains("Latte"));
    }

    #[test]
    fn test_escape_sequences_are_stripped() {
        let plain = to_plain("Latte\u{1b}[2J\u{1b}]0;pwned\u{7}\u{202E}drowkcab");
        assert!(!plain.chars().any(|c| c.is_control()), "got: {plain:?}");
        assert!(plain.starts_with("Latte[2J]0;pwned"));
        assert!(!plain.contains('\u{202E}'));
    }

    #[test]
    fn test_lists() {
        let plain = to_plain("1. Latte\n2. Americano\n\n- Cash\n- Card\n");
        let lines: Vec<_> = plain.lines().collect();
        assert_eq!(lines, ["1. Latte", "2. Americano", "", "• Cash", "• Card"]);
    }

    #[test]
    fn test_code_block_keeps_lines() {
        let plain = to_plain("```sql\nSELECT coffee_name\nFROM coffee_sales;\n```");
        let lines: Vec<_> = plain.lines().collect();
        assert_eq!(lines, ["  sql", "  SELECT coffee_name", "  FROM coffee_sales;"]);
    }

    #[test]
    fn test_table_cells_are_joined() {
        let plain = to_plain("| Coffee | Sold |\n|---|---|\n| Latte | 42 |\n");
        assert!(plain.contains("Coffee │ Sold"), "got: {plain}");
        assert!(plain.contains("Latte │ 42"), "got: {plain}");
    }

    #[test]
    fn test_link_shows_destination() {
        let plain = to_plain("[dataset](https://www.kaggle.com/datasets/ihelon/coffee-sales)");
        assert_eq!(plain, "dataset (https://www.kaggle.com/datasets/ihelon/coffee-sales)");

        let autolink = to_plain("<https://example.com>");
        assert_eq!(autolink, "https://example.com");
    }

    #[test]
    fn test_quote_prefix() {
        let plain = to_plain("> Latte wins");
        assert_eq!(plain, "│ Latte wins");
    }
}
