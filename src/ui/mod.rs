mod components;

use std::path::Path;
use std::sync::OnceLock;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap},
    Frame,
};

use crate::api::{PageTotal, PaymentKind};
use crate::app::{App, Focus, Popup};
use crate::chat::ChatPhase;
use crate::format::Column;
use crate::markdown;
use crate::theme::Theme;
use components::{centered_rect, key_hints, spinner, wrapped_height};

// Theme is loaded once at startup
static THEME: OnceLock<Theme> = OnceLock::new();

pub fn init_theme(path: Option<&Path>) {
    let _ = THEME.set(Theme::load(path));
}

fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::default)
}

// Helper functions to get theme colors
fn accent() -> Color { theme().accent }
fn inactive() -> Color { theme().inactive }
fn success() -> Color { theme().success }
fn warning() -> Color { theme().warning }
fn danger() -> Color { theme().danger }
fn text() -> Color { theme().text }
fn text_dim() -> Color { theme().text_dim }
fn bg_selected() -> Color { theme().bg_selected }
fn header() -> Color { theme().header }

/// Below this width the chat panel replaces the table instead of sitting beside it
const SIDE_BY_SIDE_MIN_WIDTH: u16 = 90;

pub fn draw(f: &mut Frame, app: &App) {
    let area = f.area();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints([
            Constraint::Length(1),               // Info line
            Constraint::Length(2),               // Title
            Constraint::Min(5),                  // Table / chat
            Constraint::Length(1),               // Footer
        ])
        .split(area);

    draw_info_line(f, app, chunks[0]);
    draw_title(f, chunks[1]);

    let body = chunks[2];
    if !app.chat_open {
        draw_sales_table(f, app, body);
    } else if body.width < SIDE_BY_SIDE_MIN_WIDTH {
        draw_chat_panel(f, app, body);
    } else {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(58),  // Table
                Constraint::Percentage(42),  // Chat sheet
            ])
            .split(body);
        draw_sales_table(f, app, columns[0]);
        draw_chat_panel(f, app, columns[1]);
    }

    draw_footer(f, app, chunks[3]);

    // Draw popups on top
    match app.popup {
        Popup::None => {}
        Popup::Help => draw_help_popup(f, app),
        Popup::Detail => draw_detail_popup(f, app),
    }
}

fn draw_info_line(f: &mut Frame, app: &App, area: Rect) {
    // Priority: status message > loading > summary
    let line = if let Some(ref status) = app.status_message {
        Line::from(vec![
            Span::styled(status, Style::default().fg(warning())),
        ])
    } else if app.loading {
        Line::from(vec![
            Span::styled(format!("{} ", spinner(app.ticks)), Style::default().fg(accent())),
            Span::styled("Loading sales", Style::default().fg(text_dim())),
        ])
    } else if let Some(total) = app.total {
        let count = match total {
            PageTotal::Exact(n) => format!("{} sales", n),
            PageTotal::AtLeast(n) => format!("{}+ sales", n),
        };
        Line::from(vec![
            Span::styled(count, Style::default().fg(text())),
            Span::styled(" │ ", Style::default().fg(text_dim())),
            Span::styled(app.api_url(), Style::default().fg(text_dim())),
        ])
    } else {
        Line::from(vec![
            Span::styled("Ready", Style::default().fg(text_dim())),
        ])
    };

    let info = Paragraph::new(line).alignment(Alignment::Center);
    f.render_widget(info, area);
}

fn draw_title(f: &mut Frame, area: Rect) {
    let title = Paragraph::new(vec![
        Line::from(Span::styled(
            " Coffee Sales Datasets",
            Style::default().fg(text()).add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled(" Datasets of coffee sales in a vending machine from ", Style::default().fg(text_dim())),
            Span::styled("@ihelon/coffee-sales", Style::default().fg(accent()).add_modifier(Modifier::UNDERLINED)),
        ]),
    ]);
    f.render_widget(title, area);
}

fn draw_sales_table(f: &mut Frame, app: &App, area: Rect) {
    let is_active = app.focus == Focus::Table && app.popup == Popup::None;
    let border_color = if is_active { accent() } else { inactive() };
    let title_style = if is_active {
        Style::default().fg(accent()).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(inactive())
    };

    let block = Block::default()
        .title(Span::styled(" Sales ", title_style))
        .title(
            Line::from(Span::styled(
                format!(" {} ", app.formatter.unit_note()),
                Style::default().fg(text_dim()),
            ))
            .right_aligned(),
        )
        .title_bottom(page_summary(app))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));

    // Responsive columns based on width
    let columns: Vec<Column> = Column::ALL
        .iter()
        .copied()
        .filter(|c| *c != Column::Card || area.width > 100)
        .collect();

    let header = Row::new(columns.iter().map(|c| {
        let line = Line::from(Span::styled(c.header(), Style::default().fg(header())));
        Cell::from(if c.is_numeric() { line.right_aligned() } else { line })
    }));

    let rows: Vec<Row> = if app.records().is_empty() {
        vec![empty_row(app)]
    } else {
        app.records()
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let cells = columns.iter().map(|column| {
                    let value = app.formatter.cell(*column, record);
                    let style = match column {
                        Column::PaymentKind => match record.cash_type {
                            PaymentKind::Card => Style::default().fg(theme().card),
                            PaymentKind::Cash => Style::default().fg(theme().cash),
                        },
                        Column::Amount => Style::default().fg(success()),
                        Column::Card => Style::default().fg(text_dim()),
                        _ => Style::default().fg(text()),
                    };
                    let line = Line::from(Span::styled(value, style));
                    Cell::from(if column.is_numeric() { line.right_aligned() } else { line })
                });

                let row_style = if i == app.selected_row && is_active {
                    Style::default().bg(bg_selected()).fg(text())
                } else {
                    Style::default()
                };
                Row::new(cells).style(row_style)
            })
            .collect()
    };

    let widths: Vec<Constraint> = columns
        .iter()
        .map(|c| match c {
            Column::DateTime => Constraint::Length(22),
            Column::PaymentKind => Constraint::Length(13),
            Column::Amount => Constraint::Length(12),
            Column::Coffee => Constraint::Min(16),
            Column::Card => Constraint::Length(21),
        })
        .collect();

    let table = Table::new(rows, widths)
        .header(header.style(Style::default()))
        .column_spacing(2)
        .block(block);

    f.render_widget(table, area);
}

fn empty_row(app: &App) -> Row<'static> {
    let (message, color) = if app.loading {
        (format!("  {} Loading…", spinner(app.ticks)), text_dim())
    } else if let Some(ref err) = app.load_error {
        (format!("  Could not load sales: {}", err), danger())
    } else {
        ("  No sales on this page".to_string(), text_dim())
    };
    Row::new(vec![Cell::from(Span::styled(message, Style::default().fg(color)))])
}

fn page_summary(app: &App) -> Line<'static> {
    let window = app.window;
    let arrow = |enabled: bool, glyph: &'static str| {
        Span::styled(glyph, Style::default().fg(if enabled { accent() } else { inactive() }))
    };
    let mut spans = vec![Span::raw(" "), arrow(!window.is_first(), "◀ ")];

    match app.total {
        Some(PageTotal::Exact(total)) => {
            spans.push(arrow(!window.is_last(total), "▶ "));
            spans.push(Span::styled(
                format!("Page {} of {}", window.page_index + 1, window.page_count(total)),
                Style::default().fg(text()),
            ));
            if let Some((first, last)) = window.range(total) {
                spans.push(Span::styled(
                    format!(" · rows {}–{} of {}", first, last, total),
                    Style::default().fg(text_dim()),
                ));
            }
        }
        Some(PageTotal::AtLeast(seen)) => {
            spans.push(arrow(true, "▶ "));
            spans.push(Span::styled(
                format!("Page {}", window.page_index + 1),
                Style::default().fg(text()),
            ));
            if let Some((first, last)) = window.range(seen) {
                spans.push(Span::styled(
                    format!(" · rows {}–{} of {}+", first, last, seen),
                    Style::default().fg(text_dim()),
                ));
            }
        }
        None => spans.push(Span::styled(
            format!("Page {}", window.page_index + 1),
            Style::default().fg(text()),
        )),
    }

    spans.push(Span::styled(
        format!(" · {} per page ", window.page_size),
        Style::default().fg(text_dim()),
    ));
    if app.loading {
        spans.push(Span::styled(format!("{} ", spinner(app.ticks)), Style::default().fg(accent())));
    }
    Line::from(spans)
}

fn draw_chat_panel(f: &mut Frame, app: &App, area: Rect) {
    let is_active = app.focus == Focus::Chat && app.popup == Popup::None;
    let border_color = if is_active { accent() } else { inactive() };
    let title_style = if is_active {
        Style::default().fg(accent()).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(inactive())
    };

    let block = Block::default()
        .title(Span::styled(" Ask - Coffee Sales ", title_style))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),   // Description
            Constraint::Min(3),      // History
            Constraint::Length(5),   // Input
        ])
        .split(inner);

    let description = Paragraph::new(Span::styled(
        "Ask anything about the coffee sales data in the table and get a human-friendly answer.",
        Style::default().fg(text_dim()),
    ))
    .wrap(Wrap { trim: true });
    f.render_widget(description, chunks[0]);

    draw_chat_history(f, app, chunks[1]);
    draw_chat_input(f, app, is_active, chunks[2]);
}

fn draw_chat_history(f: &mut Frame, app: &App, area: Rect) {
    let question_style = Style::default().fg(accent()).add_modifier(Modifier::BOLD);
    let mut lines: Vec<Line<'static>> = Vec::new();

    for turn in app.chat.history() {
        lines.push(Line::from(Span::styled("You", question_style)));
        lines.extend(turn.question.lines().map(|l| Line::from(Span::styled(l.to_string(), Style::default().fg(text())))));
        lines.push(Line::default());
        lines.extend(markdown::render(&turn.answer).lines);
        lines.push(Line::default());
    }

    if let ChatPhase::Pending { question, .. } = app.chat.phase() {
        lines.push(Line::from(Span::styled("You", question_style)));
        lines.extend(question.lines().map(|l| Line::from(Span::styled(l.to_string(), Style::default().fg(text())))));
        lines.push(Line::default());
        lines.push(Line::from(vec![
            Span::styled(format!("{} ", spinner(app.ticks)), Style::default().fg(accent())),
            Span::styled("Thinking…", Style::default().fg(text_dim())),
        ]));
    }

    if lines.is_empty() {
        lines.push(Line::from(Span::styled(
            "No questions yet. Try \"Most purchased coffee?\"",
            Style::default().fg(text_dim()),
        )));
    }

    // Stick to the newest message unless scrolled back
    let height = wrapped_height(&lines, area.width);
    let scroll = height
        .saturating_sub(area.height)
        .saturating_sub(app.chat_scroll);

    let history = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    f.render_widget(history, area);
}

fn draw_chat_input(f: &mut Frame, app: &App, is_active: bool, area: Rect) {
    let pending = app.chat.is_pending();

    let (title, border_color) = if pending {
        (format!(" {} Asking… ", spinner(app.ticks)), inactive())
    } else if is_active {
        (" Question ".to_string(), accent())
    } else {
        (" Question ".to_string(), inactive())
    };

    // The Ask "button" is disabled while pending or when there is nothing to send
    let button_style = if app.chat.can_submit() {
        Style::default().fg(accent()).add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(inactive())
    };

    let mut input_text = app.chat.question().to_string();
    if is_active && !pending {
        input_text.push('▏');
    }
    let text_style = if pending {
        Style::default().fg(text_dim())
    } else {
        Style::default().fg(text())
    };

    let placeholder = app.chat.question().is_empty() && !pending;
    let content = if placeholder {
        Paragraph::new(Line::from(vec![
            Span::styled(input_text, text_style),
            Span::styled("Ask, Search or Chat...", Style::default().fg(text_dim())),
        ]))
    } else {
        Paragraph::new(input_text).style(text_style)
    };

    let input = content
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title(Span::styled(title, Style::default().fg(border_color)))
                .title(Line::from(Span::styled(" [ Ask ] ", button_style)).right_aligned())
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border_color)),
        );
    f.render_widget(input, area);
}

fn draw_footer(f: &mut Frame, app: &App, area: Rect) {
    let hints: Vec<(&str, &str)> = match (app.focus, app.popup) {
        (_, Popup::Help) | (_, Popup::Detail) => vec![("Esc", "Close")],
        (Focus::Table, Popup::None) => vec![
            ("↑↓", "Row"),
            ("←→", "Page"),
            ("+-", "Size"),
            ("Enter", "Detail"),
            ("a", "Ask"),
            ("r", "Refresh"),
            ("h", "Help"),
            ("q", "Quit"),
        ],
        (Focus::Chat, Popup::None) => vec![
            ("Enter", "Ask"),
            ("Alt+Enter", "Newline"),
            ("↑↓", "Scroll"),
            ("Tab", "Table"),
            ("Esc", "Close"),
        ],
    };

    // Responsive: show fewer hints on narrow terminals
    let max_hints = if area.width < 60 { 4 } else if area.width < 80 { 5 } else { hints.len() };

    // Footer is commands legend ONLY - no status messages here
    let footer = Paragraph::new(Line::from(key_hints(&hints[..max_hints.min(hints.len())], accent(), text_dim())))
        .alignment(Alignment::Center);

    f.render_widget(footer, area);
}

fn draw_help_popup(f: &mut Frame, app: &App) {
    let area = f.area();
    let popup_area = centered_rect(
        if area.width < 80 { 95 } else { 70 },
        if area.height < 40 { 95 } else { 85 },
        area
    );

    f.render_widget(Clear, popup_area);

    let section = |title: &str| {
        Line::from(Span::styled(
            format!("═══ {} ═══", title),
            Style::default().fg(header()).add_modifier(Modifier::BOLD),
        ))
    };
    let key = |k: &str, what: &str| {
        Line::from(vec![
            Span::styled(format!("  {:<12}", k), Style::default().fg(accent())),
            Span::raw(what.to_string()),
        ])
    };

    let help_text = vec![
        section("Table"),
        key("↑/↓ j/k", "Select row"),
        key("→/n PgDn", "Next page"),
        key("←/p PgUp", "Previous page"),
        key("g / G", "First / last page"),
        key("+ / -", "Larger / smaller pages"),
        key("Enter", "Show every field of the selected sale"),
        key("r", "Reload the current page"),
        Line::from(""),
        section("Ask this table"),
        key("a or /", "Open the chat panel"),
        key("Enter", "Send the question"),
        key("Alt+Enter", "New line in the question"),
        key("Ctrl+U", "Clear the question"),
        key("↑/↓ PgUp/PgDn", "Scroll answers"),
        key("Tab", "Switch between table and chat"),
        key("Esc", "Close the chat panel"),
        Line::from(""),
        section("Data"),
        Line::from(vec![
            Span::raw("  "),
            Span::styled(app.formatter.unit_note(), Style::default().fg(text())),
        ]),
        Line::from(vec![
            Span::raw("  API  "),
            Span::styled(app.api_url().to_string(), Style::default().fg(text_dim())),
        ]),
        Line::from(vec![
            Span::raw("  Source  "),
            Span::styled("kaggle.com/datasets/ihelon/coffee-sales", Style::default().fg(text_dim())),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Press ", Style::default().fg(text_dim())),
            Span::styled("h", Style::default().fg(accent())),
            Span::styled("/", Style::default().fg(text_dim())),
            Span::styled("?", Style::default().fg(accent())),
            Span::styled("/", Style::default().fg(text_dim())),
            Span::styled("Esc", Style::default().fg(accent())),
            Span::styled(" to close", Style::default().fg(text_dim())),
        ]),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .title(Span::styled(" brewtab Help ", Style::default().fg(accent())))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(accent())),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(help, popup_area);
}

fn draw_detail_popup(f: &mut Frame, app: &App) {
    let Some(record) = app.selected_record() else {
        return;
    };

    let area = f.area();
    let popup_area = centered_rect(
        if area.width < 80 { 90 } else { 50 },
        if area.height < 30 { 70 } else { 45 },
        area
    );
    f.render_widget(Clear, popup_area);

    let field = |label: &str, value: String, color: Color| {
        Line::from(vec![
            Span::styled(format!("  {:<14}", label), Style::default().fg(text_dim())),
            Span::styled(value, Style::default().fg(color)),
        ])
    };

    let mut lines = vec![
        Line::from(""),
        field("Day", app.formatter.date(&record.date), text()),
    ];
    lines.extend(
        Column::ALL
            .iter()
            .map(|c| field(c.header(), app.formatter.cell(*c, record), text())),
    );
    if let Some(id) = record.id {
        lines.push(field("Record", format!("#{}", id), text_dim()));
    }
    if let Some(ref created) = record.created_at {
        lines.push(field("Imported", created.clone(), text_dim()));
    }

    let detail = Paragraph::new(lines)
        .block(
            Block::default()
                .title(Span::styled(" Sale ", Style::default().fg(accent())))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(accent())),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(detail, popup_area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiClient, Money, SalesPage, SalesRecord};
    use crate::app::AppEvent;
    use crate::config::AppConfig;
    use ratatui::{backend::TestBackend, Terminal};
    use std::time::Duration;

    fn app_with_page() -> App {
        let client = ApiClient::new("http://127.0.0.1:9/api", Duration::from_millis(200)).unwrap();
        let mut app = App::new(AppConfig::default(), client);
        let date = chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let window = app.window;
        app.handle_event(AppEvent::SalesLoaded {
            window,
            result: Ok(SalesPage {
                data: vec![SalesRecord {
                    id: Some(1),
                    date,
                    datetime: date.and_hms_opt(10, 15, 50).unwrap(),
                    cash_type: PaymentKind::Card,
                    card: Some("ANON-0000-0000-0001".to_string()),
                    money: Money(3870),
                    coffee_name: "Latte".to_string(),
                    created_at: None,
                }],
                count: 50,
                limit: 25,
                offset: 0,
            }),
        });
        app
    }

    fn render(app: &App, width: u16, height: u16) -> String {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|f| draw(f, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_table_renders_formatted_rows() {
        let app = app_with_page();
        let screen = render(&app, 140, 30);
        assert!(screen.contains("Coffee Name"));
        assert!(screen.contains("Latte"));
        assert!(screen.contains("₴38.70"));
        assert!(screen.contains("Page 1 of 2"));
        assert!(screen.contains("ANON-0000-0000-0001"), "card column shown on wide terminals");
    }

    #[test]
    fn test_narrow_table_hides_card_column() {
        let app = app_with_page();
        let screen = render(&app, 80, 30);
        assert!(screen.contains("Latte"));
        assert!(!screen.contains("ANON-0000"));
    }

    #[tokio::test]
    async fn test_chat_panel_shows_rendered_answer() {
        let mut app = app_with_page();
        app.chat_open = true;
        app.focus = Focus::Chat;
        "Most purchased coffee?".chars().for_each(|c| app.chat.push_char(c));
        app.submit_question();

        let request_id = match app.chat.phase() {
            ChatPhase::Pending { request_id, .. } => *request_id,
            ChatPhase::Idle => panic!("expected a pending question"),
        };
        let pending_screen = render(&app, 140, 30);
        assert!(pending_screen.contains("Thinking"));
        assert!(pending_screen.contains("Asking"));

        app.handle_event(AppEvent::AskFinished {
            request_id,
            result: Ok(crate::api::AskResponse {
                message: "ok".to_string(),
                data: "**Latte** <b>html</b>".to_string(),
            }),
        });

        let screen = render(&app, 140, 30);
        assert!(screen.contains("Most purchased coffee?"));
        assert!(screen.contains("Latte"));
        assert!(!screen.contains("<b>"));
        assert!(screen.contains("Ask, Search or Chat..."), "input is empty again after an answer");
    }
}
