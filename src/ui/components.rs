//! Small drawing helpers shared by the panels

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
};

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Spinner frame for the current tick (100 ms per frame)
pub fn spinner(ticks: u64) -> &'static str {
    SPINNER[(ticks % SPINNER.len() as u64) as usize]
}

/// Rows `lines` occupy once wrapped to `width` columns
pub fn wrapped_height(lines: &[Line<'_>], width: u16) -> u16 {
    let width = usize::from(width.max(1));
    let rows: usize = lines
        .iter()
        .map(|line| line.width().div_ceil(width).max(1))
        .sum();
    u16::try_from(rows).unwrap_or(u16::MAX)
}

/// `key action │ key action │ …` legend
pub fn key_hints(hints: &[(&str, &str)], key_color: Color, text_color: Color) -> Vec<Span<'static>> {
    hints
        .iter()
        .flat_map(|(key, action)| {
            vec![
                Span::styled(key.to_string(), Style::default().fg(key_color)),
                Span::styled(format!(" {} │ ", action), Style::default().fg(text_color)),
            ]
        })
        .collect()
}

pub fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_height() {
        let lines = vec![Line::from("a".repeat(25)), Line::default(), Line::from("short")];
        assert_eq!(wrapped_height(&lines, 10), 3 + 1 + 1);
        assert_eq!(wrapped_height(&lines, 0), 25 + 1 + 5);
    }

    #[test]
    fn test_spinner_cycles() {
        assert_eq!(spinner(0), spinner(10));
        assert_ne!(spinner(0), spinner(1));
    }
}
