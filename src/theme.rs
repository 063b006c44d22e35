//! Theme colors.
//! Reads `key #rrggbb` lines from a kitty-style color file; the Omarchy
//! current theme is used when no file is configured.

use ratatui::style::Color;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Theme colors for the UI
#[derive(Debug, Clone)]
pub struct Theme {
    pub accent: Color,           // Active borders, key hints
    pub danger: Color,           // Errors
    pub success: Color,          // Prices
    pub warning: Color,          // Status messages
    pub text: Color,
    pub text_dim: Color,
    pub bg_selected: Color,      // Selected row
    pub inactive: Color,         // Inactive borders
    pub header: Color,           // Table headers, section titles
    pub card: Color,             // Card payments
    pub cash: Color,             // Cash payments
}

impl Default for Theme {
    fn default() -> Self {
        // Catppuccin-inspired
        Self {
            accent: Color::Rgb(250, 179, 135),
            danger: Color::Rgb(243, 139, 168),
            success: Color::Rgb(166, 218, 149),
            warning: Color::Rgb(249, 226, 175),
            text: Color::Rgb(205, 214, 244),
            text_dim: Color::Rgb(147, 153, 178),
            bg_selected: Color::Rgb(69, 71, 90),
            inactive: Color::Rgb(88, 91, 112),
            header: Color::Rgb(243, 139, 168),
            card: Color::Rgb(137, 180, 250),
            cash: Color::Rgb(148, 226, 213),
        }
    }
}

impl Theme {
    /// Load from `path`, or the Omarchy theme, falling back to defaults
    pub fn load(path: Option<&Path>) -> Self {
        let path = path.map(Path::to_path_buf).or_else(omarchy_theme_path);

        let Some(path) = path else {
            return Self::default();
        };

        match fs::read_to_string(&path) {
            Ok(content) => {
                let colors = parse_kitty_conf(&content);
                if colors.is_empty() {
                    tracing::debug!("No colors in {}, using defaults", path.display());
                    Self::default()
                } else {
                    Self::from_colors(&colors)
                }
            }
            Err(e) => {
                tracing::debug!("Could not read theme {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Map kitty palette entries onto UI roles, keeping defaults for gaps
    fn from_colors(colors: &HashMap<String, Color>) -> Self {
        let defaults = Self::default();

        Self {
            accent: pick(colors, &["color2", "color10"], defaults.accent),
            danger: pick(colors, &["color1", "color9"], defaults.danger),
            success: pick(colors, &["color10", "color2"], defaults.success),
            warning: pick(colors, &["color3", "color11"], defaults.warning),
            text: pick(colors, &["foreground"], defaults.text),
            text_dim: pick(colors, &["color8"], defaults.text_dim),
            bg_selected: pick(colors, &["selection_background", "color0"], defaults.bg_selected),
            inactive: pick(colors, &["inactive_border_color", "color8"], defaults.inactive),
            header: pick(colors, &["color1", "color9"], defaults.header),
            card: pick(colors, &["color4", "color12"], defaults.card),
            cash: pick(colors, &["color6", "color14"], defaults.cash),
        }
    }
}

/// First of `keys` present in the palette
fn pick(colors: &HashMap<String, Color>, keys: &[&str], fallback: Color) -> Color {
    keys.iter()
        .find_map(|k| colors.get(*k).copied())
        .unwrap_or(fallback)
}

fn omarchy_theme_path() -> Option<PathBuf> {
    let path = dirs::home_dir()?.join(".config/omarchy/current/theme/kitty.conf");
    path.exists().then_some(path)
}

/// Parse kitty.conf format: `key #hexcolor`
fn parse_kitty_conf(content: &str) -> HashMap<String, Color> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line.split_once(char::is_whitespace)?;
            Some((key.trim().to_string(), parse_hex_color(value)?))
        })
        .collect()
}

/// Parse a hex color string (#RRGGBB or #RGB)
fn parse_hex_color(s: &str) -> Option<Color> {
    let s = s.trim().trim_start_matches('#');
    if !s.is_ascii() {
        return None;
    }

    match s.len() {
        6 => Some(Color::Rgb(
            u8::from_str_radix(&s[0..2], 16).ok()?,
            u8::from_str_radix(&s[2..4], 16).ok()?,
            u8::from_str_radix(&s[4..6], 16).ok()?,
        )),
        3 => Some(Color::Rgb(
            u8::from_str_radix(&s[0..1], 16).ok()? * 17,
            u8::from_str_radix(&s[1..2], 16).ok()? * 17,
            u8::from_str_radix(&s[2..3], 16).ok()? * 17,
        )),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#FFC107"), Some(Color::Rgb(255, 193, 7)));
        assert_eq!(parse_hex_color("fff"), Some(Color::Rgb(255, 255, 255)));
        assert_eq!(parse_hex_color("#12345"), None);
        assert_eq!(parse_hex_color("#zzzzzz"), None);
    }

    #[test]
    fn test_kitty_conf_maps_roles() {
        let conf = "# comment\nforeground #bebebe\ncolor2 #FFC107\n\ncolor4   #e68e0d\ncursor none\n";
        let colors = parse_kitty_conf(conf);
        assert_eq!(colors.len(), 3);

        let theme = Theme::from_colors(&colors);
        assert_eq!(theme.accent, Color::Rgb(255, 193, 7));
        assert_eq!(theme.card, Color::Rgb(230, 142, 13));
        assert_eq!(theme.text, Color::Rgb(190, 190, 190));
        assert_eq!(theme.danger, Theme::default().danger);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let theme = Theme::load(Some(Path::new("/nonexistent/brewtab/kitty.conf")));
        assert_eq!(theme.accent, Theme::default().accent);
    }
}
