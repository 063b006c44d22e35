use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::pagination::DEFAULT_PAGE_SIZE;

/// Used when neither the command line, the environment nor the config file name an API
pub const FALLBACK_API_URL: &str = "http://localhost:5000/api";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Display settings for dates and prices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocaleConfig {
    pub date_format: String,
    pub time_format: String,
    pub currency_symbol: String,
    pub currency_code: String,
    pub decimal_separator: String,
    pub thousands_separator: String,
    pub symbol_after: bool,  // "38.70 ₴" instead of "₴38.70"
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            date_format: "%b %-d, %Y".to_string(),
            time_format: "%H:%M:%S".to_string(),
            currency_symbol: "₴".to_string(),
            currency_code: "UAH".to_string(),
            decimal_separator: ".".to_string(),
            thousands_separator: ",".to_string(),
            symbol_after: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base address of the sales API, e.g. http://localhost:5000/api
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Rows per page
    #[serde(default = "default_page_size")]
    pub page_size: u64,

    /// Per-request timeout
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,

    /// Mirror answers and failures as desktop notifications
    #[serde(default)]
    pub notifications: bool,

    /// kitty-style color file (`key #rrggbb` lines)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_file: Option<PathBuf>,

    #[serde(default)]
    pub locale: LocaleConfig,
}

fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            notifications: false,
            theme_file: None,
            locale: LocaleConfig::default(),
        }
    }
}

impl AppConfig {
    /// Get the config file path
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?
            .join("brewtab");

        if let Err(e) = std::fs::create_dir_all(&config_dir) {
            tracing::warn!("Could not create config directory: {}", e);
        }

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from file, or create default
    pub fn load() -> Result<Self> {
        let path = match Self::config_path() {
            Ok(p) => p,
            Err(_) => return Ok(AppConfig::default()),
        };

        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(content) => match Self::parse(&content) {
                    Ok(config) => return Ok(config),
                    Err(e) => tracing::warn!("Failed to parse config {}: {}", path.display(), e),
                },
                Err(e) => tracing::warn!("Failed to read config {}: {}", path.display(), e),
            }
            // Leave a broken file alone so the user can fix it
            return Ok(AppConfig::default());
        }

        let config = AppConfig::default();
        if let Err(e) = config.save() {
            tracing::debug!("Could not write default config: {}", e);
        }
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content)?;
        Ok(config.cleaned())
    }

    /// Save config to file
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        let content = toml::to_string_pretty(&self.clone().cleaned())?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Normalize values a hand-edited file can get wrong
    fn cleaned(mut self) -> Self {
        self.api_url = self
            .api_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        self.page_size = self.page_size.max(1);
        self.request_timeout_secs = self.request_timeout_secs.max(1);
        self
    }

    /// API address by precedence: command line / env, config file, build-time default
    pub fn resolve_api_url(&self, override_url: Option<&str>) -> String {
        override_url
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(str::to_string)
            .or_else(|| self.api_url.clone())
            .or_else(|| option_env!("BREWTAB_API_URL").map(str::to_string))
            .unwrap_or_else(|| FALLBACK_API_URL.to_string())
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_serialization() {
        let config = AppConfig {
            api_url: Some("https://sales.example.com/api".to_string()),
            page_size: 50,
            request_timeout_secs: 10,
            notifications: true,
            theme_file: Some(PathBuf::from("/tmp/kitty.conf")),
            locale: LocaleConfig {
                currency_symbol: "€".to_string(),
                currency_code: "EUR".to_string(),
                symbol_after: true,
                ..LocaleConfig::default()
            },
        };

        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized = AppConfig::parse(&serialized).unwrap();

        assert_eq!(config.api_url, deserialized.api_url);
        assert_eq!(config.page_size, deserialized.page_size);
        assert_eq!(config.locale, deserialized.locale);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = AppConfig::parse("notifications = true\n[locale]\ncurrency_code = \"USD\"\n").unwrap();
        assert!(config.notifications);
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.locale.currency_code, "USD");
        assert_eq!(config.locale.decimal_separator, ".");
    }

    #[test]
    fn test_cleaning() {
        let config = AppConfig::parse("api_url = \"   \"\npage_size = 0\n").unwrap();
        assert_eq!(config.api_url, None);
        assert_eq!(config.page_size, 1);
    }

    #[test]
    fn test_api_url_precedence() {
        let config = AppConfig {
            api_url: Some("http://from-file/api".to_string()),
            ..AppConfig::default()
        };
        assert_eq!(config.resolve_api_url(Some("http://flag/api")), "http://flag/api");
        assert_eq!(config.resolve_api_url(Some("  ")), "http://from-file/api");
        assert_eq!(config.resolve_api_url(None), "http://from-file/api");

        let bare = AppConfig::default();
        let expected = option_env!("BREWTAB_API_URL").unwrap_or(FALLBACK_API_URL);
        assert_eq!(bare.resolve_api_url(None), expected);
    }
}
