//! Column schema for the sales table and per-column display formatting

use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDateTime;

use crate::api::{Money, SalesRecord};
use crate::config::LocaleConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    DateTime,
    PaymentKind,
    Amount,
    Coffee,
    Card,
}

impl Column {
    /// Display order; `Card` is dropped on narrow terminals
    pub const ALL: [Column; 5] = [
        Column::DateTime,
        Column::PaymentKind,
        Column::Amount,
        Column::Coffee,
        Column::Card,
    ];

    pub fn header(self) -> &'static str {
        match self {
            Column::DateTime => "Date",
            Column::PaymentKind => "Payment Type",
            Column::Amount => "Price",
            Column::Coffee => "Coffee Name",
            Column::Card => "Card",
        }
    }

    pub fn is_numeric(self) -> bool {
        self == Column::Amount
    }
}

#[derive(Debug, Clone)]
pub struct Formatter {
    locale: LocaleConfig,
}

impl Formatter {
    pub fn new(mut locale: LocaleConfig) -> Self {
        let defaults = LocaleConfig::default();
        if !is_valid_format(&locale.date_format) {
            tracing::warn!("Invalid date_format '{}', using default", locale.date_format);
            locale.date_format = defaults.date_format;
        }
        if !is_valid_format(&locale.time_format) {
            tracing::warn!("Invalid time_format '{}', using default", locale.time_format);
            locale.time_format = defaults.time_format;
        }
        Self { locale }
    }

    pub fn cell(&self, column: Column, record: &SalesRecord) -> String {
        match column {
            Column::DateTime => self.datetime(&record.datetime),
            Column::PaymentKind => record.cash_type.label().to_string(),
            Column::Amount => self.money(record.money),
            Column::Coffee => record.coffee_name.clone(),
            Column::Card => record.card.clone().unwrap_or_else(|| "-".to_string()),
        }
    }

    pub fn datetime(&self, value: &NaiveDateTime) -> String {
        format!(
            "{} {}",
            value.format(&self.locale.date_format),
            value.format(&self.locale.time_format)
        )
    }

    pub fn date(&self, value: &chrono::NaiveDate) -> String {
        value.format(&self.locale.date_format).to_string()
    }

    pub fn money(&self, amount: Money) -> String {
        let minor = amount.minor();
        let sign = if minor < 0 { "-" } else { "" };
        let abs = minor.unsigned_abs();
        let whole = group_digits(abs / 100, &self.locale.thousands_separator);
        let number = format!("{}{}{:02}", whole, self.locale.decimal_separator, abs % 100);

        if self.locale.symbol_after {
            format!("{}{} {}", sign, number, self.locale.currency_symbol)
        } else {
            format!("{}{}{}", sign, self.locale.currency_symbol, number)
        }
    }

    /// What the price column is measured in
    pub fn unit_note(&self) -> String {
        format!(
            "Prices in {} ({})",
            self.locale.currency_code, self.locale.currency_symbol
        )
    }
}

/// chrono panics while displaying a malformed format string, so check up front
fn is_valid_format(format: &str) -> bool {
    !StrftimeItems::new(format).any(|item| matches!(item, Item::Error))
}

fn group_digits(value: u64, separator: &str) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 * separator.len());
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push_str(separator);
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::PaymentKind;

    fn record() -> SalesRecord {
        SalesRecord {
            id: None,
            date: chrono::NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            datetime: chrono::NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_milli_opt(10, 15, 50, 520)
                .unwrap(),
            cash_type: PaymentKind::Cash,
            card: None,
            money: Money(3870),
            coffee_name: "Latte".to_string(),
            created_at: None,
        }
    }

    #[test]
    fn test_cells() {
        let fmt = Formatter::new(LocaleConfig::default());
        let r = record();
        assert_eq!(fmt.cell(Column::DateTime, &r), "Mar 1, 2024 10:15:50");
        assert_eq!(fmt.cell(Column::PaymentKind, &r), "Cash");
        assert_eq!(fmt.cell(Column::Amount, &r), "₴38.70");
        assert_eq!(fmt.cell(Column::Coffee, &r), "Latte");
        assert_eq!(fmt.cell(Column::Card, &r), "-");
    }

    #[test]
    fn test_money_grouping_and_locale() {
        let fmt = Formatter::new(LocaleConfig::default());
        assert_eq!(fmt.money(Money(123_456_789)), "₴1,234,567.89");
        assert_eq!(fmt.money(Money(-5)), "-₴0.05");
        assert_eq!(fmt.money(Money(0)), "₴0.00");

        let euro = Formatter::new(LocaleConfig {
            currency_symbol: "€".to_string(),
            currency_code: "EUR".to_string(),
            decimal_separator: ",".to_string(),
            thousands_separator: ".".to_string(),
            symbol_after: true,
            ..LocaleConfig::default()
        });
        assert_eq!(euro.money(Money(123_456)), "1.234,56 €");
        assert_eq!(euro.unit_note(), "Prices in EUR (€)");
    }

    #[test]
    fn test_bad_format_falls_back() {
        let fmt = Formatter::new(LocaleConfig {
            date_format: "%Q".to_string(),
            ..LocaleConfig::default()
        });
        assert_eq!(fmt.date(&record().date), "Mar 1, 2024");
    }

    #[test]
    fn test_column_order_matches_headers() {
        let headers: Vec<_> = Column::ALL.iter().map(|c| c.header()).collect();
        assert_eq!(headers, ["Date", "Payment Type", "Price", "Coffee Name", "Card"]);
        assert!(Column::Amount.is_numeric());
    }
}
