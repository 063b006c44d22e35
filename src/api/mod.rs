//! Wire types for the sales API and the errors its client can produce.
//!
//! Responses are decoded into explicit types and validated here, so the
//! rest of the app never sees a record that is missing a field or a page
//! that contradicts its own envelope.

pub mod client;

pub use client::ApiClient;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Largest response body kept in an error message
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid response: {0}")]
    Invalid(String),

    #[error("invalid API address '{0}'")]
    Address(String),
}

impl ApiError {
    pub(crate) fn status(status: reqwest::StatusCode, body: &str) -> Self {
        let body = body.trim();
        let body = match body.char_indices().nth(ERROR_BODY_LIMIT) {
            Some((idx, _)) => format!("{}…", &body[..idx]),
            None => body.to_string(),
        };
        ApiError::Status { status, body }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentKind {
    Card,
    Cash,
}

impl PaymentKind {
    pub fn label(self) -> &'static str {
        match self {
            PaymentKind::Card => "Card",
            PaymentKind::Cash => "Cash",
        }
    }
}

/// Currency amount in minor units (hundredths).
///
/// The API sends amounts as JSON numbers; they are rounded to the nearest
/// hundredth on the way in so nothing downstream does float arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Money(pub i64);

impl Money {
    pub fn from_major(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        let minor = (value * 100.0).round();
        if minor.abs() > i64::MAX as f64 {
            return None;
        }
        Some(Money(minor as i64))
    }

    pub fn minor(self) -> i64 {
        self.0
    }

    pub fn as_major(self) -> f64 {
        self.0 as f64 / 100.0
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Money::from_major(value)
            .ok_or_else(|| serde::de::Error::custom(format!("amount out of range: {value}")))
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_major())
    }
}

/// `YYYY-MM-DD HH:MM:SS[.fff]`, as stored by the sales database
mod timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let raw = raw.trim();
        NaiveDateTime::parse_from_str(raw, FORMAT)
            .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
            .map_err(|e| serde::de::Error::custom(format!("bad timestamp '{raw}': {e}")))
    }
}

fn empty_as_none<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// One vending-machine sale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub date: NaiveDate,
    #[serde(with = "timestamp")]
    pub datetime: NaiveDateTime,
    pub cash_type: PaymentKind,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub card: Option<String>,
    pub money: Money,
    pub coffee_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// A page of records plus the envelope the server echoes back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesPage {
    pub data: Vec<SalesRecord>,
    pub count: u64,
    pub limit: u64,
    pub offset: u64,
}

/// What a page says about the size of the whole table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageTotal {
    /// The table holds exactly this many records
    Exact(u64),
    /// At least this many; the page was full and `count` proves nothing more
    AtLeast(u64),
}

impl PageTotal {
    pub fn exact(self) -> Option<u64> {
        match self {
            PageTotal::Exact(n) => Some(n),
            PageTotal::AtLeast(_) => None,
        }
    }
}

impl SalesPage {
    /// Reject envelopes that contradict the request or themselves, or carry unusable records
    pub fn validate(&self, offset: u64, limit: u64) -> Result<(), ApiError> {
        if self.offset != offset || self.limit != limit {
            return Err(ApiError::Invalid(format!(
                "asked for offset {} limit {} but got offset {} limit {}",
                offset, limit, self.offset, self.limit
            )));
        }

        if self.data.len() as u64 > self.limit {
            return Err(ApiError::Invalid(format!(
                "page holds {} records but limit is {}",
                self.data.len(),
                self.limit
            )));
        }

        for (i, record) in self.data.iter().enumerate() {
            let position = self.offset.saturating_add(i as u64);
            if record.cash_type == PaymentKind::Card && record.card.is_none() {
                return Err(ApiError::Invalid(format!(
                    "record {} is a card payment without a card identifier",
                    position
                )));
            }
            if record.coffee_name.trim().is_empty() {
                return Err(ApiError::Invalid(format!(
                    "record {} has no coffee name",
                    position
                )));
            }
        }

        Ok(())
    }

    /// Size of the table as far as this page can tell.
    ///
    /// Some servers report `count` as the length of the page rather than the
    /// table. A full page whose `count` does not reach past it is therefore
    /// only a lower bound. A short page ends the table. An empty page past the
    /// start with a zero count means the table ends at or before `offset`.
    pub fn total(&self) -> PageTotal {
        let seen = self.offset.saturating_add(self.data.len() as u64);

        if self.data.is_empty() {
            if self.count == 0 && self.offset > 0 {
                return PageTotal::Exact(self.offset);
            }
            return PageTotal::Exact(self.count);
        }

        if self.data.len() as u64 >= self.limit && self.count <= seen {
            return PageTotal::AtLeast(seen);
        }

        PageTotal::Exact(self.count.max(seen))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AskRequest<'a> {
    pub q: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AskResponse {
    pub message: String,
    /// Markdown answer text, untrusted
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Health {
    pub status: String,
}

impl Health {
    pub fn is_ok(&self) -> bool {
        self.status.eq_ignore_ascii_case("ok")
    }
}
