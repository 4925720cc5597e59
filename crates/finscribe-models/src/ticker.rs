use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Maximum number of letters in a ticker symbol.
pub const MAX_TICKER_LEN: usize = 5;

/// A stock ticker symbol: 1 to 5 uppercase ASCII letters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

/// Returned when a string is not a valid ticker after normalization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid ticker: {0:?}")]
pub struct InvalidTicker(pub String);

impl Ticker {
    /// Normalize (trim + uppercase) and validate `raw`.
    pub fn parse(raw: &str) -> Result<Self, InvalidTicker> {
        let normalized = raw.trim().to_uppercase();
        if is_ticker_token(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(InvalidTicker(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// True when `s` is already a well-formed ticker (`^[A-Z]{1,5}$`).
pub fn is_ticker_token(s: &str) -> bool {
    (1..=MAX_TICKER_LEN).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_uppercase())
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Ticker {
    type Err = InvalidTicker;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Ticker {
    type Error = InvalidTicker;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Ticker> for String {
    fn from(value: Ticker) -> Self {
        value.0
    }
}

impl AsRef<str> for Ticker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
