use crate::error::{Result, SurfaceError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OptionType {
    Call,
    Put,
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionType::Call => write!(f, "calls"),
            OptionType::Put => write!(f, "puts"),
        }
    }
}

impl FromStr for OptionType {
    type Err = SurfaceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "calls" | "call" => Ok(OptionType::Call),
            "puts" | "put" => Ok(OptionType::Put),
            other => Err(SurfaceError::ConfigError(format!(
                "Unknown option type '{}', expected 'calls' or 'puts'",
                other
            ))),
        }
    }
}

/// One expiry bucket as listed by the data provider.
///
/// `timestamp` is the provider's key for the bucket and is sent back
/// unchanged when the chain for this expiry is requested.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Expiry {
    pub date: NaiveDate,
    pub timestamp: i64,
}

impl Expiry {
    pub fn new(date: NaiveDate, timestamp: i64) -> Self {
        Self { date, timestamp }
    }

    /// Expiry keyed by a unix timestamp (seconds)
    pub fn from_timestamp(timestamp: i64) -> Option<Self> {
        DateTime::<Utc>::from_timestamp(timestamp, 0).map(|dt| Self {
            date: dt.date_naive(),
            timestamp,
        })
    }

    /// Expiry for a calendar date, keyed at midnight UTC
    pub fn from_date(date: NaiveDate) -> Self {
        let timestamp = date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp();
        Self { date, timestamp }
    }

    /// `YYYY-MM-DD` label
    pub fn label(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

impl std::fmt::Display for Expiry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.date.format("%Y-%m-%d"))
    }
}

impl FromStr for Expiry {
    type Err = SurfaceError;

    fn from_str(s: &str) -> Result<Self> {
        let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .map_err(|e| SurfaceError::ParseError(format!("Invalid expiry date '{}': {}", s, e)))?;
        Ok(Self::from_date(date))
    }
}

/// A single row of an option chain table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionRow {
    pub contract_symbol: Option<String>,
    pub strike: f64,
    pub implied_volatility: f64,
}

impl OptionRow {
    pub fn new(strike: f64, implied_volatility: f64) -> Self {
        Self {
            contract_symbol: None,
            strike,
            implied_volatility,
        }
    }
}

/// Calls and puts for one expiry, in provider row order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionChain {
    pub expiry: Expiry,
    pub calls: Vec<OptionRow>,
    pub puts: Vec<OptionRow>,
}

impl OptionChain {
    pub fn new(expiry: Expiry) -> Self {
        Self {
            expiry,
            calls: Vec::new(),
            puts: Vec::new(),
        }
    }

    /// The calls or puts table
    pub fn table(&self, option_type: OptionType) -> &[OptionRow] {
        match option_type {
            OptionType::Call => &self.calls,
            OptionType::Put => &self.puts,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty() && self.puts.is_empty()
    }
}
