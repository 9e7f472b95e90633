//! Failures that abort a gains computation.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GainsError {
    /// Ticker missing from the statement's instrument information section.
    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("exchange rates unavailable for {currency}: {reason}")]
    DataUnavailable { currency: String, reason: String },

    #[error("no {currency} reference rate on or before {date}")]
    RateGapExhausted { currency: String, date: NaiveDate },

    #[error("malformed statement row {line}: {reason}")]
    MalformedRow { line: u64, reason: String },
}

pub type Result<T> = std::result::Result<T, GainsError>;
