use serde::{Deserialize, Serialize};
use time::Date;

use crate::domain::{parse_iso_date, Period};
use crate::error::ParseError;

/// Minimum field count in an upstream kline line.
const MIN_FIELDS: usize = 11;

/// One price bar for one instrument, one period, one date.
///
/// Constructed only from a raw comma-delimited field list via
/// [`BarRecord::parse`] and immutable afterwards. A later fetch for the same
/// instrument/period/date supersedes the whole record in the cache; fields
/// are never merged individually.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarRecord {
    /// Anchor date of the traded period.
    pub date: Date,
    pub open: f64,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub volume: u64,
    /// Traded value.
    pub amount: f64,
    pub amplitude: f64,
    pub change_rate: f64,
    pub change_amount: f64,
    pub turnover_rate: f64,
    pub period: Period,
    /// Previous close, always recomputed as `close - change_amount` at parse
    /// time; never trusted from upstream input.
    pub last_close: f64,
}

impl BarRecord {
    /// Parse one upstream kline line.
    ///
    /// The fixed field order is
    /// `date,open,close,high,low,volume,amount,amplitude,changeRate,changeAmount,turnoverRate`.
    /// Parsing is all-or-nothing: a short line or a malformed field fails the
    /// whole record.
    pub fn parse(line: &str, period: Period) -> Result<Self, ParseError> {
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < MIN_FIELDS {
            return Err(ParseError::TooFewFields {
                got: fields.len(),
                min: MIN_FIELDS,
            });
        }

        let date = parse_iso_date(fields[0]).map_err(|_| ParseError::InvalidDate {
            value: fields[0].to_owned(),
        })?;
        let open = parse_f64("open", fields[1])?;
        let close = parse_f64("close", fields[2])?;
        let high = parse_f64("high", fields[3])?;
        let low = parse_f64("low", fields[4])?;
        let volume = parse_u64("volume", fields[5])?;
        let amount = parse_f64("amount", fields[6])?;
        let amplitude = parse_f64("amplitude", fields[7])?;
        let change_rate = parse_f64("changeRate", fields[8])?;
        let change_amount = parse_f64("changeAmount", fields[9])?;
        let turnover_rate = parse_f64("turnoverRate", fields[10])?;

        Ok(Self {
            date,
            open,
            close,
            high,
            low,
            volume,
            amount,
            amplitude,
            change_rate,
            change_amount,
            turnover_rate,
            period,
            last_close: close - change_amount,
        })
    }
}

fn parse_f64(field: &'static str, value: &str) -> Result<f64, ParseError> {
    value.trim().parse().map_err(|_| ParseError::InvalidNumber {
        field,
        value: value.to_owned(),
    })
}

fn parse_u64(field: &'static str, value: &str) -> Result<u64, ParseError> {
    value.trim().parse().map_err(|_| ParseError::InvalidNumber {
        field,
        value: value.to_owned(),
    })
}
