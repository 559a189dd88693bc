use thiserror::Error;

/// Failure to turn one raw kline field list into a [`BarRecord`](crate::BarRecord).
///
/// Parse failures are always local to a single line: the fetcher drops the
/// offending line and keeps the rest of the batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected at least {min} comma-delimited fields, got {got}")]
    TooFewFields { got: usize, min: usize },
    #[error("invalid bar date '{value}', expected YYYY-MM-DD")]
    InvalidDate { value: String },
    #[error("field '{field}' is not a valid number: '{value}'")]
    InvalidNumber { field: &'static str, value: String },
}

/// Failure of one market-prefix fetch attempt.
///
/// These never escape [`KlineFetcher::fetch`](crate::KlineFetcher::fetch):
/// every variant degrades to "this prefix produced no data" and the next
/// prefix is tried. They exist so attempts can be logged with a reason.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("transport error: {message}")]
    Transport { message: String },
    #[error("upstream returned HTTP status {status}")]
    HttpStatus { status: u16 },
    #[error("upstream returned error code rc={rc}")]
    UpstreamCode { rc: i32 },
    #[error("upstream response carried no data payload")]
    MissingPayload,
    #[error("malformed response envelope: {message}")]
    Envelope { message: String },
}
