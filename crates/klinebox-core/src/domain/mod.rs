//! Domain models: price bars, periods, and the calendar-date formats shared
//! by the cache and the wire boundary.

mod bar;
mod period;

pub use bar::BarRecord;
pub use period::Period;

use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::Date;

/// Canonical internal date form (`YYYY-MM-DD`).
const ISO_DATE: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day]");

/// Compact wire form (`YYYYMMDD`) used by the upstream `beg`/`end` parameters.
const COMPACT_DATE: &[BorrowedFormatItem<'_>] = format_description!("[year][month][day]");

/// Parse a `YYYY-MM-DD` calendar date.
pub fn parse_iso_date(value: &str) -> Result<Date, time::error::Parse> {
    Date::parse(value.trim(), ISO_DATE)
}

/// Format a date in the compact 8-digit wire form.
pub fn format_compact_date(date: Date) -> String {
    date.format(COMPACT_DATE)
        .expect("compact date format is infallible for valid dates")
}
