use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Date, Duration};

/// Supported bar granularities.
///
/// Each period carries the upstream wire code (`klt` query parameter), a
/// default lookback window used by "fetch all available" queries, and a
/// nearby-date search radius used when a point lookup misses the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Semiannual,
    Annual,
}

impl Period {
    pub const ALL: [Self; 6] = [
        Self::Daily,
        Self::Weekly,
        Self::Monthly,
        Self::Quarterly,
        Self::Semiannual,
        Self::Annual,
    ];

    /// Upstream period code (`klt`).
    pub const fn code(self) -> u16 {
        match self {
            Self::Daily => 101,
            Self::Weekly => 102,
            Self::Monthly => 103,
            Self::Quarterly => 104,
            Self::Semiannual => 105,
            Self::Annual => 106,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Semiannual => "semiannual",
            Self::Annual => "annual",
        }
    }

    /// Default lookback window, in years, for `get_all` queries.
    pub const fn lookback_years(self) -> i32 {
        match self {
            Self::Daily => 1,
            Self::Weekly => 2,
            Self::Monthly => 5,
            Self::Quarterly => 8,
            Self::Semiannual => 10,
            Self::Annual => 20,
        }
    }

    /// Search radius, in days, applied around a missed point lookup.
    pub const fn search_radius_days(self) -> i64 {
        match self {
            Self::Daily => 10,
            Self::Weekly => 70,
            Self::Monthly => 365,
            Self::Quarterly => 1095,
            Self::Semiannual => 1825,
            Self::Annual => 3650,
        }
    }

    /// Start of the default lookback window ending at `today`.
    pub fn lookback_start(self, today: Date) -> Date {
        years_back(today, self.lookback_years())
    }

    /// Symmetric `[date - radius, date + radius]` window for point-miss
    /// re-fetches, clamped at the calendar bounds.
    pub fn point_window(self, date: Date) -> (Date, Date) {
        let radius = Duration::days(self.search_radius_days());
        let start = date.checked_sub(radius).unwrap_or(Date::MIN);
        let end = date.checked_add(radius).unwrap_or(Date::MAX);
        (start, end)
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "quarterly" => Ok(Self::Quarterly),
            "semiannual" => Ok(Self::Semiannual),
            "annual" => Ok(Self::Annual),
            other => Err(format!(
                "invalid period '{other}', expected one of daily, weekly, monthly, quarterly, semiannual, annual"
            )),
        }
    }
}

/// Move a calendar date back by whole years, clamping Feb 29 to Feb 28.
fn years_back(date: Date, years: i32) -> Date {
    let year = date.year() - years;
    Date::from_calendar_date(year, date.month(), date.day()).unwrap_or_else(|_| {
        Date::from_calendar_date(year, date.month(), 28).expect("day 28 exists in every month")
    })
}
