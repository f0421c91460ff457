use crate::error::TimeRangeError;
use chrono::{DateTime, Duration, Months, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// URL parameter holding the range start.
pub const FROM_PARAM: &str = "from";
/// URL parameter holding the range end.
pub const TO_PARAM: &str = "to";
/// Format of absolute timestamps, interpreted as UTC.
pub const ABSOLUTE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static QUICK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^now-(?P<amount>\d*)(?P<unit>[A-Za-z]*)$").expect("valid regex"));

/// Quick ranges offered by the time picker.
pub const QUICK_RANGES: &[(&str, &str)] = &[
    ("Last 5 minutes", "now-5m"),
    ("Last 15 minutes", "now-15m"),
    ("Last 30 minutes", "now-30m"),
    ("Last 1 hour", "now-1h"),
    ("Last 3 hours", "now-3h"),
    ("Last 6 hours", "now-6h"),
    ("Last 12 hours", "now-12h"),
    ("Last 24 hours", "now-1d"),
    ("Last 7 days", "now-7d"),
    ("Last 30 days", "now-30d"),
    ("Last 1 year", "now-1y"),
];

fn subtract(now: DateTime<Utc>, amount: u32, unit: &str) -> Option<DateTime<Utc>> {
    let amount_i = i64::from(amount);
    match unit {
        "s" => now.checked_sub_signed(Duration::seconds(amount_i)),
        "m" => now.checked_sub_signed(Duration::minutes(amount_i)),
        "h" => now.checked_sub_signed(Duration::hours(amount_i)),
        "d" => now.checked_sub_signed(Duration::days(amount_i)),
        "w" => now.checked_sub_signed(Duration::weeks(amount_i)),
        "M" => now.checked_sub_months(Months::new(amount)),
        "y" => now.checked_sub_months(Months::new(amount.saturating_mul(12))),
        _ => None,
    }
}

pub fn is_valid_unit(unit: &str) -> bool {
    matches!(unit, "s" | "m" | "h" | "d" | "w" | "M" | "y")
}

/// Resolve a single time expression relative to `now`.
///
/// Accepts `now`, quick offsets (`now-15m`), epoch milliseconds and absolute
/// timestamps in [`ABSOLUTE_FORMAT`].
pub fn parse_time(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>, TimeRangeError> {
    let input = input.trim();
    if input == "now" {
        return Ok(now);
    }
    if let Some(caps) = QUICK_RE.captures(input) {
        let unit = &caps["unit"];
        if !is_valid_unit(unit) {
            return Err(TimeRangeError::InvalidUnit(unit.to_string()));
        }
        let amount: u32 = caps["amount"]
            .parse()
            .map_err(|_| TimeRangeError::InvalidAmount(input.to_string()))?;
        return subtract(now, amount, unit)
            .ok_or_else(|| TimeRangeError::InvalidAmount(input.to_string()));
    }
    if !input.is_empty() && input.bytes().all(|b| b.is_ascii_digit()) {
        return input
            .parse::<i64>()
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .ok_or_else(|| TimeRangeError::InvalidTimestamp {
                input: input.to_string(),
                expected: "epoch milliseconds",
            });
    }
    NaiveDateTime::parse_from_str(input, ABSOLUTE_FORMAT)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|_| TimeRangeError::InvalidTimestamp {
            input: input.to_string(),
            expected: ABSOLUTE_FORMAT,
        })
}

/// Unresolved range as stored in the URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: String,
    pub to: String,
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::new("now-1h", "now")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl ResolvedRange {
    pub fn from_ms(&self) -> i64 {
        self.from.timestamp_millis()
    }

    pub fn to_ms(&self) -> i64 {
        self.to.timestamp_millis()
    }
}

impl TimeRange {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn resolve(&self, now: DateTime<Utc>) -> Result<ResolvedRange, TimeRangeError> {
        Ok(ResolvedRange {
            from: parse_time(&self.from, now)?,
            to: parse_time(&self.to, now)?,
        })
    }

    pub fn is_relative(&self) -> bool {
        self.from.starts_with("now") || self.to.starts_with("now")
    }

    /// Human label, using the quick-range name when one matches.
    pub fn label(&self) -> String {
        if self.to == "now" {
            if let Some((label, _)) = QUICK_RANGES.iter().find(|(_, from)| *from == self.from) {
                return (*label).to_string();
            }
        }
        format!("{} to {}", self.from, self.to)
    }
}
