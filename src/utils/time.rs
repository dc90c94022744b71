use chrono::{DateTime, Duration, Months, SecondsFormat, Utc};
use regex::Regex;

use crate::{NgsiError, Result};

/// Relative period such as `30m` or `1d`: `<n><unit>` with unit one of
/// `s m h d w M y`, minutes when the unit is omitted.
const PERIOD_PATTERN: &str = r"^\s*(\d+)\s*([smhdwMy]?)\s*$";

pub fn time_millis() -> i64 {
    let time: DateTime<chrono::Utc> = Utc::now();
    time.timestamp_millis()
}

/// ISO-8601 UTC with millisecond precision, as the FIWARE services expect.
pub fn to_iso(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Start of the window that ends at `now` and spans `period`.
pub fn period_start(
    period: &str,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    let re = Regex::new(PERIOD_PATTERN).map_err(|e| NgsiError::Runtime(e.to_string()))?;
    let caps = re.captures(period).ok_or_else(|| NgsiError::Config(format!("invalid period: {}", period)))?;
    let amount: u32 = caps[1].parse().map_err(|_| NgsiError::Config(format!("invalid period: {}", period)))?;
    let amount64 = i64::from(amount);

    let start = match &caps[2] {
        "s" => now.checked_sub_signed(Duration::seconds(amount64)),
        "" | "m" => now.checked_sub_signed(Duration::minutes(amount64)),
        "h" => now.checked_sub_signed(Duration::hours(amount64)),
        "d" => now.checked_sub_signed(Duration::days(amount64)),
        "w" => now.checked_sub_signed(Duration::weeks(amount64)),
        "M" => now.checked_sub_months(Months::new(amount)),
        "y" => amount.checked_mul(12).and_then(|m| now.checked_sub_months(Months::new(m))),
        _ => None,
    };
    start.ok_or_else(|| NgsiError::Config(format!("invalid period: {}", period)))
}

/// `(from, to)` as ISO strings for a period ending at `now`.
pub fn period_range(
    period: &str,
    now: DateTime<Utc>,
) -> Result<(String, String)> {
    let start = period_start(period, now)?;
    Ok((to_iso(start), to_iso(now)))
}
