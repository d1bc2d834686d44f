pub mod duration;

pub use duration::parse_duration;

use chrono::NaiveDate;

/// Parse a `YYYY-MM-DD` day.
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| format!("Invalid date '{s}' (expected YYYY-MM-DD): {e}"))
}
