//! Small helpers.

use chrono::NaiveDate;

pub fn sanitize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Statement numbers may carry thousands separators: "1,000" -> "1000".
pub fn strip_thousands(s: &str) -> String {
    s.trim().chars().filter(|c| *c != ',').collect()
}

/// Calendar day of a "YYYY-MM-DD, HH:MM:SS" timestamp; time of day is dropped.
pub fn calendar_day(ts: &str) -> Option<NaiveDate> {
    let day = ts.trim().get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// "2018-11-03" -> "03.11.2018"
pub fn fi_style_date(d: NaiveDate) -> String {
    d.format("%d.%m.%Y").to_string()
}
