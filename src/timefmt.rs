//! Timestamp formatting without chrono.
//!
//! The harness needs two forms: RFC 3339 for log lines and report
//! headers, and a compact `YYYYMMDD-HHMMSS` stamp for report filenames.
//! Both are derived from the same civil-date conversion.

/// Current time as an RFC 3339 UTC string.
pub fn now_rfc3339() -> String {
    format_rfc3339(now_unix_secs())
}

/// Current time as a compact `YYYYMMDD-HHMMSS` stamp (UTC).
pub fn now_stamp() -> String {
    format_stamp(now_unix_secs())
}

fn now_unix_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Format a Unix timestamp as `YYYY-MM-DDTHH:MM:SSZ`.
pub fn format_rfc3339(secs: u64) -> String {
    let (year, month, day, hours, minutes, seconds) = civil_from_unix(secs);
    format!("{year:04}-{month:02}-{day:02}T{hours:02}:{minutes:02}:{seconds:02}Z")
}

/// Format a Unix timestamp as `YYYYMMDD-HHMMSS`.
pub fn format_stamp(secs: u64) -> String {
    let (year, month, day, hours, minutes, seconds) = civil_from_unix(secs);
    format!("{year:04}{month:02}{day:02}-{hours:02}{minutes:02}{seconds:02}")
}

/// Manual conversion of a Unix timestamp to UTC civil date-time fields.
fn civil_from_unix(secs: u64) -> (u64, u64, u64, u64, u64, u64) {
    let mut s = secs;
    let seconds = s % 60;
    s /= 60;
    let minutes = s % 60;
    s /= 60;
    let hours = s % 24;
    s /= 24;

    // Days since 1970-01-01
    let mut days = s;
    let mut year = 1970u64;
    loop {
        let days_in_year = if is_leap(year) { 366 } else { 365 };
        if days < days_in_year {
            break;
        }
        days -= days_in_year;
        year += 1;
    }

    let leap = is_leap(year);
    let month_days: [u64; 12] = [
        31,
        if leap { 29 } else { 28 },
        31,
        30,
        31,
        30,
        31,
        31,
        30,
        31,
        30,
        31,
    ];
    let mut month = 0usize;
    for (i, &d) in month_days.iter().enumerate() {
        if days < d {
            month = i;
            break;
        }
        days -= d;
    }
    let day = days + 1;

    (year, month as u64 + 1, day, hours, minutes, seconds)
}

fn is_leap(year: u64) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}
