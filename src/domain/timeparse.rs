use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Timelike, Utc};
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Composite formats tried before falling back to the manual pattern.
const COMPOSITE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %I:%M:%S %p",
    "%Y-%m-%d %I:%M %p",
];

/// A time-of-day display string that could not be mapped back to an instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub input: String,
}

impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unparseable time-of-day string: '{}'", self.input)
    }
}

fn fallback_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(\d{1,2}):(\d{2})(?::(\d{2}))?\s*(AM|PM)?").expect("valid time pattern")
    })
}

/// Locale formatters emit narrow no-break and no-break spaces before AM/PM.
fn normalize_whitespace(display: &str) -> String {
    display
        .replace(['\u{202F}', '\u{00A0}'], " ")
        .trim()
        .to_string()
}

/// Parses a locale-rendered time-of-day display string back into wall-clock
/// time on the given calendar date.
///
/// Stored records carry display strings like "8:24:36 AM" or "08:24" instead
/// of machine timestamps, so every piece of time arithmetic funnels through
/// here first. Composite parsing is tried before the manual pattern because
/// it rejects less ambiguous input.
pub fn parse(date: NaiveDate, display: &str) -> Result<NaiveDateTime, ParseFailure> {
    let cleaned = normalize_whitespace(display);
    if cleaned.is_empty() {
        return Err(ParseFailure {
            input: display.to_string(),
        });
    }

    let composite = format!("{date} {cleaned}");
    for format in COMPOSITE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(&composite, format) {
            return Ok(parsed);
        }
    }

    let Some(captures) = fallback_pattern().captures(&cleaned) else {
        return Err(ParseFailure {
            input: display.to_string(),
        });
    };

    let hour: u32 = captures[1].parse().map_err(|_| ParseFailure {
        input: display.to_string(),
    })?;
    let minute: u32 = captures[2].parse().map_err(|_| ParseFailure {
        input: display.to_string(),
    })?;
    let second: u32 = captures
        .get(3)
        .map(|value| value.as_str().parse())
        .transpose()
        .map_err(|_| ParseFailure {
            input: display.to_string(),
        })?
        .unwrap_or(0);

    let hour = match captures.get(4).map(|period| period.as_str().to_ascii_uppercase()) {
        Some(period) if period == "PM" && hour < 12 => hour + 12,
        Some(period) if period == "AM" && hour == 12 => 0,
        _ => hour,
    };

    date.and_hms_opt(hour, minute, second).ok_or(ParseFailure {
        input: display.to_string(),
    })
}

/// Stable timeline ordering key; `None` when the display string is beyond
/// recovery (callers sort those entries to minute 0).
pub fn minutes_since_midnight(date: NaiveDate, display: &str) -> Option<u32> {
    let parsed = parse(date, display).ok()?;
    Some(parsed.time().hour() * 60 + parsed.time().minute())
}

/// Renders an instant the way the stored records expect: local wall-clock
/// time in 12-hour form, e.g. "8:24:36 AM".
pub fn render_display(instant: DateTime<Utc>) -> String {
    instant
        .with_timezone(&Local)
        .format("%-I:%M:%S %p")
        .to_string()
}

/// Local calendar date of an instant, used as the storage key for daily logs.
pub fn local_date(instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&Local).date_naive()
}

/// Local wall-clock view of an instant, for duration math against parsed
/// display strings.
pub fn local_naive(instant: DateTime<Utc>) -> NaiveDateTime {
    instant.with_timezone(&Local).naive_local()
}
