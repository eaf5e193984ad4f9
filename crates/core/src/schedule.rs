//! Parsing and rendering of the human-entered scheduling values: dates, durations and the
//! clock they are judged against.

use std::sync::LazyLock;

use chrono::{Datelike, Days, Local, Months, NaiveDate, Weekday};
use regex::Regex;

pub trait Clock: Send {
    fn today(&self) -> NaiveDate;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

static SLASH_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<month>\d{1,2})/(?P<day>\d{1,2})/(?P<year>\d{2}|\d{4})$").expect("regex")
});
static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<year>\d{4})-(?P<month>\d{1,2})-(?P<day>\d{1,2})$").expect("regex")
});
static RELATIVE_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^in (?P<count>\d{1,3}) (?P<unit>days?|weeks?)$").expect("regex")
});
static MONTH_DAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<month>[a-z]+)\.? (?P<day>\d{1,2})(?:st|nd|rd|th)?(?:,? (?P<year>\d{4}))?$")
        .expect("regex")
});
static DURATION_PART: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<amount>\d+(?:\.\d+)?)\s*(?P<unit>weeks?|wks?|w|days?|d|hours?|hrs?|h|minutes?|mins?|m|seconds?|secs?|s)",
    )
    .expect("regex")
});
static CLOCK_DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<hours>\d+):(?P<minutes>\d{2})(?::(?P<seconds>\d{2}))?$").expect("regex")
});

/// Resolves a date expression relative to `today`.
///
/// Weekday names always resolve forward, so naming today's weekday means a week from today.
/// Past dates are returned as-is; rejecting them is the caller's decision.
pub fn parse_date(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    let normalized = raw
        .trim()
        .trim_end_matches(|ch: char| matches!(ch, '.' | '!' | '?'))
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    match normalized.as_str() {
        "today" | "tonight" => return Some(today),
        "tomorrow" | "tmrw" | "tmr" => return today.checked_add_days(Days::new(1)),
        "yesterday" => return today.checked_sub_days(Days::new(1)),
        _ => {}
    }

    if let Some(captures) = SLASH_DATE.captures(&normalized) {
        let month = captures["month"].parse().ok()?;
        let day = captures["day"].parse().ok()?;
        let year_text = &captures["year"];
        let mut year: i32 = year_text.parse().ok()?;
        if year_text.len() == 2 {
            year += 2000;
        }
        return NaiveDate::from_ymd_opt(year, month, day);
    }

    if let Some(captures) = ISO_DATE.captures(&normalized) {
        return NaiveDate::from_ymd_opt(
            captures["year"].parse().ok()?,
            captures["month"].parse().ok()?,
            captures["day"].parse().ok()?,
        );
    }

    if let Some(captures) = RELATIVE_DATE.captures(&normalized) {
        let count: u64 = captures["count"].parse().ok()?;
        let days = if captures["unit"].starts_with("week") { count * 7 } else { count };
        return today.checked_add_days(Days::new(days));
    }

    let weekday_text = normalized
        .strip_prefix("next ")
        .or_else(|| normalized.strip_prefix("this "))
        .unwrap_or(&normalized);
    if let Some(weekday) = parse_weekday(weekday_text) {
        return Some(next_weekday(today, weekday));
    }

    if let Some(captures) = MONTH_DAY.captures(&normalized) {
        let month = parse_month(&captures["month"])?;
        let day = captures["day"].parse().ok()?;
        if let Some(year) = captures.name("year") {
            return NaiveDate::from_ymd_opt(year.as_str().parse().ok()?, month, day);
        }
        let candidate = NaiveDate::from_ymd_opt(today.year(), month, day)?;
        if candidate < today {
            return candidate.checked_add_months(Months::new(12));
        }
        return Some(candidate);
    }

    None
}

fn next_weekday(today: NaiveDate, weekday: Weekday) -> NaiveDate {
    let current = today.weekday().num_days_from_monday();
    let target = weekday.num_days_from_monday();
    let ahead = (target + 7 - current) % 7;
    let ahead = if ahead == 0 { 7 } else { ahead };
    today + Days::new(u64::from(ahead))
}

fn parse_weekday(text: &str) -> Option<Weekday> {
    Some(match text {
        "monday" | "mon" => Weekday::Mon,
        "tuesday" | "tue" | "tues" => Weekday::Tue,
        "wednesday" | "wed" => Weekday::Wed,
        "thursday" | "thu" | "thur" | "thurs" => Weekday::Thu,
        "friday" | "fri" => Weekday::Fri,
        "saturday" | "sat" => Weekday::Sat,
        "sunday" | "sun" => Weekday::Sun,
        _ => return None,
    })
}

fn parse_month(text: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "january",
        "february",
        "march",
        "april",
        "may",
        "june",
        "july",
        "august",
        "september",
        "october",
        "november",
        "december",
    ];

    if text.len() < 3 {
        return None;
    }
    MONTHS
        .iter()
        .position(|month| month.starts_with(text))
        .map(|index| index as u32 + 1)
}

pub fn weekday_name(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Parses a duration such as `30m`, `1h 30m`, `1.5 hours`, `2 hours and 15 minutes` or the
/// clock form `1:30` (hours and minutes). Bare numbers and zero durations are rejected.
pub fn parse_duration(raw: &str) -> Option<u64> {
    let normalized = raw.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }

    if let Some(captures) = CLOCK_DURATION.captures(&normalized) {
        let hours: u64 = captures["hours"].parse().ok()?;
        let minutes: u64 = captures["minutes"].parse().ok()?;
        let seconds = match captures.name("seconds") {
            Some(value) => value.as_str().parse::<u64>().ok()?,
            None => 0,
        };
        if minutes >= 60 || seconds >= 60 {
            return None;
        }
        let total = hours.checked_mul(3600)?.checked_add(minutes * 60 + seconds)?;
        return (total > 0).then_some(total);
    }

    let mut rest = normalized.as_str();
    let mut total = 0.0_f64;
    let mut parts = 0usize;

    loop {
        rest = rest.trim_start_matches(|ch: char| ch.is_whitespace() || ch == ',');
        if let Some(after_and) = rest.strip_prefix("and ") {
            rest = after_and;
            continue;
        }
        if rest.is_empty() {
            break;
        }

        let captures = DURATION_PART.captures(rest)?;
        let end = captures.get(0)?.end();
        if rest[end..].starts_with(|ch: char| ch.is_alphabetic()) {
            return None;
        }
        let amount: f64 = captures["amount"].parse().ok()?;
        total += amount * unit_seconds(&captures["unit"])? as f64;
        parts += 1;
        rest = &rest[end..];
    }

    let total = total.round();
    (parts > 0 && total >= 1.0 && total < u64::MAX as f64).then_some(total as u64)
}

fn unit_seconds(unit: &str) -> Option<u64> {
    Some(match unit.chars().next()? {
        'w' => 7 * 24 * 3600,
        'd' => 24 * 3600,
        'h' => 3600,
        'm' => 60,
        's' => 1,
        _ => return None,
    })
}

/// Renders seconds as `H:MM:SS`, prefixed with `N day(s), ` once past a day.
pub fn format_duration(total_seconds: u64) -> String {
    let days = total_seconds / 86_400;
    let remainder = total_seconds % 86_400;
    let clock = format!(
        "{}:{:02}:{:02}",
        remainder / 3600,
        (remainder % 3600) / 60,
        remainder % 60
    );

    match days {
        0 => clock,
        1 => format!("1 day, {clock}"),
        _ => format!("{days} days, {clock}"),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Days, NaiveDate, Weekday};

    use super::{format_duration, parse_date, parse_duration, weekday_name};

    fn wednesday() -> NaiveDate {
        let date = NaiveDate::from_ymd_opt(2026, 10, 21).expect("date");
        assert_eq!(date.weekday(), Weekday::Wed);
        date
    }

    fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(year, month, day)
    }

    #[test]
    fn parses_strict_slash_dates() {
        let today = wednesday();
        assert_eq!(parse_date("02/25/2100", today), ymd(2100, 2, 25));
        assert_eq!(parse_date("2/5/2100", today), ymd(2100, 2, 5));
        assert_eq!(parse_date("02/25/99", today), ymd(2099, 2, 25));
        assert_eq!(parse_date("02/25/1000", today), ymd(1000, 2, 25));
        assert_eq!(parse_date("02/30/2100", today), None);
    }

    #[test]
    fn parses_iso_dates() {
        assert_eq!(parse_date("2100-02-25", wednesday()), ymd(2100, 2, 25));
    }

    #[test]
    fn parses_relative_words() {
        let today = wednesday();
        assert_eq!(parse_date("today", today), Some(today));
        assert_eq!(parse_date("Tomorrow", today), today.checked_add_days(Days::new(1)));
        assert_eq!(parse_date("yesterday", today), today.checked_sub_days(Days::new(1)));
        assert_eq!(parse_date("in 2 weeks", today), today.checked_add_days(Days::new(14)));
    }

    #[test]
    fn weekday_prefers_the_future() {
        let today = wednesday();
        assert_eq!(parse_date("tuesday", today), ymd(2026, 10, 27));
        assert_eq!(parse_date("Thursday", today), ymd(2026, 10, 22));
        assert_eq!(parse_date("next fri", today), ymd(2026, 10, 23));
        assert_eq!(parse_date("wednesday", today), ymd(2026, 10, 28));
    }

    #[test]
    fn month_names_roll_forward_without_year() {
        let today = wednesday();
        assert_eq!(parse_date("dec 3", today), ymd(2026, 12, 3));
        assert_eq!(parse_date("February 25th", today), ymd(2027, 2, 25));
        assert_eq!(parse_date("feb 25, 2100", today), ymd(2100, 2, 25));
    }

    #[test]
    fn rejects_nonsense() {
        assert_eq!(parse_date("whenever", wednesday()), None);
        assert_eq!(parse_date("", wednesday()), None);
    }

    #[test]
    fn parses_unit_durations() {
        assert_eq!(parse_duration("30m"), Some(1800));
        assert_eq!(parse_duration("1h"), Some(3600));
        assert_eq!(parse_duration("1h30m"), Some(5400));
        assert_eq!(parse_duration("1 hour and 15 minutes"), Some(4500));
        assert_eq!(parse_duration("1.5 hours"), Some(5400));
        assert_eq!(parse_duration("2d"), Some(172_800));
    }

    #[test]
    fn parses_clock_durations_as_hours_and_minutes() {
        assert_eq!(parse_duration("1:30"), Some(5400));
        assert_eq!(parse_duration("0:45:30"), Some(2730));
        assert_eq!(parse_duration("1:75"), None);
        assert_eq!(parse_duration("10000000000000000:00"), None);
        assert_eq!(parse_duration("99999999999999999999:00"), None);
    }

    #[test]
    fn rejects_bare_numbers_and_zero() {
        assert_eq!(parse_duration("30"), None);
        assert_eq!(parse_duration("0m"), None);
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration("30 minutes later"), None);
        assert_eq!(parse_duration(&format!("{} weeks", "9".repeat(400))), None);
    }

    #[test]
    fn formats_durations_like_a_clock() {
        assert_eq!(format_duration(1800), "0:30:00");
        assert_eq!(format_duration(3600), "1:00:00");
        assert_eq!(format_duration(90_061), "1 day, 1:01:01");
        assert_eq!(format_duration(2 * 86_400), "2 days, 0:00:00");
    }

    #[test]
    fn names_weekdays() {
        assert_eq!(weekday_name(NaiveDate::from_ymd_opt(2100, 2, 25).expect("date")), "Thursday");
    }
}
