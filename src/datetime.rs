//! Timestamp disambiguation.
//!
//! Raw cells are resolved in four tiers, first match wins:
//! 1. positive numbers are Unix time (milliseconds above 10^12, else seconds)
//! 2. ISO-8601 calendar dates, with or without an explicit offset
//! 3. regional spreadsheet patterns, one explicit parser per pattern
//! 4. anything else is unparseable
//!
//! Values without an explicit offset are read in the current [`TimezoneHint`].

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{
    DateTime, Duration, FixedOffset, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, Offset,
    TimeZone, Utc,
};
use chrono_tz::Tz;
use regex::{Captures, Regex};
use serde::Serialize;

use crate::error::{IngestError, Result};

const MILLIS_THRESHOLD: f64 = 1e12;

// (abbreviation, offset in minutes east of UTC)
const ABBREVIATIONS: &[(&str, i32)] = &[
    ("EST", -300),
    ("EDT", -240),
    ("CST", -360),
    ("CDT", -300),
    ("MST", -420),
    ("MDT", -360),
    ("PST", -480),
    ("PDT", -420),
    ("BST", 60),
    ("CET", 60),
    ("CEST", 120),
    ("EET", 120),
    ("EEST", 180),
    ("IST", 330),
    ("JST", 540),
    ("HKT", 480),
    ("SGT", 480),
    ("AEST", 600),
    ("AEDT", 660),
];

static OFFSET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:utc|gmt)?\s*([+-])(\d{1,2})(?::?(\d{2}))?$").expect("valid offset regex")
});

static DEFAULT_PARSER: LazyLock<DateTimeParser> = LazyLock::new(DateTimeParser::default);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DateTimeKind {
    UnixSeconds,
    UnixMillis,
    IsoWithTz,
    IsoLocal,
    Regional,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDateTime {
    pub utc: DateTime<Utc>,
    pub kind: DateTimeKind,
    /// Offset or zone the value was read in.
    pub timezone: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Zone {
    Utc,
    Fixed(FixedOffset),
    Named(Tz),
}

/// Assumed zone for timestamps that carry no offset of their own.
#[derive(Debug, Clone, PartialEq)]
pub struct TimezoneHint {
    label: String,
    zone: Zone,
}

impl Default for TimezoneHint {
    fn default() -> Self {
        Self::utc()
    }
}

impl fmt::Display for TimezoneHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

impl FromStr for TimezoneHint {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TimezoneHint {
    pub fn utc() -> Self {
        Self {
            label: "utc".to_string(),
            zone: Zone::Utc,
        }
    }

    /// Accepts "utc"/"gmt"/"z", numeric offsets ("+05:30", "-0500", "UTC+2"),
    /// common abbreviations ("EST", "CET") and IANA names ("America/New_York").
    pub fn parse(raw: &str) -> Result<Self> {
        let label = raw.trim();
        let unknown = || IngestError::UnknownTimezone(label.to_string());
        if label.is_empty() {
            return Err(unknown());
        }
        if ["utc", "gmt", "z"].contains(&label.to_lowercase().as_str()) {
            return Ok(Self::utc());
        }

        let zone = if let Some(caps) = OFFSET_RE.captures(label) {
            let hours: i32 = caps[2].parse().map_err(|_| unknown())?;
            let minutes: i32 = caps.get(3).map_or(Ok(0), |m| m.as_str().parse()).map_err(|_| unknown())?;
            if hours > 14 || minutes > 59 {
                return Err(unknown());
            }
            let sign = if &caps[1] == "-" { -1 } else { 1 };
            let offset = FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(unknown)?;
            Zone::Fixed(offset)
        } else if let Some((_, minutes)) = ABBREVIATIONS
            .iter()
            .find(|(abbr, _)| abbr.eq_ignore_ascii_case(label))
        {
            Zone::Fixed(FixedOffset::east_opt(minutes * 60).ok_or_else(unknown)?)
        } else {
            Zone::Named(label.parse::<Tz>().map_err(|_| unknown())?)
        };

        Ok(Self {
            label: label.to_string(),
            zone,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Read a wall-clock time in this zone.
    ///
    /// Ambiguous local times (DST fold) take the earlier instant; nonexistent
    /// ones (DST gap) use the offset in effect a day earlier.
    pub fn to_utc(&self, naive: NaiveDateTime) -> DateTime<Utc> {
        match self.zone {
            Zone::Utc => naive.and_utc(),
            Zone::Fixed(offset) => (naive - offset).and_utc(),
            Zone::Named(tz) => match tz.from_local_datetime(&naive) {
                LocalResult::Single(dt) => dt.with_timezone(&Utc),
                LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
                LocalResult::None => {
                    let before = tz.offset_from_utc_datetime(&(naive - Duration::days(1))).fix();
                    (naive - before).and_utc()
                }
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum DateOrder {
    MonthDayYear,
    DayMonthYear,
    YearMonthDay,
}

#[derive(Debug)]
struct DatePattern {
    name: &'static str,
    regex: Regex,
    order: DateOrder,
}

// HH:MM[:SS[.fff]] [AM|PM], captured as groups 4..=8
const TIME_PART: &str = r"(?:[ T]+(\d{1,2}):(\d{2})(?::(\d{2})(?:\.(\d{1,9}))?)?\s*([AaPp][Mm])?)?";

impl DatePattern {
    fn new(name: &'static str, date_part: &str, order: DateOrder) -> Self {
        let regex = Regex::new(&format!("^{date_part}{TIME_PART}$")).expect("valid date pattern");
        Self { name, regex, order }
    }

    fn parse(&self, s: &str) -> Option<NaiveDateTime> {
        let caps = self.regex.captures(s)?;
        let n = |i: usize| -> Option<u32> { caps.get(i)?.as_str().parse().ok() };
        let (year, month, day) = match self.order {
            DateOrder::MonthDayYear => (n(3)?, n(1)?, n(2)?),
            DateOrder::DayMonthYear => (n(3)?, n(2)?, n(1)?),
            DateOrder::YearMonthDay => (n(1)?, n(2)?, n(3)?),
        };
        let date = NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)?;
        let time = clock_time(&caps, 4, true)?;
        Some(date.and_time(time))
    }
}

/// Build a time of day from groups `first..first+4` (hour, minute, second,
/// fraction, and optionally a meridiem). Missing time means midnight.
fn clock_time(caps: &Captures, first: usize, meridiem: bool) -> Option<NaiveTime> {
    let Some(hour) = caps.get(first) else {
        return Some(NaiveTime::MIN);
    };
    let mut hour: u32 = hour.as_str().parse().ok()?;
    let minute: u32 = caps.get(first + 1)?.as_str().parse().ok()?;
    let second: u32 = caps.get(first + 2).map_or(Some(0), |m| m.as_str().parse().ok())?;
    let nanos = match caps.get(first + 3) {
        Some(frac) => {
            let digits = frac.as_str();
            let value: u32 = digits.parse().ok()?;
            value * 10u32.pow(9 - digits.len() as u32)
        }
        None => 0,
    };
    if meridiem {
        if let Some(m) = caps.get(first + 4) {
            if !(1..=12).contains(&hour) {
                return None;
            }
            let pm = m.as_str().eq_ignore_ascii_case("pm");
            hour = match (hour, pm) {
                (12, false) => 0,
                (12, true) => 12,
                (h, true) => h + 12,
                (h, false) => h,
            };
        }
    }
    NaiveTime::from_hms_nano_opt(hour, minute, second, nanos)
}

/// Timestamp parser with its patterns compiled once.
#[derive(Debug)]
pub struct DateTimeParser {
    iso: Regex,
    patterns: Vec<DatePattern>,
}

impl Default for DateTimeParser {
    fn default() -> Self {
        let iso = Regex::new(
            r"(?i)^(\d{4})-(\d{2})-(\d{2})(?:[T ](\d{2}):(\d{2})(?::(\d{2})(?:[.,](\d{1,9}))?)?)?\s*(Z|[+-]\d{2}(?::?\d{2})?)?$",
        )
        .expect("valid iso regex");
        let patterns = vec![
            DatePattern::new("MM/DD/YYYY", r"(\d{1,2})/(\d{1,2})/(\d{4})", DateOrder::MonthDayYear),
            DatePattern::new("DD.MM.YYYY", r"(\d{1,2})\.(\d{1,2})\.(\d{4})", DateOrder::DayMonthYear),
            DatePattern::new("YYYY-MM-DD", r"(\d{4})-(\d{1,2})-(\d{1,2})", DateOrder::YearMonthDay),
            DatePattern::new("MM-DD-YYYY", r"(\d{1,2})-(\d{1,2})-(\d{4})", DateOrder::MonthDayYear),
            DatePattern::new("YYYY/MM/DD", r"(\d{4})/(\d{1,2})/(\d{1,2})", DateOrder::YearMonthDay),
        ];
        Self { iso, patterns }
    }
}

impl DateTimeParser {
    pub fn parse(&self, raw: &str, hint: &TimezoneHint) -> Option<ParsedDateTime> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }
        parse_unix(s)
            .or_else(|| self.parse_iso(s, hint))
            .or_else(|| self.parse_regional(s, hint))
    }

    fn parse_iso(&self, s: &str, hint: &TimezoneHint) -> Option<ParsedDateTime> {
        let caps = self.iso.captures(s)?;
        let n = |i: usize| -> Option<u32> { caps.get(i)?.as_str().parse().ok() };
        let date = NaiveDate::from_ymd_opt(i32::try_from(n(1)?).ok()?, n(2)?, n(3)?)?;
        let naive = date.and_time(clock_time(&caps, 4, false)?);

        match caps.get(8) {
            Some(offset) => {
                let (utc, label) = if offset.as_str().eq_ignore_ascii_case("z") {
                    (naive.and_utc(), "utc".to_string())
                } else {
                    let zone = TimezoneHint::parse(offset.as_str()).ok()?;
                    (zone.to_utc(naive), offset.as_str().to_string())
                };
                Some(ParsedDateTime {
                    utc,
                    kind: DateTimeKind::IsoWithTz,
                    timezone: label,
                })
            }
            None => Some(ParsedDateTime {
                utc: hint.to_utc(naive),
                kind: DateTimeKind::IsoLocal,
                timezone: hint.label().to_string(),
            }),
        }
    }

    fn parse_regional(&self, s: &str, hint: &TimezoneHint) -> Option<ParsedDateTime> {
        self.patterns.iter().find_map(|pattern| {
            let naive = pattern.parse(s)?;
            tracing::trace!(pattern = pattern.name, value = s, "regional date pattern matched");
            Some(ParsedDateTime {
                utc: hint.to_utc(naive),
                kind: DateTimeKind::Regional,
                timezone: hint.label().to_string(),
            })
        })
    }
}

fn parse_unix(s: &str) -> Option<ParsedDateTime> {
    let value: f64 = s.parse().ok()?;
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    let (utc, kind) = if value > MILLIS_THRESHOLD {
        (
            DateTime::from_timestamp_millis(value.round() as i64)?,
            DateTimeKind::UnixMillis,
        )
    } else {
        let secs = value.trunc();
        let nanos = (((value - secs) * 1e9).round() as u32).min(999_999_999);
        (
            DateTime::from_timestamp(secs as i64, nanos)?,
            DateTimeKind::UnixSeconds,
        )
    };
    Some(ParsedDateTime {
        utc,
        kind,
        timezone: "utc".to_string(),
    })
}

/// Parse with the shared default pattern set.
pub fn parse_datetime(raw: &str, hint: &TimezoneHint) -> Option<ParsedDateTime> {
    DEFAULT_PARSER.parse(raw, hint)
}
