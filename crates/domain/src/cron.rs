//! Five-field cron expressions (minute hour day-of-month month day-of-week),
//! validated at construction and evaluated in an IANA timezone.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const FIELD_NAMES: [&str; 5] = ["minute", "hour", "day-of-month", "month", "day-of-week"];
const FIELD_RANGES: [(u32, u32); 5] = [(0, 59), (0, 23), (1, 31), (1, 12), (0, 7)];

/// Upper bound on search steps in [`CronExpression::next_after`]. Day and
/// hour skipping keep real expressions far below it; `0 0 29 2 *` needs
/// about 1500 steps.
const MAX_SEARCH_STEPS: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldSet(u64);

impl FieldSet {
    fn contains(&self, value: u32) -> bool {
        value < 64 && self.0 & (1u64 << value) != 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CronExpression {
    source: String,
    minute: FieldSet,
    hour: FieldSet,
    day_of_month: FieldSet,
    month: FieldSet,
    day_of_week: FieldSet,
    // Classic cron: when both day fields are restricted a day matches if
    // either does.
    dom_restricted: bool,
    dow_restricted: bool,
}

impl CronExpression {
    pub fn parse(raw: &str) -> Result<Self> {
        let fields: Vec<&str> = raw.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(Error::validation(format!(
                "cron: expected 5 fields (minute hour dom month dow), got {}",
                fields.len()
            )));
        }

        let mut sets = [FieldSet(0); 5];
        for (i, field) in fields.iter().enumerate() {
            let (min, max) = FIELD_RANGES[i];
            sets[i] = parse_field(field, min, max)
                .map_err(|msg| Error::validation(format!("cron {}: {msg}", FIELD_NAMES[i])))?;
        }
        // Day-of-week 7 is an alias for Sunday.
        if sets[4].contains(7) {
            sets[4] = FieldSet((sets[4].0 | 1) & !(1u64 << 7));
        }

        Ok(Self {
            source: fields.join(" "),
            minute: sets[0],
            hour: sets[1],
            day_of_month: sets[2],
            month: sets[3],
            day_of_week: sets[4],
            dom_restricted: !fields[2].starts_with('*'),
            dow_restricted: !fields[4].starts_with('*'),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    fn day_matches(&self, dt: &NaiveDateTime) -> bool {
        let dom = self.day_of_month.contains(dt.day());
        let dow = self.day_of_week.contains(dt.weekday().num_days_from_sunday());
        if self.dom_restricted && self.dow_restricted {
            dom || dow
        } else {
            dom && dow
        }
    }

    /// Whether a wall-clock (local) minute matches.
    pub fn matches_local(&self, dt: &NaiveDateTime) -> bool {
        self.month.contains(dt.month())
            && self.day_matches(dt)
            && self.hour.contains(dt.hour())
            && self.minute.contains(dt.minute())
    }

    pub fn matches(&self, dt: &DateTime<Utc>) -> bool {
        self.matches_local(&dt.naive_utc())
    }

    /// Next occurrence strictly after `after`, evaluated in `tz`.
    ///
    /// Local minutes that fall into a DST gap are skipped; ambiguous
    /// minutes resolve to the earlier instant.
    pub fn next_after(&self, after: &DateTime<Utc>, tz: chrono_tz::Tz) -> Option<DateTime<Utc>> {
        let local = after.with_timezone(&tz).naive_local();
        let mut candidate = local.with_second(0)?.with_nanosecond(0)? + chrono::Duration::minutes(1);

        for _ in 0..MAX_SEARCH_STEPS {
            if !self.month.contains(candidate.month()) || !self.day_matches(&candidate) {
                candidate = candidate.date().succ_opt()?.and_hms_opt(0, 0, 0)?;
                continue;
            }
            if !self.hour.contains(candidate.hour()) {
                candidate = candidate.with_minute(0)? + chrono::Duration::hours(1);
                continue;
            }
            if self.minute.contains(candidate.minute()) {
                match tz.from_local_datetime(&candidate) {
                    chrono::LocalResult::Single(dt) => return Some(dt.with_timezone(&Utc)),
                    chrono::LocalResult::Ambiguous(earliest, _) => {
                        return Some(earliest.with_timezone(&Utc))
                    }
                    chrono::LocalResult::None => {}
                }
            }
            candidate += chrono::Duration::minutes(1);
        }
        None
    }

    /// Up to `n` consecutive occurrences after `after`.
    pub fn next_n(&self, after: &DateTime<Utc>, n: usize, tz: chrono_tz::Tz) -> Vec<DateTime<Utc>> {
        let mut out = Vec::with_capacity(n);
        let mut cursor = *after;
        while out.len() < n {
            match self.next_after(&cursor, tz) {
                Some(next) => {
                    out.push(next);
                    cursor = next;
                }
                None => break,
            }
        }
        out
    }
}

fn parse_field(field: &str, min: u32, max: u32) -> std::result::Result<FieldSet, String> {
    let mut bits = 0u64;
    for part in field.split(',') {
        if part.is_empty() {
            return Err(format!("empty list element in {field:?}"));
        }
        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("invalid step {step:?}, expected a number"))?;
                if step == 0 || step > max {
                    return Err(format!("step {step} out of range 1..={max}"));
                }
                (range, Some(step))
            }
            None => (part, None),
        };

        let (start, end) = if range == "*" {
            (min, max)
        } else if let Some((a, b)) = range.split_once('-') {
            let a = parse_value(a, min, max)?;
            let b = parse_value(b, min, max)?;
            if a > b {
                return Err(format!("range {a}-{b} is reversed"));
            }
            (a, b)
        } else {
            let v = parse_value(range, min, max)?;
            // `5/15` means "from 5 to the end, every 15".
            (v, if step.is_some() { max } else { v })
        };

        let step = step.unwrap_or(1);
        let mut v = start;
        while v <= end {
            bits |= 1u64 << v;
            v += step;
        }
    }
    Ok(FieldSet(bits))
}

fn parse_value(raw: &str, min: u32, max: u32) -> std::result::Result<u32, String> {
    let v: u32 = raw
        .parse()
        .map_err(|_| format!("invalid value {raw:?}, expected a number"))?;
    if v < min || v > max {
        return Err(format!("value {v} out of range {min}..={max}"));
    }
    Ok(v)
}

/// Parse an IANA timezone name.
pub fn parse_timezone(tz: &str) -> Result<chrono_tz::Tz> {
    tz.parse::<chrono_tz::Tz>().map_err(|_| {
        Error::validation(format!(
            "invalid timezone {tz:?}: use IANA names like \"America/New_York\" or \"UTC\""
        ))
    })
}

impl fmt::Display for CronExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl FromStr for CronExpression {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for CronExpression {
    type Error = Error;
    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<CronExpression> for String {
    fn from(c: CronExpression) -> String {
        c.source
    }
}
