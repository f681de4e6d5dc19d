//! Scheduling intent extraction from chat text.
//!
//! The scheduler only consumes [`ParsedIntent`]; how the intent is found is
//! behind [`IntentParser`] so the regex parser can be replaced.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentKind {
    Reminder,
    Meeting,
}

/// A schedulable request found in user text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedIntent {
    pub title: String,
    pub due_at: DateTime<Utc>,
    pub kind: IntentKind,
}

pub trait IntentParser: Send + Sync {
    /// Extract at most one intent. Relative times resolve against `now`.
    fn parse(&self, text: &str, now: DateTime<Utc>) -> Option<ParsedIntent>;
}

static REMIND_IN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bremind me (?:to )?(?P<title>.+?)\s+in\s+(?P<n>\d+)\s*(?P<unit>minutes?|mins?|hours?|hrs?|days?)\b",
    )
    .expect("valid regex")
});

static REMIND_TOMORROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\bremind me (?:to )?(?P<title>.+?)\s+tomorrow(?:\s+at\s+(?P<h>\d{1,2})(?::(?P<m>\d{2}))?\s*(?P<ampm>am|pm)?)?",
    )
    .expect("valid regex")
});

static MEETING_AT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?P<title>(?:meeting|call|sync)\b[^.!?\n]*?)\s+at\s+(?P<h>\d{1,2})(?::(?P<m>\d{2}))?\s*(?P<ampm>am|pm)\b",
    )
    .expect("valid regex")
});

/// Hour used when "tomorrow" carries no explicit time.
const DEFAULT_TOMORROW_HOUR: u32 = 9;

/// Regex-based parser for the common English phrasings. Times are UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexIntentParser;

impl RegexIntentParser {
    pub fn new() -> Self {
        Self
    }

    fn parse_relative(&self, text: &str, now: DateTime<Utc>) -> Option<ParsedIntent> {
        let caps = REMIND_IN.captures(text)?;
        let n: i64 = caps.name("n")?.as_str().parse().ok()?;
        let unit = caps.name("unit")?.as_str().to_ascii_lowercase();
        let delta = if unit.starts_with("min") {
            Duration::try_minutes(n)
        } else if unit.starts_with('h') {
            Duration::try_hours(n)
        } else {
            Duration::try_days(n)
        }?;
        Some(ParsedIntent {
            title: clean_title(caps.name("title")?.as_str())?,
            due_at: now.checked_add_signed(delta)?,
            kind: IntentKind::Reminder,
        })
    }

    fn parse_tomorrow(&self, text: &str, now: DateTime<Utc>) -> Option<ParsedIntent> {
        let caps = REMIND_TOMORROW.captures(text)?;
        let time = if caps.name("h").is_some() {
            clock_time(&caps)?
        } else {
            NaiveTime::from_hms_opt(DEFAULT_TOMORROW_HOUR, 0, 0)?
        };
        let date = (now + Duration::days(1)).date_naive();
        Some(ParsedIntent {
            title: clean_title(caps.name("title")?.as_str())?,
            due_at: date.and_time(time).and_utc(),
            kind: IntentKind::Reminder,
        })
    }

    fn parse_meeting(&self, text: &str, now: DateTime<Utc>) -> Option<ParsedIntent> {
        let caps = MEETING_AT.captures(text)?;
        let time = clock_time(&caps)?;
        let mut due = now.date_naive().and_time(time).and_utc();
        if due <= now {
            due += Duration::days(1);
        }
        Some(ParsedIntent {
            title: clean_title(caps.name("title")?.as_str())?,
            due_at: due,
            kind: IntentKind::Meeting,
        })
    }
}

impl IntentParser for RegexIntentParser {
    fn parse(&self, text: &str, now: DateTime<Utc>) -> Option<ParsedIntent> {
        self.parse_relative(text, now)
            .or_else(|| self.parse_tomorrow(text, now))
            .or_else(|| self.parse_meeting(text, now))
    }
}

/// Read `h`, optional `m` and optional `ampm` groups as a wall-clock time.
fn clock_time(caps: &Captures<'_>) -> Option<NaiveTime> {
    let mut hour: u32 = caps.name("h")?.as_str().parse().ok()?;
    let minute: u32 = match caps.name("m") {
        Some(m) => m.as_str().parse().ok()?,
        None => 0,
    };
    match caps.name("ampm").map(|m| m.as_str().to_ascii_lowercase()) {
        Some(ref s) if s == "pm" => {
            if hour == 0 || hour > 12 {
                return None;
            }
            if hour < 12 {
                hour += 12;
            }
        }
        Some(_) => {
            if hour == 0 || hour > 12 {
                return None;
            }
            if hour == 12 {
                hour = 0;
            }
        }
        None => {}
    }
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn clean_title(raw: &str) -> Option<String> {
    let title = raw
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation())
        .trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}
