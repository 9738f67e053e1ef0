use chrono::{DateTime, Duration, NaiveDateTime};
use std::fmt;

use crate::config::DEFAULT_LOOKBACK_DAYS;

/// Render format shared by the webmail UI and the store, e.g. `Fri 5/9/2025 8:00 PM`.
pub const CANONICAL_FORMAT: &str = "%a %-m/%-d/%Y %-I:%M %p";

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Formats tried, in order, for dates quoted inside reply headers.
const LOOSE_FORMATS: &[&str] = &[
    "%m/%d/%Y %I:%M %p",
    "%A, %B %d, %Y %I:%M %p",
    "%A, %B %d, %Y at %I:%M %p",
    "%a, %b %d, %Y at %I:%M %p",
    "%a, %b %d, %Y %I:%M %p",
    "%B %d, %Y at %I:%M %p",
    "%b %d, %Y at %I:%M %p",
    "%A, %d %B %Y %H:%M",
    "%a, %d %b %Y %H:%M",
    "%Y-%m-%d %H:%M",
];

/// A wall-clock time in the mailbox's local zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResolvedTimestamp {
    local: NaiveDateTime,
}

impl ResolvedTimestamp {
    pub fn new(local: NaiveDateTime) -> Self {
        Self { local }
    }

    /// Parse a string in the canonical format. Month, day and hour may or may
    /// not be zero-padded. The weekday must be one of the abbreviated names
    /// but is not checked against the date.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (weekday, rest) = s.split_once(char::is_whitespace)?;
        if !WEEKDAYS.iter().any(|w| w.eq_ignore_ascii_case(weekday)) {
            return None;
        }
        NaiveDateTime::parse_from_str(rest.trim(), "%m/%d/%Y %I:%M %p")
            .ok()
            .map(Self::new)
    }

    /// Best-effort parse of the date formats mail clients put in quoted headers.
    pub fn parse_loose(s: &str) -> Option<Self> {
        let s = s.split_whitespace().collect::<Vec<_>>().join(" ");
        if let Some(ts) = Self::parse(&s) {
            return Some(ts);
        }
        if let Ok(dt) = DateTime::parse_from_rfc2822(&s) {
            return Some(Self::new(dt.naive_local()));
        }
        LOOSE_FORMATS
            .iter()
            .find_map(|f| NaiveDateTime::parse_from_str(&s, f).ok())
            .map(Self::new)
    }

    pub fn naive(&self) -> NaiveDateTime {
        self.local
    }

    pub fn render(&self) -> String {
        self.local.format(CANONICAL_FORMAT).to_string()
    }
}

impl fmt::Display for ResolvedTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Latest timestamp already persisted. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermark(ResolvedTimestamp);

impl Watermark {
    pub fn new(ts: ResolvedTimestamp) -> Self {
        Self(ts)
    }

    /// Watermark for a store with nothing in it yet. A lookback too large
    /// for the calendar falls back to the default.
    pub fn lookback(now: NaiveDateTime, days: i64) -> Self {
        let back = |d: i64| Duration::try_days(d).and_then(|d| now.checked_sub_signed(d));
        let start = back(days)
            .or_else(|| {
                log::warn!("lookback of {days} days is out of range, using {DEFAULT_LOOKBACK_DAYS}");
                back(DEFAULT_LOOKBACK_DAYS)
            })
            .unwrap_or(now);
        // Canonical strings carry minute precision only.
        let start = start.format(CANONICAL_FORMAT).to_string();
        Self(ResolvedTimestamp::parse(&start).unwrap_or(ResolvedTimestamp::new(now)))
    }

    /// Seed from the store's latest date string, or look back `days` from now.
    pub fn seed(latest_stored: Option<&str>, now: NaiveDateTime, days: i64) -> Self {
        match latest_stored.and_then(ResolvedTimestamp::parse) {
            Some(ts) => Self(ts),
            None => Self::lookback(now, days),
        }
    }

    pub fn timestamp(&self) -> ResolvedTimestamp {
        self.0
    }

    /// Move forward to `candidate` if it is newer.
    pub fn advance(self, candidate: Option<ResolvedTimestamp>) -> Self {
        match candidate {
            Some(ts) if ts > self.0 => Self(ts),
            _ => self,
        }
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
