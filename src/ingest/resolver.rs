use chrono::DateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::domain::email::SubMessage;
use crate::domain::timestamp::{CANONICAL_FORMAT, ResolvedTimestamp};
use crate::error::DateResolutionError;

static SENT_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"Sent:\s*(.+?)\s*To:").unwrap());
static REPLY_LINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^On (.+?) wrote:").unwrap());
static ANGLE_ADDR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<.*?>").unwrap());
static UP_TO_MERIDIEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*?\d{1,2}:\d{2}(?::\d{2})?\s*[AaPp][Mm])").unwrap());

/// What a strategy gets to look at.
pub struct ResolveContext<'a> {
    pub sub: &'a SubMessage,
    /// Position in the thread; 0 is the top-level message.
    pub index: usize,
    /// Date strings rendered on screen for the enclosing message.
    pub rendered_dates: &'a [String],
}

pub trait DateStrategy {
    fn name(&self) -> &'static str;

    /// A candidate date string, or `None` when this strategy has nothing to say.
    fn try_resolve(&self, ctx: &ResolveContext<'_>) -> Option<String>;
}

/// Dates the webmail UI rendered. The newest sub-message takes the first
/// rendered date; every older one takes the last.
pub struct RenderedDate;

impl DateStrategy for RenderedDate {
    fn name(&self) -> &'static str {
        "rendered"
    }

    fn try_resolve(&self, ctx: &ResolveContext<'_>) -> Option<String> {
        let picked = if ctx.index == 0 {
            ctx.rendered_dates.first()
        } else {
            ctx.rendered_dates.last()
        };
        picked.cloned()
    }
}

/// The top-level message's own date header, read as RFC 2822 and shown in
/// the header's own offset.
pub struct HeaderDate;

impl DateStrategy for HeaderDate {
    fn name(&self) -> &'static str {
        "header"
    }

    fn try_resolve(&self, ctx: &ResolveContext<'_>) -> Option<String> {
        if ctx.index != 0 {
            return None;
        }
        let raw = ctx.sub.raw_date_candidates.first()?;
        Some(format_header_date(raw))
    }
}

/// Reformat an RFC 2822 date; anything unreadable is passed through untouched.
pub fn format_header_date(raw: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw.trim()) {
        return dt.format(CANONICAL_FORMAT).to_string();
    }
    match mailparse::dateparse(raw) {
        Ok(epoch) => DateTime::from_timestamp(epoch, 0)
            .map(|dt| dt.format(CANONICAL_FORMAT).to_string())
            .unwrap_or_else(|| raw.to_string()),
        Err(_) => raw.to_string(),
    }
}

/// A quoted Outlook-style `Sent: <date> To:` header inside a reply.
pub struct SentLine;

impl DateStrategy for SentLine {
    fn name(&self) -> &'static str {
        "sent_line"
    }

    fn try_resolve(&self, ctx: &ResolveContext<'_>) -> Option<String> {
        if ctx.index == 0 {
            return None;
        }
        let caps = SENT_LINE.captures(&ctx.sub.segment)?;
        ResolvedTimestamp::parse_loose(caps[1].trim()).map(|ts| ts.render())
    }
}

/// A Gmail-style `On <date> <name> wrote:` line.
pub struct ReplyMarker;

impl DateStrategy for ReplyMarker {
    fn name(&self) -> &'static str {
        "reply_marker"
    }

    fn try_resolve(&self, ctx: &ResolveContext<'_>) -> Option<String> {
        let caps = REPLY_LINE.captures(&ctx.sub.segment)?;
        let raw = ANGLE_ADDR.replace_all(&caps[1], "");
        let raw = raw.trim();
        let date = UP_TO_MERIDIEM
            .captures(raw)
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| raw.to_string());
        ResolvedTimestamp::parse_loose(&date).map(|ts| ts.render())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Rendered,
    Header,
    SentLine,
    ReplyMarker,
}

impl StrategyKind {
    pub fn build(self) -> Box<dyn DateStrategy> {
        match self {
            StrategyKind::Rendered => Box::new(RenderedDate),
            StrategyKind::Header => Box::new(HeaderDate),
            StrategyKind::SentLine => Box::new(SentLine),
            StrategyKind::ReplyMarker => Box::new(ReplyMarker),
        }
    }
}

/// Tries each strategy in order and keeps the first candidate that parses in
/// the canonical format.
pub struct DateResolver {
    strategies: Vec<Box<dyn DateStrategy>>,
}

impl Default for DateResolver {
    fn default() -> Self {
        Self::from_kinds(&[StrategyKind::Rendered])
    }
}

impl DateResolver {
    pub fn new(strategies: Vec<Box<dyn DateStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn from_kinds(kinds: &[StrategyKind]) -> Self {
        Self::new(kinds.iter().map(|k| k.build()).collect())
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn resolve(
        &self,
        sub: &SubMessage,
        index: usize,
        rendered_dates: &[String],
    ) -> Result<ResolvedTimestamp, DateResolutionError> {
        let ctx = ResolveContext {
            sub,
            index,
            rendered_dates,
        };
        let mut tried = Vec::new();
        for strategy in &self.strategies {
            let Some(candidate) = strategy.try_resolve(&ctx) else {
                continue;
            };
            match ResolvedTimestamp::parse(&candidate) {
                Some(ts) => return Ok(ts),
                None => tried.push(format!("{}={:?}", strategy.name(), candidate)),
            }
        }
        Err(DateResolutionError { index, tried })
    }
}
