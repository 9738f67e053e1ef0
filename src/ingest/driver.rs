use chrono::{DateTime, NaiveDateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::domain::email::EmailRecord;
use crate::domain::timestamp::{ResolvedTimestamp, Watermark};
use crate::error::IngestError;
use crate::ingest::resolver::{DateResolver, StrategyKind};
use crate::ingest::source::MessageSource;
use crate::ingest::watermark::{Admission, admit_resolution};
use crate::mail::segmenter::{SubjectStrip, segment};

/// Everything the driver needs, handed in at construction.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub subject_strip: SubjectStrip,
    pub date_strategies: Vec<StrategyKind>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            subject_strip: SubjectStrip::LegacyOffset,
            date_strategies: vec![StrategyKind::Rendered],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Exhausted,
    ReachedWatermark,
    Interrupted,
    SourceLost,
}

#[derive(Debug)]
pub struct IngestReport {
    /// Kept records, newest first.
    pub records: Vec<EmailRecord>,
    /// Newest kept timestamp; `None` when nothing was kept.
    pub watermark_candidate: Option<ResolvedTimestamp>,
    pub messages_seen: usize,
    pub stopped: StopReason,
}

pub struct IngestionDriver {
    subject_strip: SubjectStrip,
    resolver: DateResolver,
    stop: Option<Arc<AtomicBool>>,
}

impl IngestionDriver {
    pub fn new(cfg: IngestConfig) -> Self {
        Self {
            subject_strip: cfg.subject_strip,
            resolver: DateResolver::from_kinds(&cfg.date_strategies),
            stop: None,
        }
    }

    /// Stop pulling messages once `flag` turns true.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    fn interrupted(&self) -> bool {
        self.stop.as_ref().is_some_and(|f| f.load(Ordering::SeqCst))
    }

    pub fn run(
        &self,
        source: &mut dyn MessageSource,
        watermark: Watermark,
    ) -> Result<IngestReport, IngestError> {
        log::info!(
            "ingesting until {watermark} (date strategies: {})",
            self.resolver.strategy_names().join(", ")
        );

        let mut kept: Vec<(ResolvedTimestamp, EmailRecord)> = Vec::new();
        let mut seen = 0;

        let stopped = 'scan: loop {
            if self.interrupted() {
                log::info!("stop requested");
                break StopReason::Interrupted;
            }

            let msg = match source.next_message() {
                Ok(Some(msg)) => msg,
                Ok(None) => break StopReason::Exhausted,
                Err(err) => {
                    log::error!("message source failed after {seen} message(s): {err}");
                    return Err(IngestError::SourceLost {
                        partial: finish(kept, seen, watermark, StopReason::SourceLost),
                        source: err,
                    });
                }
            };
            seen += 1;

            let subs = segment(&msg.bytes, self.subject_strip);
            if subs.is_empty() {
                log::debug!("{}: no sub-messages", msg.label);
            }

            let before = kept.len();
            for (index, sub) in subs.iter().enumerate() {
                let resolved = self.resolver.resolve(sub, index, &msg.rendered_dates);
                match admit_resolution(&resolved, index, &watermark) {
                    Admission::Keep => {
                        if let Ok(ts) = resolved {
                            log::debug!("{} #{index}: keep ({ts})", msg.label);
                            kept.push((ts, EmailRecord::from_sub_message(sub, ts.render())));
                        }
                    }
                    Admission::Drop => {
                        log::debug!("{} #{index}: drop", msg.label);
                    }
                    Admission::DropRest => {
                        log::debug!("{} #{index}: already stored, skipping older replies", msg.label);
                        break;
                    }
                    Admission::DropAndStop => {
                        log::info!("{}: already stored, stopping", msg.label);
                        break 'scan StopReason::ReachedWatermark;
                    }
                }
            }

            log::info!(
                "parsed message {seen} ({}): kept {} of {} part(s)",
                msg.label,
                kept.len() - before,
                subs.len()
            );
        };

        Ok(finish(kept, seen, watermark, stopped))
    }
}

fn finish(
    kept: Vec<(ResolvedTimestamp, EmailRecord)>,
    messages_seen: usize,
    watermark: Watermark,
    stopped: StopReason,
) -> IngestReport {
    // Kept timestamps are all newer than the watermark.
    let watermark_candidate = kept.iter().map(|(ts, _)| *ts).max();
    debug_assert!(watermark_candidate.is_none_or(|ts| ts > watermark.timestamp()));
    let mut records: Vec<EmailRecord> = kept.into_iter().map(|(_, r)| r).collect();
    sort_newest_first(&mut records);
    IngestReport {
        records,
        watermark_candidate,
        messages_seen,
        stopped,
    }
}

/// Stable sort by date, newest first. Dates that do not parse sort as the
/// Unix epoch.
pub fn sort_newest_first(records: &mut [EmailRecord]) {
    records.sort_by_key(|r| std::cmp::Reverse(sort_key(&r.date)));
}

fn sort_key(date: &str) -> NaiveDateTime {
    ResolvedTimestamp::parse(date)
        .map(|ts| ts.naive())
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH.naive_utc())
}
