use crate::domain::timestamp::{ResolvedTimestamp, Watermark};
use crate::error::DateResolutionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Keep,
    /// Only this sub-message is excluded.
    Drop,
    /// A quoted reply is already stored, so the older replies below it in
    /// this message are too. The scan moves on to the next message.
    DropRest,
    /// The newest part of this message is already stored, so everything
    /// further down the list is too.
    DropAndStop,
}

pub fn admit(ts: &ResolvedTimestamp, index: usize, watermark: &Watermark) -> Admission {
    if watermark.timestamp() >= *ts {
        if index == 0 {
            Admission::DropAndStop
        } else {
            Admission::DropRest
        }
    } else {
        Admission::Keep
    }
}

/// Like [`admit`], but a sub-message without a usable date is dropped.
pub fn admit_resolution(
    resolved: &Result<ResolvedTimestamp, DateResolutionError>,
    index: usize,
    watermark: &Watermark,
) -> Admission {
    match resolved {
        Ok(ts) => admit(ts, index, watermark),
        Err(e) => {
            log::warn!("excluding sub-message: {e}");
            Admission::Drop
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> ResolvedTimestamp {
        ResolvedTimestamp::parse(s).unwrap()
    }

    fn wm(s: &str) -> Watermark {
        Watermark::new(ts(s))
    }

    #[test]
    fn newer_is_kept_at_any_index() {
        let w = wm("Mon 1/1/2024 12:00 PM");
        let newer = ts("Mon 1/1/2024 12:01 PM");
        assert_eq!(admit(&newer, 0, &w), Admission::Keep);
        assert_eq!(admit(&newer, 3, &w), Admission::Keep);
    }

    #[test]
    fn older_top_message_stops_the_scan() {
        let w = wm("Mon 1/1/2024 12:00 PM");
        assert_eq!(admit(&ts("Sun 12/31/2023 11:00 AM"), 0, &w), Admission::DropAndStop);
    }

    #[test]
    fn older_reply_ends_its_message_only() {
        let w = wm("Mon 1/1/2024 12:00 PM");
        assert_eq!(admit(&ts("Sun 12/31/2023 11:00 AM"), 1, &w), Admission::DropRest);
    }

    #[test]
    fn equal_to_watermark_is_not_new() {
        let w = wm("Mon 1/1/2024 12:00 PM");
        let same = ts("Mon 1/1/2024 12:00 PM");
        assert_eq!(admit(&same, 0, &w), Admission::DropAndStop);
        assert_eq!(admit(&same, 2, &w), Admission::DropRest);
    }

    #[test]
    fn unresolvable_is_dropped_not_fatal() {
        let w = wm("Mon 1/1/2024 12:00 PM");
        let err = Err(DateResolutionError {
            index: 0,
            tried: vec![],
        });
        assert_eq!(admit_resolution(&err, 0, &w), Admission::Drop);
        assert_eq!(
            admit_resolution(&Ok(ts("Tue 1/2/2024 8:00 AM")), 0, &w),
            Admission::Keep
        );
    }
}
