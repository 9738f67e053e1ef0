use mailparse::ParsedMail;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::domain::email::SubMessage;
use crate::mail::decoders::{extract_body, header_value};

static REPLY_MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"From:.").unwrap());

/// Headers carrying the top-level message's own date, most trusted first.
pub const DATE_HEADERS: [&str; 2] = ["X-Mailman-Approved-At", "Date"];

/// How the subject of a quoted reply is derived from the message subject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectStrip {
    /// Drop the first four characters, whatever they are.
    #[default]
    LegacyOffset,
    /// Drop a leading `"Re: "` only when it is there.
    RePrefix,
}

impl SubjectStrip {
    pub fn apply(self, subject: &str) -> String {
        match self {
            SubjectStrip::LegacyOffset => subject.chars().skip(4).collect(),
            SubjectStrip::RePrefix => subject.strip_prefix("Re: ").unwrap_or(subject).to_string(),
        }
    }
}

/// Segment an RFC 822 message. A message mailparse cannot read is treated as
/// a headerless plain-text body.
pub fn segment(raw: &[u8], policy: SubjectStrip) -> Vec<SubMessage> {
    match mailparse::parse_mail(raw) {
        Ok(parsed) => segment_parsed(&parsed, policy),
        Err(e) => {
            log::warn!("unparseable message, treating as plain text: {e}");
            segment_body(&String::from_utf8_lossy(raw), "", "", Vec::new(), policy)
        }
    }
}

fn segment_parsed(parsed: &ParsedMail, policy: SubjectStrip) -> Vec<SubMessage> {
    let subject = header_value(parsed, "Subject");
    let sender = header_value(parsed, "From");
    let dates = DATE_HEADERS
        .iter()
        .map(|h| header_value(parsed, h))
        .filter(|v| !v.is_empty())
        .collect();
    let body = extract_body(parsed);
    segment_body(&body, &subject, &sender, dates, policy)
}

/// Segment an already flattened body.
pub fn segment_body(
    body: &str,
    subject: &str,
    sender: &str,
    raw_date_candidates: Vec<String>,
    policy: SubjectStrip,
) -> Vec<SubMessage> {
    let reply_subject = policy.apply(subject);

    split_replies(body)
        .into_iter()
        .enumerate()
        .map(|(i, seg)| {
            let (subject, body, dates) = if i == 0 {
                (subject.to_string(), seg.to_string(), raw_date_candidates.clone())
            } else {
                (
                    reply_subject.clone(),
                    strip_leading_headers(seg, &reply_subject),
                    Vec::new(),
                )
            };
            SubMessage {
                subject,
                sender: sender.to_string(),
                body,
                raw_date_candidates: dates,
                segment: seg.to_string(),
            }
        })
        .collect()
}

/// Cut `body` before every reply marker. Pieces are trimmed and empty ones dropped.
pub fn split_replies(body: &str) -> Vec<&str> {
    let mut cuts: Vec<usize> = REPLY_MARKER.find_iter(body).map(|m| m.start()).collect();
    cuts.insert(0, 0);
    cuts.push(body.len());

    cuts.windows(2)
        .map(|w| body[w[0]..w[1]].trim())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Everything after `Subject: <subject>` in a quoted segment, or the whole
/// segment when that line is not there.
pub fn strip_leading_headers(segment: &str, subject: &str) -> String {
    if subject.is_empty() {
        return segment.trim().to_string();
    }
    let pattern = format!(r"Subject:\s*{}", regex::escape(subject));
    match Regex::new(&pattern).ok().and_then(|re| re.find(segment)) {
        Some(m) => segment[m.end()..].trim().to_string(),
        None => segment.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const THREAD: &str = "Subject: [USWIM] Board Games\r\n\
From: Alice <alice@example.com>\r\n\
Date: Fri, 09 May 2025 20:00:00 +0000\r\n\
\r\n\
See you there!\r\n\
\r\n\
From: Bob <bob@example.com>\r\n\
Sent: Thursday, May 8, 2025 3:00 PM\r\n\
To: list\r\n\
Subject: Board Games\r\n\
\r\n\
Bring snacks.\r\n\
From: Carol <carol@example.com>\r\n\
Sent: Wednesday, May 7, 2025 1:15 PM\r\n\
To: list\r\n\
Subject: Board Games\r\n\
\r\n\
Pizza at 7.\r\n";

    #[test]
    fn no_marker_yields_single_trimmed_message() {
        let raw = "Subject: Hello\r\nFrom: a@b.c\r\n\r\n\r\n  just one message  \r\n\r\n";
        let subs = segment(raw.as_bytes(), SubjectStrip::LegacyOffset);
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].subject, "Hello");
        assert_eq!(subs[0].sender, "a@b.c");
        assert_eq!(subs[0].body, "just one message");
    }

    #[test]
    fn n_markers_yield_n_plus_one_messages() {
        let subs = segment(THREAD.as_bytes(), SubjectStrip::LegacyOffset);
        assert_eq!(subs.len(), 3);
        assert_eq!(subs[0].body, "See you there!");
        assert_eq!(subs[0].subject, "[USWIM] Board Games");
        assert_eq!(
            subs[0].raw_date_candidates,
            vec!["Fri, 09 May 2025 20:00:00 +0000".to_string()]
        );
        assert!(subs[1].raw_date_candidates.is_empty());
        assert!(subs[1].segment.contains("Sent: Thursday, May 8, 2025 3:00 PM"));
        assert!(subs[2].segment.starts_with("From: Carol"));
    }

    #[test]
    fn legacy_strip_is_a_fixed_offset() {
        assert_eq!(SubjectStrip::LegacyOffset.apply("Re: Lunch"), "Lunch");
        assert_eq!(SubjectStrip::LegacyOffset.apply("Meeting"), "ing");
        assert_eq!(SubjectStrip::LegacyOffset.apply("Hi"), "");
        assert_eq!(SubjectStrip::LegacyOffset.apply("[US] 🍕 x"), " 🍕 x");
    }

    #[test]
    fn re_prefix_strip_is_conditional() {
        assert_eq!(SubjectStrip::RePrefix.apply("Re: Lunch"), "Lunch");
        assert_eq!(SubjectStrip::RePrefix.apply("Meeting"), "Meeting");
    }

    #[test]
    fn reply_body_starts_after_subject_line() {
        let raw = THREAD.replace("[USWIM] Board Games", "Re: Board Games");
        let subs = segment(raw.as_bytes(), SubjectStrip::LegacyOffset);
        assert_eq!(subs[1].subject, "Board Games");
        assert_eq!(subs[1].body, "Bring snacks.");
        assert_eq!(subs[2].body, "Pizza at 7.");
    }

    #[test]
    fn reply_body_is_whole_segment_without_subject_match() {
        let subs = segment(THREAD.as_bytes(), SubjectStrip::LegacyOffset);
        // "[USWIM] Board Games" minus four chars is "IM] Board Games", which is not quoted.
        assert_eq!(subs[1].subject, "IM] Board Games");
        assert!(subs[1].body.starts_with("From: Bob"));
        assert!(subs[1].body.ends_with("Bring snacks."));
    }

    #[test]
    fn subject_is_matched_literally() {
        let seg = "From: x\nSubject: (a+b)? deal\n\nbody text";
        assert_eq!(strip_leading_headers(seg, "(a+b)? deal"), "body text");
    }

    #[test]
    fn marker_need_not_start_a_line() {
        assert_eq!(
            split_replies("Thanks! From: Bob wrote earlier"),
            vec!["Thanks!", "From: Bob wrote earlier"]
        );
        // A bare "From:" at the end of a line is not a marker.
        assert_eq!(split_replies("From:\nnothing"), vec!["From:\nnothing"]);
    }

    #[test]
    fn body_starting_with_marker_has_no_top_segment() {
        let subs = segment_body("From: a\nhello", "Re: x", "s", Vec::new(), SubjectStrip::LegacyOffset);
        assert_eq!(subs.len(), 1);
        assert_eq!(subs[0].subject, "Re: x");
    }

    #[test]
    fn empty_body_is_degenerate_not_an_error() {
        let subs = segment(b"Subject: nothing\r\n\r\n   \r\n", SubjectStrip::LegacyOffset);
        assert!(subs.is_empty());
    }

    #[test]
    fn unprefixed_subject_loses_four_chars_in_reply() {
        let body = "Hello there.\nFrom: Bob <b@x.com>\nSent: Mon 1/1/2024 3:00 PM\nTo: me\nOld content";
        let subs = segment_body(body, "Meeting", "me@x.com", Vec::new(), SubjectStrip::LegacyOffset);
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].subject, "Meeting");
        assert_eq!(subs[0].body, "Hello there.");
        assert_eq!(subs[1].subject, "ing");
        assert_eq!(
            subs[1].body,
            "From: Bob <b@x.com>\nSent: Mon 1/1/2024 3:00 PM\nTo: me\nOld content"
        );
    }
}
