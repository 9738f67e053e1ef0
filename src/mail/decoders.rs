use html2text::render::TrivialDecorator;
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};
use regex::Regex;
use std::sync::LazyLock;

static SCRIPT_OR_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>").unwrap()
});

const HTML_RENDER_WIDTH: usize = 10_000;

/// First value of a header, decoded (RFC 2047), or an empty string.
pub fn header_value(parsed: &ParsedMail, name: &str) -> String {
    parsed
        .headers
        .get_first_value(name)
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

/// Flatten a message body to plain text. A `text/plain` part anywhere in the
/// tree wins; otherwise the first `text/html` part is stripped to text.
/// Attachments are never considered.
pub fn extract_body(parsed: &ParsedMail) -> String {
    if let Some(plain) = find_part(parsed, "text/plain") {
        return plain.get_body().unwrap_or_default();
    }
    if let Some(html) = find_part(parsed, "text/html")
        && let Ok(html) = html.get_body()
    {
        return html_to_text(&html);
    }
    if parsed.subparts.is_empty() {
        return parsed.get_body().unwrap_or_default();
    }
    String::new()
}

fn find_part<'a>(p: &'a ParsedMail<'a>, mimetype: &str) -> Option<&'a ParsedMail<'a>> {
    if p.get_content_disposition().disposition == DispositionType::Attachment {
        return None;
    }
    if p.subparts.is_empty() {
        return p.ctype.mimetype.eq_ignore_ascii_case(mimetype).then_some(p);
    }
    p.subparts.iter().find_map(|sp| find_part(sp, mimetype))
}

/// Drop script/style elements, keep only the text nodes in document order
/// and collapse every whitespace run to a single space.
pub fn html_to_text(html: &str) -> String {
    let cleaned = SCRIPT_OR_STYLE.replace_all(html, " ");
    let text = html2text::config::with_decorator(TrivialDecorator::new())
        .string_from_read(cleaned.as_bytes(), HTML_RENDER_WIDTH)
        .unwrap_or_else(|_| cleaned.into_owned());
    collapse_whitespace(&text)
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn normalize_snippet(s: &str, max_chars: usize) -> String {
    let mut out = String::new();
    for line in s.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(line);
        if out.chars().count() >= max_chars {
            break;
        }
    }
    out.chars().take(max_chars).collect()
}
