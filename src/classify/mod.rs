pub mod model;

use anyhow::Result;
use regex::Regex;
use std::sync::LazyLock;

use crate::domain::email::StoredEmail;
use crate::store::repo::EmailRepository;

static TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w\w+\b").unwrap());

pub trait EventClassifier {
    fn is_event(&self, subject: &str, body: &str) -> bool;
}

/// Lowercased runs of two or more word characters.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOKEN.find_iter(&lower).map(|m| m.as_str().to_string()).collect()
}

/// Classify every stored email and record which ones are events. Returns the
/// event emails.
pub fn classify_store(
    repo: &dyn EmailRepository,
    classifier: &dyn EventClassifier,
) -> Result<Vec<StoredEmail>> {
    let events: Vec<StoredEmail> = repo
        .list_emails()?
        .into_iter()
        .filter(|e| classifier.is_event(&e.subject, &e.body))
        .collect();
    let ids: Vec<_> = events.iter().map(|e| e.id).collect();
    repo.replace_event_emails(&ids)?;
    log::info!("classified {} email(s) as events", events.len());
    Ok(events)
}
