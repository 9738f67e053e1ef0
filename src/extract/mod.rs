pub mod ollama;

use anyhow::Result;
use serde_json::Value;

use crate::domain::event::{EVENT_KEYS, EventFields};
use crate::store::repo::EmailRepository;

pub trait EventExtractor {
    /// `Ok(None)` when the model answered but nothing usable came back.
    fn extract(&self, subject: &str, body: &str) -> Result<Option<EventFields>>;
}

pub fn build_prompt(subject: &str, body: &str) -> String {
    format!(
        r#"You are a helpful assistant that extracts structured information from emails that describe upcoming events.

Below is the content of one email. Use it to extract the following fields. Be precise, and if information is not clearly provided, write "unknown".

Email Subject:
{subject}

Email Body:
{body}

Extract and return the following as a JSON object with exactly these keys: {keys}

{{
  "event_name": [A short name or title of the event, if provided. Otherwise "unknown"],
  "description": [A brief summary of what the event is about, ideally 1-2 sentences.],
  "location": [The venue, building, room, or address where the event will take place. If online, say so. If not mentioned, write "unknown"],
  "date": [The date and time of the event in natural language (e.g., "Thursday at 6pm"). If not specified, write "unknown"],
  "registration_required": ["yes" if the email says you must register or RSVP before attending, "no" if not required, or "unknown" if unclear],
  "food_provided": [Mention the food being offered (e.g., "pizza", "light snacks", "catered dinner"). If no food will be provided, write "none". If the email doesn't say, write "unknown"]
}}

Return only the JSON. Do not include any explanations or extra text.
"#,
        keys = EVENT_KEYS.join(", ")
    )
}

/// Read the first `{` through the last `}` of a model reply as a JSON object.
pub fn parse_model_output(output: &str) -> Option<EventFields> {
    let start = output.find('{')?;
    let end = output.rfind('}')?;
    if end < start {
        return None;
    }
    match serde_json::from_str::<Value>(&output[start..=end]) {
        Ok(Value::Object(obj)) => Some(EventFields::from_json_object(&obj)),
        _ => None,
    }
}

/// Extract fields for every email classified as an event. Returns how many
/// were stored.
pub fn extract_store(repo: &dyn EmailRepository, extractor: &dyn EventExtractor) -> Result<usize> {
    let events = repo.event_emails()?;
    let mut stored = 0;
    for (n, email) in events.iter().enumerate() {
        log::info!("extracting {}/{}: {}", n + 1, events.len(), email.subject);
        match extractor.extract(&email.subject, &email.body) {
            Ok(Some(fields)) => {
                repo.upsert_event_info(email.id, &fields)?;
                stored += 1;
            }
            Ok(None) => log::warn!("email {}: model reply had no usable JSON", email.id),
            Err(e) => log::warn!("email {}: extraction failed: {e:#}", email.id),
        }
    }
    Ok(stored)
}
