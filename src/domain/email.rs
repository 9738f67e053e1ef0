use serde::{Deserialize, Serialize};

pub type EmailId = i64;

/// One downloaded message as the source hands it over.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// RFC 822 bytes.
    pub bytes: Vec<u8>,
    /// Date strings rendered on screen for this message, in screen order.
    pub rendered_dates: Vec<String>,
    /// Where the message came from (file name); only used in log lines.
    pub label: String,
}

impl RawMessage {
    pub fn new(bytes: impl Into<Vec<u8>>, rendered_dates: Vec<String>) -> Self {
        Self {
            bytes: bytes.into(),
            rendered_dates,
            label: String::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// One logical message cut out of a raw message's quoted chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubMessage {
    pub subject: String,
    pub sender: String,
    pub body: String,
    /// Date header values of the enclosing message; only set on index 0.
    pub raw_date_candidates: Vec<String>,
    /// Segment text before the quoted headers were cut off.
    pub segment: String,
}

/// Append shape for the store and the interchange file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecord {
    pub subject: String,
    #[serde(rename = "from")]
    pub sender: String,
    pub date: String,
    pub body: String,
}

impl EmailRecord {
    pub fn from_sub_message(sub: &SubMessage, date: String) -> Self {
        Self {
            subject: sub.subject.clone(),
            sender: sub.sender.clone(),
            date,
            body: sub.body.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEmail {
    pub id: EmailId,
    pub subject: String,
    pub sender: String,
    pub date: String,
    pub body: String,
    pub is_event: Option<bool>,
}

impl StoredEmail {
    /// Text the classifier looks at.
    pub fn text(&self) -> String {
        format!("{} {}", self.subject, self.body)
    }
}
