use anyhow::Result;

use crate::domain::email::{EmailId, EmailRecord, StoredEmail};
use crate::domain::event::EventFields;

pub trait EmailRepository {
    /// Append in order; ids are assigned by the store.
    fn append_emails(&self, items: &[EmailRecord]) -> Result<usize>;
    /// Newest date string in `emails` that parses in the canonical format.
    fn latest_date(&self) -> Result<Option<String>>;
    fn list_emails(&self) -> Result<Vec<StoredEmail>>;

    /// Oldest unlabeled emails first.
    fn unlabeled(&self, limit: usize) -> Result<Vec<StoredEmail>>;
    fn set_label(&self, id: EmailId, is_event: bool) -> Result<()>;
    fn labeled(&self) -> Result<Vec<StoredEmail>>;

    /// Replace the set of emails classified as events.
    fn replace_event_emails(&self, ids: &[EmailId]) -> Result<()>;
    fn event_emails(&self) -> Result<Vec<StoredEmail>>;

    fn upsert_event_info(&self, id: EmailId, fields: &EventFields) -> Result<()>;
    fn event_info(&self) -> Result<Vec<(EmailId, EventFields)>>;
}
