use anyhow::Result;
use rusqlite::{Connection, Row, params};

use crate::domain::email::{EmailId, EmailRecord, StoredEmail};
use crate::domain::event::EventFields;
use crate::domain::timestamp::ResolvedTimestamp;
use crate::store::repo::EmailRepository;

const EMAIL_COLUMNS: &str = "e.id, e.subject, e.sender, e.date, e.body, e.is_event";

pub struct SqliteRepo {
    conn: Connection,
}

impl SqliteRepo {
    pub fn open(path: &std::path::Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let repo = Self { conn };
        repo.migrate()?;
        Ok(repo)
    }

    pub fn open_in_memory() -> Result<Self> {
        let repo = Self {
            conn: Connection::open_in_memory()?,
        };
        repo.migrate()?;
        Ok(repo)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS emails (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                subject   TEXT NOT NULL,
                sender    TEXT NOT NULL,
                date      TEXT NOT NULL,
                body      TEXT NOT NULL,
                is_event  INTEGER
            );

            CREATE TABLE IF NOT EXISTS event_emails (
                id  INTEGER PRIMARY KEY REFERENCES emails(id)
            );

            CREATE TABLE IF NOT EXISTS event_info (
                id                     INTEGER PRIMARY KEY REFERENCES emails(id),
                event_name             TEXT NOT NULL,
                description            TEXT NOT NULL,
                location               TEXT NOT NULL,
                date                   TEXT NOT NULL,
                registration_required  TEXT NOT NULL,
                food_provided          TEXT NOT NULL
            );
            "#,
        )?;

        // emails.db files from before labeling have no is_event column.
        match self
            .conn
            .execute("ALTER TABLE emails ADD COLUMN is_event INTEGER", [])
        {
            Ok(_) => log::info!("added is_event column to emails"),
            Err(e) if e.to_string().contains("duplicate column") => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    fn query_emails(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<StoredEmail>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, email_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn email_from_row(r: &Row<'_>) -> rusqlite::Result<StoredEmail> {
    Ok(StoredEmail {
        id: r.get(0)?,
        subject: r.get(1)?,
        sender: r.get(2)?,
        date: r.get(3)?,
        body: r.get(4)?,
        is_event: r.get::<_, Option<i64>>(5)?.map(|v| v != 0),
    })
}

impl EmailRepository for SqliteRepo {
    fn append_emails(&self, items: &[EmailRecord]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO emails (subject, sender, date, body)
                VALUES (?1, ?2, ?3, ?4)
                "#,
            )?;

            for it in items {
                stmt.execute(params![it.subject, it.sender, it.date, it.body])?;
            }
        }
        tx.commit()?;
        Ok(items.len())
    }

    fn latest_date(&self) -> Result<Option<String>> {
        // Stored dates are display strings, so order them in Rust rather than SQL.
        let mut stmt = self.conn.prepare("SELECT date FROM emails")?;
        let mut rows = stmt.query([])?;
        let mut latest: Option<ResolvedTimestamp> = None;
        while let Some(r) = rows.next()? {
            let date: String = r.get(0)?;
            if let Some(ts) = ResolvedTimestamp::parse(&date) {
                latest = latest.max(Some(ts));
            }
        }
        Ok(latest.map(|ts| ts.render()))
    }

    fn list_emails(&self) -> Result<Vec<StoredEmail>> {
        self.query_emails(
            &format!("SELECT {EMAIL_COLUMNS} FROM emails e ORDER BY e.id"),
            [],
        )
    }

    fn unlabeled(&self, limit: usize) -> Result<Vec<StoredEmail>> {
        let mut out = self.query_emails(
            &format!("SELECT {EMAIL_COLUMNS} FROM emails e WHERE e.is_event IS NULL ORDER BY e.id"),
            [],
        )?;
        out.sort_by_key(|e| ResolvedTimestamp::parse(&e.date).map(|ts| ts.naive()));
        out.truncate(limit);
        Ok(out)
    }

    fn set_label(&self, id: EmailId, is_event: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE emails SET is_event=?1 WHERE id=?2",
            params![is_event as i64, id],
        )?;
        Ok(())
    }

    fn labeled(&self) -> Result<Vec<StoredEmail>> {
        self.query_emails(
            &format!(
                "SELECT {EMAIL_COLUMNS} FROM emails e WHERE e.is_event IS NOT NULL ORDER BY e.id"
            ),
            [],
        )
    }

    fn replace_event_emails(&self, ids: &[EmailId]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM event_emails", [])?;
        {
            let mut stmt = tx.prepare("INSERT OR IGNORE INTO event_emails (id) VALUES (?1)")?;
            for id in ids {
                stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn event_emails(&self) -> Result<Vec<StoredEmail>> {
        self.query_emails(
            &format!(
                "SELECT {EMAIL_COLUMNS} FROM emails e JOIN event_emails v ON v.id = e.id ORDER BY e.id"
            ),
            [],
        )
    }

    fn upsert_event_info(&self, id: EmailId, f: &EventFields) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO event_info
              (id, event_name, description, location, date, registration_required, food_provided)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
              event_name=excluded.event_name,
              description=excluded.description,
              location=excluded.location,
              date=excluded.date,
              registration_required=excluded.registration_required,
              food_provided=excluded.food_provided
            "#,
            params![
                id,
                f.event_name,
                f.description,
                f.location,
                f.date,
                f.registration_required,
                f.food_provided
            ],
        )?;
        Ok(())
    }

    fn event_info(&self) -> Result<Vec<(EmailId, EventFields)>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, event_name, description, location, date, registration_required, food_provided
            FROM event_info
            ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map([], |r| {
            Ok((
                r.get(0)?,
                EventFields {
                    event_name: r.get(1)?,
                    description: r.get(2)?,
                    location: r.get(3)?,
                    date: r.get(4)?,
                    registration_required: r.get(5)?,
                    food_provided: r.get(6)?,
                },
            ))
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(subject: &str, date: &str) -> EmailRecord {
        EmailRecord {
            subject: subject.into(),
            sender: "a@b.c".into(),
            date: date.into(),
            body: format!("{subject} body"),
        }
    }

    #[test]
    fn labels_work_on_a_database_without_is_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emails.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE emails (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    subject TEXT, sender TEXT, date TEXT, body TEXT
                );
                INSERT INTO emails (subject, sender, date, body)
                VALUES ('Pizza', 'a@b.c', 'Wed 1/10/2024 9:00 AM', 'tonight');",
            )
            .unwrap();
        }

        let repo = SqliteRepo::open(&path).unwrap();
        let todo = repo.unlabeled(10).unwrap();
        assert_eq!(todo.len(), 1);
        assert_eq!(todo[0].is_event, None);
        repo.set_label(todo[0].id, true).unwrap();
        assert_eq!(repo.labeled().unwrap()[0].is_event, Some(true));

        // Reopening must not trip over the column it already added.
        drop(repo);
        assert_eq!(SqliteRepo::open(&path).unwrap().list_emails().unwrap().len(), 1);
    }

    #[test]
    fn ids_follow_append_order() {
        let repo = SqliteRepo::open_in_memory().unwrap();
        repo.append_emails(&[rec("one", "Wed 1/10/2024 9:00 AM"), rec("two", "Tue 1/9/2024 9:00 AM")])
            .unwrap();
        repo.append_emails(&[rec("three", "Mon 1/8/2024 9:00 AM")]).unwrap();
        let all = repo.list_emails().unwrap();
        let ids: Vec<_> = all.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(all[2].subject, "three");
        assert_eq!(all[0].is_event, None);
    }

    #[test]
    fn latest_date_compares_as_time_not_text() {
        let repo = SqliteRepo::open_in_memory().unwrap();
        assert_eq!(repo.latest_date().unwrap(), None);
        repo.append_emails(&[
            rec("a", "Wed 1/10/2024 9:00 AM"),
            rec("b", "Thu 1/11/2024 8:00 AM"),
            rec("c", "Tue 1/9/2024 11:00 PM"),
            rec("d", "not a date"),
        ])
        .unwrap();
        assert_eq!(repo.latest_date().unwrap().as_deref(), Some("Thu 1/11/2024 8:00 AM"));
    }

    #[test]
    fn labeling_round_trip() {
        let repo = SqliteRepo::open_in_memory().unwrap();
        repo.append_emails(&[
            rec("newer", "Wed 1/10/2024 9:00 AM"),
            rec("older", "Mon 1/8/2024 9:00 AM"),
            rec("oldest", "Sun 1/7/2024 9:00 AM"),
        ])
        .unwrap();
        let todo = repo.unlabeled(2).unwrap();
        let subjects: Vec<_> = todo.iter().map(|e| e.subject.as_str()).collect();
        assert_eq!(subjects, vec!["oldest", "older"]);

        repo.set_label(todo[0].id, true).unwrap();
        repo.set_label(todo[1].id, false).unwrap();
        let labeled = repo.labeled().unwrap();
        assert_eq!(labeled.len(), 2);
        assert_eq!(repo.unlabeled(10).unwrap().len(), 1);
        assert!(labeled.iter().any(|e| e.subject == "oldest" && e.is_event == Some(true)));
    }

    #[test]
    fn event_emails_are_replaced_wholesale() {
        let repo = SqliteRepo::open_in_memory().unwrap();
        repo.append_emails(&[rec("a", "Wed 1/10/2024 9:00 AM"), rec("b", "Wed 1/10/2024 9:00 AM")])
            .unwrap();
        repo.replace_event_emails(&[1, 2]).unwrap();
        repo.replace_event_emails(&[2]).unwrap();
        let events = repo.event_emails().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].subject, "b");
    }

    #[test]
    fn event_info_upserts_by_email_id() {
        let repo = SqliteRepo::open_in_memory().unwrap();
        repo.append_emails(&[rec("a", "Wed 1/10/2024 9:00 AM")]).unwrap();
        let mut f = EventFields::default();
        repo.upsert_event_info(1, &f).unwrap();
        f.event_name = "Board Games".into();
        repo.upsert_event_info(1, &f).unwrap();
        let info = repo.event_info().unwrap();
        assert_eq!(info, vec![(1, f)]);
    }
}
