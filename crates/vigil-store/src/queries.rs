use anyhow::Result;
use chrono::DateTime;
use rusqlite::params;

use crate::Store;
use vigil_types::MessageRecord;

impl Store {
    /// Idempotent insert keyed by `(channel_id, message_id)`. A conflicting
    /// key is a no-op, never an error; the first-written row stays unchanged.
    /// Returns whether a row was actually written.
    pub fn upsert(&self, record: &MessageRecord) -> Result<bool> {
        let conn = self.connect()?;
        let written = conn.execute(
            "INSERT INTO messages
                (channel_id, channel_name, message_id, content,
                 has_attachment, attachment_path, posted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (channel_id, message_id) DO NOTHING",
            params![
                record.channel_id,
                record.channel_name,
                record.message_id,
                record.content,
                record.has_attachment,
                record
                    .attachment_path
                    .as_ref()
                    .map(|p| p.to_string_lossy().into_owned()),
                record.posted_at.to_rfc3339(),
            ],
        )?;
        Ok(written > 0)
    }

    /// Highest persisted message id for a channel; 0 if no rows exist.
    ///
    /// This is the sync cursor: derived on demand, never cached, so a
    /// restart or a concurrent pass always sees the latest durable state.
    pub fn last_message_id(&self, channel_id: i64) -> Result<i64> {
        let conn = self.connect()?;
        let id = conn.query_row(
            "SELECT COALESCE(MAX(message_id), 0) FROM messages WHERE channel_id = ?1",
            [channel_id],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// All rows for a channel in insertion order.
    pub fn messages(&self, channel_id: i64) -> Result<Vec<MessageRecord>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT channel_id, channel_name, message_id, content,
                    has_attachment, attachment_path, posted_at
             FROM messages WHERE channel_id = ?1 ORDER BY rowid",
        )?;

        let rows = stmt
            .query_map([channel_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, bool>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(channel_id, channel_name, message_id, content, has_attachment, path, posted)| {
                    Ok(MessageRecord {
                        channel_id,
                        channel_name,
                        message_id,
                        content,
                        has_attachment,
                        attachment_path: path.map(Into::into),
                        posted_at: DateTime::parse_from_rfc3339(&posted)?,
                    })
                },
            )
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn record(channel_id: i64, message_id: i64, content: &str) -> MessageRecord {
        let offset = FixedOffset::east_opt(9 * 3600).unwrap();
        MessageRecord {
            channel_id,
            channel_name: "alerts".into(),
            message_id,
            content: content.into(),
            has_attachment: false,
            attachment_path: None,
            posted_at: DateTime::parse_from_rfc3339("2026-08-01T09:00:00Z")
                .unwrap()
                .with_timezone(&offset),
        }
    }

    fn open_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("vigil.db")).unwrap();
        (dir, store)
    }

    #[test]
    fn upsert_is_idempotent_and_first_write_wins() {
        let (_dir, store) = open_store();

        assert!(store.upsert(&record(1, 10, "first")).unwrap());
        assert!(!store.upsert(&record(1, 10, "second")).unwrap());

        let rows = store.messages(1).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].content, "first");
    }

    #[test]
    fn last_message_id_is_zero_for_empty_channel() {
        let (_dir, store) = open_store();
        assert_eq!(store.last_message_id(1).unwrap(), 0);
    }

    #[test]
    fn last_message_id_is_max_over_channel_rows() {
        let (_dir, store) = open_store();
        store.upsert(&record(1, 3, "a")).unwrap();
        store.upsert(&record(1, 12, "b")).unwrap();
        store.upsert(&record(1, 7, "c")).unwrap();
        store.upsert(&record(2, 99, "other channel")).unwrap();

        assert_eq!(store.last_message_id(1).unwrap(), 12);
        assert_eq!(store.last_message_id(2).unwrap(), 99);
    }

    #[test]
    fn concurrent_upserts_of_same_key_yield_one_row() {
        let (_dir, store) = open_store();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || store.upsert(&record(5, 42, "raced")).unwrap())
            })
            .collect();

        let written: Vec<bool> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(written.iter().filter(|w| **w).count(), 1);
        assert_eq!(store.messages(5).unwrap().len(), 1);
    }

    #[test]
    fn round_trips_attachment_path_and_timestamp() {
        let (_dir, store) = open_store();
        let mut rec = record(1, 1, "with file");
        rec.has_attachment = true;
        rec.attachment_path = Some("/data/content/1_1".into());
        store.upsert(&rec).unwrap();

        let rows = store.messages(1).unwrap();
        assert_eq!(rows[0], rec);
    }
}
