use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS messages (
            channel_id      INTEGER NOT NULL,
            channel_name    TEXT    NOT NULL,
            message_id      INTEGER NOT NULL,
            content         TEXT    NOT NULL,
            has_attachment  INTEGER NOT NULL DEFAULT 0,
            attachment_path TEXT,
            posted_at       TEXT    NOT NULL,
            PRIMARY KEY (channel_id, message_id)
        );
        ",
    )?;

    info!("message store migrations complete");
    Ok(())
}
