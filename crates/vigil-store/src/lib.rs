pub mod migrations;
pub mod queries;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::Connection;
use tracing::info;

/// The persistence gateway.
///
/// Every query opens and closes its own connection, so no connection is ever
/// held across an engine suspension point. The store's uniqueness constraint
/// on `(channel_id, message_id)` is the only concurrency-correctness
/// mechanism the engine relies on.
#[derive(Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    /// Open (creating if needed) the database, switch it to WAL, and run
    /// migrations. Failure here is fatal at startup.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self { path: path.into() };
        let conn = store.connect()?;

        // WAL mode for concurrent readers alongside the writer pool
        conn.pragma_update(None, "journal_mode", "WAL")?;

        migrations::run(&conn)?;

        info!("message store opened at {}", store.path.display());
        Ok(store)
    }

    pub(crate) fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)
            .with_context(|| format!("opening message store at {}", self.path.display()))?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(conn)
    }
}
