#![forbid(unsafe_code)]

mod cache;
mod error;
mod journal;
mod metadata;
mod options;
mod support;

pub use cache::*;
pub use error::*;
pub use journal::*;
pub use metadata::*;
pub use options::*;

use crm_core::ids::OFFLINE_RECORD_ID_PREFIX;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const OFFLINE_SEQ_KEY: &str = "offline_record_seq";

/// The local record cache together with its rollback journal.
///
/// Mutating operations take `&mut self`; one store handle is one writer.
pub struct SqliteStore {
    conn: Connection,
    storage_dir: Option<PathBuf>,
    metadata: Arc<dyn TableMetadata>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("storage_dir", &self.storage_dir)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    pub fn open(
        storage_dir: impl AsRef<Path>,
        metadata: Arc<dyn TableMetadata>,
    ) -> Result<Self, StoreError> {
        Self::open_with_options(storage_dir, metadata, &StoreOptions::from_env())
    }

    pub fn open_with_options(
        storage_dir: impl AsRef<Path>,
        metadata: Arc<dyn TableMetadata>,
        options: &StoreOptions,
    ) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let db_path = storage_dir.join(&options.db_file_name);
        let conn = Connection::open(&db_path)?;
        conn.busy_timeout(options.busy_timeout)?;
        support::migrate_sqlite_schema(&conn)?;
        tracing::debug!(path = %db_path.display(), "opened record cache");

        Ok(Self {
            conn,
            storage_dir: Some(storage_dir),
            metadata,
        })
    }

    pub fn open_in_memory(metadata: Arc<dyn TableMetadata>) -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        support::migrate_sqlite_schema(&conn)?;
        Ok(Self {
            conn,
            storage_dir: None,
            metadata,
        })
    }

    pub fn storage_dir(&self) -> Option<&Path> {
        self.storage_dir.as_deref()
    }

    pub fn metadata(&self) -> &dyn TableMetadata {
        self.metadata.as_ref()
    }

    /// Read access for collaborators that query the cache directly.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn install_tables(&self, catalog: &SchemaCatalog) -> Result<(), StoreError> {
        self.conn.execute_batch(&catalog.create_tables_sql())?;
        Ok(())
    }

    /// Reserves the next locally assigned record id (`new00000001`, ...).
    pub fn next_offline_record_id(&mut self) -> Result<String, StoreError> {
        let tx = self.conn.transaction()?;
        let id = next_offline_record_id_tx(&tx)?;
        tx.commit()?;
        Ok(id)
    }
}

fn next_offline_record_id_tx(tx: &Transaction<'_>) -> Result<String, StoreError> {
    let current = tx
        .query_row(
            "SELECT value FROM meta WHERE key=?1",
            params![OFFLINE_SEQ_KEY],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    let current = match current {
        Some(raw) => raw
            .parse::<u64>()
            .map_err(|_| StoreError::InvalidInput("offline record counter is corrupt"))?,
        None => 0,
    };
    let next = current + 1;
    tx.execute(
        "INSERT INTO meta(key, value) VALUES (?1, ?2) \
         ON CONFLICT(key) DO UPDATE SET value=excluded.value",
        params![OFFLINE_SEQ_KEY, next.to_string()],
    )?;
    Ok(format!("{OFFLINE_RECORD_ID_PREFIX}{next:08}"))
}
