#![forbid(unsafe_code)]

use super::super::{SqliteStore, StoreError};
use super::UndoRequest;
use super::undo_request::delete_journal_tx;
use crm_core::Record;
use std::sync::Arc;

impl SqliteStore {
    /// Journals `records` under `request_nr` and applies them to the cache.
    ///
    /// The journal is durable before the cache changes. When the cache write
    /// fails nothing was applied and the journal is dropped again.
    pub fn commit_records(
        &mut self,
        request_nr: i64,
        records: &mut [Record],
    ) -> Result<UndoRequest, StoreError> {
        if records.is_empty() {
            return Err(StoreError::EmptyJournal { request_nr });
        }
        for record in records.iter_mut() {
            if record.record_id().is_none() {
                let record_id = self.next_offline_record_id()?;
                record.assign_record_id(record_id);
            }
        }

        let mut undo = UndoRequest::new(request_nr);
        for record in records.iter() {
            undo.add_record(record, self.metadata.as_ref())?;
        }
        undo.check_before_cache_save(self)?;
        undo.save(self)?;

        if let Err(err) = self.save_records(records) {
            tracing::warn!(request_nr, error = %err, "cache write failed; dropping journal");
            undo.discard(self)?;
            return Err(err);
        }

        undo.check_after_cache_save(records)?;
        undo.save(self)?;
        Ok(undo)
    }

    /// The server accepted the request; its journal is no longer needed.
    pub fn confirm_request(&mut self, request_nr: i64) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        let removed = delete_journal_tx(&tx, request_nr)?;
        tx.commit()?;
        tracing::info!(request_nr, removed, "confirmed request");
        Ok(removed)
    }

    /// Restores the cache to its state before `request_nr` and drops the
    /// journal, in one transaction.
    pub fn rollback_request(&mut self, request_nr: i64) -> Result<UndoRequest, StoreError> {
        let mut undo = UndoRequest::load(self, request_nr)?;
        let metadata = Arc::clone(&self.metadata);
        let tx = self.conn.transaction()?;
        undo.undo_atomically(tx, metadata.as_ref(), |tx| {
            delete_journal_tx(tx, request_nr).map(|_| ())
        })?;
        Ok(undo)
    }

    /// Request numbers whose journal is still persisted, ascending. After a
    /// restart these are the requests whose outcome is unknown.
    pub fn pending_request_numbers(&self) -> Result<Vec<i64>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT requestnr FROM rollbackinfo ORDER BY requestnr ASC")?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
