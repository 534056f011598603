#![forbid(unsafe_code)]

use super::super::{SqliteStore, StoreError, TableMetadata};
use super::UndoRecord;
use crm_core::Record;
use crm_core::ids::{InfoAreaId, RecordIdentification};
use crm_core::journal::{RollbackInfo, UndoOperation};
use rusqlite::{Transaction, params};
use std::collections::HashMap;
use std::sync::Arc;

/// The journal of one server round-trip: at most one [`UndoRecord`] per
/// record identification, reversed as a unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UndoRequest {
    request_nr: i64,
    records: Vec<UndoRecord>,
    by_identification: HashMap<RecordIdentification, usize>,
    /// Entry index for each `add_record` call, in call order.
    added: Vec<usize>,
}

impl UndoRequest {
    pub fn new(request_nr: i64) -> Self {
        Self {
            request_nr,
            ..Self::default()
        }
    }

    pub fn request_nr(&self) -> i64 {
        self.request_nr
    }

    pub fn records(&self) -> &[UndoRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn record(&self, identification: &RecordIdentification) -> Option<&UndoRecord> {
        self.by_identification
            .get(identification)
            .map(|index| &self.records[*index])
    }

    /// Journals `record`, folding repeated edits of one identification into
    /// the same entry. Records without an id always open a new entry.
    pub fn add_record(
        &mut self,
        record: &Record,
        metadata: &dyn TableMetadata,
    ) -> Result<(), StoreError> {
        let identification = record.identification();
        if let Some(index) = identification
            .as_ref()
            .and_then(|id| self.by_identification.get(id).copied())
        {
            self.records[index].apply_changes_from_record(record, metadata)?;
            self.added.push(index);
            return Ok(());
        }

        let index = self.records.len();
        self.records
            .push(UndoRecord::from_record(self.request_nr, record, metadata)?);
        if let Some(identification) = identification {
            self.by_identification.insert(identification, index);
        }
        self.added.push(index);
        Ok(())
    }

    pub fn check_before_cache_save(&mut self, store: &SqliteStore) -> Result<(), StoreError> {
        for record in &mut self.records {
            record.check_before_cache_save(&store.conn, store.metadata.as_ref())?;
        }
        Ok(())
    }

    /// `saved` is the batch given to [`UndoRequest::add_record`], in the same
    /// order, after the cache write assigned ids.
    pub fn check_after_cache_save(&mut self, saved: &[Record]) -> Result<(), StoreError> {
        if saved.len() != self.added.len() {
            return Err(StoreError::InvalidInput(
                "saved batch does not match the journaled records",
            ));
        }
        for (record, index) in saved.iter().zip(&self.added) {
            self.records[*index].check_after_cache_save(Some(record))?;
        }
        self.reindex();
        Ok(())
    }

    /// Replaces the persisted journal of this request with the current entries.
    pub fn save(&self, store: &mut SqliteStore) -> Result<(), StoreError> {
        if self.records.is_empty() {
            return Err(StoreError::EmptyJournal {
                request_nr: self.request_nr,
            });
        }

        let tx = store.conn.transaction()?;
        delete_journal_tx(&tx, self.request_nr)?;
        for record in &self.records {
            let rollback_info = record.rollback_info().to_json_string()?;
            tx.execute(
                "INSERT INTO rollbackinfo(requestnr, infoareaid, recordid, rollbackinfo) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    self.request_nr,
                    record.info_area_id().as_str(),
                    record.record_id(),
                    rollback_info,
                ],
            )?;
        }
        tx.commit()?;

        tracing::info!(
            request_nr = self.request_nr,
            records = self.records.len(),
            "saved rollback journal"
        );
        Ok(())
    }

    /// Reads the journal persisted for `request_nr`. No rows is an empty,
    /// valid journal.
    pub fn load(store: &SqliteStore, request_nr: i64) -> Result<Self, StoreError> {
        let mut stmt = store.conn.prepare(
            "SELECT infoareaid, recordid, rollbackinfo FROM rollbackinfo \
             WHERE requestnr=?1 ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map(params![request_nr], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut out = Self::new(request_nr);
        for row in rows {
            let (info_area_id, record_id, raw) = row?;
            let info_area_id = InfoAreaId::try_new(info_area_id)
                .map_err(|_| StoreError::InvalidInput("journal row has an invalid info area id"))?;
            let info = RollbackInfo::from_json_str(&raw)?;
            out.records.push(UndoRecord::from_rollback_info(
                request_nr,
                info_area_id,
                record_id,
                info,
            ));
        }
        out.reindex();
        Ok(out)
    }

    /// Reverses every entry in order inside one transaction. On failure the
    /// cache and the in-memory entries are left as they were before the call.
    pub fn undo_request(&mut self, store: &mut SqliteStore) -> Result<(), StoreError> {
        let metadata = Arc::clone(&store.metadata);
        let tx = store.conn.transaction()?;
        self.undo_atomically(tx, metadata.as_ref(), |_| Ok(()))
    }

    /// Deletes the persisted journal rows; returns how many were removed.
    pub fn discard(&self, store: &mut SqliteStore) -> Result<usize, StoreError> {
        let tx = store.conn.transaction()?;
        let removed = delete_journal_tx(&tx, self.request_nr)?;
        tx.commit()?;
        Ok(removed)
    }

    /// Reverses all entries, runs `finish` in the same transaction, commits.
    pub(super) fn undo_atomically(
        &mut self,
        tx: Transaction<'_>,
        metadata: &dyn TableMetadata,
        finish: impl FnOnce(&Transaction<'_>) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        if self.records.is_empty() {
            return Err(StoreError::EmptyJournal {
                request_nr: self.request_nr,
            });
        }

        let before: Vec<UndoOperation> = self.records.iter().map(UndoRecord::operation).collect();
        let mut result = self
            .records
            .iter_mut()
            .try_for_each(|record| record.undo_with_transaction(&tx, metadata));
        if result.is_ok() {
            result = finish(&tx);
        }
        if result.is_ok() {
            result = tx.commit().map_err(StoreError::from);
        }

        if let Err(err) = result {
            tracing::warn!(
                request_nr = self.request_nr,
                error = %err,
                "undo failed; rolled back"
            );
            self.restore_operations(&before);
            return Err(err);
        }
        tracing::info!(
            request_nr = self.request_nr,
            records = self.records.len(),
            "undo request applied"
        );
        Ok(())
    }

    fn restore_operations(&mut self, before: &[UndoOperation]) {
        for (record, operation) in self.records.iter_mut().zip(before) {
            record.restore_operation(*operation);
        }
    }

    fn reindex(&mut self) {
        self.by_identification = self
            .records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| record.identification().map(|id| (id, index)))
            .collect();
    }
}

pub(super) fn delete_journal_tx(tx: &Transaction<'_>, request_nr: i64) -> Result<usize, StoreError> {
    Ok(tx.execute(
        "DELETE FROM rollbackinfo WHERE requestnr=?1",
        params![request_nr],
    )?)
}
