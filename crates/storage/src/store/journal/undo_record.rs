#![forbid(unsafe_code)]

use super::super::cache::{delete_row, insert_row, record_columns, select_rows, update_row};
use super::super::{StoreError, TableMetadata};
use crm_core::Record;
use crm_core::ids::{InfoAreaId, RecordIdentification};
use crm_core::journal::{
    RollbackInfo, UndoAction, UndoField, UndoMode, UndoOperation, UndoTransitionError,
};
use rusqlite::{Connection, Transaction};
use std::collections::BTreeMap;

/// Journal entry for one record: the columns a pending write touches, their
/// pre-images, and the statement that restores them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UndoRecord {
    request_nr: i64,
    info_area_id: InfoAreaId,
    record_id: Option<String>,
    mode: UndoMode,
    operation: UndoOperation,
    fields: BTreeMap<String, UndoField>,
}

impl UndoRecord {
    pub fn from_record(
        request_nr: i64,
        record: &Record,
        metadata: &dyn TableMetadata,
    ) -> Result<Self, StoreError> {
        let mut undo = Self {
            request_nr,
            info_area_id: record.info_area_id().clone(),
            record_id: record.record_id().map(str::to_string),
            mode: UndoMode::for_record(record),
            operation: UndoOperation::Uncommitted,
            fields: BTreeMap::new(),
        };
        undo.apply_changes_from_record(record, metadata)?;
        Ok(undo)
    }

    /// Rebuilds an entry read back from the persisted journal.
    pub fn from_rollback_info(
        request_nr: i64,
        info_area_id: InfoAreaId,
        record_id: Option<String>,
        info: RollbackInfo,
    ) -> Self {
        Self {
            request_nr,
            info_area_id,
            record_id,
            mode: info.mode,
            operation: info.undo,
            fields: info
                .fields
                .into_iter()
                .map(|field| (field.name.clone(), field))
                .collect(),
        }
    }

    pub fn rollback_info(&self) -> RollbackInfo {
        RollbackInfo {
            mode: self.mode,
            undo: self.operation,
            fields: self.fields.values().cloned().collect(),
        }
    }

    pub fn request_nr(&self) -> i64 {
        self.request_nr
    }

    pub fn info_area_id(&self) -> &InfoAreaId {
        &self.info_area_id
    }

    pub fn record_id(&self) -> Option<&str> {
        self.record_id.as_deref()
    }

    pub fn identification(&self) -> Option<RecordIdentification> {
        self.record_id
            .as_ref()
            .map(|id| RecordIdentification::new(self.info_area_id.clone(), id.clone()))
    }

    pub fn mode(&self) -> UndoMode {
        self.mode
    }

    pub fn operation(&self) -> UndoOperation {
        self.operation
    }

    pub fn fields(&self) -> impl Iterator<Item = &UndoField> {
        self.fields.values()
    }

    pub fn field(&self, name: &str) -> Option<&UndoField> {
        self.fields.get(name)
    }

    /// Records the columns `record` writes. Pre-images are captured later by
    /// [`UndoRecord::check_before_cache_save`]; a column seen before keeps
    /// its old value. Once checked, an entry accepts no further changes.
    ///
    /// A delete folded into an existing entry turns it into a delete entry,
    /// so the whole row is captured. Created records stay `New`.
    pub fn apply_changes_from_record(
        &mut self,
        record: &Record,
        metadata: &dyn TableMetadata,
    ) -> Result<(), StoreError> {
        self.operation = self.operation.edited()?;
        let columns = record_columns(record, metadata)?;
        if UndoMode::for_record(record) == UndoMode::Delete && self.mode != UndoMode::New {
            self.mode = UndoMode::Delete;
        }
        for (name, value) in columns {
            self.fields
                .entry(name.clone())
                .and_modify(|field| field.value = value.clone())
                .or_insert_with(|| UndoField::new(name, value));
        }
        Ok(())
    }

    /// Captures pre-images from the cache before the protected write.
    pub fn check_before_cache_save(
        &mut self,
        conn: &Connection,
        metadata: &dyn TableMetadata,
    ) -> Result<(), StoreError> {
        let action = match self.mode {
            UndoMode::Delete => self.capture_before_delete(conn, metadata)?,
            UndoMode::Update => self.capture_before_update(conn, metadata)?,
            UndoMode::New => self.record_id.as_ref().map(|_| UndoAction::Delete),
            UndoMode::UpdateNew | UndoMode::DeleteIgnore | UndoMode::Sync => None,
        };
        self.operation = self.operation.checked(action)?;
        tracing::debug!(
            request_nr = self.request_nr,
            record = %self.display_identification(),
            mode = %self.mode,
            undo = %self.operation,
            "captured pre-image"
        );
        Ok(())
    }

    /// Picks up the id the cache assigned to a record this entry created.
    pub fn check_after_cache_save(&mut self, materialized: Option<&Record>) -> Result<(), StoreError> {
        if self.mode != UndoMode::New {
            return Ok(());
        }
        let Some(record_id) = materialized.and_then(Record::record_id) else {
            return Ok(());
        };
        self.record_id = Some(record_id.to_string());
        self.operation = self.operation.materialized()?;
        Ok(())
    }

    /// Runs the reversing statement inside the caller's transaction. Entries
    /// that are ignored or already reversed execute nothing.
    pub fn undo_with_transaction(
        &mut self,
        tx: &Transaction<'_>,
        metadata: &dyn TableMetadata,
    ) -> Result<(), StoreError> {
        let action = match self.operation {
            UndoOperation::Uncommitted => {
                return Err(StoreError::InvalidTransition(UndoTransitionError {
                    from: self.operation,
                    to: "undone",
                }));
            }
            UndoOperation::Ignore | UndoOperation::Done(_) => return Ok(()),
            UndoOperation::Pending(action) => action,
        };
        let record_id = self.required_record_id()?.to_string();

        match action {
            UndoAction::Insert => {
                // The same batch may have written the row again after deleting it.
                delete_row(tx, metadata, &self.info_area_id, &record_id)?;
                insert_row(tx, metadata, &self.info_area_id, &record_id, &self.pre_image())?;
            }
            UndoAction::Update => {
                let pre_image = self.pre_image();
                if !pre_image.is_empty()
                    && update_row(tx, metadata, &self.info_area_id, &record_id, &pre_image)? == 0
                {
                    tracing::warn!(
                        request_nr = self.request_nr,
                        record = %self.display_identification(),
                        "row to restore is missing"
                    );
                    return Err(StoreError::MissingRow {
                        identification: self.display_identification(),
                    });
                }
            }
            UndoAction::Delete => {
                delete_row(tx, metadata, &self.info_area_id, &record_id)?;
            }
        }

        self.operation = self.operation.completed()?;
        tracing::debug!(
            request_nr = self.request_nr,
            record = %self.display_identification(),
            undo = %self.operation,
            "reversed journal entry"
        );
        Ok(())
    }

    pub(super) fn restore_operation(&mut self, operation: UndoOperation) {
        self.operation = operation;
    }

    pub(super) fn display_identification(&self) -> String {
        match self.identification() {
            Some(identification) => identification.to_string(),
            None => format!("{}.<unassigned>", self.info_area_id),
        }
    }

    /// Column values to restore. A missing old value restores NULL.
    fn pre_image(&self) -> Vec<(String, Option<String>)> {
        self.fields
            .values()
            .map(|field| (field.name.clone(), field.old_value.clone()))
            .collect()
    }

    fn required_record_id(&self) -> Result<&str, StoreError> {
        self.record_id
            .as_deref()
            .ok_or(StoreError::InvalidInput("journal entry has no record id"))
    }

    fn single_row(
        &self,
        conn: &Connection,
        metadata: &dyn TableMetadata,
        columns: Option<&[String]>,
    ) -> Result<Option<BTreeMap<String, Option<String>>>, StoreError> {
        let record_id = self.required_record_id()?;
        let mut rows = select_rows(conn, metadata, &self.info_area_id, record_id, columns)?;
        if rows.len() > 1 {
            tracing::warn!(
                request_nr = self.request_nr,
                record = %self.display_identification(),
                rows = rows.len(),
                "ambiguous cache row"
            );
            return Err(StoreError::AmbiguousRecord {
                identification: self.display_identification(),
                rows: rows.len(),
            });
        }
        Ok(rows.pop())
    }

    fn capture_before_delete(
        &mut self,
        conn: &Connection,
        metadata: &dyn TableMetadata,
    ) -> Result<Option<UndoAction>, StoreError> {
        let Some(row) = self.single_row(conn, metadata, None)? else {
            self.mode = UndoMode::DeleteIgnore;
            return Ok(None);
        };
        for (name, old_value) in row {
            self.fields
                .entry(name.clone())
                .or_insert_with(|| UndoField::new(name, None))
                .old_value = old_value;
        }
        Ok(Some(UndoAction::Insert))
    }

    fn capture_before_update(
        &mut self,
        conn: &Connection,
        metadata: &dyn TableMetadata,
    ) -> Result<Option<UndoAction>, StoreError> {
        let columns: Vec<String> = self.fields.keys().cloned().collect();
        let Some(row) = self.single_row(conn, metadata, Some(&columns))? else {
            self.mode = UndoMode::UpdateNew;
            return Ok(Some(UndoAction::Delete));
        };
        for (name, old_value) in row {
            if let Some(field) = self.fields.get_mut(&name) {
                field.old_value = old_value;
            }
        }
        Ok(Some(UndoAction::Update))
    }
}
