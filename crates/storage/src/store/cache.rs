#![forbid(unsafe_code)]

use super::support::{placeholders, quote_ident, value_to_string};
use super::{SqliteStore, StoreError, TableMetadata, next_offline_record_id_tx};
use crm_core::ids::{InfoAreaId, RecordIdentification};
use crm_core::{Record, RecordMode};
use rusqlite::{Connection, Transaction, params, params_from_iter};
use std::collections::BTreeMap;

/// Column name to cached value, record id column excluded.
pub type CachedRow = BTreeMap<String, Option<String>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheWrite {
    Inserted,
    Updated,
    Deleted,
    Skipped,
}

impl SqliteStore {
    /// Applies one record to the cache. Id-less records receive an offline id.
    pub fn save_record(&mut self, record: &mut Record) -> Result<CacheWrite, StoreError> {
        self.save_records(std::slice::from_mut(record))?
            .into_iter()
            .next()
            .ok_or(StoreError::InvalidInput("cache write produced no result"))
    }

    /// Applies a batch of records in one transaction: all of them or none.
    pub fn save_records(&mut self, records: &mut [Record]) -> Result<Vec<CacheWrite>, StoreError> {
        let tx = self.conn.transaction()?;
        let mut out = Vec::with_capacity(records.len());
        for record in records.iter_mut() {
            out.push(save_record_tx(&tx, self.metadata.as_ref(), record)?);
        }
        tx.commit()?;
        Ok(out)
    }

    pub fn read_row(
        &self,
        identification: &RecordIdentification,
    ) -> Result<Option<CachedRow>, StoreError> {
        let mut rows = select_rows(
            &self.conn,
            self.metadata.as_ref(),
            identification.info_area_id(),
            identification.record_id(),
            None,
        )?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            count => Err(StoreError::AmbiguousRecord {
                identification: identification.to_string(),
                rows: count,
            }),
        }
    }
}

fn save_record_tx(
    tx: &Transaction<'_>,
    metadata: &dyn TableMetadata,
    record: &mut Record,
) -> Result<CacheWrite, StoreError> {
    if record.mode() == Some(RecordMode::Delete) || record.is_deleted() {
        let Some(record_id) = record.record_id() else {
            return Ok(CacheWrite::Skipped);
        };
        delete_row(tx, metadata, record.info_area_id(), record_id)?;
        return Ok(CacheWrite::Deleted);
    }
    if record.mode() == Some(RecordMode::Sync) {
        return Ok(CacheWrite::Skipped);
    }

    let creates = record.is_new() || record.mode().is_some_and(RecordMode::creates);
    let columns = record_columns(record, metadata)?;
    let record_id = match record.record_id() {
        Some(record_id) => record_id.to_string(),
        None => {
            let record_id = next_offline_record_id_tx(tx)?;
            record.assign_record_id(record_id.clone());
            record_id
        }
    };

    if creates {
        insert_row(tx, metadata, record.info_area_id(), &record_id, &columns)?;
        return Ok(CacheWrite::Inserted);
    }
    if columns.is_empty() {
        return Ok(CacheWrite::Skipped);
    }
    if update_row(tx, metadata, record.info_area_id(), &record_id, &columns)? > 0 {
        return Ok(CacheWrite::Updated);
    }
    insert_row(tx, metadata, record.info_area_id(), &record_id, &columns)?;
    Ok(CacheWrite::Inserted)
}

/// Physical columns a record writes: changed values first, then links. A
/// column named twice keeps its last value.
pub(in crate::store) fn record_columns(
    record: &Record,
    metadata: &dyn TableMetadata,
) -> Result<Vec<(String, Option<String>)>, StoreError> {
    let info_area_id = record.info_area_id();
    let mut out: Vec<(String, Option<String>)> = Vec::new();
    let mut put = |name: String, value: Option<String>| {
        match out.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => out.push((name, value)),
        }
    };

    for value in record.changed_values() {
        let column = metadata
            .field_column(info_area_id, value.field_id())
            .ok_or_else(|| StoreError::UnknownField {
                info_area_id: info_area_id.to_string(),
                field_id: value.field_id(),
            })?;
        put(column.name, Some(value.value().to_string()));
    }

    for link in record.links() {
        let target = link.target();
        let columns = metadata
            .link_columns(info_area_id, target.info_area_id(), link.link_id())
            .ok_or_else(|| StoreError::UnknownLink {
                info_area_id: info_area_id.to_string(),
                target_info_area_id: target.info_area_id().to_string(),
                link_id: link.link_id(),
            })?;
        put(columns.record_id_column, Some(target.record_id().to_string()));
        if let Some(info_area_column) = columns.info_area_column {
            put(info_area_column, Some(target.info_area_id().to_string()));
        }
    }

    Ok(out)
}

/// Rows cached for `record_id`; `columns` narrows the projection.
pub(in crate::store) fn select_rows(
    conn: &Connection,
    metadata: &dyn TableMetadata,
    info_area_id: &InfoAreaId,
    record_id: &str,
    columns: Option<&[String]>,
) -> Result<Vec<CachedRow>, StoreError> {
    let id_column = metadata.record_id_column();
    let projection = match columns {
        None => "*".to_string(),
        Some([]) => quote_ident(id_column),
        Some(columns) => columns
            .iter()
            .map(|name| quote_ident(name))
            .collect::<Vec<_>>()
            .join(", "),
    };
    let sql = format!(
        "SELECT {projection} FROM {} WHERE {}=?1",
        quote_ident(&metadata.table_name(info_area_id)),
        quote_ident(id_column),
    );

    let mut stmt = conn.prepare(&sql)?;
    let names: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
    let mut rows = stmt.query(params![record_id])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut cached = CachedRow::new();
        for (index, name) in names.iter().enumerate() {
            if name == id_column {
                continue;
            }
            cached.insert(name.clone(), value_to_string(row.get_ref(index)?));
        }
        out.push(cached);
    }
    Ok(out)
}

pub(in crate::store) fn insert_row(
    conn: &Connection,
    metadata: &dyn TableMetadata,
    info_area_id: &InfoAreaId,
    record_id: &str,
    columns: &[(String, Option<String>)],
) -> Result<usize, StoreError> {
    let names = std::iter::once(metadata.record_id_column())
        .chain(columns.iter().map(|(name, _)| name.as_str()))
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} ({names}) VALUES ({})",
        quote_ident(&metadata.table_name(info_area_id)),
        placeholders(1, columns.len() + 1),
    );
    let values = std::iter::once(Some(record_id))
        .chain(columns.iter().map(|(_, value)| value.as_deref()))
        .collect::<Vec<_>>();
    Ok(conn.execute(&sql, params_from_iter(values))?)
}

pub(in crate::store) fn update_row(
    conn: &Connection,
    metadata: &dyn TableMetadata,
    info_area_id: &InfoAreaId,
    record_id: &str,
    columns: &[(String, Option<String>)],
) -> Result<usize, StoreError> {
    let assignments = columns
        .iter()
        .enumerate()
        .map(|(index, (name, _))| format!("{}=?{}", quote_ident(name), index + 2))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE {} SET {assignments} WHERE {}=?1",
        quote_ident(&metadata.table_name(info_area_id)),
        quote_ident(metadata.record_id_column()),
    );
    let values = std::iter::once(Some(record_id))
        .chain(columns.iter().map(|(_, value)| value.as_deref()))
        .collect::<Vec<_>>();
    Ok(conn.execute(&sql, params_from_iter(values))?)
}

pub(in crate::store) fn delete_row(
    conn: &Connection,
    metadata: &dyn TableMetadata,
    info_area_id: &InfoAreaId,
    record_id: &str,
) -> Result<usize, StoreError> {
    let sql = format!(
        "DELETE FROM {} WHERE {}=?1",
        quote_ident(&metadata.table_name(info_area_id)),
        quote_ident(metadata.record_id_column()),
    );
    Ok(conn.execute(&sql, params![record_id])?)
}
